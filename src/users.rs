use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use serde::Serialize;
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    models::{Role, User},
    store::Store,
    tokens::{Claims, TokenAuthority},
};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub expires_at: i64,
    pub user: User,
}

#[derive(Clone)]
pub struct UserService {
    store: Store,
    tokens: TokenAuthority,
}

impl UserService {
    pub fn new(store: Store, tokens: TokenAuthority) -> Self {
        Self { store, tokens }
    }

    pub async fn register(&self, username: &str, password: &str) -> AppResult<User> {
        self.create(username, password, Role::User).await
    }

    pub async fn create_admin(&self, username: &str, password: &str) -> AppResult<User> {
        self.create(username, password, Role::Admin).await
    }

    pub async fn login(&self, username: &str, password: &str) -> AppResult<Session> {
        let user = self
            .store
            .find_user_by_username(username.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let hash = PasswordHash::new(&user.password_hash)
            .map_err(|err| AppError::Internal(anyhow::anyhow!("stored hash: {err}")))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .map_err(|_| AppError::InvalidCredentials)?;

        let (token, claims) = self.tokens.issue(&user.id, &user.username, user.role)?;
        info!(user_id = %user.id, "user logged in");
        Ok(Session { token, expires_at: claims.exp, user })
    }

    pub async fn logout(&self, claims: &Claims) -> AppResult<()> {
        self.tokens.revoke(claims).await?;
        info!(user_id = %claims.user_id, "user logged out");
        Ok(())
    }

    async fn create(&self, username: &str, password: &str, role: Role) -> AppResult<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("username is required".into()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.store.find_user_by_username(username).await?.is_some() {
            return Err(AppError::UsernameTaken);
        }

        let user = self.store.create_user(username, &hash_password(password)?, role).await?;
        info!(user_id = %user.id, %role, "user created");
        Ok(user)
    }
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Internal(anyhow::anyhow!("hash password: {err}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jiff::SignedDuration;

    use super::*;
    use crate::{cache::SqliteCache, testing};

    async fn service() -> UserService {
        let (store, clock) = testing::store().await;
        let cache = SqliteCache::new(store.db().clone(), Arc::new(clock.clone()));
        let tokens = TokenAuthority::new(
            "test-secret",
            SignedDuration::from_hours(1),
            Arc::new(cache),
            Arc::new(clock),
        );
        UserService::new(store, tokens)
    }

    #[tokio::test]
    async fn register_then_login() {
        let users = service().await;
        let user = users.register("  alice ", "hunter22").await.unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, Role::User);
        assert!(user.password_hash.starts_with("$argon2"));

        let session = users.login("alice", "hunter22").await.unwrap();
        assert_eq!(session.user.id, user.id);
        assert!(!session.token.is_empty());
    }

    #[tokio::test]
    async fn rejects_bad_registrations() {
        let users = service().await;
        assert!(matches!(users.register(" ", "hunter22").await, Err(AppError::Validation(_))));
        assert!(matches!(users.register("bob", "short").await, Err(AppError::Validation(_))));

        users.register("bob", "hunter22").await.unwrap();
        assert!(matches!(users.register("bob", "another1").await, Err(AppError::UsernameTaken)));
    }

    #[tokio::test]
    async fn wrong_password_or_unknown_user_is_invalid_credentials() {
        let users = service().await;
        users.register("alice", "hunter22").await.unwrap();
        assert!(matches!(users.login("alice", "hunter23").await, Err(AppError::InvalidCredentials)));
        assert!(matches!(users.login("carol", "hunter22").await, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn logout_revokes_the_session_token() {
        let users = service().await;
        let admin = users.create_admin("root", "rootroot").await.unwrap();
        assert_eq!(admin.role, Role::Admin);

        let session = users.login("root", "rootroot").await.unwrap();
        let claims = users.tokens.validate(&session.token).await.unwrap();
        assert!(claims.is_admin());

        users.logout(&claims).await.unwrap();
        assert!(matches!(users.tokens.validate(&session.token).await, Err(AppError::Revoked)));
    }
}
