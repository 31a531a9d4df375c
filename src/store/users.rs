use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use tracing::warn;
use uuid::Uuid;

use super::Store;
use crate::{
    entities::users,
    error::{AppError, AppResult, Violation, violation},
    models::{Role, User, timestamp},
};

impl TryFrom<users::Model> for User {
    type Error = AppError;

    fn try_from(model: users::Model) -> Result<Self, Self::Error> {
        let role = model.role.parse::<Role>().map_err(|err| {
            warn!(user = %model.id, error = %err, "stored user has an unknown role");
            AppError::Internal(anyhow::anyhow!(err))
        })?;
        Ok(Self {
            id: model.id,
            username: model.username,
            password_hash: model.password_hash,
            role,
            created_at: timestamp(model.created_at),
            updated_at: timestamp(model.updated_at),
        })
    }
}

impl Store {
    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> AppResult<User> {
        let now = timestamp(self.now_sec());
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: now,
            updated_at: now,
        };
        let model = users::ActiveModel {
            id: Set(user.id.clone()),
            username: Set(user.username.clone()),
            password_hash: Set(user.password_hash.clone()),
            role: Set(role.as_str().to_string()),
            created_at: Set(now.as_second()),
            updated_at: Set(now.as_second()),
        };

        users::Entity::insert(model).exec_without_returning(&self.db).await.map_err(|err| {
            match violation(&err) {
                Some(Violation::Unique) => AppError::UsernameTaken,
                _ => err.into(),
            }
        })?;
        Ok(user)
    }

    pub async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db)
            .await?
            .map(User::try_from)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;

    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn usernames_are_unique() {
        let (store, _clock) = testing::store().await;
        store.create_user("alice", "hash", Role::User).await.unwrap();
        assert!(matches!(
            store.create_user("alice", "other", Role::Admin).await,
            Err(AppError::UsernameTaken)
        ));
    }

    #[tokio::test]
    async fn returned_user_matches_stored_user() {
        let (store, clock) = testing::store().await;
        clock.advance(SignedDuration::from_millis(250));
        let created = store.create_user("alice", "hash", Role::User).await.unwrap();

        let found = store.find_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.created_at, created.created_at);
        assert_eq!(found.updated_at, created.updated_at);
        assert_eq!(created.created_at, testing::epoch());
    }

    #[tokio::test]
    async fn finds_user_with_role() {
        let (store, _clock) = testing::store().await;
        let created = store.create_user("root", "hash", Role::Admin).await.unwrap();

        let found = store.find_user_by_username("root").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.role, Role::Admin);
        assert_eq!(found.created_at, testing::epoch());

        assert!(store.find_user_by_username("nobody").await.unwrap().is_none());
    }
}
