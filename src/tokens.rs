use std::sync::Arc;

use jiff::SignedDuration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    cache::KeyValueCache,
    clock::Clock,
    error::{AppError, AppResult},
    models::Role,
};

const REVOKED: &str = "true";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Issues HS256 bearer tokens and keeps the revocation list in the
/// key-value cache, one `revoked:{jti}` entry per logged-out token.
#[derive(Clone)]
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: SignedDuration,
    revocations: Arc<dyn KeyValueCache>,
    clock: Arc<dyn Clock>,
}

impl TokenAuthority {
    pub fn new(
        secret: &str,
        ttl: SignedDuration,
        revocations: Arc<dyn KeyValueCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            revocations,
            clock,
        }
    }

    pub fn issue(&self, user_id: &str, username: &str, role: Role) -> AppResult<(String, Claims)> {
        let now = self.clock.now().as_second();
        let claims = Claims {
            user_id: user_id.to_string(),
            username: username.to_string(),
            role,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| AppError::Internal(err.into()))?;
        Ok((token, claims))
    }

    /// Checks signature and expiry, then the revocation list.
    ///
    /// A revocation lookup that fails is logged and treated as "not
    /// revoked" so a cache outage does not lock every user out.
    pub async fn validate(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock below.
        validation.validate_exp = false;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|err| {
                debug!(error = %err, "rejected token");
                AppError::InvalidOrExpired
            })?
            .claims;

        if claims.exp <= self.clock.now().as_second() {
            return Err(AppError::InvalidOrExpired);
        }

        match self.revocations.get(&revocation_key(&claims.jti)).await {
            Ok(Some(flag)) if flag == REVOKED => Err(AppError::Revoked),
            Ok(_) => Ok(claims),
            Err(err) => {
                warn!(jti = %claims.jti, error = %err, "revocation lookup failed");
                Ok(claims)
            },
        }
    }

    /// Revokes the token for the rest of its lifetime and no longer.
    pub async fn revoke(&self, claims: &Claims) -> AppResult<()> {
        let remaining = claims.exp - self.clock.now().as_second();
        if remaining <= 0 {
            return Ok(());
        }
        self.revocations
            .set(&revocation_key(&claims.jti), REVOKED, SignedDuration::from_secs(remaining))
            .await?;
        debug!(jti = %claims.jti, remaining, "token revoked");
        Ok(())
    }
}

fn revocation_key(jti: &str) -> String {
    format!("revoked:{jti}")
}
