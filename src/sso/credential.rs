use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::User;
use crate::error::{AppError, AuthError};

pub const SSO_CREDENTIAL_TTL_HOURS: i64 = 24;

/// Legacy cross-app credential: base64 JSON, NOT signed. Any holder can
/// forge one, so receiving systems must not treat it as proof of identity
/// on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsoCredential {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub exp: i64,
    pub iat: i64,
}

impl SsoCredential {
    pub fn issue(user: &User, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user.id.to_string(),
            email: user.email.clone(),
            name: user.name().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(SSO_CREDENTIAL_TTL_HOURS)).timestamp(),
        }
    }

    pub fn encode(&self) -> Result<String, AppError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| AppError::InternalError(format!("Failed to serialize credential: {}", e)))?;
        Ok(BASE64.encode(json))
    }

    pub fn decode(encoded: &str) -> Result<Self, AppError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|_| AppError::AuthError(AuthError::InvalidToken))?;
        serde_json::from_slice(&bytes).map_err(|_| AppError::AuthError(AuthError::InvalidToken))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}
