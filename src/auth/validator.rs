use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{CredentialStore, User, UserSession};
use crate::Result;

/// A presented token that matched an active, unexpired session.
#[derive(Debug, Clone, Serialize)]
pub struct ValidatedSession {
    pub session: UserSession,
    pub user: User,
}

pub struct SessionValidator {
    store: Arc<dyn CredentialStore>,
}

impl SessionValidator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Resolves `token` to its session and user, or `None` when the token is
    /// unknown, expired or deactivated. Store failures are still errors.
    pub async fn validate_token(&self, token: &str) -> Result<Option<ValidatedSession>> {
        self.validate_token_at(token, Utc::now()).await
    }

    pub async fn validate_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ValidatedSession>> {
        if token.is_empty() {
            return Ok(None);
        }

        let Some(session) = self
            .store
            .find_active_unexpired_session_by_token(token, now)
            .await?
        else {
            debug!("Rejected session token");
            return Ok(None);
        };

        let Some(user) = self.store.get_user(session.user_id).await? else {
            warn!(session_id = %session.id, "Session belongs to a missing user");
            return Ok(None);
        };

        self.spawn_touch(session.id);

        Ok(Some(ValidatedSession { session, user }))
    }

    // The caller already has its answer; a failed touch is only logged.
    fn spawn_touch(&self, session_id: Uuid) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.touch_session(session_id).await {
                warn!(session_id = %session_id, "Failed to touch session: {}", e);
            }
        });
    }

    /// Explicit logout. Returns `false` when the token was already unusable.
    pub async fn invalidate_token(&self, token: &str) -> Result<bool> {
        let Some(session) = self
            .store
            .find_active_unexpired_session_by_token(token, Utc::now())
            .await?
        else {
            return Ok(false);
        };

        self.store.deactivate_session(session.id).await?;
        info!(user_id = %session.user_id, session_id = %session.id, "Session invalidated");
        Ok(true)
    }

    pub async fn list_active_sessions(&self, user_id: Uuid) -> Result<Vec<UserSession>> {
        self.store.list_active_sessions_for_user(user_id).await
    }
}
