use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::ip_lookup::IpLookup;
use crate::auth::token::generate_session_token;
use crate::db::{CredentialStore, UserSession};
use crate::Result;

/// Creates session credentials and keeps a single active session per user.
pub struct SessionIssuer {
    store: Arc<dyn CredentialStore>,
    ip_lookup: IpLookup,
    ttl_hours: i64,
}

impl SessionIssuer {
    pub fn new(store: Arc<dyn CredentialStore>, ip_lookup: IpLookup, ttl_hours: i64) -> Self {
        Self {
            store,
            ip_lookup,
            ttl_hours,
        }
    }

    /// Issues a fresh session for `user_id`, superseding every session the
    /// user had before. Returns the stored row; its `token` is the bearer
    /// credential.
    ///
    /// `client_ip` is the caller's address as seen by the HTTP layer. The
    /// external lookup is only consulted when it is absent.
    pub async fn issue_session(
        &self,
        user_id: Uuid,
        client_ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<UserSession> {
        let now = Utc::now();
        let token = generate_session_token(now);
        let ip_address = match client_ip.filter(|ip| !ip.trim().is_empty()) {
            Some(ip) => ip.trim().to_string(),
            None => self.ip_lookup.resolve().await,
        };

        let mut session = UserSession::new(user_id, token, self.ttl_hours, now);
        session.ip_address = Some(ip_address);
        session.user_agent = user_agent;

        match self.store.replace_active_session(&session).await {
            Ok(stored) => {
                info!(
                    user_id = %user_id,
                    session_id = %stored.id,
                    expires_at = %stored.expires_at,
                    "Session issued"
                );
                Ok(stored)
            }
            Err(e) => {
                error!(user_id = %user_id, "Session issuance failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ip_lookup::UNKNOWN_IP;
    use crate::auth::token::TOKEN_PREFIX;
    use crate::db::store::MockCredentialStore;
    use crate::error::{AppError, DatabaseError};
    use chrono::Duration;

    #[tokio::test]
    async fn test_issue_uses_replace_and_records_provenance() {
        let user_id = Uuid::new_v4();
        let mut store = MockCredentialStore::new();
        store
            .expect_replace_active_session()
            .withf(move |s| s.user_id == user_id && s.is_active)
            .times(1)
            .returning(|s| Ok(s.clone()));

        let issuer = SessionIssuer::new(Arc::new(store), IpLookup::disabled(), 24);
        let session = issuer
            .issue_session(user_id, None, Some("Mozilla/5.0".to_string()))
            .await
            .unwrap();

        assert!(session.token.starts_with(TOKEN_PREFIX));
        assert_eq!(session.expires_at - session.created_at, Duration::hours(24));
        assert_eq!(session.ip_address.as_deref(), Some(UNKNOWN_IP));
        assert_eq!(session.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[tokio::test]
    async fn test_client_address_is_recorded() {
        let mut store = MockCredentialStore::new();
        store
            .expect_replace_active_session()
            .times(1)
            .returning(|s| Ok(s.clone()));

        let issuer = SessionIssuer::new(Arc::new(store), IpLookup::disabled(), 24);
        let session = issuer
            .issue_session(Uuid::new_v4(), Some("203.0.113.7".to_string()), None)
            .await
            .unwrap();

        assert_eq!(session.ip_address.as_deref(), Some("203.0.113.7"));
    }

    #[tokio::test]
    async fn test_store_failure_aborts_issuance() {
        let mut store = MockCredentialStore::new();
        store
            .expect_replace_active_session()
            .times(1)
            .returning(|_| Err(DatabaseError::ConnectionError("connection refused".into()).into()));

        let issuer = SessionIssuer::new(Arc::new(store), IpLookup::disabled(), 24);
        let err = issuer.issue_session(Uuid::new_v4(), None, None).await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::ConnectionError(_))));
    }
}
