use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{Subscription, SubscriptionFields, User, UserSession};
use crate::Result;

/// Persistence contract for session, subscription and profile records.
///
/// Every failure is a store error and is surfaced to the caller as is; no
/// implementation retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Inserts the session, or overwrites the row with the same id.
    async fn upsert_session(&self, session: &UserSession) -> Result<UserSession>;

    /// Marks every active session of `user_id` inactive, returning how many
    /// rows changed.
    async fn deactivate_all_active_sessions_for_user(&self, user_id: Uuid) -> Result<u64>;

    /// Deactivates the user's sessions and then stores `session`.
    ///
    /// The default awaits the deactivation before issuing the insert, so a
    /// concurrent reader sees zero or one active session but never two. If
    /// the insert fails the user is left with no active session. Stores with
    /// transactions override this to make the pair atomic.
    async fn replace_active_session(&self, session: &UserSession) -> Result<UserSession> {
        self.deactivate_all_active_sessions_for_user(session.user_id).await?;
        self.upsert_session(session).await
    }

    async fn find_active_unexpired_session_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserSession>>;

    /// Bumps `updated_at` to the current time.
    async fn touch_session(&self, id: Uuid) -> Result<()>;

    async fn list_active_sessions_for_user(&self, user_id: Uuid) -> Result<Vec<UserSession>>;

    async fn deactivate_session(&self, id: Uuid) -> Result<()>;

    /// Hard-deletes sessions that expired before `before`.
    async fn purge_expired_sessions(&self, before: DateTime<Utc>) -> Result<u64>;

    async fn get_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>>;

    async fn upsert_subscription(
        &self,
        user_id: Uuid,
        fields: SubscriptionFields,
    ) -> Result<Subscription>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;
}
