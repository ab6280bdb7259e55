//! Periodic purge of sessions that expired long ago.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::SweepConfig;
use crate::db::CredentialStore;
use crate::Result;

/// Deletes sessions whose expiry is older than `retention_hours` before `now`.
pub async fn sweep_once(
    store: &dyn CredentialStore,
    retention_hours: i64,
    now: DateTime<Utc>,
) -> Result<u64> {
    let cutoff = now - Duration::hours(retention_hours);
    let purged = store.purge_expired_sessions(cutoff).await?;
    if purged > 0 {
        info!(purged, cutoff = %cutoff, "Purged expired sessions");
    }
    Ok(purged)
}

pub fn spawn_session_sweeper(store: Arc<dyn CredentialStore>, config: SweepConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(config.interval_secs.max(1)));
        loop {
            interval.tick().await;
            if let Err(e) = sweep_once(store.as_ref(), config.retention_hours, Utc::now()).await {
                error!("Session sweep failed: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryStore, UserSession};
    use uuid::Uuid;

    #[test_log::test(tokio::test)]
    async fn test_sweep_respects_retention() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let user_id = Uuid::new_v4();

        // expired 10 days ago, expired 2 days ago, still valid
        for (i, age_days) in [11, 3, 0].into_iter().enumerate() {
            let created = now - Duration::days(age_days);
            store
                .upsert_session(&UserSession::new(user_id, format!("tok-{}", i), 24, created))
                .await
                .unwrap();
        }

        let purged = sweep_once(&store, 7 * 24, now).await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.session_count().await, 2);
    }
}
