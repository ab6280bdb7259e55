use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{Subscription, SubscriptionFields, User, UserSession};
use crate::db::store::CredentialStore;
use crate::error::DatabaseError;
use crate::Result;

#[derive(Debug, Default)]
struct Tables {
    sessions: HashMap<Uuid, UserSession>,
    subscriptions: HashMap<Uuid, Subscription>,
    users: HashMap<Uuid, User>,
}

/// Process-local store used by tests and local development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    pub async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }

    pub async fn get_session(&self, id: Uuid) -> Option<UserSession> {
        self.tables.read().await.sessions.get(&id).cloned()
    }
}

fn ensure_token_free(tables: &Tables, session: &UserSession) -> Result<()> {
    let duplicate = tables
        .sessions
        .values()
        .any(|s| s.token == session.token && s.id != session.id);
    if duplicate {
        return Err(DatabaseError::Duplicate.into());
    }
    Ok(())
}

fn insert_session(tables: &mut Tables, session: &UserSession) -> Result<UserSession> {
    ensure_token_free(tables, session)?;
    tables.sessions.insert(session.id, session.clone());
    Ok(session.clone())
}

fn deactivate_for_user(tables: &mut Tables, user_id: Uuid, now: DateTime<Utc>) -> u64 {
    let mut changed = 0;
    for session in tables.sessions.values_mut() {
        if session.user_id == user_id && session.is_active {
            session.is_active = false;
            session.updated_at = now;
            changed += 1;
        }
    }
    changed
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn upsert_session(&self, session: &UserSession) -> Result<UserSession> {
        let mut tables = self.tables.write().await;
        insert_session(&mut tables, session)
    }

    async fn deactivate_all_active_sessions_for_user(&self, user_id: Uuid) -> Result<u64> {
        let mut tables = self.tables.write().await;
        Ok(deactivate_for_user(&mut tables, user_id, Utc::now()))
    }

    async fn replace_active_session(&self, session: &UserSession) -> Result<UserSession> {
        // One write guard for both steps; nothing changes if the insert would fail
        let mut tables = self.tables.write().await;
        ensure_token_free(&tables, session)?;
        deactivate_for_user(&mut tables, session.user_id, Utc::now());
        insert_session(&mut tables, session)
    }

    async fn find_active_unexpired_session_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserSession>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .values()
            .find(|s| s.token == token && s.is_usable_at(now))
            .cloned())
    }

    async fn touch_session(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        let session = tables.sessions.get_mut(&id).ok_or(DatabaseError::NotFound)?;
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn list_active_sessions_for_user(&self, user_id: Uuid) -> Result<Vec<UserSession>> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<UserSession> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.is_active)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn deactivate_session(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        let session = tables.sessions.get_mut(&id).ok_or(DatabaseError::NotFound)?;
        session.is_active = false;
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn purge_expired_sessions(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let len = tables.sessions.len();
        tables.sessions.retain(|_, s| s.expires_at >= before);
        Ok((len - tables.sessions.len()) as u64)
    }

    async fn get_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>> {
        Ok(self.tables.read().await.subscriptions.get(&user_id).cloned())
    }

    async fn upsert_subscription(
        &self,
        user_id: Uuid,
        fields: SubscriptionFields,
    ) -> Result<Subscription> {
        let mut tables = self.tables.write().await;
        let subscription =
            Subscription::from_fields(user_id, fields, tables.subscriptions.get(&user_id), Utc::now());
        tables.subscriptions.insert(user_id, subscription.clone());
        Ok(subscription)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }
}
