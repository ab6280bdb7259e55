use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::db::models::{Subscription, SubscriptionFields, SubscriptionRow, User, UserSession};
use crate::db::store::CredentialStore;
use crate::error::AppError;
use crate::Result;

const SESSION_COLUMNS: &str = "id, user_id, session_token, is_active, expires_at, created_at, \
                               updated_at, ip_address, user_agent";

const SUBSCRIPTION_COLUMNS: &str = "user_id, plan_type, status, trial_end_date, expires_at, \
                                    manual_access, created_at, updated_at";

/// PostgreSQL implementation of [`CredentialStore`].
#[derive(Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>> {
        Ok(self.pool.as_ref().begin().await?)
    }

    /// Serializes issuance per user until the transaction ends. Without it a
    /// concurrent insert is invisible to the deactivating UPDATE under
    /// READ COMMITTED.
    async fn lock_user_with_transaction(
        &self,
        user_id: Uuid,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text))")
            .bind(user_id)
            .execute(&mut **transaction)
            .await?;

        Ok(())
    }

    async fn deactivate_with_transaction(
        &self,
        user_id: Uuid,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_active = FALSE, updated_at = $2 \
             WHERE user_id = $1 AND is_active = TRUE",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut **transaction)
        .await?;

        Ok(result.rows_affected())
    }

    async fn upsert_session_with_transaction(
        &self,
        session: &UserSession,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<UserSession> {
        let sql = format!(
            "INSERT INTO user_sessions ({SESSION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET \
                 is_active = EXCLUDED.is_active, \
                 expires_at = EXCLUDED.expires_at, \
                 updated_at = EXCLUDED.updated_at, \
                 ip_address = EXCLUDED.ip_address, \
                 user_agent = EXCLUDED.user_agent \
             RETURNING {SESSION_COLUMNS}"
        );

        let session = sqlx::query_as::<_, UserSession>(&sql)
            .bind(session.id)
            .bind(session.user_id)
            .bind(&session.token)
            .bind(session.is_active)
            .bind(session.expires_at)
            .bind(session.created_at)
            .bind(session.updated_at)
            .bind(&session.ip_address)
            .bind(&session.user_agent)
            .fetch_one(&mut **transaction)
            .await?;

        Ok(session)
    }

    async fn commit_or_rollback<T>(
        transaction: Transaction<'_, Postgres>,
        result: Result<T>,
    ) -> Result<T> {
        match result {
            Ok(value) => {
                transaction.commit().await?;
                Ok(value)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl CredentialStore for DbOperations {
    async fn upsert_session(&self, session: &UserSession) -> Result<UserSession> {
        let mut transaction = self.begin_transaction().await?;
        let result = self.upsert_session_with_transaction(session, &mut transaction).await;
        Self::commit_or_rollback(transaction, result).await
    }

    async fn deactivate_all_active_sessions_for_user(&self, user_id: Uuid) -> Result<u64> {
        let mut transaction = self.begin_transaction().await?;
        let result = self.deactivate_with_transaction(user_id, &mut transaction).await;
        Self::commit_or_rollback(transaction, result).await
    }

    async fn replace_active_session(&self, session: &UserSession) -> Result<UserSession> {
        let mut transaction = self.begin_transaction().await?;

        let result = async {
            self.lock_user_with_transaction(session.user_id, &mut transaction).await?;
            self.deactivate_with_transaction(session.user_id, &mut transaction).await?;
            self.upsert_session_with_transaction(session, &mut transaction).await
        }
        .await;

        Self::commit_or_rollback(transaction, result).await
    }

    async fn find_active_unexpired_session_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM user_sessions \
             WHERE session_token = $1 AND is_active = TRUE AND expires_at > $2"
        );

        let session = sqlx::query_as::<_, UserSession>(&sql)
            .bind(token)
            .bind(now)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(session)
    }

    async fn touch_session(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE user_sessions SET updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn list_active_sessions_for_user(&self, user_id: Uuid) -> Result<Vec<UserSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM user_sessions \
             WHERE user_id = $1 AND is_active = TRUE ORDER BY created_at DESC"
        );

        let sessions = sqlx::query_as::<_, UserSession>(&sql)
            .bind(user_id)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(sessions)
    }

    async fn deactivate_session(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_active = FALSE, updated_at = $1 WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::from(sqlx::Error::RowNotFound));
        }

        Ok(())
    }

    async fn purge_expired_sessions(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut transaction = self.begin_transaction().await?;

        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < $1")
            .bind(before)
            .execute(&mut *transaction)
            .await
            .map(|r| r.rows_affected())
            .map_err(AppError::from);

        Self::commit_or_rollback(transaction, result).await
    }

    async fn get_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>> {
        let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = $1");

        let row = sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        row.map(Subscription::try_from).transpose()
    }

    async fn upsert_subscription(
        &self,
        user_id: Uuid,
        fields: SubscriptionFields,
    ) -> Result<Subscription> {
        let sql = format!(
            "INSERT INTO subscriptions ({SUBSCRIPTION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 plan_type = EXCLUDED.plan_type, \
                 status = EXCLUDED.status, \
                 trial_end_date = EXCLUDED.trial_end_date, \
                 expires_at = EXCLUDED.expires_at, \
                 manual_access = EXCLUDED.manual_access, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        );

        let row = sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(user_id)
            .bind(fields.plan_type.as_str())
            .bind(fields.status.as_str())
            .bind(fields.trial_end_date)
            .bind(fields.expires_at)
            .bind(fields.manual_access)
            .bind(Utc::now())
            .fetch_one(self.pool.as_ref())
            .await?;

        Subscription::try_from(row)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, display_name FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }
}
