use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, DatabaseError};

/// Profile of an authenticated user, owned by the hosted backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

impl User {
    pub fn new(email: String, display_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            display_name,
        }
    }

    /// Name shown to sub-applications, falling back to the email address.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "session_token")]
    pub token: String,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl UserSession {
    pub fn new(user_id: Uuid, token: String, expires_in_hours: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token,
            is_active: true,
            expires_at: now + Duration::hours(expires_in_hours),
            created_at: now,
            updated_at: now,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Active and not yet expired at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Trial,
    Paid,
    Master,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Trial => "trial",
            PlanType::Paid => "paid",
            PlanType::Master => "master",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(PlanType::Trial),
            "paid" => Ok(PlanType::Paid),
            "master" => Ok(PlanType::Master),
            other => Err(AppError::ValidationError(format!("unknown plan type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
    PendingPayment,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::PendingPayment => "pending_payment",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "expired" => Ok(SubscriptionStatus::Expired),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "pending_payment" => Ok(SubscriptionStatus::PendingPayment),
            other => Err(AppError::ValidationError(format!("unknown subscription status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: Uuid,
    pub plan_type: PlanType,
    pub status: SubscriptionStatus,
    pub trial_end_date: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub manual_access: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Builds the row an upsert of `fields` produces, keeping the original
    /// creation time when a row already exists.
    pub fn from_fields(
        user_id: Uuid,
        fields: SubscriptionFields,
        existing: Option<&Subscription>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            plan_type: fields.plan_type,
            status: fields.status,
            trial_end_date: fields.trial_end_date,
            expires_at: fields.expires_at,
            manual_access: fields.manual_access,
            created_at: existing.map(|s| s.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}

/// Writable columns of a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionFields {
    pub plan_type: PlanType,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub trial_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub manual_access: bool,
}

impl SubscriptionFields {
    /// An active trial ending `days` after `now`.
    pub fn trial(now: DateTime<Utc>, days: i64) -> Self {
        let end = now + Duration::days(days);
        Self {
            plan_type: PlanType::Trial,
            status: SubscriptionStatus::Active,
            trial_end_date: Some(end),
            expires_at: Some(end),
            manual_access: false,
        }
    }
}

/// Raw `subscriptions` row; enum columns are stored as text.
#[derive(Debug, FromRow)]
pub(crate) struct SubscriptionRow {
    pub user_id: Uuid,
    pub plan_type: String,
    pub status: String,
    pub trial_end_date: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub manual_access: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = AppError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let invalid = |e: AppError| DatabaseError::InvalidRecord(e.to_string());
        Ok(Self {
            user_id: row.user_id,
            plan_type: row.plan_type.parse().map_err(invalid)?,
            status: row.status.parse().map_err(invalid)?,
            trial_end_date: row.trial_end_date,
            expires_at: row.expires_at,
            manual_access: row.manual_access,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_window_is_fixed() {
        let now = Utc::now();
        let session = UserSession::new(Uuid::new_v4(), "tok".into(), 24, now);
        assert_eq!(session.expires_at - session.created_at, Duration::hours(24));
        assert!(session.is_usable_at(now));
        assert!(session.is_usable_at(now + Duration::hours(23)));
        assert!(!session.is_usable_at(now + Duration::hours(24)));
    }

    #[test]
    fn test_inactive_session_is_not_usable() {
        let now = Utc::now();
        let mut session = UserSession::new(Uuid::new_v4(), "tok".into(), 24, now);
        session.is_active = false;
        assert!(!session.is_usable_at(now));
    }

    #[test]
    fn test_enum_text_mapping() {
        assert_eq!("pending_payment".parse::<SubscriptionStatus>().unwrap(), SubscriptionStatus::PendingPayment);
        assert_eq!(SubscriptionStatus::Cancelled.to_string(), "cancelled");
        assert_eq!("master".parse::<PlanType>().unwrap(), PlanType::Master);
        assert!("gold".parse::<PlanType>().is_err());
        assert_eq!(
            serde_json::to_value(SubscriptionStatus::PendingPayment).unwrap(),
            serde_json::json!("pending_payment")
        );
    }

    #[test]
    fn test_corrupt_row_is_rejected() {
        let now = Utc::now();
        let row = SubscriptionRow {
            user_id: Uuid::new_v4(),
            plan_type: "platinum".into(),
            status: "active".into(),
            trial_end_date: None,
            expires_at: None,
            manual_access: false,
            created_at: now,
            updated_at: now,
        };
        let err = Subscription::try_from(row).unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::InvalidRecord(_))));
    }

    #[test]
    fn test_upsert_keeps_creation_time() {
        let created = Utc::now() - Duration::days(30);
        let user_id = Uuid::new_v4();
        let first = Subscription::from_fields(user_id, SubscriptionFields::trial(created, 7), None, created);
        let now = Utc::now();
        let fields = SubscriptionFields {
            plan_type: PlanType::Paid,
            status: SubscriptionStatus::Active,
            trial_end_date: None,
            expires_at: None,
            manual_access: false,
        };
        let second = Subscription::from_fields(user_id, fields, Some(&first), now);
        assert_eq!(second.created_at, created);
        assert_eq!(second.updated_at, now);
        assert_eq!(second.plan_type, PlanType::Paid);
    }
}
