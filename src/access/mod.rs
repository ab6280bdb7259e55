//! Entitlement evaluation.
//!
//! Access is account-wide: the feature identifier is carried through every
//! call but does not change the outcome.

pub mod dashboard;

pub use dashboard::{dashboard_tiles, DashboardTile};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::{PlanType, Subscription, SubscriptionStatus, User};

/// Decides which users may use which systems.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    master_email: String,
}

impl AccessPolicy {
    pub fn new(master_email: impl Into<String>) -> Self {
        Self {
            master_email: master_email.into(),
        }
    }

    pub fn is_master(&self, user: &User) -> bool {
        !self.master_email.is_empty() && user.email.eq_ignore_ascii_case(&self.master_email)
    }

    pub fn has_access(&self, user: &User, subscription: Option<&Subscription>, feature_id: &str) -> bool {
        self.has_access_at(user, subscription, feature_id, Utc::now())
    }

    pub fn has_access_at(
        &self,
        user: &User,
        subscription: Option<&Subscription>,
        _feature_id: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if self.is_master(user) {
            return true;
        }

        let Some(subscription) = subscription else {
            return false;
        };

        if subscription.manual_access {
            return true;
        }

        let status_allows = match subscription.status {
            SubscriptionStatus::Active => true,
            SubscriptionStatus::Expired
            | SubscriptionStatus::Cancelled
            | SubscriptionStatus::PendingPayment => false,
        };

        let plan_allows = match subscription.plan_type {
            PlanType::Paid | PlanType::Trial => true,
            PlanType::Master => false,
        };

        let not_expired = subscription.expires_at.map_or(true, |expires_at| expires_at > now);

        status_allows && plan_allows && not_expired
    }

    /// Summarizes the account for display, in the same precedence order as
    /// [`AccessPolicy::has_access_at`].
    pub fn subscription_state(
        &self,
        user: &User,
        subscription: Option<&Subscription>,
        now: DateTime<Utc>,
    ) -> SubscriptionState {
        if self.is_master(user) {
            return SubscriptionState::Master;
        }

        let Some(sub) = subscription else {
            return SubscriptionState::NoSubscription;
        };

        if sub.manual_access {
            return SubscriptionState::ManualAccess;
        }

        if !self.has_access_at(user, Some(sub), "", now) {
            return SubscriptionState::Lapsed { status: sub.status };
        }

        match sub.plan_type {
            PlanType::Trial => {
                let ends_at = sub.trial_end_date.or(sub.expires_at);
                SubscriptionState::Trial {
                    ends_at,
                    days_remaining: ends_at.map(|end| days_until(end, now)),
                }
            }
            PlanType::Paid => SubscriptionState::Paid { expires_at: sub.expires_at },
            // has_access_at never grants a master plan without manual access
            PlanType::Master => SubscriptionState::Lapsed { status: sub.status },
        }
    }
}

/// Whole days left until `end`, counting a partial day as a full one.
pub fn days_until(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (end - now).num_seconds();
    if seconds <= 0 {
        0
    } else {
        (seconds + 86_399) / 86_400
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubscriptionState {
    Master,
    NoSubscription,
    ManualAccess,
    Trial {
        ends_at: Option<DateTime<Utc>>,
        days_remaining: Option<i64>,
    },
    Paid {
        expires_at: Option<DateTime<Utc>>,
    },
    Lapsed {
        status: SubscriptionStatus,
    },
}

impl SubscriptionState {
    pub fn grants_access(&self) -> bool {
        !matches!(self, SubscriptionState::NoSubscription | SubscriptionState::Lapsed { .. })
    }
}
