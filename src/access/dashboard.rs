use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::access::AccessPolicy;
use crate::db::{Subscription, User};
use crate::sso::SystemRegistry;

/// A catalog entry as the dashboard shows it to one user.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardTile {
    pub id: String,
    pub display_name: String,
    pub base_url: String,
    pub accessible: bool,
}

pub fn dashboard_tiles(
    policy: &AccessPolicy,
    registry: &SystemRegistry,
    user: &User,
    subscription: Option<&Subscription>,
    now: DateTime<Utc>,
) -> Vec<DashboardTile> {
    registry
        .entries()
        .iter()
        .map(|entry| DashboardTile {
            id: entry.id.clone(),
            display_name: entry.display_name.clone(),
            base_url: entry.base_url.to_string(),
            accessible: entry.is_active && policy.has_access_at(user, subscription, &entry.id, now),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;

    fn registry() -> SystemRegistry {
        SystemRegistry::from_config(&[
            SystemConfig {
                id: "drive".into(),
                display_name: "Drive".into(),
                base_url: "https://drive.studio.test".into(),
                is_active: true,
            },
            SystemConfig {
                id: "formatura".into(),
                display_name: "Formatura".into(),
                base_url: "https://formatura.studio.test".into(),
                is_active: false,
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_master_sees_only_enabled_systems_as_usable() {
        let policy = AccessPolicy::new("master@studio.test");
        let master = User::new("master@studio.test".into(), None);
        let tiles = dashboard_tiles(&policy, &registry(), &master, None, Utc::now());

        assert_eq!(tiles.len(), 2);
        assert!(tiles[0].accessible);
        assert!(!tiles[1].accessible);
    }

    #[test]
    fn test_user_without_subscription_sees_locked_tiles() {
        let policy = AccessPolicy::new("master@studio.test");
        let user = User::new("ana@studio.test".into(), None);
        let tiles = dashboard_tiles(&policy, &registry(), &user, None, Utc::now());
        assert!(tiles.iter().all(|t| !t.accessible));
    }
}
