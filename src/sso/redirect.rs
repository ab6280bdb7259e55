use chrono::Utc;
use tracing::{debug, error};
use url::Url;

use crate::db::User;
use crate::sso::credential::SsoCredential;
use crate::sso::registry::SystemRegistry;

pub const SESSION_TOKEN_PARAM: &str = "session_token";
pub const TIMESTAMP_PARAM: &str = "timestamp";
pub const SSO_TOKEN_PARAM: &str = "sso_token";

/// Builds URLs into sub-applications. Pure: no I/O, no store access.
#[derive(Debug, Clone)]
pub struct CrossAppRedirector {
    registry: SystemRegistry,
}

impl CrossAppRedirector {
    pub fn new(registry: SystemRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SystemRegistry {
        &self.registry
    }

    fn base_url(&self, system_id: &str) -> Option<Url> {
        match self.registry.get(system_id) {
            Some(entry) if entry.is_active => Some(entry.base_url.clone()),
            Some(_) => {
                debug!("System {} is disabled", system_id);
                None
            }
            None => {
                debug!("System {} is not registered", system_id);
                None
            }
        }
    }

    /// `None` when `system_id` is not a registered, enabled system.
    pub fn build_redirect_url(&self, token: &str, system_id: &str) -> Option<Url> {
        self.build_redirect_url_at(token, system_id, Utc::now().timestamp_millis())
    }

    pub fn build_redirect_url_at(&self, token: &str, system_id: &str, timestamp_ms: i64) -> Option<Url> {
        let mut url = self.base_url(system_id)?;
        url.query_pairs_mut()
            .append_pair(SESSION_TOKEN_PARAM, token)
            .append_pair(TIMESTAMP_PARAM, &timestamp_ms.to_string());
        Some(url)
    }

    /// Legacy flow carrying an unsigned [`SsoCredential`].
    pub fn build_sso_url(&self, user: &User, system_id: &str) -> Option<Url> {
        let mut url = self.base_url(system_id)?;
        let encoded = match SsoCredential::issue(user, Utc::now()).encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("Failed to encode SSO credential: {}", e);
                return None;
            }
        };
        url.query_pairs_mut().append_pair(SSO_TOKEN_PARAM, &encoded);
        Some(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;

    fn redirector() -> CrossAppRedirector {
        let systems = vec![
            SystemConfig {
                id: "drive".into(),
                display_name: "Drive".into(),
                base_url: "https://drive.studio.test/app?lang=pt".into(),
                is_active: true,
            },
            SystemConfig {
                id: "formatura".into(),
                display_name: "Formatura".into(),
                base_url: "https://formatura.studio.test".into(),
                is_active: false,
            },
        ];
        CrossAppRedirector::new(SystemRegistry::from_config(&systems).unwrap())
    }

    fn param(url: &Url, name: &str) -> Option<String> {
        url.query_pairs().find(|(k, _)| k == name).map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_redirect_keeps_origin_and_existing_query() {
        let url = redirector().build_redirect_url_at("session_1_ab+c", "drive", 1_700_000_000_000).unwrap();
        assert_eq!(url.origin().ascii_serialization(), "https://drive.studio.test");
        assert_eq!(url.path(), "/app");
        assert_eq!(param(&url, "lang").as_deref(), Some("pt"));
        assert_eq!(param(&url, SESSION_TOKEN_PARAM).as_deref(), Some("session_1_ab+c"));
        assert_eq!(param(&url, TIMESTAMP_PARAM).as_deref(), Some("1700000000000"));
    }

    #[test]
    fn test_timestamp_is_numeric() {
        let url = redirector().build_redirect_url("tok", "drive").unwrap();
        let ts: i64 = param(&url, TIMESTAMP_PARAM).unwrap().parse().unwrap();
        assert!(ts > 0);
    }

    #[test]
    fn test_unknown_or_disabled_system() {
        assert!(redirector().build_redirect_url("tok", "nonexistent").is_none());
        assert!(redirector().build_redirect_url("tok", "formatura").is_none());
    }

    #[test]
    fn test_sso_url_carries_decodable_credential() {
        let user = User::new("ana@studio.test".into(), Some("Ana".into()));
        let url = redirector().build_sso_url(&user, "drive").unwrap();
        let credential = SsoCredential::decode(&param(&url, SSO_TOKEN_PARAM).unwrap()).unwrap();
        assert_eq!(credential.user_id, user.id.to_string());
        assert!(redirector().build_sso_url(&user, "nonexistent").is_none());
    }
}
