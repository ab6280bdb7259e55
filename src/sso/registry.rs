use serde::Serialize;
use url::Url;

use crate::config::SystemConfig;
use crate::error::AppError;

/// One independently hosted sub-application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemEntry {
    pub id: String,
    pub display_name: String,
    pub base_url: Url,
    pub is_active: bool,
}

/// Static catalog of sub-applications, built once from configuration.
#[derive(Debug, Clone, Default)]
pub struct SystemRegistry {
    entries: Vec<SystemEntry>,
}

impl SystemRegistry {
    /// Rejects unparsable base URLs and duplicate ids up front so lookups
    /// never fail later.
    pub fn from_config(systems: &[SystemConfig]) -> Result<Self, AppError> {
        let mut entries: Vec<SystemEntry> = Vec::with_capacity(systems.len());

        for system in systems {
            if entries.iter().any(|e| e.id == system.id) {
                return Err(AppError::ConfigError(format!("duplicate system id '{}'", system.id)));
            }

            let base_url = Url::parse(&system.base_url).map_err(|e| {
                AppError::ConfigError(format!("invalid base URL for '{}': {}", system.id, e))
            })?;

            if base_url.cannot_be_a_base() {
                return Err(AppError::ConfigError(format!(
                    "base URL for '{}' cannot carry query parameters",
                    system.id
                )));
            }

            entries.push(SystemEntry {
                id: system.id.clone(),
                display_name: system.display_name.clone(),
                base_url,
                is_active: system.is_active,
            });
        }

        Ok(Self { entries })
    }

    pub fn get(&self, id: &str) -> Option<&SystemEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[SystemEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(id: &str, url: &str) -> SystemConfig {
        SystemConfig {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            base_url: url.to_string(),
            is_active: true,
        }
    }

    #[test]
    fn test_lookup() {
        let registry = SystemRegistry::from_config(&[
            system("drive", "https://drive.example.com"),
            system("admin", "https://admin.example.com/panel"),
        ])
        .unwrap();

        assert_eq!(registry.get("admin").unwrap().base_url.path(), "/panel");
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.entries().len(), 2);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = SystemRegistry::from_config(&[system("drive", "not a url")]).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));

        let err = SystemRegistry::from_config(&[system("mail", "mailto:ops@example.com")]).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = SystemRegistry::from_config(&[
            system("drive", "https://a.example.com"),
            system("drive", "https://b.example.com"),
        ])
        .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
