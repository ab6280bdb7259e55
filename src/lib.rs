pub mod access;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod sso;
pub mod sweeper;

use std::sync::Arc;
use std::time::Duration;
use actix_web::HttpResponse;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use access::AccessPolicy;
pub use auth::{BackendTokenVerifier, IpLookup, SessionIssuer, SessionValidator};
pub use db::{CredentialStore, DbOperations, InMemoryStore, User, UserSession};
pub use sso::{CrossAppRedirector, SystemRegistry};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub store: Arc<dyn CredentialStore>,
    pub issuer: Arc<SessionIssuer>,
    pub validator: Arc<SessionValidator>,
    pub policy: Arc<AccessPolicy>,
    pub redirector: Arc<CrossAppRedirector>,
    pub backend_verifier: Arc<BackendTokenVerifier>,
}

impl AppState {
    /// Connects to PostgreSQL and wires every component to it.
    pub async fn new(config: Settings) -> Result<Self> {
        let db = DbOperations::new_with_options(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(5),
        )
        .await
        .map_err(|e| AppError::DatabaseError(error::DatabaseError::ConnectionError(e.to_string())))?;

        if config.database.run_migrations {
            db.run_migrations().await?;
        }

        Self::with_store(config, Arc::new(db))
    }

    /// Wires every component to an already constructed store.
    pub fn with_store(config: Settings, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let ip_lookup = IpLookup::new(
            &config.auth.ip_lookup_url,
            Duration::from_secs(config.auth.ip_lookup_timeout_secs),
        )?;
        let registry = SystemRegistry::from_config(&config.systems)?;

        Ok(Self {
            issuer: Arc::new(SessionIssuer::new(
                Arc::clone(&store),
                ip_lookup,
                config.auth.session_ttl_hours,
            )),
            validator: Arc::new(SessionValidator::new(Arc::clone(&store))),
            policy: Arc::new(AccessPolicy::new(config.auth.master_email.clone())),
            redirector: Arc::new(CrossAppRedirector::new(registry)),
            backend_verifier: Arc::new(BackendTokenVerifier::from_config(&config.auth)),
            store,
            config: Arc::new(config),
        })
    }
}
