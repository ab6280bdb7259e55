use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::AppError;

/// Recorded when the public address cannot be resolved.
pub const UNKNOWN_IP: &str = "unknown";

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

/// Fallback address lookup through an external `{"ip": "..."}` service,
/// used when the HTTP layer reports no client address. Never fails; every problem yields [`UNKNOWN_IP`].
#[derive(Debug, Clone)]
pub struct IpLookup {
    client: reqwest::Client,
    url: Option<String>,
}

impl IpLookup {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        let url = Some(url.trim())
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        Ok(Self { client, url })
    }

    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            url: None,
        }
    }

    pub async fn resolve(&self) -> String {
        let Some(url) = &self.url else {
            return UNKNOWN_IP.to_string();
        };

        match self.fetch(url).await {
            Ok(ip) if !ip.trim().is_empty() => {
                debug!("Resolved public IP {}", ip);
                ip.trim().to_string()
            }
            Ok(_) => {
                warn!("IP lookup at {} returned an empty address", url);
                UNKNOWN_IP.to_string()
            }
            Err(e) => {
                warn!("IP lookup at {} failed: {}", url, e);
                UNKNOWN_IP.to_string()
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        let response: IpResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.ip)
    }
}
