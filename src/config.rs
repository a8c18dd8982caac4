//! Configuration Management
//!
//! Client settings: endpoints, retry policy, upload threshold, and the
//! default project. Settings can be persisted under the user config dir.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIGQUERY_ENDPOINT: &str = "https://bigquery.googleapis.com";
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

/// Files above this size are uploaded with the resumable protocol
pub const DEFAULT_RESUMABLE_THRESHOLD: u64 = 5_000_000;

/// Default number of retries for transient failures
pub const DEFAULT_RETRIES: u32 = 3;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Project used when none is given explicitly
    pub project_id: Option<String>,
    /// Base URL of the BigQuery API (scheme and host, no path)
    pub bigquery_endpoint: String,
    /// Base URL of the Cloud Storage API (scheme and host, no path)
    pub storage_endpoint: String,
    /// Retries for transient failures on idempotent calls
    pub retries: u32,
    /// First backoff delay; doubles on every retry
    pub backoff_base_ms: u64,
    pub resumable_threshold: u64,
    pub user_agent: String,
    pub timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            bigquery_endpoint: DEFAULT_BIGQUERY_ENDPOINT.to_string(),
            storage_endpoint: DEFAULT_STORAGE_ENDPOINT.to_string(),
            retries: DEFAULT_RETRIES,
            backoff_base_ms: 1000,
            resumable_threshold: DEFAULT_RESUMABLE_THRESHOLD,
            user_agent: format!("gcloud-client/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: None,
        }
    }
}

impl ClientConfig {
    /// Configuration pointing both services at one base URL (emulators, tests)
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            bigquery_endpoint: endpoint.trim_end_matches('/').to_string(),
            storage_endpoint: endpoint.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gcloud-client").join("config.json"))
    }

    /// Load configuration from disk, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Ignoring invalid config file {:?}: {}", path, e);
                    Self::default()
                },
            },
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Check endpoints and limits before any client is built
    pub fn validate(&self) -> Result<()> {
        for (label, endpoint) in [
            ("bigquery_endpoint", &self.bigquery_endpoint),
            ("storage_endpoint", &self.storage_endpoint),
        ] {
            let url = url::Url::parse(endpoint)
                .map_err(|e| Error::InvalidArgument(format!("{}: {}", label, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::InvalidArgument(format!(
                    "{}: unsupported scheme {}",
                    label,
                    url.scheme()
                )));
            }
        }
        if let Some(project) = &self.project_id {
            if project.trim().is_empty() {
                return Err(Error::InvalidArgument("project is missing".to_string()));
            }
        }
        Ok(())
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Resolve the project for a service (explicit > config > env > gcloud)
    pub fn effective_project(&self, explicit: Option<&str>, service_env: &str) -> Result<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.project_id.clone())
            .or_else(|| crate::gcp::auth::get_default_project(service_env))
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| Error::InvalidArgument("project is missing".to_string()))
    }
}
