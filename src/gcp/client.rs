//! GCP Client
//!
//! Combines authentication and HTTP, adds the bounded retry loop, and builds
//! service URLs.

use super::auth::GcpCredentials;
use super::http::{is_transient_status, ApiRequest, ApiResponse, GcpHttpClient};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use serde_json::Value;
use std::sync::Arc;

/// Main GCP client. Cheap to clone; clones share the HTTP pool and token cache.
#[derive(Clone, Debug)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    config: Arc<ClientConfig>,
}

impl GcpClient {
    /// Create a client using Application Default Credentials
    pub async fn new(config: ClientConfig) -> Result<Self> {
        let credentials = GcpCredentials::new().await?;
        Self::with_credentials(config, credentials)
    }

    /// Create a client with explicit credentials
    pub fn with_credentials(config: ClientConfig, credentials: GcpCredentials) -> Result<Self> {
        config.validate()?;
        let http = GcpHttpClient::new(&config)?;

        Ok(Self {
            credentials,
            http,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Send a request, retrying transient failures on idempotent calls.
    ///
    /// Returns the final response whatever its status; see [`GcpClient::call`]
    /// for the variant that raises on non-success.
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        let retries = if request.idempotent {
            request.retries.unwrap_or(self.config.retries)
        } else {
            0
        };
        let mut attempt = 0;

        loop {
            let token = self.get_token().await?;
            let outcome = self.http.execute(&request, &token).await;

            let retryable = match &outcome {
                Ok(response) => is_transient_status(response.status),
                Err(Error::Http(e)) => e.is_timeout() || e.is_connect(),
                Err(_) => false,
            };

            if !retryable || attempt >= retries {
                return outcome;
            }

            let delay = self.config.backoff_base() * 2u32.saturating_pow(attempt);
            tracing::warn!(
                "Transient failure on {} {} (attempt {}/{}), retrying in {:?}",
                request.method,
                request.url,
                attempt + 1,
                retries + 1,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Send a request and decode the JSON body, raising on non-success
    pub async fn call(&self, request: ApiRequest) -> Result<Value> {
        self.request(request).await?.into_json()
    }

    // =========================================================================
    // BigQuery API helpers
    // =========================================================================

    /// Build BigQuery API URL for a project-relative path
    pub fn bigquery_url(&self, project_id: &str, path: &str) -> String {
        let base = format!(
            "{}/bigquery/v2/projects/{}",
            self.config.bigquery_endpoint, project_id
        );
        if path.is_empty() {
            base
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Build BigQuery media upload URL
    pub fn bigquery_upload_url(&self, project_id: &str) -> String {
        format!(
            "{}/upload/bigquery/v2/projects/{}/jobs",
            self.config.bigquery_endpoint, project_id
        )
    }

    // =========================================================================
    // Cloud Storage API helpers
    // =========================================================================

    /// Build Cloud Storage API URL
    pub fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1/{}", self.config.storage_endpoint, path)
    }

    /// Build Cloud Storage bucket URL
    pub fn storage_bucket_url(&self, bucket: &str) -> String {
        self.storage_url(&format!("b/{}", urlencoding::encode(bucket)))
    }

    /// Build Cloud Storage objects URL
    pub fn storage_objects_url(&self, bucket: &str) -> String {
        format!("{}/o", self.storage_bucket_url(bucket))
    }

    /// Build Cloud Storage single object URL; object names are percent-encoded
    pub fn storage_object_url(&self, bucket: &str, object: &str) -> String {
        format!(
            "{}/{}",
            self.storage_objects_url(bucket),
            urlencoding::encode(object)
        )
    }

    /// Build Cloud Storage media upload URL
    pub fn storage_upload_url(&self, bucket: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o",
            self.config.storage_endpoint,
            urlencoding::encode(bucket)
        )
    }
}
