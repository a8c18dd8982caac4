//! GCP API interaction module
//!
//! Transport layer shared by the BigQuery and Cloud Storage handles.
//!
//! # Module Structure
//!
//! - [`auth`] - Application Default Credentials or a fixed bearer token
//! - [`client`] - Authenticated client with retries and URL builders
//! - [`http`] - Single-attempt HTTP execution and response classification
//!
//! # Example
//!
//! ```ignore
//! use gcloud_client::gcp::{client::GcpClient, http::ApiRequest};
//!
//! async fn example(config: gcloud_client::ClientConfig) -> gcloud_client::Result<()> {
//!     let client = GcpClient::new(config).await?;
//!     let url = client.bigquery_url("my-project", "datasets");
//!     let datasets = client.call(ApiRequest::get(url)).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;

pub use auth::GcpCredentials;
pub use client::GcpClient;
