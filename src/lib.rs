//! Resource-oriented client for the BigQuery and Cloud Storage REST APIs.
//!
//! Handles ([`bigquery::Dataset`], [`bigquery::Table`], [`storage::Bucket`],
//! [`storage::File`], ...) cache the last representation the server sent.
//! Fields missing from a summary representation are fetched on first read,
//! setters send a PATCH with only the changed fields, and `update` batches
//! several changes into one request.
//!
//! ```no_run
//! use gcloud_client::{Bigquery, ClientConfig};
//!
//! # async fn run() -> gcloud_client::Result<()> {
//! let bigquery = Bigquery::new(None, ClientConfig::load()).await?;
//! if let Some(mut dataset) = bigquery.dataset("my_dataset").await? {
//!     dataset.update(|d| d.set_description("Nightly exports")).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod bigquery;
pub mod config;
pub mod error;
pub mod gcp;
pub mod resource;
pub mod storage;
pub mod upload;

pub use bigquery::Bigquery;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use gcp::{GcpClient, GcpCredentials};
pub use resource::{Completeness, ListOptions, Page, Resource};
pub use storage::Storage;
