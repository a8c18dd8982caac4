//! Cloud Storage
//!
//! [`Storage`] is the project-level entry point; [`Bucket`] and [`File`]
//! are the resource handles. CORS rules are edited with [`CorsBuilder`].

pub mod bucket;
pub mod connection;
pub mod cors;
pub mod file;

pub use bucket::{Bucket, BucketUpdate};
pub use connection::Connection;
pub use cors::{Cors, CorsBuilder, CorsRule, CorsRuleOptions, OneOrMany};
pub use file::{File, FileListOptions, FileOptions, FileUpdate};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::gcp::client::GcpClient;
use crate::resource::{require_id, Completeness, ListOptions, Page};
use connection::BucketAcls;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Environment variable naming the default Storage project
pub const PROJECT_ENV: &str = "STORAGE_PROJECT";

/// Predefined ACLs, applied by name when a bucket or object is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredefinedAcl {
    #[serde(alias = "auth", alias = "auth_read", alias = "authenticated")]
    AuthenticatedRead,
    #[serde(alias = "owner_full")]
    BucketOwnerFullControl,
    #[serde(alias = "owner_read")]
    BucketOwnerRead,
    Private,
    ProjectPrivate,
    #[serde(alias = "public")]
    PublicRead,
    PublicReadWrite,
}

impl PredefinedAcl {
    pub fn as_api_str(self) -> &'static str {
        match self {
            PredefinedAcl::AuthenticatedRead => "authenticatedRead",
            PredefinedAcl::BucketOwnerFullControl => "bucketOwnerFullControl",
            PredefinedAcl::BucketOwnerRead => "bucketOwnerRead",
            PredefinedAcl::Private => "private",
            PredefinedAcl::ProjectPrivate => "projectPrivate",
            PredefinedAcl::PublicRead => "publicRead",
            PredefinedAcl::PublicReadWrite => "publicReadWrite",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    Standard,
    Nearline,
    /// Durable Reduced Availability
    #[serde(alias = "durable_reduced_availability")]
    Dra,
}

impl StorageClass {
    pub fn as_api_str(self) -> &'static str {
        match self {
            StorageClass::Standard => "STANDARD",
            StorageClass::Nearline => "NEARLINE",
            StorageClass::Dra => "DURABLE_REDUCED_AVAILABILITY",
        }
    }
}

/// Options for `Storage::create_bucket`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BucketOptions {
    pub location: Option<String>,
    pub storage_class: Option<StorageClass>,
    pub versioning: Option<bool>,
    pub logging_bucket: Option<String>,
    pub logging_prefix: Option<String>,
    pub website_main: Option<String>,
    pub website_404: Option<String>,
    pub cors: Option<Cors>,
    pub acl: Option<PredefinedAcl>,
    pub default_acl: Option<PredefinedAcl>,
    /// Overrides the configured retry count for the insert
    pub retries: Option<u32>,
}

impl BucketOptions {
    fn body(&self, name: &str) -> Value {
        let mut body = Map::new();
        body.insert("name".to_string(), json!(name));
        if let Some(location) = &self.location {
            body.insert("location".to_string(), json!(location));
        }
        if let Some(class) = self.storage_class {
            body.insert("storageClass".to_string(), json!(class.as_api_str()));
        }
        if let Some(enabled) = self.versioning {
            body.insert("versioning".to_string(), json!({ "enabled": enabled }));
        }
        let mut logging = Map::new();
        if let Some(bucket) = &self.logging_bucket {
            logging.insert("logBucket".to_string(), json!(bucket));
        }
        if let Some(prefix) = &self.logging_prefix {
            logging.insert("logObjectPrefix".to_string(), json!(prefix));
        }
        if !logging.is_empty() {
            body.insert("logging".to_string(), Value::Object(logging));
        }
        let mut website = Map::new();
        if let Some(main) = &self.website_main {
            website.insert("mainPageSuffix".to_string(), json!(main));
        }
        if let Some(not_found) = &self.website_404 {
            website.insert("notFoundPage".to_string(), json!(not_found));
        }
        if !website.is_empty() {
            body.insert("website".to_string(), Value::Object(website));
        }
        if let Some(cors) = &self.cors {
            body.insert("cors".to_string(), cors.to_value());
        }
        Value::Object(body)
    }
}

/// Cloud Storage within one project
#[derive(Debug, Clone)]
pub struct Storage {
    connection: Connection,
}

impl Storage {
    /// Connect with Application Default Credentials.
    ///
    /// The project is, in order: `project`, the config's `project_id`,
    /// `STORAGE_PROJECT` and the usual gcloud variables and properties,
    /// then the project of the credentials.
    pub async fn new(project: Option<&str>, config: ClientConfig) -> Result<Self> {
        let resolved = config.effective_project(project, PROJECT_ENV);
        let client = GcpClient::new(config).await?;
        let project = match resolved {
            Ok(project) => project,
            Err(e) => client.credentials.project_id().await.ok_or(e)?,
        };
        Ok(Self::with_client(client, project))
    }

    pub fn with_client(client: GcpClient, project: impl Into<String>) -> Self {
        Self {
            connection: Connection::new(client, project),
        }
    }

    pub fn project(&self) -> &str {
        self.connection.project()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// One page of the project's buckets
    pub async fn buckets(&self, options: &ListOptions) -> Result<Page<Bucket>> {
        let response = self.connection.list_buckets(options).await?;
        Page::from_response(&response, "items", None, |value| {
            Bucket::from_value(self.connection.clone(), value, Completeness::Partial)
        })
    }

    /// Look up a bucket; `None` when it does not exist
    pub async fn bucket(&self, name: &str) -> Result<Option<Bucket>> {
        require_id("bucket name", name)?;
        match self.connection.get_bucket(name).await {
            Ok(value) => {
                Bucket::from_value(self.connection.clone(), value, Completeness::Full).map(Some)
            },
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_bucket(&self, name: &str, options: &BucketOptions) -> Result<Bucket> {
        require_id("bucket name", name)?;
        let acls = BucketAcls {
            acl: options.acl.map(PredefinedAcl::as_api_str),
            default_acl: options.default_acl.map(PredefinedAcl::as_api_str),
        };
        tracing::info!("Creating bucket {} in {}", name, self.project());
        let value = self
            .connection
            .insert_bucket(options.body(name), acls, options.retries)
            .await?;
        Bucket::from_value(self.connection.clone(), value, Completeness::Partial)
    }

    /// Create a bucket whose CORS rules are defined by `define`. Rules are
    /// only sent when the builder was modified.
    pub async fn create_bucket_with_cors<F>(
        &self,
        name: &str,
        options: &BucketOptions,
        define: F,
    ) -> Result<Bucket>
    where
        F: FnOnce(&mut CorsBuilder),
    {
        let mut builder = CorsBuilder::new();
        define(&mut builder);
        if !builder.changed() {
            return self.create_bucket(name, options).await;
        }
        let options = BucketOptions {
            cors: Some(builder.build()),
            ..options.clone()
        };
        self.create_bucket(name, &options).await
    }
}
