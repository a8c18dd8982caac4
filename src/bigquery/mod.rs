//! BigQuery
//!
//! [`Bigquery`] is the project-level entry point. From it:
//!
//! - [`Dataset`] - dataset handle (tables, views, metadata)
//! - [`Table`] / [`View`] - table handles, returned as [`TableResource`]
//! - [`Job`] - copy, extract and load jobs
//! - [`SchemaBuilder`] - builds table schemas

pub mod connection;
pub mod data;
pub mod dataset;
pub mod insert;
pub mod job;
pub mod load;
pub mod reference;
pub mod schema;
pub mod table;

pub use connection::Connection;
pub use data::{DataOptions, TableData};
pub use dataset::{Dataset, DatasetUpdate, TableOptions, ViewOptions};
pub use insert::{ErrorProto, InsertError, InsertOptions, InsertResponse};
pub use job::{
    CopyOptions, CreateDisposition, DataFormat, ExtractOptions, Job, JobKind, LoadOptions,
    WriteDisposition,
};
pub use load::LoadSource;
pub use reference::{DatasetReference, TableReference};
pub use schema::{Field, FieldMode, FieldOptions, FieldType, Schema, SchemaBuilder};
pub use table::{Table, TableCore, TableDestination, TableResource, TableUpdate, View, ViewUpdate};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::gcp::client::GcpClient;
use crate::resource::{require_id, Completeness, Page};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Environment variable naming the default BigQuery project
pub const PROJECT_ENV: &str = "BIGQUERY_PROJECT";

/// Options for listing datasets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetListOptions {
    /// Include hidden datasets
    pub all: bool,
    pub token: Option<String>,
    pub max: Option<u32>,
}

/// Options for `Bigquery::create_dataset`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetOptions {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Default lifetime of new tables in milliseconds
    pub default_expiration: Option<i64>,
    /// `US` or `EU`
    pub location: Option<String>,
}

/// BigQuery within one project
#[derive(Debug, Clone)]
pub struct Bigquery {
    connection: Connection,
}

impl Bigquery {
    /// Connect with Application Default Credentials.
    ///
    /// The project is, in order: `project`, the config's `project_id`,
    /// `BIGQUERY_PROJECT` and the usual gcloud variables and properties,
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

    /// One page of the project's datasets
    pub async fn datasets(&self, options: &DatasetListOptions) -> Result<Page<Dataset>> {
        let response = self
            .connection
            .list_datasets(options.all, options.token.as_deref(), options.max)
            .await?;
        Page::from_response(&response, "datasets", None, |value| {
            Dataset::from_value(self.connection.clone(), value, Completeness::Partial)
        })
    }

    /// Look up a dataset; `None` when it does not exist
    pub async fn dataset(&self, dataset_id: &str) -> Result<Option<Dataset>> {
        require_id("dataset_id", dataset_id)?;
        let reference = DatasetReference::new(self.project(), dataset_id);
        match self.connection.get_dataset(&reference).await {
            Ok(value) => {
                Dataset::from_value(self.connection.clone(), value, Completeness::Full).map(Some)
            },
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_dataset(&self, dataset_id: &str, options: &DatasetOptions) -> Result<Dataset> {
        require_id("dataset_id", dataset_id)?;
        let mut body = Map::new();
        body.insert(
            "datasetReference".to_string(),
            json!({ "projectId": self.project(), "datasetId": dataset_id }),
        );
        if let Some(name) = &options.name {
            body.insert("friendlyName".to_string(), json!(name));
        }
        if let Some(description) = &options.description {
            body.insert("description".to_string(), json!(description));
        }
        if let Some(expiration) = options.default_expiration {
            body.insert("defaultTableExpirationMs".to_string(), json!(expiration));
        }
        if let Some(location) = &options.location {
            body.insert("location".to_string(), json!(location));
        }
        tracing::info!("Creating dataset {}:{}", self.project(), dataset_id);
        let value = self.connection.insert_dataset(Value::Object(body)).await?;
        Dataset::from_value(self.connection.clone(), value, Completeness::Partial)
    }

    /// Look up a job in this project; `None` when it does not exist
    pub async fn job(&self, job_id: &str) -> Result<Option<Job>> {
        require_id("job_id", job_id)?;
        match self.connection.get_job(self.project(), job_id).await {
            Ok(value) => Job::from_value(self.connection.clone(), value).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
