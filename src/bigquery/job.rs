//! BigQuery jobs
//!
//! Copy, extract and load calls on a table each insert a job and hand back a
//! [`Job`] handle. Job bodies are built here; every body carries a
//! client-generated `jobId` so an insert can be retried safely.

use super::connection::Connection;
use super::insert::ErrorProto;
use super::reference::TableReference;
use crate::error::Result;
use crate::resource::representation::{value_millis, Representation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;

/// What a job does, from the key present under `configuration`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Copy,
    Extract,
    Load,
    Query,
    Unknown,
}

/// Whether a job may create its destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreateDisposition {
    Needed,
    Never,
}

impl CreateDisposition {
    pub fn as_api_str(self) -> &'static str {
        match self {
            CreateDisposition::Needed => "CREATE_IF_NEEDED",
            CreateDisposition::Never => "CREATE_NEVER",
        }
    }
}

/// What a job does with data already in the destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteDisposition {
    Truncate,
    Append,
    Empty,
}

impl WriteDisposition {
    pub fn as_api_str(self) -> &'static str {
        match self {
            WriteDisposition::Truncate => "WRITE_TRUNCATE",
            WriteDisposition::Append => "WRITE_APPEND",
            WriteDisposition::Empty => "WRITE_EMPTY",
        }
    }
}

/// Source or destination file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    Csv,
    Json,
    Avro,
    DatastoreBackup,
}

impl DataFormat {
    pub fn as_api_str(self) -> &'static str {
        match self {
            DataFormat::Csv => "CSV",
            DataFormat::Json => "NEWLINE_DELIMITED_JSON",
            DataFormat::Avro => "AVRO",
            DataFormat::DatastoreBackup => "DATASTORE_BACKUP",
        }
    }

    /// Guess the format from a file name or URL extension
    pub fn from_path(path: &str) -> Option<Self> {
        let extension = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(DataFormat::Csv),
            "json" => Some(DataFormat::Json),
            "avro" => Some(DataFormat::Avro),
            "backup_info" => Some(DataFormat::DatastoreBackup),
            _ => None,
        }
    }
}

/// Options for `Table::copy`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CopyOptions {
    pub create: Option<CreateDisposition>,
    pub write: Option<WriteDisposition>,
}

/// Options for `Table::extract`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractOptions {
    /// Defaults to the extension of the first destination URL, then CSV
    pub format: Option<DataFormat>,
    /// `GZIP` or `NONE`
    pub compression: Option<String>,
    pub delimiter: Option<String>,
    /// Print a header row (CSV only)
    pub header: Option<bool>,
}

/// Options for `Table::load`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadOptions {
    /// Defaults to the source's file extension
    pub format: Option<DataFormat>,
    pub create: Option<CreateDisposition>,
    pub write: Option<WriteDisposition>,
    /// Entity properties to load from a Datastore backup
    pub projection_fields: Vec<String>,
    pub jagged_rows: Option<bool>,
    pub quoted_newlines: Option<bool>,
    /// `UTF-8` or `ISO-8859-1`
    pub encoding: Option<String>,
    pub delimiter: Option<String>,
    pub ignore_unknown: Option<bool>,
    pub max_bad_records: Option<u32>,
    pub quote: Option<String>,
    pub skip_leading: Option<u32>,
    /// Resumable chunk size in bytes, rounded down to 256 KiB
    pub chunk_size: Option<u64>,
}

fn job_reference(project: &str) -> Value {
    json!({
        "projectId": project,
        "jobId": format!("gcloud_client_{}", uuid::Uuid::new_v4().simple()),
    })
}

fn insert_opt(map: &mut Map<String, Value>, key: &str, value: Option<impl Into<Value>>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value.into());
    }
}

fn job_body(project: &str, kind: &str, config: Map<String, Value>) -> Value {
    json!({
        "jobReference": job_reference(project),
        "configuration": { kind: config },
    })
}

pub(crate) fn copy_job(
    project: &str,
    source: &TableReference,
    destination: &TableReference,
    options: &CopyOptions,
) -> Result<Value> {
    let mut config = Map::new();
    config.insert("sourceTable".to_string(), serde_json::to_value(source)?);
    config.insert("destinationTable".to_string(), serde_json::to_value(destination)?);
    insert_opt(&mut config, "createDisposition", options.create.map(|c| c.as_api_str()));
    insert_opt(&mut config, "writeDisposition", options.write.map(|w| w.as_api_str()));
    Ok(job_body(project, "copy", config))
}

pub(crate) fn extract_job(
    project: &str,
    source: &TableReference,
    urls: &[String],
    options: &ExtractOptions,
) -> Result<Value> {
    let format = options
        .format
        .or_else(|| urls.first().and_then(|u| DataFormat::from_path(u)))
        .unwrap_or(DataFormat::Csv);

    let mut config = Map::new();
    config.insert("destinationUris".to_string(), json!(urls));
    config.insert("sourceTable".to_string(), serde_json::to_value(source)?);
    config.insert("destinationFormat".to_string(), json!(format.as_api_str()));
    insert_opt(&mut config, "printHeader", options.header);
    insert_opt(&mut config, "compression", options.compression.clone());
    insert_opt(&mut config, "fieldDelimiter", options.delimiter.clone());
    Ok(job_body(project, "extract", config))
}

/// Load job body. `source_uri` is set for loads from Cloud Storage and left
/// out for media uploads, where `file_name` only drives format detection.
pub(crate) fn load_job(
    project: &str,
    destination: &TableReference,
    source_uri: Option<&str>,
    file_name: &str,
    options: &LoadOptions,
) -> Result<Value> {
    let mut config = Map::new();
    if let Some(uri) = source_uri {
        config.insert("sourceUris".to_string(), json!([uri]));
    }
    config.insert("destinationTable".to_string(), serde_json::to_value(destination)?);
    insert_opt(&mut config, "createDisposition", options.create.map(|c| c.as_api_str()));
    insert_opt(&mut config, "writeDisposition", options.write.map(|w| w.as_api_str()));
    insert_opt(
        &mut config,
        "sourceFormat",
        options
            .format
            .or_else(|| DataFormat::from_path(file_name))
            .map(|f| f.as_api_str()),
    );
    if !options.projection_fields.is_empty() {
        config.insert("projectionFields".to_string(), json!(options.projection_fields));
    }
    insert_opt(&mut config, "allowJaggedRows", options.jagged_rows);
    insert_opt(&mut config, "allowQuotedNewlines", options.quoted_newlines);
    insert_opt(&mut config, "encoding", options.encoding.clone());
    insert_opt(&mut config, "fieldDelimiter", options.delimiter.clone());
    insert_opt(&mut config, "ignoreUnknownValues", options.ignore_unknown);
    insert_opt(&mut config, "maxBadRecords", options.max_bad_records);
    insert_opt(&mut config, "quote", options.quote.clone());
    insert_opt(&mut config, "skipLeadingRows", options.skip_leading);
    Ok(job_body(project, "load", config))
}

/// Handle over a `jobs` resource.
///
/// Job documents always arrive complete, so accessors read the cache
/// directly; call [`Job::reload`] to observe progress.
#[derive(Debug, Clone)]
pub struct Job {
    connection: Connection,
    rep: Representation,
}

impl Job {
    pub(crate) fn from_value(connection: Connection, value: Value) -> Result<Self> {
        Ok(Self {
            connection,
            rep: Representation::full(value)?,
        })
    }

    pub fn job_id(&self) -> Option<String> {
        self.rep.str("jobReference.jobId")
    }

    pub fn project_id(&self) -> Option<String> {
        self.rep.str("jobReference.projectId")
    }

    /// `PENDING`, `RUNNING` or `DONE`
    pub fn state(&self) -> Option<String> {
        self.rep.str("status.state")
    }

    pub fn is_running(&self) -> bool {
        self.state().as_deref() == Some("RUNNING")
    }

    pub fn is_pending(&self) -> bool {
        self.state().as_deref() == Some("PENDING")
    }

    pub fn is_done(&self) -> bool {
        self.state().as_deref() == Some("DONE")
    }

    /// Done with a fatal error
    pub fn is_failed(&self) -> bool {
        self.is_done() && self.error().is_some()
    }

    /// The error that made the job fail, if any
    pub fn error(&self) -> Option<ErrorProto> {
        self.rep
            .pointer("status.errorResult")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Every error encountered, including non-fatal ones
    pub fn errors(&self) -> Vec<ErrorProto> {
        self.rep
            .pointer("status.errors")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn kind(&self) -> JobKind {
        let Some(config) = self.rep.get("configuration") else {
            return JobKind::Unknown;
        };
        if config.get("copy").is_some() {
            JobKind::Copy
        } else if config.get("extract").is_some() {
            JobKind::Extract
        } else if config.get("load").is_some() {
            JobKind::Load
        } else if config.get("query").is_some() {
            JobKind::Query
        } else {
            JobKind::Unknown
        }
    }

    pub fn configuration(&self) -> Option<&Value> {
        self.rep.get("configuration")
    }

    pub fn statistics(&self) -> Option<&Value> {
        self.rep.get("statistics")
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.rep.pointer("statistics.creationTime").and_then(value_millis)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.rep.pointer("statistics.startTime").and_then(value_millis)
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.rep.pointer("statistics.endTime").and_then(value_millis)
    }

    pub fn representation(&self) -> &Representation {
        &self.rep
    }

    /// Fetch the current job state
    pub async fn reload(&mut self) -> Result<()> {
        let job_id = self.job_id().unwrap_or_default();
        crate::resource::require_id("job_id", &job_id)?;
        let project = self
            .project_id()
            .unwrap_or_else(|| self.connection.project().to_string());
        let value = self.connection.get_job(&project, &job_id).await?;
        self.rep.replace(value, crate::resource::Completeness::Full)
    }
}
