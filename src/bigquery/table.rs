//! Tables and views
//!
//! Both kinds share [`TableCore`] (identity, common attributes, rename,
//! delete). A list or lookup returns a [`TableResource`], resolved once from
//! the `type` field of the resource.

use super::connection::Connection;
use super::data::{DataOptions, TableData};
use super::insert::{InsertOptions, InsertResponse};
use super::job::{self, CopyOptions, ExtractOptions, Job, LoadOptions};
use super::load::{LoadSource, ResolvedSource};
use super::reference::TableReference;
use super::schema::{Schema, SchemaBuilder};
use crate::error::{Error, Result};
use crate::resource::representation::{value_millis, value_u64};
use crate::resource::{Completeness, Patch, PatchScope, Representation, Resource};
use crate::upload::{self, UploadTarget};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::ops::{Deref, DerefMut};

/// State shared by tables and views
#[derive(Debug, Clone)]
pub struct TableCore {
    connection: Connection,
    reference: TableReference,
    rep: Representation,
}

impl TableCore {
    fn new(connection: Connection, value: Value, completeness: Completeness) -> Result<Self> {
        let reference: TableReference = value
            .get("tableReference")
            .cloned()
            .ok_or_else(|| Error::UnexpectedResponse("table has no tableReference".to_string()))
            .and_then(|r| serde_json::from_value(r).map_err(Error::from))?;
        Ok(Self {
            connection,
            reference,
            rep: Representation::new(value, completeness)?,
        })
    }

    pub fn reference(&self) -> &TableReference {
        &self.reference
    }

    pub fn table_id(&self) -> &str {
        &self.reference.table_id
    }

    pub fn dataset_id(&self) -> &str {
        &self.reference.dataset_id
    }

    pub fn project_id(&self) -> &str {
        &self.reference.project_id
    }

    /// `project:dataset.table`
    pub fn id(&self) -> String {
        self.rep
            .str("id")
            .unwrap_or_else(|| self.reference.to_string())
    }

    /// [`TableCore::id`] in the form usable inside a query
    pub fn query_id(&self) -> String {
        if self.project_id().contains('-') {
            format!("[{}]", self.id())
        } else {
            self.id()
        }
    }

    pub fn is_table(&self) -> bool {
        self.rep.str("type").as_deref() == Some("TABLE")
    }

    pub fn is_view(&self) -> bool {
        self.rep.str("type").as_deref() == Some("VIEW")
    }

    pub async fn name(&mut self) -> Result<Option<String>> {
        self.attribute_str("friendlyName").await
    }

    pub async fn description(&mut self) -> Result<Option<String>> {
        self.attribute_str("description").await
    }

    pub async fn etag(&mut self) -> Result<Option<String>> {
        self.attribute_str("etag").await
    }

    pub async fn api_url(&mut self) -> Result<Option<String>> {
        self.attribute_str("selfLink").await
    }

    pub async fn location(&mut self) -> Result<Option<String>> {
        self.attribute_str("location").await
    }

    pub async fn created_at(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.attribute("creationTime").await?.and_then(value_millis))
    }

    pub async fn modified_at(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.attribute("lastModifiedTime").await?.and_then(value_millis))
    }

    /// `None` when the table never expires
    pub async fn expires_at(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.attribute("expirationTime").await?.and_then(value_millis))
    }

    pub async fn set_name(&mut self, name: &str) -> Result<()> {
        self.apply_patch(Patch::field("friendlyName", name)).await.map(|_| ())
    }

    pub async fn set_description(&mut self, description: &str) -> Result<()> {
        self.apply_patch(Patch::field("description", description))
            .await
            .map(|_| ())
    }

    pub async fn delete(&self) -> Result<()> {
        tracing::info!("Deleting {}", self.describe());
        self.connection.delete_table(&self.reference).await
    }

    pub async fn reload(&mut self) -> Result<()> {
        Resource::reload(self).await
    }
}

impl Resource for TableCore {
    fn describe(&self) -> String {
        format!("table {}", self.reference)
    }

    fn representation(&self) -> &Representation {
        &self.rep
    }

    fn representation_mut(&mut self) -> &mut Representation {
        &mut self.rep
    }

    async fn fetch_full(&self) -> Result<Value> {
        self.connection.get_table(&self.reference).await
    }

    async fn send_patch(&self, patch: &Patch) -> Result<Value> {
        self.connection.patch_table(&self.reference, patch).await
    }
}

/// Where a copy job writes
#[derive(Debug, Clone)]
pub enum TableDestination {
    Reference(TableReference),
    /// `project:dataset.table`, `dataset.table`, or `table`, relative to the
    /// source table
    Name(String),
}

impl From<&str> for TableDestination {
    fn from(value: &str) -> Self {
        TableDestination::Name(value.to_string())
    }
}

impl From<String> for TableDestination {
    fn from(value: String) -> Self {
        TableDestination::Name(value)
    }
}

impl From<TableReference> for TableDestination {
    fn from(value: TableReference) -> Self {
        TableDestination::Reference(value)
    }
}

impl From<&Table> for TableDestination {
    fn from(value: &Table) -> Self {
        TableDestination::Reference(value.reference().clone())
    }
}

/// Batched changes to a table's metadata
#[derive(Debug)]
pub struct TableUpdate<'a> {
    scope: PatchScope<'a>,
    schema: Option<Schema>,
}

impl TableUpdate<'_> {
    pub fn name(&self) -> Option<&str> {
        self.scope.get("friendlyName").and_then(Value::as_str)
    }

    pub fn set_name(&mut self, name: &str) {
        self.scope.set("friendlyName", name);
    }

    pub fn description(&self) -> Option<&str> {
        self.scope.get("description").and_then(Value::as_str)
    }

    pub fn set_description(&mut self, description: &str) {
        self.scope.set("description", description);
    }

    /// Serialized when the update is sent
    pub fn set_schema(&mut self, schema: &Schema) {
        self.schema = Some(schema.clone());
    }

    /// Milliseconds since the epoch; `None` keeps the table forever
    pub fn set_expiration(&mut self, expires_at: Option<DateTime<Utc>>) {
        let value = expires_at.map_or(Value::Null, |t| json!(t.timestamp_millis().to_string()));
        self.scope.set("expirationTime", value);
    }

    fn into_patch(self) -> Result<Patch> {
        let mut patch = self.scope.into_patch();
        if let Some(schema) = &self.schema {
            patch.set("schema", serde_json::to_value(schema)?);
        }
        Ok(patch)
    }
}

/// A table holding rows
#[derive(Debug, Clone)]
pub struct Table(TableCore);

impl Deref for Table {
    type Target = TableCore;

    fn deref(&self) -> &TableCore {
        &self.0
    }
}

impl DerefMut for Table {
    fn deref_mut(&mut self) -> &mut TableCore {
        &mut self.0
    }
}

impl Table {
    pub async fn bytes_count(&mut self) -> Result<Option<u64>> {
        Ok(self.0.attribute("numBytes").await?.and_then(value_u64))
    }

    pub async fn rows_count(&mut self) -> Result<Option<u64>> {
        Ok(self.0.attribute("numRows").await?.and_then(value_u64))
    }

    /// Current schema; empty when the table has none yet
    pub async fn schema(&mut self) -> Result<Schema> {
        match self.0.attribute("schema").await? {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(Schema::default()),
        }
    }

    pub async fn fields(&mut self) -> Result<Vec<super::schema::Field>> {
        Ok(self.schema().await?.fields().to_vec())
    }

    pub async fn headers(&mut self) -> Result<Vec<String>> {
        Ok(self.schema().await?.headers())
    }

    pub async fn set_schema(&mut self, schema: &Schema) -> Result<()> {
        let patch = Patch::field("schema", serde_json::to_value(schema)?);
        self.0.apply_patch(patch).await.map(|_| ())
    }

    /// Edit the schema with a builder. With `replace`, the builder starts
    /// empty instead of from the current fields. Nothing is sent unless the
    /// builder was modified.
    ///
    /// Returns whether the schema was sent.
    pub async fn update_schema<F>(&mut self, replace: bool, edit: F) -> Result<bool>
    where
        F: FnOnce(&mut SchemaBuilder),
    {
        let mut builder = if replace {
            self.0.ensure_full_data().await?;
            SchemaBuilder::new()
        } else {
            self.schema().await?.to_builder()
        };
        edit(&mut builder);
        if !builder.changed() {
            return Ok(false);
        }
        self.set_schema(&builder.build()).await?;
        Ok(true)
    }

    /// Apply several metadata changes with a single request
    pub async fn update<F>(&mut self, edit: F) -> Result<bool>
    where
        F: FnOnce(&mut TableUpdate<'_>),
    {
        self.0.ensure_full_data().await?;
        let patch = {
            let mut proxy = TableUpdate {
                scope: PatchScope::new(self.0.representation()),
                schema: None,
            };
            edit(&mut proxy);
            proxy.into_patch()?
        };
        self.0.apply_patch(patch).await
    }

    /// Read one page of rows
    pub async fn data(&mut self, options: &DataOptions) -> Result<TableData> {
        let schema = self.schema().await?;
        let response = self
            .0
            .connection
            .list_tabledata(
                &self.0.reference,
                options.token.as_deref(),
                options.max,
                options.start,
            )
            .await?;
        TableData::from_response(&response, schema.fields())
    }

    /// Stream rows into the table
    pub async fn insert(
        &self,
        rows: Vec<Map<String, Value>>,
        options: &InsertOptions,
    ) -> Result<InsertResponse> {
        if rows.is_empty() {
            return Err(Error::InvalidArgument("no rows to insert".to_string()));
        }
        let response = self
            .0
            .connection
            .insert_tabledata(
                &self.0.reference,
                &rows,
                options.skip_invalid,
                options.ignore_unknown,
            )
            .await?;
        Ok(InsertResponse::from_response(rows, &response))
    }

    /// Start a job copying this table to `destination`
    pub async fn copy(
        &self,
        destination: impl Into<TableDestination>,
        options: &CopyOptions,
    ) -> Result<Job> {
        let destination = match destination.into() {
            TableDestination::Reference(reference) => reference,
            TableDestination::Name(name) => TableReference::parse(&name, &self.0.reference)?,
        };
        let body = job::copy_job(
            self.0.connection.project(),
            &self.0.reference,
            &destination,
            options,
        )?;
        self.insert_job(body).await
    }

    /// Start a job exporting this table to Cloud Storage
    pub async fn extract<I, S>(&self, urls: I, options: &ExtractOptions) -> Result<Job>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls: Vec<String> = urls.into_iter().map(Into::into).collect();
        if urls.is_empty() {
            return Err(Error::InvalidArgument("extract destination is missing".to_string()));
        }
        let body = job::extract_job(self.0.connection.project(), &self.0.reference, &urls, options)?;
        self.insert_job(body).await
    }

    /// Start a load job from a Cloud Storage URL or a local file.
    ///
    /// Local files are uploaded with the job metadata; the transfer is
    /// resumable when the file is larger than the configured threshold.
    pub async fn load(&self, source: impl Into<LoadSource>, options: &LoadOptions) -> Result<Job> {
        let project = self.0.connection.project();
        match source.into().resolve().await? {
            ResolvedSource::Storage(url) => {
                let body = job::load_job(project, &self.0.reference, Some(&url), &url, options)?;
                self.insert_job(body).await
            },
            ResolvedSource::LocalFile { path, size } => {
                tracing::debug!("Loading {} bytes from {:?} into {}", size, path, self.0.describe());
                let name = path.to_string_lossy();
                let metadata = job::load_job(project, &self.0.reference, None, &name, options)?;
                let target = UploadTarget::new(self.0.connection.upload_url());
                let value = upload::upload_file(
                    self.0.connection.client(),
                    &target,
                    &path,
                    metadata,
                    options.chunk_size,
                )
                .await?;
                Job::from_value(self.0.connection.clone(), value)
            },
        }
    }

    async fn insert_job(&self, body: Value) -> Result<Job> {
        let value = self.0.connection.insert_job(body).await?;
        Job::from_value(self.0.connection.clone(), value)
    }
}

/// Batched changes to a view
#[derive(Debug)]
pub struct ViewUpdate<'a> {
    scope: PatchScope<'a>,
}

impl ViewUpdate<'_> {
    pub fn name(&self) -> Option<&str> {
        self.scope.get("friendlyName").and_then(Value::as_str)
    }

    pub fn set_name(&mut self, name: &str) {
        self.scope.set("friendlyName", name);
    }

    pub fn description(&self) -> Option<&str> {
        self.scope.get("description").and_then(Value::as_str)
    }

    pub fn set_description(&mut self, description: &str) {
        self.scope.set("description", description);
    }

    pub fn query(&self) -> Option<&str> {
        self.scope.get_nested("view", "query").and_then(Value::as_str)
    }

    pub fn set_query(&mut self, query: &str) {
        self.scope.set_nested("view", "query", query);
    }
}

/// A virtual table defined by a SQL query
#[derive(Debug, Clone)]
pub struct View(TableCore);

impl Deref for View {
    type Target = TableCore;

    fn deref(&self) -> &TableCore {
        &self.0
    }
}

impl DerefMut for View {
    fn deref_mut(&mut self) -> &mut TableCore {
        &mut self.0
    }
}

impl View {
    pub async fn query(&mut self) -> Result<Option<String>> {
        self.0.attribute_str("view.query").await
    }

    pub async fn set_query(&mut self, query: &str) -> Result<()> {
        let mut patch = Patch::new();
        patch.set_nested("view", "query", query);
        self.0.apply_patch(patch).await.map(|_| ())
    }

    pub async fn update<F>(&mut self, edit: F) -> Result<bool>
    where
        F: FnOnce(&mut ViewUpdate<'_>),
    {
        self.0.ensure_full_data().await?;
        let patch = {
            let mut proxy = ViewUpdate {
                scope: PatchScope::new(self.0.representation()),
            };
            edit(&mut proxy);
            proxy.scope.into_patch()
        };
        self.0.apply_patch(patch).await
    }
}

/// A table or a view, decided by the resource's `type`
#[derive(Debug, Clone)]
pub enum TableResource {
    Table(Table),
    View(View),
}

impl TableResource {
    pub(crate) fn from_value(
        connection: Connection,
        value: Value,
        completeness: Completeness,
    ) -> Result<Self> {
        let is_view = value.get("type").and_then(Value::as_str) == Some("VIEW");
        let core = TableCore::new(connection, value, completeness)?;
        Ok(if is_view {
            TableResource::View(View(core))
        } else {
            TableResource::Table(Table(core))
        })
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            TableResource::Table(table) => Some(table),
            TableResource::View(_) => None,
        }
    }

    pub fn as_view(&self) -> Option<&View> {
        match self {
            TableResource::View(view) => Some(view),
            TableResource::Table(_) => None,
        }
    }

    pub fn into_table(self) -> Option<Table> {
        match self {
            TableResource::Table(table) => Some(table),
            TableResource::View(_) => None,
        }
    }

    pub fn into_view(self) -> Option<View> {
        match self {
            TableResource::View(view) => Some(view),
            TableResource::Table(_) => None,
        }
    }
}

impl Deref for TableResource {
    type Target = TableCore;

    fn deref(&self) -> &TableCore {
        match self {
            TableResource::Table(table) => &table.0,
            TableResource::View(view) => &view.0,
        }
    }
}

impl DerefMut for TableResource {
    fn deref_mut(&mut self) -> &mut TableCore {
        match self {
            TableResource::Table(table) => &mut table.0,
            TableResource::View(view) => &mut view.0,
        }
    }
}
