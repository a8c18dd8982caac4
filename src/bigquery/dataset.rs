//! Datasets

use super::connection::Connection;
use super::reference::DatasetReference;
use super::schema::{Schema, SchemaBuilder};
use super::table::{Table, TableResource, View};
use crate::error::{Error, Result};
use crate::resource::representation::value_millis;
use crate::resource::{
    require_id, Completeness, ListOptions, Page, Patch, PatchScope, Representation, Resource,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Options for `Dataset::create_table`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableOptions {
    pub name: Option<String>,
    pub description: Option<String>,
    pub schema: Option<Schema>,
}

/// Options for `Dataset::create_view`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewOptions {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Batched changes to a dataset
#[derive(Debug)]
pub struct DatasetUpdate<'a> {
    scope: PatchScope<'a>,
}

impl DatasetUpdate<'_> {
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

    pub fn default_expiration(&self) -> Option<i64> {
        self.scope
            .get("defaultTableExpirationMs")
            .and_then(crate::resource::representation::value_i64)
    }

    /// Default lifetime of new tables in milliseconds; `None` clears it
    pub fn set_default_expiration(&mut self, millis: Option<i64>) {
        self.scope.set("defaultTableExpirationMs", millis.map_or(Value::Null, Value::from));
    }
}

/// Handle over a `datasets` resource
#[derive(Debug, Clone)]
pub struct Dataset {
    connection: Connection,
    reference: DatasetReference,
    rep: Representation,
}

impl Dataset {
    pub(crate) fn from_value(
        connection: Connection,
        value: Value,
        completeness: Completeness,
    ) -> Result<Self> {
        let reference: DatasetReference = value
            .get("datasetReference")
            .cloned()
            .ok_or_else(|| {
                Error::UnexpectedResponse("dataset has no datasetReference".to_string())
            })
            .and_then(|r| serde_json::from_value(r).map_err(Error::from))?;
        Ok(Self {
            connection,
            reference,
            rep: Representation::new(value, completeness)?,
        })
    }

    pub fn reference(&self) -> &DatasetReference {
        &self.reference
    }

    pub fn dataset_id(&self) -> &str {
        &self.reference.dataset_id
    }

    pub fn project_id(&self) -> &str {
        &self.reference.project_id
    }

    pub async fn name(&mut self) -> Result<Option<String>> {
        self.attribute_str("friendlyName").await
    }

    pub async fn description(&mut self) -> Result<Option<String>> {
        self.attribute_str("description").await
    }

    /// Default lifetime of new tables in milliseconds
    pub async fn default_expiration(&mut self) -> Result<Option<i64>> {
        self.attribute_i64("defaultTableExpirationMs").await
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

    pub async fn set_name(&mut self, name: &str) -> Result<()> {
        self.apply_patch(Patch::field("friendlyName", name)).await.map(|_| ())
    }

    pub async fn set_description(&mut self, description: &str) -> Result<()> {
        self.apply_patch(Patch::field("description", description))
            .await
            .map(|_| ())
    }

    pub async fn set_default_expiration(&mut self, millis: Option<i64>) -> Result<()> {
        let value = millis.map_or(Value::Null, Value::from);
        self.apply_patch(Patch::field("defaultTableExpirationMs", value))
            .await
            .map(|_| ())
    }

    /// Apply several changes with a single request.
    ///
    /// Returns whether a request was made.
    pub async fn update<F>(&mut self, edit: F) -> Result<bool>
    where
        F: FnOnce(&mut DatasetUpdate<'_>),
    {
        self.ensure_full_data().await?;
        let patch = {
            let mut proxy = DatasetUpdate {
                scope: PatchScope::new(&self.rep),
            };
            edit(&mut proxy);
            proxy.scope.into_patch()
        };
        self.apply_patch(patch).await
    }

    /// Delete the dataset. Without `force` the server refuses to delete a
    /// dataset that still holds tables.
    pub async fn delete(&self, force: bool) -> Result<()> {
        tracing::info!("Deleting {} (force: {})", self.describe(), force);
        self.connection.delete_dataset(&self.reference, force).await
    }

    pub async fn reload(&mut self) -> Result<()> {
        Resource::reload(self).await
    }

    fn table_body(&self, table_id: &str, name: Option<&str>, description: Option<&str>) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert(
            "tableReference".to_string(),
            json!({
                "projectId": self.reference.project_id,
                "datasetId": self.reference.dataset_id,
                "tableId": table_id,
            }),
        );
        if let Some(name) = name {
            body.insert("friendlyName".to_string(), json!(name));
        }
        if let Some(description) = description {
            body.insert("description".to_string(), json!(description));
        }
        body
    }

    /// Create a table in this dataset
    pub async fn create_table(&self, table_id: &str, options: &TableOptions) -> Result<Table> {
        require_id("table_id", table_id)?;
        let mut body = self.table_body(
            table_id,
            options.name.as_deref(),
            options.description.as_deref(),
        );
        if let Some(schema) = &options.schema {
            body.insert("schema".to_string(), serde_json::to_value(schema)?);
        }
        let value = self
            .connection
            .insert_table(&self.reference, Value::Object(body))
            .await?;
        TableResource::from_value(self.connection.clone(), value, Completeness::Partial)?
            .into_table()
            .ok_or_else(|| Error::UnexpectedResponse("created table is a view".to_string()))
    }

    /// Create a table whose schema is defined by `define`. A builder left
    /// untouched keeps `options.schema` as given.
    pub async fn create_table_with<F>(
        &self,
        table_id: &str,
        options: &TableOptions,
        define: F,
    ) -> Result<Table>
    where
        F: FnOnce(&mut SchemaBuilder),
    {
        let mut builder = options
            .schema
            .as_ref()
            .map(Schema::to_builder)
            .unwrap_or_default();
        define(&mut builder);
        if !builder.changed() {
            return self.create_table(table_id, options).await;
        }
        let options = TableOptions {
            schema: Some(builder.build()),
            ..options.clone()
        };
        self.create_table(table_id, &options).await
    }

    /// Create a view defined by `query`
    pub async fn create_view(&self, table_id: &str, query: &str, options: &ViewOptions) -> Result<View> {
        require_id("table_id", table_id)?;
        if query.trim().is_empty() {
            return Err(Error::InvalidArgument("view query is missing".to_string()));
        }
        let mut body = self.table_body(
            table_id,
            options.name.as_deref(),
            options.description.as_deref(),
        );
        body.insert("view".to_string(), json!({ "query": query }));
        let value = self
            .connection
            .insert_table(&self.reference, Value::Object(body))
            .await?;
        TableResource::from_value(self.connection.clone(), value, Completeness::Partial)?
            .into_view()
            .ok_or_else(|| Error::UnexpectedResponse("created view is a table".to_string()))
    }

    /// One page of the dataset's tables and views
    pub async fn tables(&self, options: &ListOptions) -> Result<Page<TableResource>> {
        let response = self.connection.list_tables(&self.reference, options).await?;
        Page::from_response(&response, "tables", Some("totalItems"), |value| {
            TableResource::from_value(self.connection.clone(), value, Completeness::Partial)
        })
    }

    /// Look up a table or view; `None` when it does not exist
    pub async fn table(&self, table_id: &str) -> Result<Option<TableResource>> {
        require_id("table_id", table_id)?;
        match self.connection.get_table(&self.reference.table(table_id)).await {
            Ok(value) => {
                TableResource::from_value(self.connection.clone(), value, Completeness::Full).map(Some)
            },
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Resource for Dataset {
    fn describe(&self) -> String {
        format!("dataset {}", self.reference)
    }

    fn representation(&self) -> &Representation {
        &self.rep
    }

    fn representation_mut(&mut self) -> &mut Representation {
        &mut self.rep
    }

    async fn fetch_full(&self) -> Result<Value> {
        self.connection.get_dataset(&self.reference).await
    }

    async fn send_patch(&self, patch: &Patch) -> Result<Value> {
        self.connection.patch_dataset(&self.reference, patch).await
    }
}
