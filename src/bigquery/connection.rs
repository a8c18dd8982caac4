//! BigQuery Connection
//!
//! Maps named BigQuery operations to REST calls. Handles never build
//! requests themselves; they go through these methods.

use super::reference::{DatasetReference, TableReference};
use crate::error::Result;
use crate::gcp::client::GcpClient;
use crate::gcp::http::ApiRequest;
use crate::resource::{ListOptions, Patch};
use serde_json::{json, Value};

/// Project-scoped BigQuery connection. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Connection {
    client: GcpClient,
    project: String,
}

impl Connection {
    pub fn new(client: GcpClient, project: impl Into<String>) -> Self {
        Self {
            client,
            project: project.into(),
        }
    }

    /// Project that new datasets and jobs are created in
    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn client(&self) -> &GcpClient {
        &self.client
    }

    fn dataset_url(&self, dataset: &DatasetReference) -> String {
        self.client.bigquery_url(
            &dataset.project_id,
            &format!("datasets/{}", dataset.dataset_id),
        )
    }

    fn table_url(&self, table: &TableReference) -> String {
        self.client.bigquery_url(
            &table.project_id,
            &format!("datasets/{}/tables/{}", table.dataset_id, table.table_id),
        )
    }

    // =========================================================================
    // Datasets
    // =========================================================================

    pub async fn list_datasets(
        &self,
        all: bool,
        token: Option<&str>,
        max: Option<u32>,
    ) -> Result<Value> {
        let url = self.client.bigquery_url(&self.project, "datasets");
        let request = ApiRequest::get(url)
            .query_opt("all", all.then_some(true))
            .query_opt("pageToken", token)
            .query_opt("maxResults", max);
        self.client.call(request).await
    }

    pub async fn get_dataset(&self, dataset: &DatasetReference) -> Result<Value> {
        self.client.call(ApiRequest::get(self.dataset_url(dataset))).await
    }

    pub async fn insert_dataset(&self, body: Value) -> Result<Value> {
        let url = self.client.bigquery_url(&self.project, "datasets");
        self.client.call(ApiRequest::post(url).json(body)).await
    }

    pub async fn patch_dataset(&self, dataset: &DatasetReference, patch: &Patch) -> Result<Value> {
        let request = ApiRequest::patch(self.dataset_url(dataset)).json(patch.to_value());
        self.client.call(request).await
    }

    pub async fn delete_dataset(&self, dataset: &DatasetReference, force: bool) -> Result<()> {
        let request =
            ApiRequest::delete(self.dataset_url(dataset)).query_opt("deleteContents", force.then_some(true));
        self.client.call(request).await.map(|_| ())
    }

    // =========================================================================
    // Tables
    // =========================================================================

    pub async fn list_tables(
        &self,
        dataset: &DatasetReference,
        options: &ListOptions,
    ) -> Result<Value> {
        let request = ApiRequest::get(format!("{}/tables", self.dataset_url(dataset)))
            .query_opt("pageToken", options.token.as_deref())
            .query_opt("maxResults", options.max);
        self.client.call(request).await
    }

    pub async fn get_table(&self, table: &TableReference) -> Result<Value> {
        self.client.call(ApiRequest::get(self.table_url(table))).await
    }

    pub async fn insert_table(&self, dataset: &DatasetReference, body: Value) -> Result<Value> {
        let request = ApiRequest::post(format!("{}/tables", self.dataset_url(dataset))).json(body);
        self.client.call(request).await
    }

    pub async fn patch_table(&self, table: &TableReference, patch: &Patch) -> Result<Value> {
        let request = ApiRequest::patch(self.table_url(table)).json(patch.to_value());
        self.client.call(request).await
    }

    pub async fn delete_table(&self, table: &TableReference) -> Result<()> {
        self.client
            .call(ApiRequest::delete(self.table_url(table)))
            .await
            .map(|_| ())
    }

    // =========================================================================
    // Table data
    // =========================================================================

    pub async fn list_tabledata(
        &self,
        table: &TableReference,
        token: Option<&str>,
        max: Option<u32>,
        start: Option<u64>,
    ) -> Result<Value> {
        let request = ApiRequest::get(format!("{}/data", self.table_url(table)))
            .query_opt("pageToken", token)
            .query_opt("maxResults", max)
            .query_opt("startIndex", start);
        self.client.call(request).await
    }

    /// Stream rows into a table. Every row carries an `insertId`, so a retried
    /// request cannot duplicate rows.
    pub async fn insert_tabledata(
        &self,
        table: &TableReference,
        rows: &[serde_json::Map<String, Value>],
        skip_invalid: bool,
        ignore_unknown: bool,
    ) -> Result<Value> {
        let rows: Vec<Value> = rows
            .iter()
            .map(|row| {
                json!({
                    "insertId": uuid::Uuid::new_v4().to_string(),
                    "json": row,
                })
            })
            .collect();
        let body = json!({
            "kind": "bigquery#tableDataInsertAllRequest",
            "skipInvalidRows": skip_invalid,
            "ignoreUnknownValues": ignore_unknown,
            "rows": rows,
        });
        let request = ApiRequest::post(format!("{}/insertAll", self.table_url(table)))
            .json(body)
            .idempotent(true);
        self.client.call(request).await
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    /// Insert a job. Job bodies carry a client-generated job ID, which makes
    /// a retried insert safe.
    pub async fn insert_job(&self, body: Value) -> Result<Value> {
        let url = self.client.bigquery_url(&self.project, "jobs");
        let request = ApiRequest::post(url).json(body).idempotent(true);
        self.client.call(request).await
    }

    pub async fn get_job(&self, project_id: &str, job_id: &str) -> Result<Value> {
        let url = self
            .client
            .bigquery_url(project_id, &format!("jobs/{}", job_id));
        self.client.call(ApiRequest::get(url)).await
    }

    /// Media upload URL for load jobs in this project
    pub fn upload_url(&self) -> String {
        self.client.bigquery_upload_url(&self.project)
    }
}
