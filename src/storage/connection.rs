//! Cloud Storage Connection
//!
//! Maps named Storage operations to REST calls.

use crate::error::Result;
use crate::gcp::client::GcpClient;
use crate::gcp::http::ApiRequest;
use crate::resource::{ListOptions, Patch};
use serde_json::Value;

/// Project-scoped Storage connection. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Connection {
    client: GcpClient,
    project: String,
}

/// Query parameters for listing objects
#[derive(Debug, Clone, Default)]
pub struct ObjectListQuery<'a> {
    pub prefix: Option<&'a str>,
    pub delimiter: Option<&'a str>,
    pub token: Option<&'a str>,
    pub max: Option<u32>,
    pub versions: bool,
}

/// Predefined ACLs applied when a bucket is created
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketAcls<'a> {
    pub acl: Option<&'a str>,
    pub default_acl: Option<&'a str>,
}

impl Connection {
    pub fn new(client: GcpClient, project: impl Into<String>) -> Self {
        Self {
            client,
            project: project.into(),
        }
    }

    /// Project that owns new buckets
    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn client(&self) -> &GcpClient {
        &self.client
    }

    // =========================================================================
    // Buckets
    // =========================================================================

    pub async fn list_buckets(&self, options: &ListOptions) -> Result<Value> {
        let request = ApiRequest::get(self.client.storage_url("b"))
            .query("project", &self.project)
            .query_opt("prefix", options.prefix.as_deref())
            .query_opt("pageToken", options.token.as_deref())
            .query_opt("maxResults", options.max);
        self.client.call(request).await
    }

    pub async fn get_bucket(&self, bucket: &str) -> Result<Value> {
        self.client
            .call(ApiRequest::get(self.client.storage_bucket_url(bucket)))
            .await
    }

    /// Create a bucket. Bucket names are global, so a repeated insert can
    /// only fail with a conflict and never creates a second bucket.
    pub async fn insert_bucket(
        &self,
        body: Value,
        acls: BucketAcls<'_>,
        retries: Option<u32>,
    ) -> Result<Value> {
        let request = ApiRequest::post(self.client.storage_url("b"))
            .query("project", &self.project)
            .query_opt("predefinedAcl", acls.acl)
            .query_opt("predefinedDefaultObjectAcl", acls.default_acl)
            .json(body)
            .idempotent(true)
            .retries(retries);
        self.client.call(request).await
    }

    pub async fn patch_bucket(&self, bucket: &str, patch: &Patch) -> Result<Value> {
        let request =
            ApiRequest::patch(self.client.storage_bucket_url(bucket)).json(patch.to_value());
        self.client.call(request).await
    }

    pub async fn delete_bucket(&self, bucket: &str, retries: Option<u32>) -> Result<()> {
        let request = ApiRequest::delete(self.client.storage_bucket_url(bucket)).retries(retries);
        self.client.call(request).await.map(|_| ())
    }

    // =========================================================================
    // Objects
    // =========================================================================

    pub async fn list_files(&self, bucket: &str, query: &ObjectListQuery<'_>) -> Result<Value> {
        let request = ApiRequest::get(self.client.storage_objects_url(bucket))
            .query_opt("prefix", query.prefix)
            .query_opt("delimiter", query.delimiter)
            .query_opt("pageToken", query.token)
            .query_opt("maxResults", query.max)
            .query_opt("versions", query.versions.then_some(true));
        self.client.call(request).await
    }

    pub async fn get_file(&self, bucket: &str, name: &str) -> Result<Value> {
        self.client
            .call(ApiRequest::get(self.client.storage_object_url(bucket, name)))
            .await
    }

    pub async fn patch_file(&self, bucket: &str, name: &str, patch: &Patch) -> Result<Value> {
        let request =
            ApiRequest::patch(self.client.storage_object_url(bucket, name)).json(patch.to_value());
        self.client.call(request).await
    }

    pub async fn delete_file(&self, bucket: &str, name: &str) -> Result<()> {
        self.client
            .call(ApiRequest::delete(self.client.storage_object_url(bucket, name)))
            .await
            .map(|_| ())
    }

    /// Object contents
    pub async fn download_file(&self, bucket: &str, name: &str) -> Result<Vec<u8>> {
        let request =
            ApiRequest::get(self.client.storage_object_url(bucket, name)).query("alt", "media");
        let response = self.client.request(request).await?;
        if !response.is_success() {
            return Err(response.error());
        }
        Ok(response.body)
    }

    /// Media upload URL for objects in `bucket`
    pub fn upload_url(&self, bucket: &str) -> String {
        self.client.storage_upload_url(bucket)
    }
}
