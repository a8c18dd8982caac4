//! Buckets

use super::connection::{Connection, ObjectListQuery};
use super::cors::{Cors, CorsBuilder};
use super::file::{File, FileListOptions, FileOptions};
use crate::error::{Error, Result};
use crate::resource::representation::{value_bool, value_rfc3339};
use crate::resource::{require_id, Completeness, Page, Patch, PatchScope, Representation, Resource};
use crate::upload::{self, UploadTarget};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::path::Path;

/// Batched changes to a bucket
#[derive(Debug)]
pub struct BucketUpdate<'a> {
    scope: PatchScope<'a>,
    current_cors: Cors,
    cors: Option<CorsBuilder>,
}

impl BucketUpdate<'_> {
    pub fn versioning(&self) -> bool {
        self.scope
            .get_nested("versioning", "enabled")
            .and_then(value_bool)
            .unwrap_or(false)
    }

    pub fn set_versioning(&mut self, enabled: bool) {
        self.scope.set_nested("versioning", "enabled", enabled);
    }

    pub fn logging_bucket(&self) -> Option<&str> {
        self.scope
            .get_nested("logging", "logBucket")
            .and_then(Value::as_str)
    }

    pub fn set_logging_bucket(&mut self, bucket: &str) {
        self.scope.set_nested("logging", "logBucket", bucket);
    }

    pub fn logging_prefix(&self) -> Option<&str> {
        self.scope
            .get_nested("logging", "logObjectPrefix")
            .and_then(Value::as_str)
    }

    pub fn set_logging_prefix(&mut self, prefix: &str) {
        self.scope.set_nested("logging", "logObjectPrefix", prefix);
    }

    pub fn website_main(&self) -> Option<&str> {
        self.scope
            .get_nested("website", "mainPageSuffix")
            .and_then(Value::as_str)
    }

    pub fn set_website_main(&mut self, page: &str) {
        self.scope.set_nested("website", "mainPageSuffix", page);
    }

    pub fn website_404(&self) -> Option<&str> {
        self.scope
            .get_nested("website", "notFoundPage")
            .and_then(Value::as_str)
    }

    pub fn set_website_404(&mut self, page: &str) {
        self.scope.set_nested("website", "notFoundPage", page);
    }

    /// Edit the CORS rules. Repeated calls keep editing the same builder.
    pub fn cors<F>(&mut self, edit: F)
    where
        F: FnOnce(&mut CorsBuilder),
    {
        let mut builder = match self.cors.take() {
            Some(builder) => builder,
            None => self.current_cors.to_builder(),
        };
        edit(&mut builder);
        self.cors = Some(builder);
    }

    fn into_patch(self) -> Patch {
        let mut patch = self.scope.into_patch();
        if let Some(builder) = self.cors.filter(CorsBuilder::changed) {
            patch.set("cors", builder.build().to_value());
        }
        patch
    }
}

/// Handle over a bucket
#[derive(Debug, Clone)]
pub struct Bucket {
    connection: Connection,
    name: String,
    rep: Representation,
}

impl Bucket {
    pub(crate) fn from_value(
        connection: Connection,
        value: Value,
        completeness: Completeness,
    ) -> Result<Self> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::UnexpectedResponse("bucket has no name".to_string()))?;
        Ok(Self {
            connection,
            name,
            rep: Representation::new(value, completeness)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn id(&mut self) -> Result<Option<String>> {
        self.attribute_str("id").await
    }

    pub async fn api_url(&mut self) -> Result<Option<String>> {
        self.attribute_str("selfLink").await
    }

    pub async fn created_at(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.attribute("timeCreated").await?.and_then(value_rfc3339))
    }

    pub async fn location(&mut self) -> Result<Option<String>> {
        self.attribute_str("location").await
    }

    pub async fn storage_class(&mut self) -> Result<Option<String>> {
        self.attribute_str("storageClass").await
    }

    pub async fn versioning(&mut self) -> Result<bool> {
        Ok(self
            .attribute("versioning.enabled")
            .await?
            .and_then(value_bool)
            .unwrap_or(false))
    }

    pub async fn logging_bucket(&mut self) -> Result<Option<String>> {
        self.attribute_str("logging.logBucket").await
    }

    pub async fn logging_prefix(&mut self) -> Result<Option<String>> {
        self.attribute_str("logging.logObjectPrefix").await
    }

    pub async fn website_main(&mut self) -> Result<Option<String>> {
        self.attribute_str("website.mainPageSuffix").await
    }

    pub async fn website_404(&mut self) -> Result<Option<String>> {
        self.attribute_str("website.notFoundPage").await
    }

    /// Current CORS rules; empty when none are configured
    pub async fn cors(&mut self) -> Result<Cors> {
        Cors::from_value(self.attribute("cors").await?)
    }

    async fn set_nested(&mut self, parent: &str, key: &str, value: Value) -> Result<()> {
        let mut patch = Patch::new();
        patch.set_nested(parent, key, value);
        self.apply_patch(patch).await.map(|_| ())
    }

    pub async fn set_versioning(&mut self, enabled: bool) -> Result<()> {
        self.set_nested("versioning", "enabled", json!(enabled)).await
    }

    pub async fn set_logging_bucket(&mut self, bucket: &str) -> Result<()> {
        self.set_nested("logging", "logBucket", json!(bucket)).await
    }

    pub async fn set_logging_prefix(&mut self, prefix: &str) -> Result<()> {
        self.set_nested("logging", "logObjectPrefix", json!(prefix)).await
    }

    pub async fn set_website_main(&mut self, page: &str) -> Result<()> {
        self.set_nested("website", "mainPageSuffix", json!(page)).await
    }

    pub async fn set_website_404(&mut self, page: &str) -> Result<()> {
        self.set_nested("website", "notFoundPage", json!(page)).await
    }

    pub async fn set_cors(&mut self, cors: &Cors) -> Result<()> {
        self.apply_patch(Patch::field("cors", cors.to_value()))
            .await
            .map(|_| ())
    }

    /// Apply several changes with a single request.
    ///
    /// Returns whether a request was made.
    pub async fn update<F>(&mut self, edit: F) -> Result<bool>
    where
        F: FnOnce(&mut BucketUpdate<'_>),
    {
        self.ensure_full_data().await?;
        let current_cors = Cors::from_value(self.rep.get("cors"))?;
        let patch = {
            let mut proxy = BucketUpdate {
                scope: PatchScope::new(&self.rep),
                current_cors,
                cors: None,
            };
            edit(&mut proxy);
            proxy.into_patch()
        };
        self.apply_patch(patch).await
    }

    /// Edit the CORS rules with a builder seeded from the current ones.
    /// Nothing is sent unless the builder was modified.
    ///
    /// Returns the rules in effect afterwards.
    pub async fn update_cors<F>(&mut self, edit: F) -> Result<Cors>
    where
        F: FnOnce(&mut CorsBuilder),
    {
        let mut builder = self.cors().await?.to_builder();
        edit(&mut builder);
        if builder.changed() {
            self.set_cors(&builder.build()).await?;
        }
        self.cors().await
    }

    /// Delete the (empty) bucket. `retries` overrides the configured retry
    /// count for this call.
    pub async fn delete(&self, retries: Option<u32>) -> Result<()> {
        tracing::info!("Deleting {}", self.describe());
        self.connection.delete_bucket(&self.name, retries).await
    }

    /// One page of the bucket's objects
    pub async fn files(&self, options: &FileListOptions) -> Result<Page<File>> {
        let query = ObjectListQuery {
            prefix: options.prefix.as_deref(),
            delimiter: options.delimiter.as_deref(),
            token: options.token.as_deref(),
            max: options.max,
            versions: options.versions,
        };
        let response = self.connection.list_files(&self.name, &query).await?;
        Page::from_response(&response, "items", None, |value| {
            File::from_value(self.connection.clone(), value, Completeness::Partial)
        })
    }

    /// Look up an object; `None` when it does not exist
    pub async fn file(&self, name: &str) -> Result<Option<File>> {
        require_id("file name", name)?;
        match self.connection.get_file(&self.name, name).await {
            Ok(value) => {
                File::from_value(self.connection.clone(), value, Completeness::Full).map(Some)
            },
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Upload a local file. The object is named `name`, or after the local
    /// file when `name` is `None`.
    pub async fn create_file(
        &self,
        path: impl AsRef<Path>,
        name: Option<&str>,
        options: &FileOptions,
    ) -> Result<File> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(Error::InvalidArgument(format!(
                "{} is not a file",
                path.display()
            )));
        }
        let name = match name {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| Error::InvalidArgument("file name is missing".to_string()))?,
        };
        require_id("file name", &name)?;

        let mut target = UploadTarget::new(self.connection.upload_url(&self.name))
            .content_type(options.content_type.as_deref());
        if let Some(acl) = options.acl {
            target = target.query("predefinedAcl", acl.as_api_str());
        }
        let value = upload::upload_file(
            self.connection.client(),
            &target,
            path,
            options.metadata(&name),
            options.chunk_size,
        )
        .await?;
        File::from_value(self.connection.clone(), value, Completeness::Partial)
    }

    pub async fn reload(&mut self) -> Result<()> {
        Resource::reload(self).await
    }
}

impl Resource for Bucket {
    fn describe(&self) -> String {
        format!("bucket {}", self.name)
    }

    fn representation(&self) -> &Representation {
        &self.rep
    }

    fn representation_mut(&mut self) -> &mut Representation {
        &mut self.rep
    }

    async fn fetch_full(&self) -> Result<Value> {
        self.connection.get_bucket(&self.name).await
    }

    async fn send_patch(&self, patch: &Patch) -> Result<Value> {
        self.connection.patch_bucket(&self.name, patch).await
    }
}
