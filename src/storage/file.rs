//! Objects stored in a bucket

use super::connection::Connection;
use super::PredefinedAcl;
use crate::error::{Error, Result};
use crate::resource::representation::{value_i64, value_rfc3339, value_u64};
use crate::resource::{Completeness, Patch, PatchScope, Representation, Resource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Options for `Bucket::files`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileListOptions {
    pub prefix: Option<String>,
    /// Group names sharing a prefix up to this delimiter into `Page::prefixes`
    pub delimiter: Option<String>,
    pub token: Option<String>,
    pub max: Option<u32>,
    /// Include every generation of each object
    pub versions: bool,
}

impl FileListOptions {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }
}

/// Options for `Bucket::create_file`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileOptions {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    /// Custom metadata key/value pairs
    pub metadata: Option<BTreeMap<String, String>>,
    pub acl: Option<PredefinedAcl>,
    /// Resumable chunk size in bytes, rounded down to 256 KiB
    pub chunk_size: Option<u64>,
}

impl FileOptions {
    /// Object resource sent alongside the media
    pub(crate) fn metadata(&self, name: &str) -> Value {
        let mut body = Map::new();
        body.insert("name".to_string(), Value::from(name));
        let fields = [
            ("contentType", &self.content_type),
            ("cacheControl", &self.cache_control),
            ("contentDisposition", &self.content_disposition),
            ("contentEncoding", &self.content_encoding),
            ("contentLanguage", &self.content_language),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                body.insert(key.to_string(), Value::from(value.as_str()));
            }
        }
        if let Some(metadata) = &self.metadata {
            let map = metadata
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                .collect();
            body.insert("metadata".to_string(), Value::Object(map));
        }
        Value::Object(body)
    }
}

/// Batched changes to an object's metadata
#[derive(Debug)]
pub struct FileUpdate<'a> {
    scope: PatchScope<'a>,
}

impl FileUpdate<'_> {
    fn str(&self, key: &str) -> Option<&str> {
        self.scope.get(key).and_then(Value::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.str("contentType")
    }

    pub fn set_content_type(&mut self, value: &str) {
        self.scope.set("contentType", value);
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.str("cacheControl")
    }

    pub fn set_cache_control(&mut self, value: &str) {
        self.scope.set("cacheControl", value);
    }

    pub fn content_disposition(&self) -> Option<&str> {
        self.str("contentDisposition")
    }

    pub fn set_content_disposition(&mut self, value: &str) {
        self.scope.set("contentDisposition", value);
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.str("contentEncoding")
    }

    pub fn set_content_encoding(&mut self, value: &str) {
        self.scope.set("contentEncoding", value);
    }

    pub fn content_language(&self) -> Option<&str> {
        self.str("contentLanguage")
    }

    pub fn set_content_language(&mut self, value: &str) {
        self.scope.set("contentLanguage", value);
    }

    /// Set one custom metadata entry, keeping the others
    pub fn set_metadata(&mut self, key: &str, value: &str) {
        self.scope.set_nested("metadata", key, value);
    }
}

/// Handle over an object
#[derive(Debug, Clone)]
pub struct File {
    connection: Connection,
    bucket: String,
    name: String,
    rep: Representation,
}

impl File {
    pub(crate) fn from_value(
        connection: Connection,
        value: Value,
        completeness: Completeness,
    ) -> Result<Self> {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| Error::UnexpectedResponse(format!("object has no {}", key)))
        };
        let bucket = field("bucket")?;
        let name = field("name")?;
        Ok(Self {
            connection,
            bucket,
            name,
            rep: Representation::new(value, completeness)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the bucket holding the object
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// `gs://bucket/name`, as accepted by BigQuery load and extract jobs
    pub fn gs_url(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.name)
    }

    pub async fn id(&mut self) -> Result<Option<String>> {
        self.attribute_str("id").await
    }

    pub async fn size(&mut self) -> Result<Option<u64>> {
        Ok(self.attribute("size").await?.and_then(value_u64))
    }

    pub async fn content_type(&mut self) -> Result<Option<String>> {
        self.attribute_str("contentType").await
    }

    pub async fn generation(&mut self) -> Result<Option<i64>> {
        Ok(self.attribute("generation").await?.and_then(value_i64))
    }

    pub async fn created_at(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.attribute("timeCreated").await?.and_then(value_rfc3339))
    }

    pub async fn updated_at(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.attribute("updated").await?.and_then(value_rfc3339))
    }

    pub async fn etag(&mut self) -> Result<Option<String>> {
        self.attribute_str("etag").await
    }

    /// Base64 MD5 hash of the data
    pub async fn md5(&mut self) -> Result<Option<String>> {
        self.attribute_str("md5Hash").await
    }

    /// Base64 CRC32c checksum of the data
    pub async fn crc32c(&mut self) -> Result<Option<String>> {
        self.attribute_str("crc32c").await
    }

    pub async fn api_url(&mut self) -> Result<Option<String>> {
        self.attribute_str("selfLink").await
    }

    pub async fn media_url(&mut self) -> Result<Option<String>> {
        self.attribute_str("mediaLink").await
    }

    pub async fn cache_control(&mut self) -> Result<Option<String>> {
        self.attribute_str("cacheControl").await
    }

    pub async fn content_disposition(&mut self) -> Result<Option<String>> {
        self.attribute_str("contentDisposition").await
    }

    pub async fn content_encoding(&mut self) -> Result<Option<String>> {
        self.attribute_str("contentEncoding").await
    }

    pub async fn content_language(&mut self) -> Result<Option<String>> {
        self.attribute_str("contentLanguage").await
    }

    /// Custom metadata; empty when none is set
    pub async fn metadata(&mut self) -> Result<BTreeMap<String, String>> {
        let metadata = self
            .attribute("metadata")
            .await?
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Ok(metadata)
    }

    async fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        self.apply_patch(Patch::field(key, value)).await.map(|_| ())
    }

    pub async fn set_content_type(&mut self, value: &str) -> Result<()> {
        self.set_field("contentType", value).await
    }

    pub async fn set_cache_control(&mut self, value: &str) -> Result<()> {
        self.set_field("cacheControl", value).await
    }

    pub async fn set_content_disposition(&mut self, value: &str) -> Result<()> {
        self.set_field("contentDisposition", value).await
    }

    pub async fn set_content_encoding(&mut self, value: &str) -> Result<()> {
        self.set_field("contentEncoding", value).await
    }

    pub async fn set_content_language(&mut self, value: &str) -> Result<()> {
        self.set_field("contentLanguage", value).await
    }

    /// Replace the custom metadata
    pub async fn set_metadata(&mut self, metadata: &BTreeMap<String, String>) -> Result<()> {
        let map: Map<String, Value> = metadata
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect();
        self.apply_patch(Patch::field("metadata", Value::Object(map)))
            .await
            .map(|_| ())
    }

    /// Apply several changes with a single request.
    ///
    /// Returns whether a request was made.
    pub async fn update<F>(&mut self, edit: F) -> Result<bool>
    where
        F: FnOnce(&mut FileUpdate<'_>),
    {
        self.ensure_full_data().await?;
        let patch = {
            let mut proxy = FileUpdate {
                scope: PatchScope::new(&self.rep),
            };
            edit(&mut proxy);
            proxy.scope.into_patch()
        };
        self.apply_patch(patch).await
    }

    pub async fn delete(&self) -> Result<()> {
        tracing::info!("Deleting {}", self.describe());
        self.connection.delete_file(&self.bucket, &self.name).await
    }

    /// Write the object's data to `path`; returns the number of bytes
    pub async fn download(&self, path: impl AsRef<Path>) -> Result<u64> {
        let data = self.connection.download_file(&self.bucket, &self.name).await?;
        tokio::fs::write(path.as_ref(), &data).await?;
        tracing::debug!("Downloaded {} ({} bytes)", self.gs_url(), data.len());
        Ok(data.len() as u64)
    }

    pub async fn reload(&mut self) -> Result<()> {
        Resource::reload(self).await
    }
}

impl Resource for File {
    fn describe(&self) -> String {
        format!("file {}", self.gs_url())
    }

    fn representation(&self) -> &Representation {
        &self.rep
    }

    fn representation_mut(&mut self) -> &mut Representation {
        &mut self.rep
    }

    async fn fetch_full(&self) -> Result<Value> {
        self.connection.get_file(&self.bucket, &self.name).await
    }

    async fn send_patch(&self, patch: &Patch) -> Result<Value> {
        self.connection.patch_file(&self.bucket, &self.name, patch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upload_metadata() {
        let options = FileOptions {
            content_type: Some("text/csv".to_string()),
            cache_control: Some("no-cache".to_string()),
            metadata: Some(BTreeMap::from([("player".to_string(), "Bob".to_string())])),
            ..FileOptions::default()
        };
        assert_eq!(
            options.metadata("path/to/data.csv"),
            json!({
                "name": "path/to/data.csv",
                "contentType": "text/csv",
                "cacheControl": "no-cache",
                "metadata": {"player": "Bob"}
            })
        );
        assert_eq!(FileOptions::default().metadata("a"), json!({"name": "a"}));
    }

    #[test]
    fn test_list_options_reject_unknown_keys() {
        let result: std::result::Result<FileListOptions, _> =
            serde_json::from_value(json!({"prefix": "a", "delimeter": "/"}));
        assert!(result.is_err());
    }
}
