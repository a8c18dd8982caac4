//! Resource abstraction layer
//!
//! Every handle in the crate (datasets, tables, jobs, buckets, files) is a
//! cached [`Representation`] plus a connection. This module holds the shared
//! behaviour:
//!
//! - [`representation`] - the cached document and its completeness tag
//! - [`patch`] - partial-update documents and batched update scopes
//! - [`page`] - one page of a list call
//!
//! The [`Resource`] trait supplies lazy loading and patching on top of two
//! per-resource calls, `fetch_full` and `send_patch`.

pub mod page;
pub mod patch;
pub mod representation;

pub use page::{ListOptions, Page};
pub use patch::{Patch, PatchScope};
pub use representation::{Completeness, Representation};

use crate::error::Result;
use serde_json::Value;
use std::future::Future;

/// A server-side resource backed by a cached representation.
///
/// Reads of fields missing from a partial representation trigger exactly one
/// full fetch; later reads are served from the cache until the next reload
/// or mutation. Successful mutations replace the cache with the server
/// response; failed ones leave it untouched.
#[allow(async_fn_in_trait)]
pub trait Resource {
    /// Short identity used in log lines, e.g. `table my-project:ds.t`
    fn describe(&self) -> String;

    fn representation(&self) -> &Representation;

    fn representation_mut(&mut self) -> &mut Representation;

    /// Fetch the full representation keyed by this resource's identity
    fn fetch_full(&self) -> impl Future<Output = Result<Value>> + Send;

    /// Send a partial update and return the updated full representation
    fn send_patch(&self, patch: &Patch) -> impl Future<Output = Result<Value>> + Send;

    /// Replace the cache with a fresh full representation
    async fn reload(&mut self) -> Result<()> {
        let value = self.fetch_full().await?;
        self.representation_mut().replace(value, Completeness::Full)
    }

    /// Fetch the full representation unless it is already cached
    async fn ensure_full_data(&mut self) -> Result<()> {
        if !self.representation().is_full() {
            tracing::debug!("Loading full representation of {}", self.describe());
            self.reload().await?;
        }
        Ok(())
    }

    /// Read a (dotted) field, fetching the full representation first when the
    /// field is missing from a partial one
    async fn attribute(&mut self, path: &str) -> Result<Option<&Value>> {
        if self.representation().pointer(path).is_none() {
            self.ensure_full_data().await?;
        }
        Ok(self.representation().pointer(path))
    }

    async fn attribute_str(&mut self, path: &str) -> Result<Option<String>> {
        Ok(self.attribute(path).await?.and_then(representation::value_str))
    }

    async fn attribute_i64(&mut self, path: &str) -> Result<Option<i64>> {
        Ok(self.attribute(path).await?.and_then(representation::value_i64))
    }

    /// Send `patch` and adopt the response. Empty patches send nothing.
    ///
    /// Returns whether a request was made.
    async fn apply_patch(&mut self, patch: Patch) -> Result<bool> {
        if patch.is_empty() {
            return Ok(false);
        }
        tracing::debug!(
            "Patching {} ({} field(s))",
            self.describe(),
            patch.len()
        );
        let value = self.send_patch(&patch).await?;
        self.representation_mut().replace(value, Completeness::Full)?;
        Ok(true)
    }
}

/// Fail fast on empty identifiers before any request is built
pub(crate) fn require_id(kind: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(crate::Error::InvalidArgument(format!("{} is missing", kind)));
    }
    Ok(())
}
