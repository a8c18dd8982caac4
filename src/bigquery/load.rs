//! Load sources

use crate::error::{Error, Result};
use crate::storage::File;
use std::path::{Path, PathBuf};

/// Something a table can be loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    /// A URL, normally `gs://bucket/object`
    Uri(String),
    /// A local path
    Path(PathBuf),
}

/// A load source after classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// Cloud Storage object, loaded by reference
    Storage(String),
    /// Regular local file to upload
    LocalFile { path: PathBuf, size: u64 },
}

impl LoadSource {
    /// Classify the source: `gs://` URLs (any case) load by reference,
    /// existing regular files are uploaded, anything else is rejected.
    pub async fn resolve(&self) -> Result<ResolvedSource> {
        match self {
            LoadSource::Uri(uri) if is_storage_url(uri) => Ok(ResolvedSource::Storage(uri.clone())),
            LoadSource::Uri(uri) => local_file(Path::new(uri))
                .await
                .ok_or_else(|| Error::UnsupportedSource(uri.clone())),
            LoadSource::Path(path) => local_file(path)
                .await
                .ok_or_else(|| Error::UnsupportedSource(path.display().to_string())),
        }
    }
}

fn is_storage_url(s: &str) -> bool {
    s.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("gs://"))
}

async fn local_file(path: &Path) -> Option<ResolvedSource> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    metadata.is_file().then(|| ResolvedSource::LocalFile {
        path: path.to_path_buf(),
        size: metadata.len(),
    })
}

impl From<&str> for LoadSource {
    fn from(value: &str) -> Self {
        LoadSource::Uri(value.to_string())
    }
}

impl From<String> for LoadSource {
    fn from(value: String) -> Self {
        LoadSource::Uri(value)
    }
}

impl From<&Path> for LoadSource {
    fn from(value: &Path) -> Self {
        LoadSource::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for LoadSource {
    fn from(value: PathBuf) -> Self {
        LoadSource::Path(value)
    }
}

impl From<&File> for LoadSource {
    fn from(file: &File) -> Self {
        LoadSource::Uri(file.gs_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_storage_urls_any_case() {
        for url in ["gs://bucket/file.csv", "GS://bucket/file.csv", "Gs://b/f"] {
            assert_eq!(
                LoadSource::from(url).resolve().await.unwrap(),
                ResolvedSource::Storage(url.to_string())
            );
        }
    }

    #[tokio::test]
    async fn test_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"a,b\n1,2\n").unwrap();
        let resolved = LoadSource::from(file.path()).resolve().await.unwrap();
        assert_eq!(
            resolved,
            ResolvedSource::LocalFile {
                path: file.path().to_path_buf(),
                size: 8
            }
        );
    }

    #[tokio::test]
    async fn test_unsupported_sources() {
        let dir = tempfile::tempdir().unwrap();
        for source in [
            LoadSource::from("http://example.com/data.csv"),
            LoadSource::from("/definitely/not/here.csv"),
            LoadSource::from(dir.path()),
        ] {
            assert!(matches!(
                source.resolve().await,
                Err(Error::UnsupportedSource(_))
            ));
        }
    }
}
