//! Media uploads
//!
//! Local files go up either as one `multipart/related` request or, above the
//! resumable threshold, through a resumable session that can send the file
//! in aligned chunks.

use crate::error::{Error, Result};
use crate::gcp::client::GcpClient;
use crate::gcp::http::ApiRequest;
use serde_json::Value;
use std::io::SeekFrom;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Resumable chunks must be a multiple of this many bytes
pub const CHUNK_ALIGNMENT: u64 = 256 * 1024;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Chunks in a row the server may answer without committing new bytes
const MAX_STALLED_CHUNKS: u32 = 3;

/// Round a chunk size down to the alignment unit.
///
/// `None` means "send the whole body in one request", which is also what a
/// zero or sub-unit size becomes.
pub fn verify_chunk_size(chunk_size: Option<u64>) -> Option<u64> {
    let requested = chunk_size.unwrap_or(0);
    let aligned = (requested / CHUNK_ALIGNMENT) * CHUNK_ALIGNMENT;
    (aligned != 0).then_some(aligned)
}

/// How a local file is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    Multipart,
    Resumable { chunk_size: Option<u64> },
}

impl UploadStrategy {
    /// Files strictly larger than `threshold` use the resumable protocol
    pub fn select(file_size: u64, threshold: u64, chunk_size: Option<u64>) -> Self {
        if file_size > threshold {
            UploadStrategy::Resumable {
                chunk_size: verify_chunk_size(chunk_size),
            }
        } else {
            UploadStrategy::Multipart
        }
    }
}

/// Where and how to upload: base media URL plus extra query parameters
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub content_type: String,
}

impl UploadTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }

    pub fn content_type(mut self, content_type: Option<&str>) -> Self {
        if let Some(content_type) = content_type {
            self.content_type = content_type.to_string();
        }
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    fn request(&self, upload_type: &str) -> ApiRequest {
        let mut request = ApiRequest::post(&self.url).query("uploadType", upload_type);
        for (key, value) in &self.query {
            request = request.query(key, value);
        }
        request
    }
}

/// Upload a local file with `metadata` as the resource body.
///
/// Returns the resource the server created (object or job).
pub async fn upload_file(
    client: &GcpClient,
    target: &UploadTarget,
    path: &Path,
    metadata: Value,
    chunk_size: Option<u64>,
) -> Result<Value> {
    let size = tokio::fs::metadata(path).await?.len();
    let strategy = UploadStrategy::select(size, client.config().resumable_threshold, chunk_size);
    tracing::info!("Uploading {:?} ({} bytes) using {:?}", path, size, strategy);

    match strategy {
        UploadStrategy::Multipart => upload_multipart(client, target, path, metadata).await,
        UploadStrategy::Resumable { chunk_size } => {
            upload_resumable(client, target, path, size, metadata, chunk_size).await
        },
    }
}

async fn upload_multipart(
    client: &GcpClient,
    target: &UploadTarget,
    path: &Path,
    metadata: Value,
) -> Result<Value> {
    let data = tokio::fs::read(path).await?;
    let boundary = format!("gcloud_client_{}", uuid::Uuid::new_v4().simple());
    let body = multipart_body(&boundary, &metadata, &target.content_type, &data)?;

    let request = target.request("multipart").bytes(
        format!("multipart/related; boundary={}", boundary),
        body,
    );
    client.call(request).await
}

/// Assemble a two-part `multipart/related` body: JSON metadata, then media
pub fn multipart_body(
    boundary: &str,
    metadata: &Value,
    content_type: &str,
    data: &[u8],
) -> Result<Vec<u8>> {
    let mut body = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n",
            boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(&serde_json::to_vec(metadata)?);
    body.extend_from_slice(
        format!("\r\n--{}\r\nContent-Type: {}\r\n\r\n", boundary, content_type).as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    Ok(body)
}

async fn upload_resumable(
    client: &GcpClient,
    target: &UploadTarget,
    path: &Path,
    size: u64,
    metadata: Value,
    chunk_size: Option<u64>,
) -> Result<Value> {
    let start = target
        .request("resumable")
        .header("X-Upload-Content-Type", &target.content_type)
        .header("X-Upload-Content-Length", size)
        .json(metadata);
    let response = client.request(start).await?;
    if !response.is_success() {
        return Err(response.error());
    }
    let session_url = response
        .header("location")
        .map(str::to_string)
        .ok_or_else(|| {
            Error::UnexpectedResponse("resumable session has no Location header".to_string())
        })?;
    tracing::debug!("Resumable session started for {:?}", path);

    let mut file = tokio::fs::File::open(path).await?;

    let Some(chunk_size) = chunk_size else {
        let mut data = Vec::with_capacity(size as usize);
        file.read_to_end(&mut data).await?;
        let request = ApiRequest::put(&session_url).bytes(target.content_type.as_str(), data);
        return client.call(request).await;
    };

    let mut offset = 0u64;
    let mut stalled = 0u32;
    loop {
        let len = chunk_size.min(size - offset);
        let end_offset = offset + len;
        let is_final = end_offset == size;
        let mut data = vec![0u8; len as usize];
        file.seek(SeekFrom::Start(offset)).await?;
        file.read_exact(&mut data).await?;

        let range = if len == 0 {
            format!("bytes */{}", size)
        } else {
            format!("bytes {}-{}/{}", offset, end_offset - 1, size)
        };
        tracing::debug!("Uploading chunk {} (final: {})", range, is_final);

        let request = ApiRequest::put(&session_url)
            .header("Content-Range", range)
            .bytes(target.content_type.as_str(), data);
        let response = client.request(request).await?;

        if response.status != 308 {
            return response.into_json();
        }

        // No Range header means the server kept nothing of this session
        let committed = response
            .header("range")
            .and_then(committed_bytes)
            .unwrap_or(0);
        if committed > offset {
            stalled = 0;
        } else {
            stalled += 1;
            if stalled > MAX_STALLED_CHUNKS {
                return Err(Error::UnexpectedResponse(format!(
                    "resumable upload stalled at byte {}",
                    committed
                )));
            }
        }
        if is_final && committed >= size {
            return Err(Error::UnexpectedResponse(
                "resumable upload did not complete".to_string(),
            ));
        }
        offset = committed.min(size);
    }
}

/// Parse a `Range: bytes=0-1234` header into the committed byte count
fn committed_bytes(range: &str) -> Option<u64> {
    let end = range.strip_prefix("bytes=")?.split('-').nth(1)?;
    end.trim().parse::<u64>().ok().map(|last| last + 1)
}
