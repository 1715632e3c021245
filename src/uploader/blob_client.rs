use async_trait::async_trait;
use futures::stream;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Client;
use std::sync::Arc;
use tokio::time::Duration;

use super::endpoint::UploadTarget;
use crate::errors::AppResult;

/// Azure's marker for a whole-blob (non-chunked) write.
const BLOCK_BLOB_HEADER: (&str, &str) = ("x-ms-blob-type", "BlockBlob");

/// Request bodies are streamed in pieces of this size so upload progress can
/// be observed; the PUT itself is still a single unchunked write. A piece
/// counts as sent once the HTTP client pulls it from the stream, so reported
/// progress measures buffered send and can run ahead of bytes on the wire.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Callback fed integer percentages as request bytes are handed to the
/// HTTP client.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// What the store said. `message` carries the response body for non-2xx
/// statuses so the failure reason can be recorded per file.
#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub status: u16,
    pub message: Option<String>,
}

impl PutOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Seam to the blob store's write API. Errors are transport-level only;
/// HTTP-level failures come back as a `PutOutcome` with a non-2xx status.
#[async_trait]
pub trait BlobTransport: Send + Sync {
    async fn put(
        &self,
        target: &UploadTarget,
        body: Vec<u8>,
        content_type: &str,
        progress: ProgressFn,
    ) -> AppResult<PutOutcome>;
}

/// Production transport over reqwest.
pub struct BlobClient {
    client: Client,
}

impl BlobClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap(),
        }
    }
}

impl Default for BlobClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobTransport for BlobClient {
    async fn put(
        &self,
        target: &UploadTarget,
        body: Vec<u8>,
        content_type: &str,
        progress: ProgressFn,
    ) -> AppResult<PutOutcome> {
        let total = body.len();
        let mut sent = 0usize;

        let chunks: Vec<Vec<u8>> = body
            .chunks(UPLOAD_CHUNK_SIZE)
            .map(|chunk| chunk.to_vec())
            .collect();

        let byte_stream = stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len();
            let percent = if total == 0 {
                100
            } else {
                ((sent as u64 * 100) / total as u64) as u8
            };
            progress(percent.min(100));
            Ok::<Vec<u8>, std::io::Error>(chunk)
        }));

        log::debug!(
            "PUT {} ({} bytes, {})",
            target.blob_name,
            total,
            content_type
        );

        let response = self
            .client
            .put(&target.url)
            .header(BLOCK_BLOB_HEADER.0, BLOCK_BLOB_HEADER.1)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, total as u64)
            .body(reqwest::Body::wrap_stream(byte_stream))
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            return Ok(PutOutcome {
                status: status.as_u16(),
                message: None,
            });
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        log::warn!(
            "Blob store returned {} for {}: {}",
            status,
            target.blob_name,
            error_text.lines().next().unwrap_or("")
        );

        Ok(PutOutcome {
            status: status.as_u16(),
            message: Some(error_text),
        })
    }
}
