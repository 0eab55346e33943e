//! Client-side chunk transmission orchestrator.
//!
//! Splits a source file into fixed-size chunks and sends them strictly in
//! order, one in flight at a time, retrying each chunk with exponential
//! backoff. On retry exhaustion or caller cancellation it sends a best-effort
//! abort so the server can reclaim the session without waiting for the ttl.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::models::UploadResponse;

/// default chunk size: 5 MiB
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;
/// retries per chunk before the upload is abandoned
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// first retry delay; doubles per attempt
pub const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(1);

/// errors surfaced to the caller of [`ChunkUploader::upload`]
#[derive(Debug, thiserror::Error)]
pub enum UploadClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gave up on chunk {chunk} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        chunk: u64,
        attempts: u32,
        last_error: String,
    },

    #[error("upload cancelled")]
    Cancelled,

    #[error("unexpected response body: {0}")]
    BadResponse(String),
}

/// optional knobs for one upload
#[derive(Default)]
pub struct UploadOptions {
    /// overrides the filename as the destination key
    pub object_name: Option<String>,
    /// opaque payload forwarded to the server-side path service
    pub path_payload: Option<String>,
    /// called with 0..=100 after each acknowledged chunk; never decreases
    pub progress: Option<Box<dyn Fn(u8) + Send + Sync>>,
    /// cancel between chunks or mid-backoff; triggers the abort path
    pub cancel: CancellationToken,
}

/// sequential chunk uploader against a bulkdrop /upload endpoint
pub struct ChunkUploader {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    chunk_size: usize,
    max_retries: u32,
    retry_base: Duration,
}

impl ChunkUploader {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base: DEFAULT_RETRY_BASE,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be positive");
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_retry_policy(mut self, max_retries: u32, retry_base: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base = retry_base;
        self
    }

    /// upload `path` under `upload_id`, sequentially, chunk by chunk
    ///
    /// the returned descriptor is the server's last-chunk response body,
    /// taken as authoritative; no independent verification is done
    pub async fn upload(
        &self,
        path: &Path,
        upload_id: &str,
        options: &UploadOptions,
    ) -> Result<UploadResponse, UploadClientError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());

        let size = tokio::fs::metadata(path).await?.len();
        // an empty file still goes up as one (empty) chunk
        let total_chunks = size.div_ceil(self.chunk_size as u64).max(1);

        tracing::info!(
            upload_id = %upload_id,
            file = %file_name,
            size,
            total_chunks,
            "Starting chunked upload"
        );

        let mut file = tokio::fs::File::open(path).await?;

        for chunk_number in 1..=total_chunks {
            if options.cancel.is_cancelled() {
                self.send_abort(upload_id).await;
                return Err(UploadClientError::Cancelled);
            }

            let already_sent = (chunk_number - 1) * self.chunk_size as u64;
            let chunk_len = (size - already_sent).min(self.chunk_size as u64) as usize;
            let mut buf = vec![0u8; chunk_len];
            file.read_exact(&mut buf).await?;

            let is_last = chunk_number == total_chunks;
            let body = match self
                .send_chunk(
                    upload_id,
                    chunk_number,
                    total_chunks,
                    is_last,
                    &file_name,
                    &buf,
                    options,
                )
                .await
            {
                Ok(body) => body,
                Err(e) => {
                    self.send_abort(upload_id).await;
                    return Err(e);
                }
            };

            if let Some(progress) = &options.progress {
                let pct = ((chunk_number as f64 / total_chunks as f64) * 100.0).round() as u8;
                progress(pct);
            }

            if is_last {
                // the final response body is the authoritative result
                return serde_json::from_value(body.clone())
                    .map_err(|_| UploadClientError::BadResponse(body.to_string()));
            }
        }

        unreachable!("loop returns on the last chunk")
    }

    /// one chunk with the retry/backoff policy applied
    #[allow(clippy::too_many_arguments)]
    async fn send_chunk(
        &self,
        upload_id: &str,
        chunk_number: u64,
        total_chunks: u64,
        is_last: bool,
        file_name: &str,
        data: &[u8],
        options: &UploadOptions,
    ) -> Result<serde_json::Value, UploadClientError> {
        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.retry_base * 2u32.pow(attempt - 1);
                tracing::warn!(
                    upload_id = %upload_id,
                    chunk = chunk_number,
                    attempt,
                    ?delay,
                    "Retrying chunk after {}",
                    last_error
                );
                tokio::select! {
                    _ = options.cancel.cancelled() => return Err(UploadClientError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            match self
                .try_send(
                    upload_id,
                    chunk_number,
                    total_chunks,
                    is_last,
                    file_name,
                    data,
                    options,
                )
                .await
            {
                Ok(body) => return Ok(body),
                Err(e) => last_error = e,
            }
        }

        Err(UploadClientError::RetriesExhausted {
            chunk: chunk_number,
            attempts: self.max_retries + 1,
            last_error,
        })
    }

    /// a single wire attempt; any transport failure or non-2xx is retryable
    #[allow(clippy::too_many_arguments)]
    async fn try_send(
        &self,
        upload_id: &str,
        chunk_number: u64,
        total_chunks: u64,
        is_last: bool,
        file_name: &str,
        data: &[u8],
        options: &UploadOptions,
    ) -> Result<serde_json::Value, String> {
        let part = Part::bytes(data.to_vec()).file_name(file_name.to_string());
        let mut form = Form::new()
            .text("is_multipart", "true")
            .text("upload_id", upload_id.to_string())
            .text("chunk_number", chunk_number.to_string())
            .text("total_chunks", total_chunks.to_string())
            .text("is_last_chunk", is_last.to_string())
            .text("original_filename", file_name.to_string())
            .part("file", part);

        if let Some(object_name) = &options.object_name {
            form = form.text("object_name", object_name.clone());
        }
        if let Some(path_payload) = &options.path_payload {
            form = form.text("path_payload", path_payload.clone());
        }

        let mut request = self.http.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("bad response body: {}", e))?;

        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown error");
            return Err(format!("server returned {}: {}", status, message));
        }

        Ok(body)
    }

    /// best-effort abort; delivery failure is logged, never escalated, since
    /// the server-side reaper is the backstop
    async fn send_abort(&self, upload_id: &str) {
        let form = Form::new()
            .text("abort_upload", "true")
            .text("upload_id", upload_id.to_string());

        let mut request = self.http.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        match request.send().await {
            Ok(_) => tracing::debug!(upload_id = %upload_id, "Sent abort signal"),
            Err(e) => {
                tracing::warn!(upload_id = %upload_id, "Failed to deliver abort signal: {}", e)
            }
        }
    }
}
