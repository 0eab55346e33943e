use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::assembler::assemble;
use crate::blob_store::LocalBlobStore;
use crate::error::UploadError;
use crate::fetch::fetch_public_url;
use crate::models::{
    AbortResponse, ChunkProgressResponse, UploadResponse, UploadSource,
};
use crate::resolve::resolve_destination_key;
use crate::state::AppState;
use crate::utils::{has_blocked_extension, sanitize_filename, sanitize_upload_id};

/// everything a request to /upload can carry, collected from the multipart
/// form before dispatch
#[derive(Default)]
struct UploadForm {
    payload: Option<Bytes>,
    payload_filename: Option<String>,
    object_name: Option<String>,
    public_url: Option<String>,
    path_payload: Option<String>,
    is_multipart: bool,
    upload_id: Option<String>,
    chunk_number: Option<String>,
    total_chunks: Option<String>,
    is_last_chunk: bool,
    original_filename: Option<String>,
    abort_upload: bool,
}

impl UploadForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, UploadError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| UploadError::Validation(format!("failed to read multipart field: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();

            // the file payload is whichever field arrives with a filename
            if field.file_name().is_some() || name == "file" {
                form.payload_filename = field.file_name().map(|s| s.to_string());
                form.payload = Some(field.bytes().await.map_err(|e| {
                    UploadError::Validation(format!("failed to read file payload: {}", e))
                })?);
                continue;
            }

            let value = field.text().await.map_err(|e| {
                UploadError::Validation(format!("failed to read field '{}': {}", name, e))
            })?;

            match name.as_str() {
                "object_name" => form.object_name = Some(value),
                "public_url" => form.public_url = Some(value),
                "path_payload" => form.path_payload = Some(value),
                "is_multipart" => form.is_multipart = value == "true",
                "upload_id" => form.upload_id = Some(value),
                "chunk_number" => form.chunk_number = Some(value),
                "total_chunks" => form.total_chunks = Some(value),
                "is_last_chunk" => form.is_last_chunk = value == "true",
                "original_filename" => form.original_filename = Some(value),
                "abort_upload" => form.abort_upload = value == "true",
                _ => {}
            }
        }

        Ok(form)
    }
}

/// the upload endpoint: abort, chunk, or single-shot upload depending on the
/// form fields present
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, UploadError> {
    let form = UploadForm::from_multipart(multipart).await?;

    if form.abort_upload {
        return handle_abort(&state, &form).await;
    }
    if form.is_multipart {
        return handle_chunk(&state, form).await;
    }
    handle_single(&state, form).await
}

// abort is idempotent: unknown or already-finished ids succeed too
async fn handle_abort(state: &AppState, form: &UploadForm) -> Result<Response, UploadError> {
    let raw_id = form
        .upload_id
        .as_deref()
        .ok_or_else(|| UploadError::Validation("abort_upload requires upload_id".to_string()))?;
    let upload_id = sanitize_upload_id(raw_id)?;

    state.chunks.purge(&upload_id).await;
    let removed = state.registry.abort(&upload_id);
    tracing::info!(upload_id = %upload_id, removed, "Upload aborted by client");

    Ok(Json(AbortResponse {
        success: true,
        upload_id,
    })
    .into_response())
}

async fn handle_chunk(state: &AppState, form: UploadForm) -> Result<Response, UploadError> {
    let upload_id = sanitize_upload_id(
        form.upload_id
            .as_deref()
            .ok_or_else(|| UploadError::Validation("upload_id is required".to_string()))?,
    )?;

    let chunk_number = parse_count(form.chunk_number.as_deref(), "chunk_number")?;
    let total_chunks = parse_count(form.total_chunks.as_deref(), "total_chunks")?;

    let original_filename = clean_filename(form.original_filename.as_deref())?;

    let payload = form
        .payload
        .as_ref()
        .ok_or_else(|| UploadError::Validation("file payload is required".to_string()))?;

    // sessions are created implicitly by chunk 1; anything else must find an
    // existing session or the client has to restart. a retry of chunk 1
    // finds the existing session and skips key resolution, so the path
    // service is consulted at most once per session.
    let session = match state.registry.get(&upload_id) {
        Some(session) => session,
        None if chunk_number == 1 => {
            let destination_key = resolve_destination_key(
                &state.http,
                state.config.path_service_url.as_deref(),
                form.object_name.as_deref(),
                form.path_payload.as_deref(),
                &original_filename,
            )
            .await?;

            state.registry.create_if_absent(
                &upload_id,
                total_chunks,
                &original_filename,
                &destination_key,
            )
        }
        None => return Err(UploadError::SessionNotFound(upload_id.clone())),
    };

    // the chunk count is fixed at session creation; a disagreeing request is
    // rejected without touching the session
    if session.total_chunks != total_chunks {
        return Err(UploadError::Validation(format!(
            "total_chunks mismatch for upload {}: session has {}, request says {}",
            upload_id, session.total_chunks, total_chunks
        )));
    }

    if chunk_number > session.total_chunks {
        return Err(UploadError::OutOfRangeChunk {
            index: chunk_number,
            total: session.total_chunks,
        });
    }

    let session = state.spool_chunk(&upload_id, chunk_number, payload).await?;

    tracing::debug!(
        upload_id = %upload_id,
        chunk = chunk_number,
        total = total_chunks,
        bytes = payload.len(),
        "📦 Received chunk"
    );

    if !form.is_last_chunk {
        return Ok(chunk_progress(&upload_id, chunk_number, &session).into_response());
    }

    if !session.is_complete() {
        // the client thinks it is done but chunks are missing; tear the
        // session down, it has to restart under a new id
        let received = session.received_chunks.len();
        state.chunks.purge(&upload_id).await;
        state.registry.abort(&upload_id);
        return Err(UploadError::Incomplete {
            id: upload_id,
            received,
            total: total_chunks,
        });
    }

    match assemble(
        &state.registry,
        &state.chunks,
        state.blobs.as_ref(),
        &upload_id,
    )
    .await
    {
        Ok(artifact) => Ok(Json(UploadResponse {
            success: true,
            file_url: state.config.public_file_url(&artifact.destination_key),
            object_name: artifact.destination_key,
            source: UploadSource::MultipartUpload,
            original_filename,
            file_size: artifact.file_size,
            upload_id: Some(upload_id),
            total_chunks: Some(total_chunks),
        })
        .into_response()),
        // a racing retry of the last chunk lost the finalize guard; that is
        // a no-op success for this caller
        Err(UploadError::AlreadyFinalizing(_)) => {
            Ok(chunk_progress(&upload_id, chunk_number, &session).into_response())
        }
        Err(e) => Err(e),
    }
}

async fn handle_single(state: &AppState, form: UploadForm) -> Result<Response, UploadError> {
    match (&form.payload, &form.public_url) {
        (Some(_), Some(_)) => Err(UploadError::Validation(
            "cannot provide both 'file' and 'public_url'; choose one".to_string(),
        )),
        (Some(_), None) => handle_single_file(state, form).await,
        (None, Some(_)) => handle_single_url(state, form).await,
        (None, None) => Err(UploadError::Validation(
            "either 'file' or 'public_url' must be provided".to_string(),
        )),
    }
}

async fn handle_single_file(state: &AppState, form: UploadForm) -> Result<Response, UploadError> {
    let payload = form.payload.as_ref().expect("checked by caller");
    let original_filename = clean_filename(
        form.original_filename
            .as_deref()
            .or(form.payload_filename.as_deref()),
    )?;

    let destination_key = resolve_destination_key(
        &state.http,
        state.config.path_service_url.as_deref(),
        form.object_name.as_deref(),
        form.path_payload.as_deref(),
        &original_filename,
    )
    .await?;

    let mut reader: &[u8] = payload;
    let file_size = commit_blob(state, &destination_key, &mut reader).await?;

    tracing::info!(
        object_name = %destination_key,
        file_size,
        "✅ Uploaded file"
    );

    Ok(Json(UploadResponse {
        success: true,
        file_url: state.config.public_file_url(&destination_key),
        object_name: destination_key,
        source: UploadSource::FileUpload,
        original_filename,
        file_size,
        upload_id: None,
        total_chunks: None,
    })
    .into_response())
}

async fn handle_single_url(state: &AppState, form: UploadForm) -> Result<Response, UploadError> {
    let url = form.public_url.as_deref().expect("checked by caller");

    let mut remote = fetch_public_url(&state.http, url).await?;
    let filename = remote.filename.clone();
    if has_blocked_extension(&filename) {
        return Err(UploadError::Validation(format!(
            "file extension not allowed: {}",
            filename
        )));
    }

    let destination_key = resolve_destination_key(
        &state.http,
        state.config.path_service_url.as_deref(),
        form.object_name.as_deref(),
        form.path_payload.as_deref(),
        &filename,
    )
    .await?;

    let file_size = commit_blob(state, &destination_key, remote.reader.as_mut()).await?;

    tracing::info!(
        url = %url,
        object_name = %destination_key,
        file_size,
        "✅ Uploaded file from public URL"
    );

    Ok(Json(UploadResponse {
        success: true,
        file_url: state.config.public_file_url(&destination_key),
        object_name: destination_key,
        source: UploadSource::PublicUrl,
        original_filename: filename,
        file_size,
        upload_id: None,
        total_chunks: None,
    })
    .into_response())
}

// single uploads go through the same staging + atomic promotion as assembly,
// so a partial body is never visible at the destination key
async fn commit_blob(
    state: &AppState,
    destination_key: &str,
    reader: &mut (dyn tokio::io::AsyncRead + Send + Unpin),
) -> Result<u64, UploadError> {
    let temp_key = LocalBlobStore::staging_key();
    let written = state.blobs.put_stream(&temp_key, reader).await?;

    if let Err(e) = state.blobs.finalize(&temp_key, destination_key).await {
        let _ = state.blobs.delete(&temp_key).await;
        return Err(e);
    }
    Ok(written)
}

fn chunk_progress(
    upload_id: &str,
    chunk_number: u64,
    session: &crate::session::UploadSession,
) -> Json<ChunkProgressResponse> {
    Json(ChunkProgressResponse {
        success: true,
        upload_id: upload_id.to_string(),
        chunk_number,
        total_chunks: session.total_chunks,
        chunks_received: session.received_chunks.len(),
    })
}

fn parse_count(raw: Option<&str>, field: &str) -> Result<u64, UploadError> {
    let value: u64 = raw
        .ok_or_else(|| UploadError::Validation(format!("{} is required", field)))?
        .trim()
        .parse()
        .map_err(|_| UploadError::Validation(format!("{} must be a positive integer", field)))?;

    if value < 1 {
        return Err(UploadError::Validation(format!(
            "{} must be at least 1",
            field
        )));
    }
    Ok(value)
}

fn clean_filename(raw: Option<&str>) -> Result<String, UploadError> {
    let name = sanitize_filename(
        raw.ok_or_else(|| UploadError::Validation("original_filename is required".to_string()))?,
    );

    if name.is_empty() {
        return Err(UploadError::Validation("no usable filename".to_string()));
    }
    if has_blocked_extension(&name) {
        return Err(UploadError::Validation(format!(
            "file extension not allowed: {}",
            name
        )));
    }
    Ok(name)
}

/// health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "bulkdrop-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
