use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::models::ErrorResponse;

/// server-side error taxonomy for the upload protocol
///
/// the message tells the client whether to retry the same chunk, restart the
/// whole upload under a new id, or give up
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{0}")]
    Validation(String),

    #[error("upload session {0} not found; restart from chunk 1")]
    SessionNotFound(String),

    #[error("chunk {index} outside declared range 1..={total}")]
    OutOfRangeChunk { index: u64, total: u64 },

    #[error("upload {id} incomplete: received {received}/{total} chunks; restart the upload")]
    Incomplete {
        id: String,
        received: usize,
        total: u64,
    },

    /// another request already holds the finalize guard for this session
    #[error("upload {0} is already being finalized")]
    AlreadyFinalizing(String),

    /// the atomic commit failed; the session is gone, do not retry it
    #[error("failed to commit final artifact: {0}")]
    FinalizeFailed(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("path service error: {0}")]
    PathService(String),

    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("{0}")]
    Internal(String),
}

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::Validation(_)
            | UploadError::OutOfRangeChunk { .. }
            | UploadError::Incomplete { .. }
            | UploadError::Download { .. } => StatusCode::BAD_REQUEST,
            UploadError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            UploadError::AlreadyFinalizing(_) => StatusCode::CONFLICT,
            UploadError::FinalizeFailed(_)
            | UploadError::Storage(_)
            | UploadError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::PathService(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Upload failed: {}", self);
        } else {
            tracing::warn!("Upload rejected: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
