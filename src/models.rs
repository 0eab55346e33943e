use serde::{Deserialize, Serialize};

// wire types for the /upload endpoint; Deserialize is derived as well because
// the client-side uploader parses the same bodies

/// where an artifact came from
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadSource {
    MultipartUpload,
    FileUpload,
    PublicUrl,
}

/// final result descriptor, returned for single uploads and for the last
/// chunk of a multipart upload
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UploadResponse {
    pub success: bool,
    pub file_url: String,
    pub object_name: String,
    pub source: UploadSource,
    pub original_filename: String,
    pub file_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u64>,
}

/// acknowledgement for a non-final chunk
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChunkProgressResponse {
    pub success: bool,
    pub upload_id: String,
    pub chunk_number: u64,
    pub total_chunks: u64,
    pub chunks_received: usize,
}

/// acknowledgement for an abort request; aborting an unknown id succeeds
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AbortResponse {
    pub success: bool,
    pub upload_id: String,
}

/// generic error body, paired with a non-2xx status
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}
