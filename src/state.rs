use std::sync::Arc;

use crate::blob_store::{BlobStore, LocalBlobStore};
use crate::chunk_store::ChunkStore;
use crate::config::Config;
use crate::error::UploadError;
use crate::session::{SessionRegistry, UploadSession};

/// shared application state
pub struct AppState {
    pub config: Config,
    /// the upload session state machine, keyed by upload_id
    pub registry: Arc<SessionRegistry>,
    /// per-session chunk spool
    pub chunks: ChunkStore,
    /// durable artifact storage
    pub blobs: Arc<dyn BlobStore>,
    /// outbound client for the path service and public_url downloads
    pub http: reqwest::Client,
}

impl AppState {
    /// wire up state over the configured artifact directory
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let chunks = ChunkStore::new(&config.files_dir);
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(config.files_dir.clone()));

        Self {
            config,
            registry,
            chunks,
            blobs,
            http: reqwest::Client::new(),
        }
    }

    /// spool one chunk to disk and record it in the registry
    ///
    /// the write lands before the registry mark so an acknowledged chunk is
    /// always durable; if the session vanished in between (a reaper sweep or
    /// abort won the race) the freshly recreated spool is dropped again
    pub async fn spool_chunk(
        &self,
        id: &str,
        index: u64,
        data: &[u8],
    ) -> Result<UploadSession, UploadError> {
        self.chunks.write_chunk(id, index, data).await?;
        match self.registry.mark_chunk_received(id, index) {
            Ok(session) => Ok(session),
            Err(e) => {
                self.chunks.purge(id).await;
                Err(e)
            }
        }
    }
}
