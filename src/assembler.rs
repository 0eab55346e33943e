use crate::blob_store::{BlobStore, LocalBlobStore};
use crate::chunk_store::ChunkStore;
use crate::error::UploadError;
use crate::session::{SessionRegistry, UploadSession};

/// what assembly produced
#[derive(Debug, Clone)]
pub struct AssembledArtifact {
    pub destination_key: String,
    pub file_size: u64,
}

/// concatenate a session's chunks in index order and commit the result
///
/// exactly one caller per session gets past the finalize guard; everyone
/// else receives `AlreadyFinalizing` with no side effects. a failure past
/// the guard is terminal: the session and its chunks are torn down and the
/// client must restart under a new id.
pub async fn assemble(
    registry: &SessionRegistry,
    chunks: &ChunkStore,
    blobs: &dyn BlobStore,
    id: &str,
) -> Result<AssembledArtifact, UploadError> {
    let session = registry
        .get(id)
        .ok_or_else(|| UploadError::SessionNotFound(id.to_string()))?;

    if !registry.try_begin_finalize(id) {
        return Err(UploadError::AlreadyFinalizing(id.to_string()));
    }

    match commit(chunks, blobs, &session).await {
        Ok(artifact) => {
            registry.complete(id);
            chunks.purge(id).await;
            tracing::info!(
                upload_id = %id,
                object_name = %artifact.destination_key,
                file_size = artifact.file_size,
                "✅ Assembled upload"
            );
            Ok(artifact)
        }
        Err(e) => {
            // no half-retries of the last mile: tear the session down
            registry.abort(id);
            chunks.purge(id).await;
            Err(e)
        }
    }
}

async fn commit(
    chunks: &ChunkStore,
    blobs: &dyn BlobStore,
    session: &UploadSession,
) -> Result<AssembledArtifact, UploadError> {
    let mut reader = chunks.read_ordered(&session.id, session.total_chunks).await?;

    let temp_key = LocalBlobStore::staging_key();
    let file_size = blobs.put_stream(&temp_key, &mut reader).await?;

    if let Err(e) = blobs.finalize(&temp_key, &session.destination_key).await {
        let _ = blobs.delete(&temp_key).await;
        return Err(e);
    }

    Ok(AssembledArtifact {
        destination_key: session.destination_key.clone(),
        file_size,
    })
}
