use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncRead;

use crate::error::UploadError;
use crate::utils::validate_object_key;

/// prefix for in-flight blobs; lives under the artifact root so the final
/// promotion is a same-filesystem rename
pub const STAGING_PREFIX: &str = ".staging";

/// durable key -> bytes storage the assembled artifact is committed into
///
/// the local filesystem implementation below is the default; an object-store
/// implementation would satisfy the same contract
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// write `bytes` under `key`, replacing any existing blob
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), UploadError>;

    /// stream `reader` to exhaustion under `key`; returns bytes written
    async fn put_stream(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, UploadError>;

    /// atomically promote `temp_key` to `final_key`
    ///
    /// never a byte-copy: either the whole blob appears at `final_key` or
    /// nothing does
    async fn finalize(&self, temp_key: &str, final_key: &str) -> Result<(), UploadError>;

    /// size of the blob at `key`, or None if absent
    async fn stat(&self, key: &str) -> Result<Option<u64>, UploadError>;

    /// remove the blob at `key`; unknown keys are not an error
    async fn delete(&self, key: &str) -> Result<(), UploadError>;
}

/// blob store rooted at a local directory
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// fresh staging key for an in-flight blob
    pub fn staging_key() -> String {
        format!("{}/{}.part", STAGING_PREFIX, uuid::Uuid::new_v4())
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, UploadError> {
        validate_object_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), UploadError> {
        let mut slice = bytes;
        self.put_stream(key, &mut slice).await?;
        Ok(())
    }

    async fn put_stream(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, UploadError> {
        let path = self.key_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&path).await?;
        let written = tokio::io::copy(reader, &mut file).await?;
        file.sync_all().await?;

        tracing::trace!(key = %key, bytes = written, "Wrote blob");
        Ok(written)
    }

    async fn finalize(&self, temp_key: &str, final_key: &str) -> Result<(), UploadError> {
        let temp_path = self.key_path(temp_key)?;
        let final_path = self.key_path(final_key)?;

        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| UploadError::FinalizeFailed(e.to_string()))?;
        }

        // same filesystem, so this is atomic; concurrent commits to the same
        // key are last-writer-wins
        fs::rename(&temp_path, &final_path)
            .await
            .map_err(|e| UploadError::FinalizeFailed(e.to_string()))?;

        tracing::debug!(from = %temp_key, to = %final_key, "Committed blob");
        Ok(())
    }

    async fn stat(&self, key: &str) -> Result<Option<u64>, UploadError> {
        match fs::metadata(self.key_path(key)?).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), UploadError> {
        match fs::remove_file(self.key_path(key)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
