use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};

use crate::error::UploadError;

/// disk spool holding a session's chunk payloads until assembly
///
/// layout: `<files_dir>/.chunks/<upload_id>/chunk_<n>`, n starting at 1
#[derive(Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    pub fn new(files_dir: &Path) -> Self {
        Self {
            root: files_dir.join(".chunks"),
        }
    }

    fn session_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn chunk_path(&self, id: &str, index: u64) -> PathBuf {
        self.session_dir(id).join(format!("chunk_{}", index))
    }

    /// persist one chunk payload; rewriting the same `(id, index)` replaces
    /// the file, which makes client retries of a chunk idempotent
    pub async fn write_chunk(&self, id: &str, index: u64, data: &[u8]) -> Result<(), UploadError> {
        fs::create_dir_all(self.session_dir(id)).await?;

        let path = self.chunk_path(id, index);
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;

        tracing::trace!(upload_id = %id, chunk = index, bytes = data.len(), "Wrote chunk to spool");
        Ok(())
    }

    /// open the session's chunks as one reader yielding bytes in strict
    /// index order `1..=total_chunks`
    ///
    /// verifies every index is present before yielding anything (a second
    /// completeness guard, independent of the registry's), then opens each
    /// chunk only when the previous one is drained, so a session with
    /// thousands of chunks never holds more than one descriptor
    pub async fn read_ordered(
        &self,
        id: &str,
        total_chunks: u64,
    ) -> Result<OrderedChunkReader, UploadError> {
        let mut missing = 0usize;
        for index in 1..=total_chunks {
            if fs::metadata(self.chunk_path(id, index)).await.is_err() {
                missing += 1;
            }
        }
        if missing > 0 {
            return Err(UploadError::Incomplete {
                id: id.to_string(),
                received: (total_chunks as usize) - missing,
                total: total_chunks,
            });
        }

        let paths = (1..=total_chunks)
            .map(|index| self.chunk_path(id, index))
            .collect();
        Ok(OrderedChunkReader::new(paths))
    }

    /// delete every spooled chunk for a session; no-op for unknown ids
    pub async fn purge(&self, id: &str) {
        match fs::remove_dir_all(self.session_dir(id)).await {
            Ok(()) => {
                tracing::debug!(upload_id = %id, "Purged chunk spool");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(upload_id = %id, "Failed to purge chunk spool: {}", e);
            }
        }
    }
}

type OpenFuture = Pin<Box<dyn Future<Output = io::Result<fs::File>> + Send>>;

enum ReaderState {
    Between,
    Opening(OpenFuture),
    Reading(fs::File),
    Done,
}

/// reads a sequence of files back to back, opening the next one only after
/// the previous is drained
pub struct OrderedChunkReader {
    paths: VecDeque<PathBuf>,
    state: ReaderState,
}

impl std::fmt::Debug for OrderedChunkReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedChunkReader")
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl OrderedChunkReader {
    fn new(paths: VecDeque<PathBuf>) -> Self {
        Self {
            paths,
            state: ReaderState::Between,
        }
    }
}

impl AsyncRead for OrderedChunkReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            match &mut this.state {
                ReaderState::Between => match this.paths.pop_front() {
                    Some(path) => {
                        this.state = ReaderState::Opening(Box::pin(fs::File::open(path)));
                    }
                    None => {
                        this.state = ReaderState::Done;
                    }
                },
                ReaderState::Opening(open) => {
                    let file = ready!(open.as_mut().poll(cx))?;
                    this.state = ReaderState::Reading(file);
                }
                ReaderState::Reading(file) => {
                    let filled = buf.filled().len();
                    ready!(Pin::new(file).poll_read(cx, buf))?;
                    if buf.filled().len() == filled {
                        // this chunk is drained, move to the next
                        this.state = ReaderState::Between;
                        continue;
                    }
                    return Poll::Ready(Ok(()));
                }
                ReaderState::Done => return Poll::Ready(Ok(())),
            }
        }
    }
}
