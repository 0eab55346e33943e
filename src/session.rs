use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::UploadError;

/// lifecycle of one upload session
///
/// `Completed`, `Aborted` and `Expired` are terminal; reaching any of them
/// removes the session from the registry, so an id is never resumable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Receiving,
    Finalizing,
    Completed,
    Aborted,
    Expired,
}

impl SessionState {
    fn as_str(&self) -> &'static str {
        match self {
            SessionState::Receiving => "receiving",
            SessionState::Finalizing => "finalizing",
            SessionState::Completed => "completed",
            SessionState::Aborted => "aborted",
            SessionState::Expired => "expired",
        }
    }
}

/// server-side record of one in-progress chunked upload
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub id: String,
    pub original_filename: String,
    /// fixed at creation by the first chunk; later disagreement is rejected
    pub total_chunks: u64,
    /// 1-based indices seen so far; grows monotonically
    pub received_chunks: HashSet<u64>,
    /// resolved once at creation, immutable thereafter
    pub destination_key: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn is_complete(&self) -> bool {
        self.received_chunks.len() as u64 == self.total_chunks
    }
}

/// in-memory session registry keyed by upload id
///
/// all mutations go through the per-entry map lock, so requests for different
/// ids never contend and requests for the same id serialize on the entry.
/// swapping in a shared backing store would keep this same contract.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, UploadSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// create the session for `id` if it does not exist; first caller wins
    ///
    /// idempotent: an existing session is returned unchanged, whatever
    /// parameters the later caller supplied
    pub fn create_if_absent(
        &self,
        id: &str,
        total_chunks: u64,
        original_filename: &str,
        destination_key: &str,
    ) -> UploadSession {
        let session = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!(
                    upload_id = %id,
                    total_chunks,
                    original_filename = %original_filename,
                    destination_key = %destination_key,
                    state = "receiving",
                    "Created upload session"
                );
                UploadSession {
                    id: id.to_string(),
                    original_filename: original_filename.to_string(),
                    total_chunks,
                    received_chunks: HashSet::new(),
                    destination_key: destination_key.to_string(),
                    state: SessionState::Receiving,
                    created_at: Utc::now(),
                }
            })
            .clone();
        session
    }

    /// snapshot of a session, if it exists
    pub fn get(&self, id: &str) -> Option<UploadSession> {
        self.sessions.get(id).map(|s| s.clone())
    }

    /// record that chunk `index` has arrived; monotonic set-union, safe to
    /// call twice for the same index (client retries)
    pub fn mark_chunk_received(
        &self,
        id: &str,
        index: u64,
    ) -> Result<UploadSession, UploadError> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| UploadError::SessionNotFound(id.to_string()))?;

        if index < 1 || index > entry.total_chunks {
            return Err(UploadError::OutOfRangeChunk {
                index,
                total: entry.total_chunks,
            });
        }

        // a retry racing finalize may land here after the guard was taken;
        // the set is already complete, leave it alone
        if entry.state == SessionState::Receiving {
            entry.received_chunks.insert(index);
        }

        tracing::debug!(
            upload_id = %id,
            chunk = index,
            received = entry.received_chunks.len(),
            total = entry.total_chunks,
            state = entry.state.as_str(),
            "Marked chunk received"
        );

        Ok(entry.clone())
    }

    /// atomically move `Receiving` -> `Finalizing` if all chunks are present
    ///
    /// this is the single guard against double assembly: of any number of
    /// concurrent callers exactly one sees `true`
    pub fn try_begin_finalize(&self, id: &str) -> bool {
        let Some(mut entry) = self.sessions.get_mut(id) else {
            return false;
        };

        if entry.state != SessionState::Receiving || !entry.is_complete() {
            return false;
        }

        entry.state = SessionState::Finalizing;
        tracing::info!(
            upload_id = %id,
            total_chunks = entry.total_chunks,
            state = "finalizing",
            "Beginning finalize"
        );
        true
    }

    /// terminal: assembly committed
    pub fn complete(&self, id: &str) -> bool {
        self.remove_terminal(id, SessionState::Completed)
    }

    /// terminal: client abort or finalize failure
    pub fn abort(&self, id: &str) -> bool {
        self.remove_terminal(id, SessionState::Aborted)
    }

    /// terminal: reaped after the ttl
    pub fn expire(&self, id: &str) -> bool {
        self.remove_terminal(id, SessionState::Expired)
    }

    // terminal transitions delete the registry entry; calling them again (or
    // for an unknown id) is a no-op
    fn remove_terminal(&self, id: &str, state: SessionState) -> bool {
        match self.sessions.remove(id) {
            Some((_, session)) => {
                tracing::info!(
                    upload_id = %id,
                    original_filename = %session.original_filename,
                    received = session.received_chunks.len(),
                    total = session.total_chunks,
                    state = state.as_str(),
                    "Upload session removed"
                );
                true
            }
            None => false,
        }
    }

    /// non-terminal sessions created longer than `ttl` ago
    pub fn list_expirable(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<UploadSession> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        self.sessions
            .iter()
            .filter(|entry| {
                matches!(
                    entry.state,
                    SessionState::Receiving | SessionState::Finalizing
                ) && entry.created_at + ttl < now
            })
            .map(|entry| entry.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
