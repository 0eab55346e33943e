use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::chunk_store::ChunkStore;
use crate::session::SessionRegistry;

/// background sweep that expires upload sessions idle past the ttl
///
/// a sweep racing an in-flight chunk request is fine: the later operation
/// wins and the client sees `SessionNotFound` on its next call
pub struct SessionReaper {
    registry: Arc<SessionRegistry>,
    chunks: ChunkStore,
    ttl: Duration,
    interval: Duration,
}

impl SessionReaper {
    pub fn new(
        registry: Arc<SessionRegistry>,
        chunks: ChunkStore,
        ttl: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            chunks,
            ttl,
            interval,
        }
    }

    /// expire everything past the ttl; returns how many sessions were reaped
    pub async fn sweep(&self) -> usize {
        let expirable = self.registry.list_expirable(Utc::now(), self.ttl);

        let mut count = 0;
        for session in expirable {
            // purge first so an expired id can never be reassembled
            self.chunks.purge(&session.id).await;
            if self.registry.expire(&session.id) {
                count += 1;
            }
        }

        if count > 0 {
            tracing::info!(count, "🗑️  Reaped idle upload sessions");
        }
        count
    }

    /// run sweeps on the configured interval until the handle is stopped
    pub fn start(self) -> ReaperHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // interval fires immediately; skip the startup tick
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                    _ = &mut stop_rx => break,
                }
            }
            tracing::debug!("Session reaper stopped");
        });

        ReaperHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// lifecycle handle for the reaper task
pub struct ReaperHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// stop the sweep loop and wait for it to exit
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}
