//! # Persistence Writer
//!
//! Serializes every cart snapshot write through one background task.
//!
//! ## Write Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Persistence Writer Flow                              │
//! │                                                                         │
//! │  CartStore mutation (under the cart lock)                              │
//! │       │                                                                 │
//! │       │  enqueue(Snapshot { revision: 7, payload })   never blocks     │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  unbounded channel:  W5  W6  Flush  W7                          │   │
//! │  └────────────────────────────┬────────────────────────────────────┘   │
//! │                               ▼                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    PersistWriter::run                           │   │
//! │  │                                                                 │   │
//! │  │  1. Receive one command, drain everything already queued        │   │
//! │  │  2. Keep only the newest snapshot (W7); W5, W6 are coalesced    │   │
//! │  │  3. kv.set(key, W7.payload).await                               │   │
//! │  │  4. Ack flush waiters                                           │   │
//! │  │  5. Failure? log + count, wait for the next snapshot            │   │
//! │  │  6. Shutdown? close the channel, count what queued behind it,   │   │
//! │  │     then write and exit                                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  GUARANTEE: one write in flight at a time, in issue order, so the      │
//! │  last snapshot issued is the last one written.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueStore;

// =============================================================================
// Types
// =============================================================================

/// A serialized cart stamped with the revision that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub revision: u64,
    pub payload: String,
}

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Snapshots successfully written.
    pub written: u64,

    /// Snapshots skipped because a newer one was already queued.
    pub coalesced: u64,

    /// Writes that failed.
    pub failed: u64,

    /// Revision of the last successful write.
    pub last_revision: Option<u64>,

    /// Message of the most recent failure.
    pub last_error: Option<String>,

    /// Snapshots that arrived after shutdown was requested and were dropped.
    pub discarded: u64,
}

enum WriterCommand {
    Write(Snapshot),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

type SharedStats = Arc<Mutex<WriterStats>>;

fn update_stats(stats: &SharedStats, f: impl FnOnce(&mut WriterStats)) {
    let mut guard = stats.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard);
}

// =============================================================================
// Handle
// =============================================================================

/// Handle for feeding and controlling the writer task.
#[derive(Clone)]
pub struct PersistWriterHandle {
    tx: mpsc::UnboundedSender<WriterCommand>,
    stats: SharedStats,
}

impl PersistWriterHandle {
    /// Queues a snapshot. Never blocks.
    pub fn enqueue(&self, snapshot: Snapshot) -> StoreResult<()> {
        self.tx
            .send(WriterCommand::Write(snapshot))
            .map_err(|_| StoreError::WriterClosed)
    }

    /// Waits until every snapshot queued before this call has been
    /// attempted (written, coalesced, or failed).
    pub async fn flush(&self) -> StoreResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(WriterCommand::Flush(done_tx))
            .map_err(|_| StoreError::WriterClosed)?;
        done_rx.await.map_err(|_| StoreError::WriterClosed)
    }

    /// Drains pending snapshots and stops the task.
    pub async fn shutdown(&self) -> StoreResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(WriterCommand::Shutdown(done_tx))
            .map_err(|_| StoreError::WriterClosed)?;
        done_rx.await.map_err(|_| StoreError::WriterClosed)
    }

    /// Returns true once the task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Current counters.
    pub fn stats(&self) -> WriterStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Single sequential writer for one storage key.
pub struct PersistWriter {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    rx: mpsc::UnboundedReceiver<WriterCommand>,
    stats: SharedStats,
}

/// Commands gathered from one drain of the channel.
#[derive(Default)]
struct Batch {
    latest: Option<Snapshot>,
    waiters: Vec<oneshot::Sender<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl PersistWriter {
    /// Creates a writer and its handle. Call [`PersistWriter::run`] (or use
    /// [`PersistWriter::spawn`]) to start processing.
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> (Self, PersistWriterHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = SharedStats::default();

        let writer = PersistWriter {
            kv,
            key: key.into(),
            rx,
            stats: stats.clone(),
        };

        (writer, PersistWriterHandle { tx, stats })
    }

    /// Creates a writer and spawns it on the current tokio runtime.
    pub fn spawn(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> PersistWriterHandle {
        let (writer, handle) = Self::new(kv, key);
        tokio::spawn(writer.run());
        handle
    }

    /// Runs the writer loop until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        info!(key = %self.key, "Persistence writer starting");

        while let Some(command) = self.rx.recv().await {
            let mut batch = Batch::default();
            self.absorb(command, &mut batch);

            // Stop draining at shutdown; later commands are dropped with it
            while batch.shutdown.is_none() {
                match self.rx.try_recv() {
                    Ok(command) => self.absorb(command, &mut batch),
                    Err(_) => break,
                }
            }

            // Refuse new commands before the final write is awaited
            if batch.shutdown.is_some() {
                self.rx.close();
                self.discard_pending();
            }

            if let Some(snapshot) = batch.latest.take() {
                self.write(snapshot).await;
            }

            for waiter in batch.waiters {
                let _ = waiter.send(());
            }

            if let Some(done) = batch.shutdown {
                info!(key = %self.key, "Persistence writer shutting down");
                let _ = done.send(());
                return;
            }
        }

        info!(key = %self.key, "Persistence writer stopped");
    }

    fn absorb(&self, command: WriterCommand, batch: &mut Batch) {
        match command {
            WriterCommand::Write(snapshot) => {
                if let Some(older) = batch.latest.replace(snapshot) {
                    debug!(revision = older.revision, "Coalesced cart snapshot");
                    update_stats(&self.stats, |s| s.coalesced += 1);
                }
            }
            WriterCommand::Flush(waiter) => batch.waiters.push(waiter),
            WriterCommand::Shutdown(done) => batch.shutdown = Some(done),
        }
    }

    /// Drops whatever was queued behind the shutdown command. Pending
    /// flush and shutdown callers see `WriterClosed`.
    fn discard_pending(&mut self) {
        while let Ok(command) = self.rx.try_recv() {
            if let WriterCommand::Write(snapshot) = command {
                warn!(
                    revision = snapshot.revision,
                    "Dropping cart snapshot queued after shutdown"
                );
                update_stats(&self.stats, |s| s.discarded += 1);
            }
        }
    }

    async fn write(&self, snapshot: Snapshot) {
        let last_revision = self.stats().last_revision;
        if last_revision.is_some_and(|last| snapshot.revision <= last) {
            warn!(
                revision = snapshot.revision,
                ?last_revision,
                "Skipping stale cart snapshot"
            );
            update_stats(&self.stats, |s| s.coalesced += 1);
            return;
        }

        match self.kv.set(&self.key, &snapshot.payload).await {
            Ok(()) => {
                debug!(
                    revision = snapshot.revision,
                    bytes = snapshot.payload.len(),
                    "Persisted cart snapshot"
                );
                update_stats(&self.stats, |s| {
                    s.written += 1;
                    s.last_revision = Some(snapshot.revision);
                });
            }
            Err(e) => {
                error!(
                    revision = snapshot.revision,
                    code = e.code(),
                    error = %e,
                    "Failed to persist cart snapshot"
                );
                update_stats(&self.stats, |s| {
                    s.failed += 1;
                    s.last_error = Some(e.to_string());
                });
            }
        }
    }

    fn stats(&self) -> WriterStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory::MemoryKvStore;
    use async_trait::async_trait;

    fn snapshot(revision: u64) -> Snapshot {
        Snapshot {
            revision,
            payload: format!("rev-{}", revision),
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Persistence("disk unplugged".into()))
        }
        async fn set(&self, _key: &str, _value: &str) -> StoreResult<()> {
            Err(StoreError::Persistence("disk unplugged".into()))
        }
        async fn remove(&self, _key: &str) -> StoreResult<()> {
            Err(StoreError::Persistence("disk unplugged".into()))
        }
    }

    #[tokio::test]
    async fn test_last_issued_snapshot_wins() {
        let kv = MemoryKvStore::new();
        let handle = PersistWriter::spawn(Arc::new(kv.clone()), "cart");

        for revision in 1..=50 {
            handle.enqueue(snapshot(revision)).unwrap();
        }
        handle.flush().await.unwrap();

        assert_eq!(kv.get("cart").await.unwrap().as_deref(), Some("rev-50"));

        let stats = handle.stats();
        assert_eq!(stats.last_revision, Some(50));
        assert_eq!(stats.written + stats.coalesced, 50);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_queued_snapshots_coalesce_before_run() {
        let kv = MemoryKvStore::new();
        let (writer, handle) = PersistWriter::new(Arc::new(kv.clone()), "cart");

        // Everything is queued before the loop starts: one drain, one write
        handle.enqueue(snapshot(1)).unwrap();
        handle.enqueue(snapshot(2)).unwrap();
        handle.enqueue(snapshot(3)).unwrap();
        tokio::spawn(writer.run());
        handle.flush().await.unwrap();

        let stats = handle.stats();
        assert_eq!(stats.written, 1);
        assert_eq!(stats.coalesced, 2);
        assert_eq!(kv.get("cart").await.unwrap().as_deref(), Some("rev-3"));
    }

    #[tokio::test]
    async fn test_stale_revision_is_skipped() {
        let kv = MemoryKvStore::new();
        let handle = PersistWriter::spawn(Arc::new(kv.clone()), "cart");

        handle.enqueue(snapshot(5)).unwrap();
        handle.flush().await.unwrap();
        handle.enqueue(snapshot(4)).unwrap();
        handle.flush().await.unwrap();

        assert_eq!(kv.get("cart").await.unwrap().as_deref(), Some("rev-5"));
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_fatal() {
        let handle = PersistWriter::spawn(Arc::new(BrokenStore), "cart");

        handle.enqueue(snapshot(1)).unwrap();
        handle.flush().await.unwrap();
        handle.enqueue(snapshot(2)).unwrap();
        handle.flush().await.unwrap();

        let stats = handle.stats();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.written, 0);
        assert!(stats.last_error.unwrap().contains("disk unplugged"));
        assert!(!handle.is_closed());
    }

    #[tokio::test]
    async fn test_shutdown_drains_then_closes() {
        let kv = MemoryKvStore::new();
        let handle = PersistWriter::spawn(Arc::new(kv.clone()), "cart");

        handle.enqueue(snapshot(1)).unwrap();
        handle.shutdown().await.unwrap();

        assert_eq!(kv.get("cart").await.unwrap().as_deref(), Some("rev-1"));
        assert!(matches!(
            handle.enqueue(snapshot(2)),
            Err(StoreError::WriterClosed)
        ));
        assert!(matches!(handle.flush().await, Err(StoreError::WriterClosed)));
    }

    #[tokio::test]
    async fn test_snapshot_queued_behind_shutdown_is_discarded() {
        let kv = MemoryKvStore::new();
        let (writer, handle) = PersistWriter::new(Arc::new(kv.clone()), "cart");

        handle.enqueue(snapshot(1)).unwrap();
        let closer = handle.clone();
        let shutdown = tokio::spawn(async move { closer.shutdown().await });
        // Let the shutdown command reach the channel
        tokio::task::yield_now().await;

        // Accepted by the channel, but behind the shutdown
        handle.enqueue(snapshot(2)).unwrap();

        tokio::spawn(writer.run());
        shutdown.await.unwrap().unwrap();

        let stats = handle.stats();
        assert_eq!(stats.written, 1);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.last_revision, Some(1));
        assert_eq!(kv.get("cart").await.unwrap().as_deref(), Some("rev-1"));
        assert!(handle.is_closed());
    }
}
