//! `LogStore`: the thin adaptation of a WAL to the consensus entry model
//! (spec §4.4).

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument};

use super::entry::{LogEntry, BEGIN_INDEX};
use super::file_wal::WalAdapter;
use crate::errors::{NodeError, NodeResult};

/// The application-level commit index lives on the parent consensus node,
/// deliberately split from the WAL's own durability index (spec §4.4,
/// "`commit_index()`").
pub trait CommitIndexSource: Send + Sync {
    fn commit_index(&self) -> u64;
}

#[derive(Debug, Clone, Serialize)]
pub struct LogStoreDescription {
    pub last_index: u64,
    pub last_term: u64,
    pub begin_index: u64,
}

/// Rolling latency samples for the store's two I/O-bound operations,
/// replacing the original's debug dumpers with a small structured record
/// (spec §9).
#[derive(Default)]
pub struct LatencySampler {
    samples: Mutex<VecDeque<Duration>>,
}

const LATENCY_WINDOW: usize = 256;

impl LatencySampler {
    pub fn add_sample(&self, d: Duration) {
        let mut samples = self.samples.lock();
        samples.push_back(d);
        if samples.len() > LATENCY_WINDOW {
            samples.pop_front();
        }
    }

    pub fn max(&self) -> Duration {
        self.samples.lock().iter().max().copied().unwrap_or_default()
    }

    pub fn mean(&self) -> Duration {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return Duration::ZERO;
        }
        samples.iter().sum::<Duration>() / samples.len() as u32
    }
}

/// One role's append-only replicated log, backed by a [`WalAdapter`].
///
/// Appends are serialized by `write_lock` (spec §5: "single-writer per
/// log"); reads may run concurrently with each other but not with a
/// truncate, which also takes the write lock.
pub struct LogStore<W: WalAdapter> {
    wal: Arc<W>,
    write_lock: AsyncMutex<()>,
    last_index: AtomicU64,
    last_term: AtomicU64,
    parent: Option<Arc<dyn CommitIndexSource>>,
    pub append_latency: LatencySampler,
    pub truncate_latency: LatencySampler,
}

impl<W: WalAdapter> LogStore<W> {
    pub fn new(wal: Arc<W>, parent: Option<Arc<dyn CommitIndexSource>>) -> Self {
        let last_index = wal.last_ver();
        Self {
            wal,
            write_lock: AsyncMutex::new(()),
            last_index: AtomicU64::new(last_index),
            // Recomputed lazily: `0` until the first `last_term()` call or
            // append resolves it via a WAL read, since `last_ver()` alone
            // doesn't carry the term.
            last_term: AtomicU64::new(0),
            parent,
            append_latency: LatencySampler::default(),
            truncate_latency: LatencySampler::default(),
        }
    }

    pub fn last_index(&self) -> u64 {
        self.last_index.load(Ordering::Acquire)
    }

    pub async fn last_term(&self) -> u64 {
        let cached = self.last_term.load(Ordering::Acquire);
        let last_index = self.last_index();
        if last_index == 0 {
            return 0;
        }
        if cached != 0 {
            return cached;
        }
        match self.wal.read(last_index).await {
            Ok(Some(entry)) => {
                self.last_term.store(entry.term, Ordering::Release);
                entry.term
            }
            _ => 0,
        }
    }

    #[instrument(skip(self, entry), fields(index = entry.index, term = entry.term))]
    pub async fn append(&self, entry: LogEntry) -> NodeResult<()> {
        let _guard = self.write_lock.lock().await;
        let expected = self.last_index() + 1;
        if entry.index != expected {
            return Err(NodeError::Wal(format!(
                "out-of-order append: expected index {expected}, got {}",
                entry.index
            )));
        }
        let started = std::time::Instant::now();
        let term = entry.term;
        self.wal.write(&entry).await?;
        self.wal.fsync().await?;
        self.append_latency.add_sample(started.elapsed());

        self.last_index.store(entry.index, Ordering::Release);
        self.last_term.store(term, Ordering::Release);
        debug!(index = entry.index, "entry appended and fsynced");
        Ok(())
    }

    pub async fn get(&self, index: u64) -> NodeResult<LogEntry> {
        if index < BEGIN_INDEX || index > self.last_index() {
            return Err(NodeError::Wal(format!("index {index} out of range")));
        }
        self.wal
            .read(index)
            .await?
            .ok_or_else(|| NodeError::Wal(format!("index {index} not found")))
    }

    #[instrument(skip(self))]
    pub async fn truncate(&self, from_index: u64) -> NodeResult<()> {
        let _guard = self.write_lock.lock().await;
        let started = std::time::Instant::now();
        self.wal.rollback(from_index).await?;
        self.truncate_latency.add_sample(started.elapsed());

        let new_last = from_index.saturating_sub(1);
        self.last_index.store(new_last, Ordering::Release);
        self.last_term.store(0, Ordering::Release);
        Ok(())
    }

    pub async fn update_commit_index(&self, index: u64) -> NodeResult<()> {
        self.wal.commit(index).await
    }

    /// The *application* commit index, sourced from the parent consensus
    /// node rather than the WAL (spec §4.4).
    pub fn commit_index(&self) -> u64 {
        self.parent.as_ref().map(|p| p.commit_index()).unwrap_or(0)
    }

    pub fn describe(&self, last_term: u64) -> LogStoreDescription {
        LogStoreDescription {
            last_index: self.last_index(),
            last_term,
            begin_index: BEGIN_INDEX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// In-memory WAL double for log-store tests, mirroring the teacher's
    /// test-support fake adapters.
    #[derive(Default)]
    pub struct FakeWal {
        entries: Mutex<HashMap<u64, LogEntry>>,
        last: AtomicU64,
    }

    #[async_trait]
    impl WalAdapter for FakeWal {
        async fn write(&self, entry: &LogEntry) -> NodeResult<()> {
            self.entries.lock().insert(entry.index, entry.clone());
            self.last.store(entry.index, Ordering::Release);
            Ok(())
        }
        async fn fsync(&self) -> NodeResult<()> {
            Ok(())
        }
        async fn read(&self, index: u64) -> NodeResult<Option<LogEntry>> {
            Ok(self.entries.lock().get(&index).cloned())
        }
        async fn rollback(&self, from_index: u64) -> NodeResult<()> {
            let mut entries = self.entries.lock();
            entries.retain(|idx, _| *idx < from_index);
            self.last.store(
                entries.keys().copied().max().unwrap_or(0),
                Ordering::Release,
            );
            Ok(())
        }
        async fn commit(&self, _index: u64) -> NodeResult<()> {
            Ok(())
        }
        fn last_ver(&self) -> u64 {
            self.last.load(Ordering::Acquire)
        }
    }

    fn entry(index: u64, term: u64, bytes: &[u8]) -> LogEntry {
        LogEntry {
            index,
            term,
            entry_type: 0,
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn append_then_truncate_then_reappend_round_trip() {
        let store = LogStore::new(Arc::new(FakeWal::default()), None);

        store.append(entry(1, 1, b"a")).await.unwrap();
        store.append(entry(2, 1, b"bb")).await.unwrap();
        store.append(entry(3, 2, b"ccc")).await.unwrap();
        assert_eq!(store.last_index(), 3);
        assert_eq!(store.last_term().await, 2);

        store.truncate(2).await.unwrap();
        assert_eq!(store.last_index(), 1);

        store.append(entry(2, 3, b"d")).await.unwrap();
        assert_eq!(store.get(2).await.unwrap().term, 3);
    }

    #[tokio::test]
    async fn out_of_order_append_is_rejected() {
        let store = LogStore::new(Arc::new(FakeWal::default()), None);
        store.append(entry(1, 1, b"a")).await.unwrap();
        let err = store.append(entry(3, 1, b"c")).await.unwrap_err();
        assert!(matches!(err, NodeError::Wal(_)));
    }

    #[tokio::test]
    async fn get_out_of_range_is_not_found() {
        let store = LogStore::new(Arc::new(FakeWal::default()), None);
        store.append(entry(1, 1, b"a")).await.unwrap();
        assert!(store.get(0).await.is_err());
        assert!(store.get(2).await.is_err());
    }

    struct FixedParent(u64);
    impl CommitIndexSource for FixedParent {
        fn commit_index(&self) -> u64 {
            self.0
        }
    }

    #[tokio::test]
    async fn commit_index_comes_from_the_parent_not_the_wal() {
        let store = LogStore::new(Arc::new(FakeWal::default()), Some(Arc::new(FixedParent(42))));
        assert_eq!(store.commit_index(), 42);
    }
}
