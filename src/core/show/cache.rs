//! The TTL + refcount show-session cache (spec §3, §4.3).
//!
//! Grounded on the teacher's `TtlManager`/`ChannelPurgerTask` background
//! sweeper pattern: a `tokio::time::interval` loop that checks deadlines and
//! a `broadcast` shutdown signal, `tokio::select!`-ed together.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

use super::session::{ColumnLayout, ShowIter, ShowSession};
use crate::errors::{NodeError, NodeResult};

struct SessionEntry {
    session: parking_lot::Mutex<ShowSession>,
    ref_count: AtomicU32,
    marked_for_removal: AtomicBool,
}

/// A temporary shared reference to a session, acquired through
/// [`ShowSessionCache::acquire_session`]. Must be released exactly once;
/// `Drop` releases with `force_remove = false` if the caller forgets.
pub struct SessionHandle {
    id: u64,
    entry: Arc<SessionEntry>,
    cache: Arc<ShowSessionCacheInner>,
    released: bool,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn with_session<R>(&self, f: impl FnOnce(&mut ShowSession) -> R) -> R {
        f(&mut self.entry.session.lock())
    }

    pub fn release(mut self, force_remove: bool) {
        self.released = true;
        self.cache.release(self.id, &self.entry, force_remove);
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if !self.released {
            self.cache.release(self.id, &self.entry, false);
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub live_sessions: usize,
    pub evicted_total: u64,
    pub force_removed_total: u64,
}

struct ShowSessionCacheInner {
    sessions: DashMap<u64, Arc<SessionEntry>>,
    next_id: AtomicU64,
    evicted_total: AtomicU64,
    force_removed_total: AtomicU64,
}

impl ShowSessionCacheInner {
    /// Remove the session if its ref count has drained to zero and it is
    /// marked for removal (TTL fired or `force_remove` requested); defers
    /// to whichever release call observes the count hitting zero.
    fn release(&self, id: u64, entry: &Arc<SessionEntry>, force_remove: bool) {
        if force_remove {
            entry.marked_for_removal.store(true, Ordering::Release);
        }
        let remaining = entry.ref_count.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining == 0 && entry.marked_for_removal.load(Ordering::Acquire) {
            self.evict(id);
        }
    }

    fn evict(&self, id: u64) {
        if let Some((_, entry)) = self.sessions.remove(&id) {
            // Dropping `entry` drops the session's `iter` field exactly
            // once, running whatever cleanup its `ShowIter` impl needs.
            drop(entry);
            self.evicted_total.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Expiring, reference-counted cache of paginated show sessions.
pub struct ShowSessionCache {
    inner: Arc<ShowSessionCacheInner>,
    ttl: Duration,
}

impl ShowSessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(ShowSessionCacheInner {
                sessions: DashMap::new(),
                next_id: AtomicU64::new(1),
                evicted_total: AtomicU64::new(0),
                force_removed_total: AtomicU64::new(0),
            }),
            ttl,
        }
    }

    /// Assign a monotonically increasing, nonzero id and insert the session
    /// with a deadline of `now + 6 * shell_activity_timer` (spec §3).
    pub fn create_session(
        &self,
        show_type: u32,
        db: String,
        payload: Vec<u8>,
        num_of_rows: i32,
        layout: ColumnLayout,
        iter: Box<dyn ShowIter>,
    ) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let session = ShowSession {
            id,
            show_type,
            db,
            payload,
            num_of_rows,
            num_of_reads: 0,
            layout,
            iter: Some(iter),
            deadline: Instant::now() + self.ttl,
        };
        self.inner.sessions.insert(
            id,
            Arc::new(SessionEntry {
                session: parking_lot::Mutex::new(session),
                ref_count: AtomicU32::new(0),
                marked_for_removal: AtomicBool::new(false),
            }),
        );
        id
    }

    pub fn acquire_session(&self, id: u64) -> NodeResult<SessionHandle> {
        let entry = self
            .inner
            .sessions
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(NodeError::InvalidShowObject(id))?;
        if entry.marked_for_removal.load(Ordering::Acquire) {
            return Err(NodeError::InvalidShowObject(id));
        }
        entry.ref_count.fetch_add(1, Ordering::AcqRel);
        Ok(SessionHandle {
            id,
            entry,
            cache: self.inner.clone(),
            released: false,
        })
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            live_sessions: self.inner.sessions.len(),
            evicted_total: self.inner.evicted_total.load(Ordering::Relaxed),
            force_removed_total: self.inner.force_removed_total.load(Ordering::Relaxed),
        }
    }

    /// One sweep: evict every session past its deadline with no outstanding
    /// references; mark the rest for removal on their next release.
    fn sweep_once(&self) {
        let now = Instant::now();
        let expired: Vec<u64> = self
            .inner
            .sessions
            .iter()
            .filter(|e| e.session.lock().deadline <= now)
            .map(|e| *e.key())
            .collect();

        for id in expired {
            let Some(entry) = self.inner.sessions.get(&id).map(|e| e.value().clone()) else {
                continue;
            };
            entry.marked_for_removal.store(true, Ordering::Release);
            if entry.ref_count.load(Ordering::Acquire) == 0 {
                self.inner.evict(id);
            } else {
                debug!(session_id = id, "TTL fired but session still held; deferring");
            }
        }
    }

    /// Spawn the background sweeper task. Stops when `shutdown` fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        period: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = tick.tick() => self.sweep_once(),
                    _ = shutdown.recv() => {
                        debug!("show-session sweeper shutting down");
                        return;
                    }
                }
            }
        })
    }
}
