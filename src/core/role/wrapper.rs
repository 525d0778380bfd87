//! `RoleWrapper`: the reference-counted, latch-guarded container that owns a
//! single role's state and handler table.
//!
//! Per the redesign notes (spec §9), the original's raw-pointer-plus-latch
//! ownership becomes a shared-ownership primitive (`Arc`) with the latch
//! guarding only the `(deployed, role_state, handlers)` triple; `ref_count`
//! is a lock-free atomic that participates in the latch only through the
//! short critical section `acquire`/`mark` run inside.

use super::funcs::{HandlerBinding, RoleFuncs, RoleState};
use super::kind::{MsgType, ProcessMode, RoleKind};
use crate::errors::{NodeError, NodeResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// In-process IPC bookkeeping for a role (`proc` in the spec's data model).
#[derive(Debug, Clone, Default)]
pub struct ProcInfo {
    pub mode: ProcessMode,
    pub pid: Option<u32>,
    pub shm_handle: Option<String>,
}

/// Persisted `<data_dir>/<role>/deployed.json` contents (spec §6).
#[derive(Serialize, Deserialize)]
struct DeployedBit {
    deployed: bool,
}

/// The mutable state the latch protects as one unit.
struct Latched {
    deployed: bool,
    role_state: Option<Arc<dyn RoleState>>,
    handlers: HashMap<MsgType, HandlerBinding>,
}

/// One instance per `RoleKind`. Owned exclusively by the [`Node`](crate::core::node::Node).
pub struct RoleWrapper {
    pub kind: RoleKind,
    pub name: String,
    pub data_path: PathBuf,
    pub required: AtomicBool,
    ref_count: AtomicU32,
    latch: RwLock<Latched>,
    pub proc: Mutex<ProcInfo>,
    funcs: Arc<dyn RoleFuncs>,
    /// Shared with the owning `Node`; set once graceful shutdown begins so
    /// new `acquire`/`mark` calls fail fast with `NodeStopping` while
    /// in-flight handlers finish undisturbed.
    stopping: Arc<AtomicBool>,
}

/// A temporary shared reference acquired through [`RoleWrapper::acquire`] or
/// [`RoleWrapper::mark`]. Must be released on every exit path; `Drop`
/// guarantees this even when the caller returns early or panics.
pub struct RoleRef {
    wrapper: Arc<RoleWrapper>,
    state: Option<Arc<dyn RoleState>>,
    released: bool,
}

impl RoleRef {
    /// The role's opened state, if the wrapper was deployed at acquire time.
    /// `None` only when obtained via `mark` on an undeployed-but-required
    /// wrapper, i.e. the forward-to-child path.
    pub fn state(&self) -> Option<&Arc<dyn RoleState>> {
        self.state.as_ref()
    }

    /// Explicitly release the reference. Equivalent to dropping it, but
    /// named to match the spec's `release` operation at call sites that
    /// want the release to read as a deliberate step.
    pub fn release(mut self) {
        self.released = true;
        self.wrapper.ref_count.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Drop for RoleRef {
    fn drop(&mut self) {
        if !self.released {
            self.wrapper.ref_count.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// A structured snapshot of a wrapper's lifecycle state, replacing the
/// original's ad hoc JSON debug dumpers (spec §9).
#[derive(Debug, Clone, Serialize)]
pub struct RoleDescription {
    pub kind: RoleKind,
    pub required: bool,
    pub deployed: bool,
    pub ref_count: u32,
    pub mode: ProcessMode,
}

impl RoleWrapper {
    pub fn new(
        kind: RoleKind,
        data_dir: &std::path::Path,
        funcs: Arc<dyn RoleFuncs>,
        stopping: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name: kind.dir_name().to_string(),
            data_path: data_dir.join(kind.dir_name()),
            kind,
            required: AtomicBool::new(false),
            ref_count: AtomicU32::new(0),
            latch: RwLock::new(Latched {
                deployed: false,
                role_state: None,
                handlers: HashMap::new(),
            }),
            proc: Mutex::new(ProcInfo::default()),
            funcs,
            stopping,
        }
    }

    pub fn is_required(&self) -> bool {
        self.required.load(Ordering::Acquire)
    }

    pub fn set_required(&self, value: bool) {
        self.required.store(value, Ordering::Release);
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count.load(Ordering::Acquire)
    }

    /// The role's operation set, for callers (the dispatcher's lifecycle
    /// path) that need to invoke `create`/`drop_role`/`handlers` directly
    /// rather than through `open`/`close`.
    pub(crate) fn funcs(&self) -> &Arc<dyn RoleFuncs> {
        &self.funcs
    }

    /// Take a read-latch, test `deployed`, atomically increment
    /// `ref_count`, release the latch. O(1), never blocks on I/O.
    pub async fn acquire(self: &Arc<Self>) -> NodeResult<RoleRef> {
        if self.stopping.load(Ordering::Acquire) {
            return Err(NodeError::NodeStopping);
        }
        let guard = self.latch.read().await;
        if !guard.deployed {
            return Err(NodeError::NodeNotDeployed(self.kind));
        }
        let state = guard.role_state.clone();
        self.ref_count.fetch_add(1, Ordering::AcqRel);
        drop(guard);
        Ok(RoleRef {
            wrapper: self.clone(),
            state,
            released: false,
        })
    }

    /// Identical to `acquire`, except it also succeeds when the wrapper is
    /// not yet deployed but the current process is the parent and the role
    /// is required — routing startup-phase messages into a child before its
    /// `deployed` bit is visible to the parent.
    pub async fn mark(self: &Arc<Self>, is_parent: bool) -> NodeResult<RoleRef> {
        if self.stopping.load(Ordering::Acquire) {
            return Err(NodeError::NodeStopping);
        }
        let guard = self.latch.read().await;
        let startup_forward = !guard.deployed && is_parent && self.is_required();
        if !guard.deployed && !startup_forward {
            return Err(NodeError::NodeNotDeployed(self.kind));
        }
        let state = guard.role_state.clone();
        self.ref_count.fetch_add(1, Ordering::AcqRel);
        drop(guard);
        Ok(RoleRef {
            wrapper: self.clone(),
            state,
            released: false,
        })
    }

    /// Open the role: call `funcs.open`; on success, mark deployed, persist
    /// the deployed bit, and register the role's declared handlers.
    pub async fn open(self: &Arc<Self>) -> NodeResult<()> {
        let mut guard = self.latch.write().await;
        if guard.deployed {
            return Err(NodeError::NodeAlreadyDeployed(self.kind));
        }
        tokio::fs::create_dir_all(&self.data_path).await?;
        let data_path_str = self.data_path.to_string_lossy().to_string();
        let state = self.funcs.open(&data_path_str).await?;

        let mut handlers = HashMap::new();
        for binding in self.funcs.handlers() {
            handlers.insert(binding.msg_type, binding);
        }

        guard.deployed = true;
        guard.role_state = Some(state.clone());
        guard.handlers = handlers;
        self.persist_deployed_bit(true).await?;
        drop(guard);

        debug!(role = %self.kind, "role opened");
        self.funcs.start(state).await?;
        Ok(())
    }

    /// Close the role: clear `deployed` under the write-latch, spin-wait
    /// for `ref_count` to drain to zero, then call `funcs.close`.
    pub async fn close(self: &Arc<Self>) -> NodeResult<()> {
        let mut guard = self.latch.write().await;
        if !guard.deployed {
            return Ok(());
        }
        guard.deployed = false;

        let mut spins: u32 = 0;
        while self.ref_count.load(Ordering::Acquire) != 0 {
            spins += 1;
            if spins % 1000 == 0 {
                warn!(role = %self.kind, ref_count = self.ref_count(), "close still draining references");
            }
            tokio::task::yield_now().await;
        }

        let state = guard.role_state.take();
        guard.handlers.clear();
        self.persist_deployed_bit(false).await?;
        drop(guard);

        if let Some(state) = state {
            self.funcs.close(state).await?;
        }
        debug!(role = %self.kind, "role closed");
        Ok(())
    }

    /// The handler bound to `msg_type`, if any, plus its shard override.
    pub async fn handler_for(&self, msg_type: MsgType) -> Option<HandlerBinding> {
        self.latch.read().await.handlers.get(&msg_type).cloned()
    }

    async fn persist_deployed_bit(&self, deployed: bool) -> NodeResult<()> {
        let path = self.data_path.join("deployed.json");
        let tmp_path = self.data_path.join("deployed.json.tmp");
        let body = serde_json::to_vec(&DeployedBit { deployed })?;
        tokio::fs::write(&tmp_path, body).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    pub fn describe(&self) -> RoleDescription {
        // A `try_read` is sufficient for a diagnostic snapshot: if a writer
        // holds the latch, `deployed` is mid-transition and either value is
        // a defensible answer for a point-in-time read.
        let deployed = self
            .latch
            .try_read()
            .map(|g| g.deployed)
            .unwrap_or(false);
        RoleDescription {
            kind: self.kind,
            required: self.is_required(),
            deployed,
            ref_count: self.ref_count(),
            mode: self.proc.lock().mode,
        }
    }
}
