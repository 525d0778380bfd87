//! `Node`: the top-level container owning every role wrapper, the
//! show-session cache, and the background sweeper (spec §3 "Node").

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use crate::config::NodeConfig;
use crate::core::adapters::{ShmChannel, Transport};
use crate::core::dispatcher::Dispatcher;
use crate::core::role::{RoleFuncs, RoleKind};
use crate::core::show::ShowSessionCache;
use crate::errors::{NodeError, NodeResult};

/// Node-wide lifecycle phase, distinct from any individual role's
/// `deployed` bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Init,
    Running,
    Stopped,
}

/// Persisted `<data_dir>/dnode.json` identity record (spec §6).
#[derive(Debug, Serialize, Deserialize)]
struct NodeIdentity {
    cluster_id: String,
    node_id: u64,
    local_endpoint: String,
    first_endpoint: Option<String>,
}

/// A single server process hosting some subset of the six roles.
pub struct Node {
    pub cluster_id: String,
    pub node_id: u64,
    pub local_endpoint: String,
    pub first_endpoint: Option<String>,
    pub data_dir: PathBuf,
    status: parking_lot::RwLock<NodeStatus>,
    stopping: Arc<AtomicBool>,
    dispatcher: Dispatcher,
    show_cache: Arc<ShowSessionCache>,
    sweeper: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
    // Held for the node's lifetime; its `Drop` releases the advisory lock.
    _running_lock: std::fs::File,
}

impl Node {
    /// Acquire `<data_dir>/.running`, write `dnode.json`, build the
    /// dispatcher, decide+open required roles, and start the show-session
    /// sweeper. Fails fast if another node instance already holds the lock.
    pub async fn start(
        config: &NodeConfig,
        role_funcs: Vec<Arc<dyn RoleFuncs>>,
        transport: Arc<dyn Transport>,
        shm: Option<Arc<dyn ShmChannel>>,
        child_hosted_role: Option<RoleKind>,
    ) -> NodeResult<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;

        let lock_path = config.data_dir.join(".running");
        let running_lock = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;
        FileExt::try_lock_exclusive(&running_lock).map_err(|_| {
            NodeError::Internal(format!(
                "another node instance already holds {}",
                lock_path.display()
            ))
        })?;

        Self::persist_identity(&config.data_dir, config).await?;

        let stopping = Arc::new(AtomicBool::new(false));
        let dispatcher = Dispatcher::new(
            config.deployment_mode,
            &config.data_dir,
            role_funcs,
            transport,
            shm,
            stopping.clone(),
            child_hosted_role,
        );
        dispatcher.start().await?;

        let show_cache = Arc::new(ShowSessionCache::new(config.show_session_ttl()));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let sweeper = show_cache
            .clone()
            .spawn_sweeper(config.shell_activity_timer, shutdown_rx);

        info!(node_id = config.node_id, "node started");

        Ok(Self {
            cluster_id: config.cluster_id.clone(),
            node_id: config.node_id,
            local_endpoint: config.local_endpoint.clone(),
            first_endpoint: config.first_endpoint.clone(),
            data_dir: config.data_dir.clone(),
            status: parking_lot::RwLock::new(NodeStatus::Running),
            stopping,
            dispatcher,
            show_cache,
            sweeper: tokio::sync::Mutex::new(Some(sweeper)),
            shutdown_tx,
            _running_lock: running_lock,
        })
    }

    async fn persist_identity(data_dir: &Path, config: &NodeConfig) -> NodeResult<()> {
        let identity = NodeIdentity {
            cluster_id: config.cluster_id.clone(),
            node_id: config.node_id,
            local_endpoint: config.local_endpoint.clone(),
            first_endpoint: config.first_endpoint.clone(),
        };
        let path = data_dir.join("dnode.json");
        let tmp_path = data_dir.join("dnode.json.tmp");
        tokio::fs::write(&tmp_path, serde_json::to_vec(&identity)?).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    pub fn status(&self) -> NodeStatus {
        *self.status.read()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn show_cache(&self) -> &Arc<ShowSessionCache> {
        &self.show_cache
    }

    /// Set `event = Stop`: new `acquire`/`mark` calls on every role fail
    /// fast with `NodeStopping` while in-flight handlers finish undisturbed
    /// (spec §5, "Cancellation"), then close every deployed role and stop
    /// the sweeper.
    pub async fn shutdown(&self) -> NodeResult<()> {
        *self.status.write() = NodeStatus::Stopped;
        self.stopping.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());

        self.dispatcher.shutdown().await?;

        if let Some(sweeper) = self.sweeper.lock().await.take() {
            sweeper.abort();
        }
        info!(node_id = self.node_id, "node stopped");
        Ok(())
    }
}
