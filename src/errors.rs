//! The primary error type for the node-management core.

use std::sync::Arc;
use thiserror::Error;

/// All failures the dispatcher, show-session cache, and log store can surface.
///
/// Mirrors the error kinds enumerated in the node-management spec (§7) one to
/// one, so a caller can match on `NodeError` instead of re-deriving the
/// mapping from prose.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("node not deployed: {0:?}")]
    NodeNotDeployed(crate::core::role::RoleKind),

    #[error("node already deployed: {0:?}")]
    NodeAlreadyDeployed(crate::core::role::RoleKind),

    #[error("no handler registered for message type {0}")]
    InvalidMsgType(u16),

    #[error("invalid or expired show object: {0}")]
    InvalidShowObject(u64),

    #[error("out of memory")]
    OutOfMemory,

    #[error("WAL error: {0}")]
    Wal(String),

    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("node is stopping")]
    NodeStopping,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for NodeError {
    fn from(e: std::io::Error) -> Self {
        NodeError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(e: serde_json::Error) -> Self {
        NodeError::Internal(format!("JSON (de)serialization error: {e}"))
    }
}

impl PartialEq for NodeError {
    fn eq(&self, other: &Self) -> bool {
        use NodeError::*;
        match (self, other) {
            (NodeNotDeployed(a), NodeNotDeployed(b)) => a == b,
            (NodeAlreadyDeployed(a), NodeAlreadyDeployed(b)) => a == b,
            (InvalidMsgType(a), InvalidMsgType(b)) => a == b,
            (InvalidShowObject(a), InvalidShowObject(b)) => a == b,
            (OutOfMemory, OutOfMemory) => true,
            (Wal(a), Wal(b)) => a == b,
            (Io(a), Io(b)) => a.to_string() == b.to_string(),
            (NodeStopping, NodeStopping) => true,
            (Config(a), Config(b)) => a == b,
            (Internal(a), Internal(b)) => a == b,
            _ => false,
        }
    }
}

pub type NodeResult<T> = Result<T, NodeError>;
