//! The synthesized root role. Every node owns a `Dnode` wrapper; no
//! embedding binary declares a `RoleFuncs` for it (spec §3, §4.2).

use crate::core::role::{HandlerBinding, RoleFuncs, RoleKind, RoleState};
use crate::errors::{NodeError, NodeResult};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

pub struct DnodeState;

impl RoleState for DnodeState {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `Dnode` is always required, has nothing to open or close, and declares
/// no message handlers of its own.
#[derive(Default)]
pub struct DnodeFuncs;

#[async_trait]
impl RoleFuncs for DnodeFuncs {
    fn kind(&self) -> RoleKind {
        RoleKind::Dnode
    }

    async fn is_required(&self) -> bool {
        true
    }

    async fn open(&self, _data_path: &str) -> NodeResult<Arc<dyn RoleState>> {
        Ok(Arc::new(DnodeState))
    }

    async fn close(&self, _state: Arc<dyn RoleState>) -> NodeResult<()> {
        Ok(())
    }

    async fn create(&self, _data_path: &str, _input: &[u8]) -> NodeResult<()> {
        Err(NodeError::Internal(
            "Dnode is synthesized at startup and cannot be created".into(),
        ))
    }

    async fn drop_role(&self, _state: Arc<dyn RoleState>, _input: &[u8]) -> NodeResult<()> {
        Err(NodeError::Internal("Dnode cannot be dropped".into()))
    }

    fn handlers(&self) -> Vec<HandlerBinding> {
        Vec::new()
    }
}
