//! The dispatcher: process-mode selection, message routing, and the
//! create/drop lifecycle flow (spec §4.2).

mod dnode;
mod lifecycle;
mod routing;

pub use dnode::{DnodeFuncs, DnodeState};

use crate::core::adapters::{ShmChannel, Transport};
use crate::core::role::{MsgType, ProcessMode, RoleDescription, RoleFuncs, RoleKind, RoleWrapper, ShardId};
use crate::errors::{NodeError, NodeResult};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::Mutex;
use tracing::info;

/// Owns every [`RoleWrapper`] for this node, the static `msg_type ->
/// RoleKind` routing table, and the node-wide lifecycle mutex.
pub struct Dispatcher {
    mode: ProcessMode,
    wrappers: HashMap<RoleKind, Arc<RoleWrapper>>,
    msg_table: HashMap<MsgType, RoleKind>,
    lifecycle_mutex: Mutex<()>,
    transport: Arc<dyn Transport>,
    shm: Option<Arc<dyn ShmChannel>>,
    #[allow(dead_code)]
    stopping: Arc<AtomicBool>,
    /// Set when this process was launched as a child hosting exactly one
    /// non-`Dnode` role; forces the synthesized `Dnode` wrapper's
    /// `required` to `false` at startup (spec §4.2 (a) override).
    child_hosted_role: Option<RoleKind>,
}

impl Dispatcher {
    pub fn new(
        mode: ProcessMode,
        data_dir: &Path,
        role_funcs: Vec<Arc<dyn RoleFuncs>>,
        transport: Arc<dyn Transport>,
        shm: Option<Arc<dyn ShmChannel>>,
        stopping: Arc<AtomicBool>,
        child_hosted_role: Option<RoleKind>,
    ) -> Self {
        let mut wrappers = HashMap::new();
        wrappers.insert(
            RoleKind::Dnode,
            Arc::new(RoleWrapper::new(
                RoleKind::Dnode,
                data_dir,
                Arc::new(DnodeFuncs),
                stopping.clone(),
            )),
        );
        for funcs in role_funcs {
            let kind = funcs.kind();
            wrappers.insert(
                kind,
                Arc::new(RoleWrapper::new(kind, data_dir, funcs, stopping.clone())),
            );
        }

        let mut msg_table = HashMap::new();
        for (kind, wrapper) in &wrappers {
            for binding in wrapper.funcs().handlers() {
                msg_table.insert(binding.msg_type, *kind);
            }
        }

        Self {
            mode,
            wrappers,
            msg_table,
            lifecycle_mutex: Mutex::new(()),
            transport,
            shm,
            stopping,
            child_hosted_role,
        }
    }

    fn wrapper(&self, kind: RoleKind) -> NodeResult<&Arc<RoleWrapper>> {
        self.wrappers
            .get(&kind)
            .ok_or_else(|| NodeError::Internal(format!("no wrapper registered for {kind}")))
    }

    /// Decide each wrapper's `required`, then open required wrappers in
    /// dependency order `Dnode -> Mnode -> Vnodes -> Qnode -> Snode ->
    /// Bnode` (spec §4.2 (a)-(b)).
    pub async fn start(&self) -> NodeResult<()> {
        for (kind, wrapper) in &self.wrappers {
            let required = wrapper.funcs().is_required().await;
            wrapper.set_required(required);
            info!(role = %kind, required, "role requirement decided");
        }

        if self.child_hosted_role.is_some() {
            self.wrapper(RoleKind::Dnode)?.set_required(false);
        }

        let dnode = self.wrapper(RoleKind::Dnode)?;
        if dnode.is_required() {
            dnode.open().await?;
        }
        for kind in RoleKind::STARTUP_ORDER {
            let wrapper = self.wrapper(kind)?;
            if wrapper.is_required() {
                wrapper.open().await?;
            }
        }
        Ok(())
    }

    /// Close every deployed role, in reverse startup order, draining
    /// outstanding references first (delegates to `RoleWrapper::close`).
    pub async fn shutdown(&self) -> NodeResult<()> {
        for kind in RoleKind::STARTUP_ORDER.iter().rev() {
            self.wrapper(*kind)?.close().await?;
        }
        self.wrapper(RoleKind::Dnode)?.close().await?;
        Ok(())
    }

    pub async fn route(
        &self,
        msg_type: MsgType,
        shard_id: Option<ShardId>,
        payload: Vec<u8>,
    ) -> NodeResult<Vec<u8>> {
        routing::route(self, msg_type, shard_id, payload).await
    }

    pub async fn create_role(&self, kind: RoleKind, input: &[u8]) -> NodeResult<()> {
        lifecycle::create_role(self, kind, input).await
    }

    pub async fn drop_role(&self, kind: RoleKind, input: &[u8]) -> NodeResult<()> {
        lifecycle::drop_role(self, kind, input).await
    }

    pub fn describe_all(&self) -> Vec<RoleDescription> {
        self.wrappers.values().map(|w| w.describe()).collect()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::adapters::LoopbackTransport;
    use crate::core::role::{BoxFuture, HandlerBinding, RoleState};
    use async_trait::async_trait;
    use std::any::Any;

    struct EchoState;
    impl RoleState for EchoState {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct EchoFuncs {
        kind: RoleKind,
        required: bool,
    }

    #[async_trait]
    impl RoleFuncs for EchoFuncs {
        fn kind(&self) -> RoleKind {
            self.kind
        }
        async fn is_required(&self) -> bool {
            self.required
        }
        async fn open(&self, _data_path: &str) -> NodeResult<Arc<dyn RoleState>> {
            Ok(Arc::new(EchoState))
        }
        async fn close(&self, _state: Arc<dyn RoleState>) -> NodeResult<()> {
            Ok(())
        }
        async fn create(&self, _data_path: &str, _input: &[u8]) -> NodeResult<()> {
            Ok(())
        }
        async fn drop_role(&self, _state: Arc<dyn RoleState>, _input: &[u8]) -> NodeResult<()> {
            Ok(())
        }
        fn handlers(&self) -> Vec<HandlerBinding> {
            vec![HandlerBinding {
                msg_type: 99,
                shard_override: None,
                handler: Arc::new(|_state, payload| -> BoxFuture<NodeResult<Vec<u8>>> {
                    Box::pin(async move { Ok(payload) })
                }),
            }]
        }
    }

    fn dispatcher(dir: &Path, required: bool) -> Dispatcher {
        Dispatcher::new(
            ProcessMode::Single,
            dir,
            vec![Arc::new(EchoFuncs {
                kind: RoleKind::Qnode,
                required,
            })],
            Arc::new(LoopbackTransport::default()),
            None,
            Arc::new(AtomicBool::new(false)),
            None,
        )
    }

    #[tokio::test]
    async fn route_invokes_the_declared_handler() {
        let tmp = tempfile::tempdir().unwrap();
        let d = dispatcher(tmp.path(), true);
        d.start().await.unwrap();

        let reply = d.route(99, None, b"hello".to_vec()).await.unwrap();
        assert_eq!(reply, b"hello");
    }

    #[tokio::test]
    async fn route_rejects_unknown_msg_type() {
        let tmp = tempfile::tempdir().unwrap();
        let d = dispatcher(tmp.path(), true);
        d.start().await.unwrap();

        let err = d.route(7, None, vec![]).await.unwrap_err();
        assert_eq!(err, NodeError::InvalidMsgType(7));
    }

    #[tokio::test]
    async fn route_fails_when_role_not_required_at_startup() {
        let tmp = tempfile::tempdir().unwrap();
        let d = dispatcher(tmp.path(), false);
        d.start().await.unwrap();

        let err = d.route(99, None, vec![]).await.unwrap_err();
        assert_eq!(err, NodeError::NodeNotDeployed(RoleKind::Qnode));
    }

    #[tokio::test]
    async fn create_then_duplicate_create_then_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let d = dispatcher(tmp.path(), false);
        d.start().await.unwrap();

        d.create_role(RoleKind::Qnode, &[]).await.unwrap();
        assert!(tmp.path().join("qnode").exists());

        let err = d.create_role(RoleKind::Qnode, &[]).await.unwrap_err();
        assert_eq!(err, NodeError::NodeAlreadyDeployed(RoleKind::Qnode));

        d.drop_role(RoleKind::Qnode, &[]).await.unwrap();
        assert!(!tmp.path().join("qnode").exists());

        let err = d.drop_role(RoleKind::Qnode, &[]).await.unwrap_err();
        assert_eq!(err, NodeError::NodeNotDeployed(RoleKind::Qnode));
    }

    #[tokio::test]
    async fn concurrent_create_has_exactly_one_winner() {
        let tmp = tempfile::tempdir().unwrap();
        let d = Arc::new(dispatcher(tmp.path(), false));
        d.start().await.unwrap();

        let d1 = d.clone();
        let d2 = d.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { d1.create_role(RoleKind::Qnode, &[]).await }),
            tokio::spawn(async move { d2.create_role(RoleKind::Qnode, &[]).await }),
        );
        let results = [r1.unwrap(), r2.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let already = results
            .iter()
            .filter(|r| matches!(r, Err(NodeError::NodeAlreadyDeployed(_))))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(already, 1);
        assert_eq!(d.wrapper(RoleKind::Qnode).unwrap().ref_count(), 0);
    }
}
