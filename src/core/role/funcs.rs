//! The per-role operation set ("vtable" in the spec's terms) and the
//! type-erased role state it operates on.
//!
//! The spec's `role_state: opaque` plus a C-style `RoleFuncs` vtable becomes,
//! per the redesign notes, a single `Role` capability trait operating on a
//! shared, downcastable state object instead of raw pointers.

use crate::core::role::kind::{MsgType, RoleKind, ShardId};
use crate::errors::NodeResult;
use async_trait::async_trait;
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed, `'static` async handler future, since trait objects can't return
/// `impl Future` directly.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// The opened role's private state. Type-erased so the dispatcher can own
/// heterogeneous roles uniformly; a role's own handlers downcast it back to
/// their concrete type via [`RoleState::as_any`].
pub trait RoleState: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// A single `(msg_type, handler)` binding a role declares during `open`,
/// with an optional shard override for messages that must be steered to a
/// specific storage shard regardless of the envelope's own `shard_id`.
#[derive(Clone)]
pub struct HandlerBinding {
    pub msg_type: MsgType,
    pub shard_override: Option<ShardId>,
    pub handler: HandlerFn,
}

/// `handlers[msg_type](role_state, payload) -> reply bytes`.
pub type HandlerFn =
    Arc<dyn Fn(Arc<dyn RoleState>, Vec<u8>) -> BoxFuture<NodeResult<Vec<u8>>> + Send + Sync>;

/// The per-role operation set supplied by each concrete role implementation.
///
/// Mirrors the spec's `funcs: RoleFuncs` vtable (`open/close/create/drop/
/// is_required`) one to one, plus `start` and `handlers` which the spec's
/// prose calls out separately (§4.2, §3).
#[async_trait]
pub trait RoleFuncs: Send + Sync {
    fn kind(&self) -> RoleKind;

    /// Whether this deployment wants the role. Called once at startup.
    async fn is_required(&self) -> bool;

    /// Open the role, returning its private state on success.
    async fn open(&self, data_path: &str) -> NodeResult<Arc<dyn RoleState>>;

    /// Close the role. Called only after `ref_count` has drained to zero.
    async fn close(&self, state: Arc<dyn RoleState>) -> NodeResult<()>;

    /// Start any background work the role needs once opened (e.g. its own
    /// consensus loop). A no-op default for roles with nothing to start.
    async fn start(&self, _state: Arc<dyn RoleState>) -> NodeResult<()> {
        Ok(())
    }

    /// Handle a `CreateNodeReq` for this role kind.
    async fn create(&self, data_path: &str, input: &[u8]) -> NodeResult<()>;

    /// Handle a `DropNodeReq` for this role kind.
    async fn drop_role(&self, state: Arc<dyn RoleState>, input: &[u8]) -> NodeResult<()>;

    /// The `(msg_type, handler, shard_override)` bindings this role serves.
    /// Called once, immediately after a successful `open`.
    fn handlers(&self) -> Vec<HandlerBinding>;
}
