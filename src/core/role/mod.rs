//! Role identity, the per-role operation set, and the latch-guarded wrapper
//! that owns a role's lifecycle (spec §3, §4.1).

mod funcs;
mod kind;
mod wrapper;

pub use funcs::{BoxFuture, HandlerBinding, HandlerFn, RoleFuncs, RoleState};
pub use kind::{MsgType, ProcessMode, RoleKind, ShardId};
pub use wrapper::{ProcInfo, RoleDescription, RoleRef, RoleWrapper};
