//! Role identity and deployment-mode types.

use serde::{Deserialize, Serialize};

/// The closed set of logical roles a node may host.
///
/// `Dnode` is the always-present root role that owns the others; it is
/// created implicitly by the dispatcher and never appears in a deployment's
/// role list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleKind {
    Dnode,
    Vnodes,
    Qnode,
    Snode,
    Mnode,
    Bnode,
}

impl RoleKind {
    /// All non-`Dnode` roles, in the dependency order the dispatcher opens
    /// them at startup: `Mnode -> Vnodes -> Qnode -> Snode -> Bnode`.
    pub const STARTUP_ORDER: [RoleKind; 5] = [
        RoleKind::Mnode,
        RoleKind::Vnodes,
        RoleKind::Qnode,
        RoleKind::Snode,
        RoleKind::Bnode,
    ];

    /// The on-disk directory name for this role, e.g. `<data_dir>/mnode`.
    pub fn dir_name(self) -> &'static str {
        match self {
            RoleKind::Dnode => "dnode",
            RoleKind::Vnodes => "vnode",
            RoleKind::Qnode => "qnode",
            RoleKind::Snode => "snode",
            RoleKind::Mnode => "mnode",
            RoleKind::Bnode => "bnode",
        }
    }
}

impl std::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// How this deployment was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProcessMode {
    /// Every role runs in-process.
    #[default]
    Single,
    /// This process is the parent in a multiprocess deployment; some roles
    /// run in child processes reached over shared memory.
    Parent,
    /// This process is a child hosting exactly one non-`Dnode` role.
    Child,
    /// An in-process test harness mode; behaves like `Single` but signals
    /// to test doubles that no real IPC or WAL is required.
    Test,
}

/// A shard identifier selecting a storage partition (`vgId` in the glossary).
pub type ShardId = u32;

/// A wire message type tag.
pub type MsgType = u16;
