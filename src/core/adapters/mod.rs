//! External collaborator interfaces (spec §4.5): transport, parent/child
//! shared-memory IPC, and the WAL adapter the log store is built on.
//!
//! These are modeled as traits so the dispatcher and log store are testable
//! without a real network stack or a real shared-memory segment. A real
//! transport and a real multiprocess shared-memory channel are out of scope
//! (spec §1); a real file-backed WAL adapter is in scope and lives in
//! [`crate::core::logstore::file_wal`].

mod shm;
mod transport;

pub use shm::{InProcessShmChannel, ShmChannel, ShmFrame};
pub use transport::{LoopbackTransport, Transport, WireMessage};
