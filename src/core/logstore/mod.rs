//! The replicated log store: a thin adaptation of an append-only WAL onto
//! the consensus entry model (spec §4.4).

pub mod file_wal;

mod entry;
mod store;

pub use entry::{decode_body, encode, LogEntry, BEGIN_INDEX};
pub use file_wal::{FileWalAdapter, WalAdapter};
pub use store::{CommitIndexSource, LatencySampler, LogStore, LogStoreDescription};
