//! Scenario 5 from the testable-properties list, run against the real
//! file-backed WAL adapter rather than the in-memory test double used by
//! the log store's own unit tests.

use std::sync::Arc;

use nodecore::core::logstore::{FileWalAdapter, LogEntry, LogStore};

fn entry(index: u64, term: u64, bytes: &[u8]) -> LogEntry {
    LogEntry {
        index,
        term,
        entry_type: 0,
        bytes: bytes.to_vec(),
    }
}

#[tokio::test]
async fn append_truncate_reappend_round_trips_through_the_real_wal() {
    let tmp = tempfile::tempdir().unwrap();
    let wal = Arc::new(FileWalAdapter::open(tmp.path()).await.unwrap());
    let store = LogStore::new(wal, None);

    store.append(entry(1, 1, b"a")).await.unwrap();
    store.append(entry(2, 1, b"bb")).await.unwrap();
    store.append(entry(3, 2, b"ccc")).await.unwrap();
    assert_eq!(store.last_index(), 3);
    assert_eq!(store.last_term().await, 2);
    assert_eq!(store.get(1).await.unwrap().bytes, b"a");
    assert_eq!(store.get(3).await.unwrap().bytes, b"ccc");

    store.truncate(2).await.unwrap();
    assert_eq!(store.last_index(), 1);
    assert!(store.get(2).await.is_err());

    store.append(entry(2, 3, b"d")).await.unwrap();
    assert_eq!(store.get(2).await.unwrap().term, 3);
    assert_eq!(store.get(2).await.unwrap().bytes, b"d");
}

#[tokio::test]
async fn reopening_the_same_directory_rebuilds_the_index() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let wal = Arc::new(FileWalAdapter::open(tmp.path()).await.unwrap());
        let store = LogStore::new(wal, None);
        store.append(entry(1, 1, b"a")).await.unwrap();
        store.append(entry(2, 1, b"bb")).await.unwrap();
    }

    let wal = Arc::new(FileWalAdapter::open(tmp.path()).await.unwrap());
    let store = LogStore::new(wal, None);
    assert_eq!(store.last_index(), 2);
    assert_eq!(store.get(1).await.unwrap().bytes, b"a");
    assert_eq!(store.get(2).await.unwrap().bytes, b"bb");
}
