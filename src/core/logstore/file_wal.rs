//! The WAL adapter interface and a real, file-backed implementation (spec
//! §4.5 "WAL", §6 "Log-entry framing").

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use super::entry::{decode_body, encode, LogEntry};
use crate::errors::{NodeError, NodeResult};

/// The durable journal a [`LogStore`](super::store::LogStore) is built on.
/// `write`/`fsync`/`read`/`rollback`/`commit`/`last_ver` mirror the wire
/// names in spec §4.5 one to one.
#[async_trait]
pub trait WalAdapter: Send + Sync {
    async fn write(&self, entry: &LogEntry) -> NodeResult<()>;
    async fn fsync(&self) -> NodeResult<()>;
    async fn read(&self, index: u64) -> NodeResult<Option<LogEntry>>;
    async fn rollback(&self, from_index: u64) -> NodeResult<()>;
    async fn commit(&self, index: u64) -> NodeResult<()>;
    fn last_ver(&self) -> u64;
}

struct Record {
    offset: u64,
    len: u32,
}

struct Inner {
    file: File,
    index: BTreeMap<u64, Record>,
    committed: u64,
}

/// Single append-only file per role directory (`<data_dir>/<role>/wal/log`),
/// an in-memory `index -> (offset, len)` map rebuilt at open time, exactly
/// the append/truncate/random-read shape the teacher's AOF writer gives its
/// command log.
pub struct FileWalAdapter {
    inner: Mutex<Inner>,
}

impl FileWalAdapter {
    pub async fn open(dir: &Path) -> NodeResult<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path: PathBuf = dir.join("log");
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await?;

        let mut index = BTreeMap::new();
        let mut offset = 0u64;
        let mut reader = OpenOptions::new().read(true).open(&path).await?;
        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(NodeError::from(e)),
            }
            let body_len = u32::from_le_bytes(len_buf);
            let mut body = vec![0u8; body_len as usize];
            reader.read_exact(&mut body).await?;
            if let Some(entry) = decode_body(&body) {
                index.insert(
                    entry.index,
                    Record {
                        offset,
                        len: body_len,
                    },
                );
            }
            offset += 4 + body_len as u64;
        }

        file.seek(std::io::SeekFrom::End(0)).await?;
        Ok(Self {
            inner: Mutex::new(Inner {
                file,
                index,
                committed: 0,
            }),
        })
    }
}

#[async_trait]
impl WalAdapter for FileWalAdapter {
    async fn write(&self, entry: &LogEntry) -> NodeResult<()> {
        let mut inner = self.inner.lock().await;
        let offset = inner.file.stream_position().await?;
        let framed = encode(entry);
        inner
            .file
            .write_all(&framed)
            .await
            .map_err(|e| NodeError::Wal(e.to_string()))?;
        inner.index.insert(
            entry.index,
            Record {
                offset,
                len: (framed.len() - 4) as u32,
            },
        );
        Ok(())
    }

    async fn fsync(&self) -> NodeResult<()> {
        let inner = self.inner.lock().await;
        inner
            .file
            .sync_data()
            .await
            .map_err(|e| NodeError::Wal(e.to_string()))
    }

    async fn read(&self, index: u64) -> NodeResult<Option<LogEntry>> {
        let mut inner = self.inner.lock().await;
        let Some(record) = inner.index.get(&index) else {
            return Ok(None);
        };
        let (offset, len) = (record.offset, record.len);
        inner.file.seek(std::io::SeekFrom::Start(offset + 4)).await?;
        let mut body = vec![0u8; len as usize];
        inner.file.read_exact(&mut body).await?;
        inner.file.seek(std::io::SeekFrom::End(0)).await?;
        Ok(decode_body(&body))
    }

    async fn rollback(&self, from_index: u64) -> NodeResult<()> {
        let mut inner = self.inner.lock().await;
        let current_len = inner.file.stream_position().await?;
        let cutoff_offset = match inner.index.get(&from_index) {
            Some(record) => record.offset,
            // `from_index` has no record: either it's past the last
            // written entry (nothing to cut) or the log was already
            // truncated at or below it, so the current length is correct.
            None => current_len,
        };
        inner
            .file
            .set_len(cutoff_offset)
            .await
            .map_err(|e| NodeError::Wal(e.to_string()))?;
        inner.file.seek(std::io::SeekFrom::End(0)).await?;
        inner.index.retain(|idx, _| *idx < from_index);
        Ok(())
    }

    async fn commit(&self, index: u64) -> NodeResult<()> {
        self.inner.lock().await.committed = index;
        Ok(())
    }

    fn last_ver(&self) -> u64 {
        self.inner
            .try_lock()
            .ok()
            .and_then(|inner| inner.index.keys().next_back().copied())
            .unwrap_or(0)
    }
}
