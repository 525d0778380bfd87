//! Shared-memory parent/child channel (spec §4.5, §6).
//!
//! A parent process running [`ProcessMode::Parent`](crate::core::role::ProcessMode)
//! forwards requests for child-hosted roles over this channel instead of
//! invoking their handlers directly; a child forwards its replies back the
//! same way. Framing is `{len, msg_type, bytes}`, ordered and lossless per
//! direction, mirroring the spec's description of the real segment.
//!
//! A real POSIX/System V shared-memory backing is out of scope (spec §1);
//! [`InProcessShmChannel`] is an in-process double built on an mpsc channel,
//! used by tests and by single-binary embedders that want the `Parent`/
//! `Child` routing paths exercised without a second process.

use crate::core::role::{MsgType, ShardId};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::mpsc;

/// A single frame crossing the channel in either direction.
#[derive(Debug, Clone)]
pub struct ShmFrame {
    pub msg_type: MsgType,
    pub shard_id: Option<ShardId>,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait ShmChannel: Send + Sync {
    /// Forward a request frame to the other side and await its reply frame.
    async fn call(&self, frame: ShmFrame) -> std::io::Result<ShmFrame>;
}

/// An in-process double standing in for the real shared-memory segment.
///
/// Wraps a single bounded mpsc pair carrying `(request, reply_tx)`; a task
/// reading from `inbox` is expected to answer each request on its private
/// oneshot reply channel. Built this way, rather than as a raw byte ring,
/// because the spec's framing guarantee ("ordered, lossless, per direction")
/// is exactly what an mpsc channel already gives for free.
pub struct InProcessShmChannel {
    inbox_tx: mpsc::Sender<(ShmFrame, tokio::sync::oneshot::Sender<ShmFrame>)>,
    inbox_rx: Mutex<mpsc::Receiver<(ShmFrame, tokio::sync::oneshot::Sender<ShmFrame>)>>,
}

impl InProcessShmChannel {
    pub fn new(capacity: usize) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(capacity);
        Self {
            inbox_tx,
            inbox_rx: Mutex::new(inbox_rx),
        }
    }

    /// Receive the next forwarded frame, returning a responder to answer it.
    /// The responding side calls this in a loop; there is no requirement
    /// that replies come back in request order, only that each request gets
    /// exactly one reply.
    pub async fn recv(&self) -> Option<(ShmFrame, tokio::sync::oneshot::Sender<ShmFrame>)> {
        self.inbox_rx.lock().await.recv().await
    }
}

#[async_trait]
impl ShmChannel for InProcessShmChannel {
    async fn call(&self, frame: ShmFrame) -> std::io::Result<ShmFrame> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.inbox_tx
            .send((frame, reply_tx))
            .await
            .map_err(|_| std::io::Error::other("shm channel closed"))?;
        reply_rx
            .await
            .map_err(|_| std::io::Error::other("shm responder dropped without replying"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_request_and_reply() {
        let chan = std::sync::Arc::new(InProcessShmChannel::new(4));

        let responder = {
            let chan = chan.clone();
            tokio::spawn(async move {
                let (frame, reply_tx) = chan.recv().await.expect("request arrives");
                assert_eq!(frame.msg_type, 7);
                reply_tx
                    .send(ShmFrame {
                        msg_type: 7,
                        shard_id: frame.shard_id,
                        bytes: b"pong".to_vec(),
                    })
                    .ok();
            })
        };

        let reply = chan
            .call(ShmFrame {
                msg_type: 7,
                shard_id: Some(3),
                bytes: b"ping".to_vec(),
            })
            .await
            .expect("call succeeds");

        assert_eq!(reply.bytes, b"pong");
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn call_fails_once_the_other_side_is_gone() {
        let chan = InProcessShmChannel::new(1);
        drop(chan.inbox_rx.into_inner());

        let err = chan
            .call(ShmFrame {
                msg_type: 1,
                shard_id: None,
                bytes: vec![],
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::Other);
    }
}
