//! The network transport adapter interface (spec §4.5, §6).
//!
//! A real implementation is out of scope for this crate; [`LoopbackTransport`]
//! is an in-process double used by the dispatcher's own tests and by
//! embedders that want to exercise routing without a socket.

use async_trait::async_trait;

/// A wire message envelope as it arrives from the transport, already decoded
/// down to a type tag and shard id (spec §6).
#[derive(Debug, Clone)]
pub struct WireMessage {
    pub msg_type: u16,
    pub shard_id: Option<u32>,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request to another node's endpoint.
    async fn send_req(&self, dest_endpoint: &str, msg: WireMessage) -> std::io::Result<()>;

    /// Send a reply back to the originating client of an in-flight request.
    async fn send_rsp(&self, msg: WireMessage) -> std::io::Result<()>;

    /// Notify the transport that a peer link is broken, e.g. after a failed
    /// `send_req`, so it can drop cached connection state.
    fn register_broken_link(&self, dest_endpoint: &str);
}

/// An in-process transport double: `send_rsp` and `send_req` just record
/// their calls. Used by tests that exercise the dispatcher end to end
/// without a socket.
#[derive(Default)]
pub struct LoopbackTransport {
    pub sent_requests: parking_lot::Mutex<Vec<(String, WireMessage)>>,
    pub sent_responses: parking_lot::Mutex<Vec<WireMessage>>,
    pub broken_links: parking_lot::Mutex<Vec<String>>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send_req(&self, dest_endpoint: &str, msg: WireMessage) -> std::io::Result<()> {
        self.sent_requests
            .lock()
            .push((dest_endpoint.to_string(), msg));
        Ok(())
    }

    async fn send_rsp(&self, msg: WireMessage) -> std::io::Result<()> {
        self.sent_responses.lock().push(msg);
        Ok(())
    }

    fn register_broken_link(&self, dest_endpoint: &str) {
        self.broken_links.lock().push(dest_endpoint.to_string());
    }
}
