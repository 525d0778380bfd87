//! Message routing (spec §4.2, "Routing algorithm").

use super::Dispatcher;
use crate::core::adapters::ShmFrame;
use crate::core::role::{MsgType, ProcessMode, ShardId};
use crate::errors::{NodeError, NodeResult};
use tracing::Instrument;

pub(super) async fn route(
    dispatcher: &Dispatcher,
    msg_type: MsgType,
    shard_id: Option<ShardId>,
    payload: Vec<u8>,
) -> NodeResult<Vec<u8>> {
    let span = tracing::info_span!("dispatch", msg_type, shard_id = shard_id.unwrap_or(0));
    async move {
        let kind = *dispatcher
            .msg_table
            .get(&msg_type)
            .ok_or(NodeError::InvalidMsgType(msg_type))?;
        let wrapper = dispatcher.wrapper(kind)?;

        let is_parent = dispatcher.mode == ProcessMode::Parent;
        let r = wrapper.mark(is_parent).await?;

        let forwards_to_child = is_parent && wrapper.proc.lock().shm_handle.is_some();
        if forwards_to_child {
            let shm = dispatcher.shm.clone().ok_or_else(|| {
                NodeError::Internal("parent mode but no shared-memory channel configured".into())
            });
            let outcome = match shm {
                Ok(shm) => shm
                    .call(ShmFrame {
                        msg_type,
                        shard_id,
                        bytes: payload,
                    })
                    .await
                    .map(|frame| frame.bytes)
                    .map_err(|e| NodeError::Internal(e.to_string())),
                Err(e) => Err(e),
            };
            r.release();
            return outcome;
        }

        let binding = match wrapper.handler_for(msg_type).await {
            Some(b) => b,
            None => {
                r.release();
                return Err(NodeError::InvalidMsgType(msg_type));
            }
        };
        let state = match r.state().cloned() {
            Some(s) => s,
            None => {
                r.release();
                return Err(NodeError::NodeNotDeployed(kind));
            }
        };

        let outcome = (binding.handler)(state, payload).await;
        r.release();
        outcome
    }
    .instrument(span)
    .await
}
