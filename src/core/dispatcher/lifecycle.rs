//! Create/drop lifecycle flows, serialized by the node-wide lifecycle mutex
//! (spec §4.2, "Lifecycle — create"/"Lifecycle — drop").

use super::Dispatcher;
use crate::core::role::RoleKind;
use crate::errors::{NodeError, NodeResult};
use tracing::Instrument;

pub(super) async fn create_role(
    dispatcher: &Dispatcher,
    kind: RoleKind,
    input: &[u8],
) -> NodeResult<()> {
    let span = tracing::info_span!("lifecycle", op = "create", role = %kind);
    async move {
        let wrapper = dispatcher.wrapper(kind)?;

        // Fast pre-check outside the mutex: already deployed is the common
        // "reject early" case and doesn't need the lifecycle mutex to detect.
        if wrapper.acquire().await.is_ok() {
            return Err(NodeError::NodeAlreadyDeployed(kind));
        }

        let _guard = dispatcher.lifecycle_mutex.lock().await;
        // Re-check now that we hold the mutex: another create may have
        // completed while we waited for it.
        if wrapper.acquire().await.is_ok() {
            return Err(NodeError::NodeAlreadyDeployed(kind));
        }

        tokio::fs::create_dir_all(&wrapper.data_path).await?;
        let data_path = wrapper.data_path.to_string_lossy().to_string();
        wrapper.funcs().create(&data_path, input).await?;
        wrapper.open().await?;
        wrapper.set_required(true);
        wrapper.proc.lock().mode = dispatcher.mode;
        Ok(())
    }
    .instrument(span)
    .await
}

pub(super) async fn drop_role(
    dispatcher: &Dispatcher,
    kind: RoleKind,
    input: &[u8],
) -> NodeResult<()> {
    let span = tracing::info_span!("lifecycle", op = "drop", role = %kind);
    async move {
        let wrapper = dispatcher.wrapper(kind)?;
        let r = wrapper.acquire().await?;

        let _guard = dispatcher.lifecycle_mutex.lock().await;
        let state = match r.state().cloned() {
            Some(s) => s,
            None => {
                r.release();
                return Err(NodeError::NodeNotDeployed(kind));
            }
        };

        let drop_outcome = wrapper.funcs().drop_role(state, input).await;
        r.release();
        drop_outcome?;

        wrapper.set_required(false);
        wrapper.close().await?;
        tokio::fs::remove_dir_all(&wrapper.data_path).await.ok();
        Ok(())
    }
    .instrument(span)
    .await
}
