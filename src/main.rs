//! Entry point: load configuration, start a node, run until interrupted.
//!
//! This binary wires the core together with no role implementations of its
//! own — a real deployment supplies `RoleFuncs` for `Mnode`/`Vnodes`/
//! `Qnode`/`Snode`/`Bnode` and a real `Transport`; here the node runs with
//! only the synthesized `Dnode` role so the wiring itself stays testable
//! without that surrounding product.

use std::sync::Arc;

use nodecore::config::NodeConfig;
use nodecore::core::adapters::LoopbackTransport;
use nodecore::core::node::Node;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "nodecore.toml".to_string());
    let config = NodeConfig::from_file(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let node = Node::start(
        &config,
        Vec::new(),
        Arc::new(LoopbackTransport::default()),
        None,
        None,
    )
    .await?;

    tracing::info!(node_id = node.node_id, "running; press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    node.shutdown().await?;
    Ok(())
}
