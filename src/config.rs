//! Loads and validates node-level configuration: data directory, deployment
//! mode, and the timers that govern show-session eviction.
//!
//! Out of scope per the spec: the startup CLI that produces this config file
//! in the first place. This module only loads and validates it.

use crate::core::role::ProcessMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_shell_activity_timer() -> Duration {
    Duration::from_secs(10)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// Top-level node configuration, loaded from a TOML file with environment
/// overrides under the `NODECORE_` prefix (e.g. `NODECORE_PORT`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Cluster-wide identifier this node belongs to.
    pub cluster_id: String,
    /// This node's own identifier, unique within the cluster.
    pub node_id: u64,
    /// The endpoint other nodes use to reach this one.
    pub local_endpoint: String,
    /// The endpoint of the first node contacted to join the cluster, if any.
    #[serde(default)]
    pub first_endpoint: Option<String>,
    /// Root directory for all on-disk node and role state.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// How this deployment was launched: single process, multiprocess parent,
    /// multiprocess child, or an in-process test harness.
    #[serde(default)]
    pub deployment_mode: ProcessMode,
    /// Base unit for show-session TTL: a session is evicted after
    /// `6 * shell_activity_timer` with no retrieve.
    #[serde(with = "humantime_serde", default = "default_shell_activity_timer")]
    pub shell_activity_timer: Duration,
    /// `tracing` env-filter directive string, e.g. `"info,nodecore::core=debug"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl NodeConfig {
    /// Loads configuration from `path`, layering `NODECORE_*` environment
    /// variables on top of the file, matching the teacher's config-loading
    /// convention (file first, environment for overrides).
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("NODECORE").separator("__"))
            .build()?;
        let cfg: NodeConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.local_endpoint.is_empty() {
            anyhow::bail!("local_endpoint must not be empty");
        }
        if self.shell_activity_timer.is_zero() {
            anyhow::bail!("shell_activity_timer must be greater than zero");
        }
        Ok(())
    }

    /// Absolute eviction deadline duration for a freshly created show session.
    pub fn show_session_ttl(&self) -> Duration {
        self.shell_activity_timer * 6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_session_ttl_is_six_times_the_activity_timer() {
        let cfg = NodeConfig {
            cluster_id: "c1".into(),
            node_id: 1,
            local_endpoint: "127.0.0.1:6030".into(),
            first_endpoint: None,
            data_dir: default_data_dir(),
            deployment_mode: ProcessMode::Single,
            shell_activity_timer: Duration::from_secs(10),
            log_level: default_log_level(),
        };
        assert_eq!(cfg.show_session_ttl(), Duration::from_secs(60));
    }
}
