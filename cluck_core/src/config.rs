//! TOML configuration for a Cluck node.
//!
//! Every field has a default, so an absent file or an empty table yields a
//! working setup. The standard lookup order is the working directory, the
//! user config directory, then the system-wide location.

use crate::communication::CluckNode;
use crate::error::{CluckError, CluckResult};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Node-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CluckConfig {
    /// Trace every routed message at debug level.
    pub trace_all: bool,
    /// Throttle window for missing-link warnings and negative-ack replies.
    pub missing_link_warn_interval_ms: u64,
    /// Timeout applied to RPC calls made without an explicit one.
    pub default_rpc_timeout_ms: u64,
}

impl Default for CluckConfig {
    fn default() -> CluckConfig {
        CluckConfig {
            trace_all: false,
            missing_link_warn_interval_ms: 1000,
            default_rpc_timeout_ms: 1000,
        }
    }
}

impl CluckConfig {
    /// Parse a configuration file.
    pub fn from_file(path: &Path) -> CluckResult<CluckConfig> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|err| CluckError::Config(err.to_string()))
    }

    /// Load the first configuration file found in the standard locations, or
    /// the defaults when none exists.
    pub fn find_and_load() -> CluckResult<CluckConfig> {
        for path in Self::standard_paths() {
            if path.exists() {
                info!("loading configuration from {}", path.display());
                return Self::from_file(&path);
            }
            debug!("no configuration at {}", path.display());
        }
        Ok(CluckConfig::default())
    }

    fn standard_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("cluck.toml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".cluck").join("config.toml"));
        }
        paths.push(PathBuf::from("/etc/cluck/config.toml"));
        paths
    }

    /// Apply these settings to a node.
    pub fn apply(&self, node: &CluckNode) {
        node.set_trace_all(self.trace_all);
        node.set_missing_link_warn_interval(Duration::from_millis(
            self.missing_link_warn_interval_ms,
        ));
    }

    /// The default RPC timeout as a [`Duration`].
    pub fn default_rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.default_rpc_timeout_ms)
    }
}
