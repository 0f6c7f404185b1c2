//! # Composer Configuration
//!
//! Node mode, lock timeout and light-vendor settings for the composer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Light vendor method returning parents, last ball and round index.
pub const DEFAULT_VENDOR_METHOD: &str = "light/get_parents_and_last_ball_and_powcount";

/// Round index stamped on genesis units.
pub const DEFAULT_GENESIS_ROUND_INDEX: u64 = 1;

/// Whether this node keeps the DAG locally or asks a light vendor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    /// Parents and last ball come from the local ledger.
    #[default]
    Full,
    /// Parents and last ball are fetched from a light vendor.
    Light,
}

impl NodeMode {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeMode::Full => "full",
            NodeMode::Light => "light",
        }
    }
}

/// Composer configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Full or light node.
    pub mode: NodeMode,

    /// Give up waiting for address locks after this many seconds.
    /// `None` waits indefinitely.
    pub lock_timeout_secs: Option<u64>,

    /// Method name sent to the light vendor.
    pub vendor_method: String,

    /// Round index for genesis units.
    pub genesis_round_index: u64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            mode: NodeMode::Full,
            lock_timeout_secs: None,
            vendor_method: DEFAULT_VENDOR_METHOD.to_string(),
            genesis_round_index: DEFAULT_GENESIS_ROUND_INDEX,
        }
    }
}

impl ComposerConfig {
    /// Create a config for testing (bounded lock wait).
    pub fn for_testing() -> Self {
        Self {
            lock_timeout_secs: Some(5),
            ..Self::default()
        }
    }

    /// Light-node config with defaults for everything else.
    pub fn light() -> Self {
        Self {
            mode: NodeMode::Light,
            ..Self::default()
        }
    }

    /// Lock timeout as a duration.
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_secs.map(Duration::from_secs)
    }
}
