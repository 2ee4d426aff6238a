//! Per-request deadline configuration.

use serde::{Deserialize, Serialize};

/// Deadline applied to store operations when the caller does not set one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Default deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    5000
}
