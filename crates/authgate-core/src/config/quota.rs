//! API key quota accounting configuration.

use serde::{Deserialize, Serialize};

/// Schedules for the monthly quota batch operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Whether the quota jobs are registered with the scheduler.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron expression for flagging keys that reached their monthly limit.
    #[serde(default = "default_refresh_cron")]
    pub refresh_cron: String,
    /// Cron expression for clearing the reached flags at a new period.
    #[serde(default = "default_reset_cron")]
    pub reset_cron: String,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_cron: default_refresh_cron(),
            reset_cron: default_reset_cron(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_refresh_cron() -> String {
    "0 */5 * * * *".to_string()
}

fn default_reset_cron() -> String {
    "0 0 0 1 * *".to_string()
}
