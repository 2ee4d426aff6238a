//! Session admission and listing configuration.

use serde::{Deserialize, Serialize};

/// Session management configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How concurrent `create` calls against one scope are serialized.
    #[serde(default)]
    pub admission: AdmissionMode,
    /// Page size used when a list request does not name one.
    #[serde(default = "default_list_limit")]
    pub default_list_limit: u32,
    /// Upper bound applied to any requested page size.
    #[serde(default = "default_max_list_limit")]
    pub max_list_limit: u32,
    /// PostgreSQL `TO_CHAR` pattern for the formatted timestamp columns.
    #[serde(default = "default_time_layout")]
    pub time_layout: String,
    /// Cron expression for the expired session sweep.
    #[serde(default = "default_cleanup_cron")]
    pub cleanup_cron: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            admission: AdmissionMode::default(),
            default_list_limit: default_list_limit(),
            max_list_limit: default_max_list_limit(),
            time_layout: default_time_layout(),
            cleanup_cron: default_cleanup_cron(),
        }
    }
}

/// Admission strategy applied when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    /// Count, evict and insert inside one transaction holding a
    /// per-scope advisory lock. The scope never exceeds its limit.
    #[default]
    Strict,
    /// Run count, evict and insert as independent statements. Concurrent
    /// creates may leave a scope above its limit until the next create.
    Relaxed,
}

impl std::fmt::Display for AdmissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdmissionMode::Strict => write!(f, "strict"),
            AdmissionMode::Relaxed => write!(f, "relaxed"),
        }
    }
}

fn default_list_limit() -> u32 {
    10
}

fn default_max_list_limit() -> u32 {
    1000
}

fn default_time_layout() -> String {
    "YYYY-MM-DD HH24:MI:SS".to_string()
}

fn default_cleanup_cron() -> String {
    "0 */15 * * * *".to_string()
}
