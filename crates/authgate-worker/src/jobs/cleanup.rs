//! Expired session cleanup job handler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing;

use authgate_database::SessionStore;
use authgate_service::RequestContext;

use super::{JobExecutionError, JobHandler};

/// Handles expired session cleanup
#[derive(Clone)]
pub struct SessionCleanupJobHandler {
    /// Session store
    sessions: Arc<dyn SessionStore>,
    /// Deadline for one run
    timeout: Duration,
}

impl std::fmt::Debug for SessionCleanupJobHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCleanupJobHandler")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SessionCleanupJobHandler {
    /// Create a new session cleanup job handler
    pub fn new(sessions: Arc<dyn SessionStore>, timeout: Duration) -> Self {
        Self { sessions, timeout }
    }
}

#[async_trait]
impl JobHandler for SessionCleanupJobHandler {
    fn job_type(&self) -> &str {
        "session_cleanup"
    }

    async fn execute(&self) -> Result<u64, JobExecutionError> {
        tracing::info!("Running session cleanup");

        let ctx = RequestContext::new(self.timeout);
        let count = ctx
            .run(self.sessions.delete_all_expired(Utc::now()))
            .await?;

        tracing::info!("Cleaned up {} expired sessions", count);
        Ok(count)
    }
}
