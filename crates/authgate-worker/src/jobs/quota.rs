//! Monthly quota refresh and reset job handlers.

use std::time::Duration;

use async_trait::async_trait;
use tracing;

use authgate_service::{QuotaService, RequestContext};

use super::{JobExecutionError, JobHandler};

/// Flags API keys whose current-month usage reached their limit
#[derive(Debug, Clone)]
pub struct QuotaRefreshJobHandler {
    /// Quota service
    quota: QuotaService,
    /// Deadline for one run
    timeout: Duration,
}

impl QuotaRefreshJobHandler {
    /// Create a new quota refresh job handler
    pub fn new(quota: QuotaService, timeout: Duration) -> Self {
        Self { quota, timeout }
    }
}

#[async_trait]
impl JobHandler for QuotaRefreshJobHandler {
    fn job_type(&self) -> &str {
        "quota_refresh"
    }

    async fn execute(&self) -> Result<u64, JobExecutionError> {
        let ctx = RequestContext::new(self.timeout);
        let flagged = self.quota.refresh_monthly_limits(&ctx).await?;
        tracing::info!(flagged, "Quota refresh finished");
        Ok(flagged)
    }
}

/// Clears every limit-reached flag at the start of a billing period
#[derive(Debug, Clone)]
pub struct QuotaResetJobHandler {
    /// Quota service
    quota: QuotaService,
    /// Deadline for one run
    timeout: Duration,
}

impl QuotaResetJobHandler {
    /// Create a new quota reset job handler
    pub fn new(quota: QuotaService, timeout: Duration) -> Self {
        Self { quota, timeout }
    }
}

#[async_trait]
impl JobHandler for QuotaResetJobHandler {
    fn job_type(&self) -> &str {
        "quota_reset"
    }

    async fn execute(&self) -> Result<u64, JobExecutionError> {
        let ctx = RequestContext::new(self.timeout);
        let cleared = self.quota.reset_monthly_limits(&ctx).await?;
        tracing::info!(cleared, "Quota reset finished");
        Ok(cleared)
    }
}
