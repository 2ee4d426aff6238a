//! API key usage recording and monthly limit maintenance.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use authgate_core::error::AppError;
use authgate_core::result::AppResult;
use authgate_database::QuotaTracker;
use authgate_entity::api_key::ApiKeyUsage;

use crate::context::RequestContext;

/// Quota service over any [`QuotaTracker`].
#[derive(Clone)]
pub struct QuotaService {
    /// Backing tracker.
    tracker: Arc<dyn QuotaTracker>,
}

impl std::fmt::Debug for QuotaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaService").finish()
    }
}

impl QuotaService {
    /// Creates a new quota service.
    pub fn new(tracker: Arc<dyn QuotaTracker>) -> Self {
        Self { tracker }
    }

    /// Whether the key has been flagged as over its monthly limit.
    pub async fn check_api_key_limit(&self, ctx: &RequestContext, api_key: &str) -> AppResult<bool> {
        ctx.run(self.tracker.check_limit(api_key)).await
    }

    /// Accumulates `count` requests against the key's current month.
    ///
    /// A zero count only makes sure the month's counter exists.
    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, count = count))]
    pub async fn record_api_key_usage(
        &self,
        ctx: &RequestContext,
        api_key: &str,
        count: i64,
    ) -> AppResult<()> {
        match count {
            0 => ctx.run(self.tracker.create(api_key)).await?,
            n if n > 0 => ctx.run(self.tracker.upsert(api_key, n)).await?,
            n => {
                return Err(AppError::validation(format!(
                    "request count {n} must not be negative"
                )));
            }
        }
        debug!(count, "API key usage recorded");
        Ok(())
    }

    /// The key's counter for the month containing `month`.
    pub async fn get_api_key_usage(
        &self,
        ctx: &RequestContext,
        api_key: &str,
        month: NaiveDate,
    ) -> AppResult<Option<ApiKeyUsage>> {
        ctx.run(self.tracker.get_usage(api_key, month)).await
    }

    /// Flags every key whose usage this month reached its limit.
    pub async fn refresh_monthly_limits(&self, ctx: &RequestContext) -> AppResult<u64> {
        let flagged = ctx.run(self.tracker.update_monthly_limit()).await?;
        info!(flagged, "Monthly limits refreshed");
        Ok(flagged)
    }

    /// Clears every reached flag for a new billing period.
    pub async fn reset_monthly_limits(&self, ctx: &RequestContext) -> AppResult<u64> {
        let cleared = ctx.run(self.tracker.update_is_monthly_limit_reached()).await?;
        info!(cleared, "Monthly limits reset");
        Ok(cleared)
    }
}
