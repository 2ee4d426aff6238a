//! API key usage repository implementation.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{debug, info};

use authgate_core::error::AppError;
use authgate_core::result::AppResult;
use authgate_entity::api_key::{ApiKey, ApiKeyUsage};
use authgate_entity::api_key::usage::month_start;

use crate::error::db_err;
use crate::store::QuotaTracker;

/// First day of the current month in the database's time zone.
const CURRENT_MONTH: &str = "date_trunc('month', NOW())::date";

/// Repository for monthly API key counters and the limit-reached flag.
#[derive(Debug, Clone)]
pub struct ApiKeyUsageRepository {
    pool: PgPool,
}

impl ApiKeyUsageRepository {
    /// Create a new API key usage repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn require_key(api_key: &str) -> AppResult<()> {
    if api_key.trim().is_empty() {
        return Err(AppError::validation("api_key is required"));
    }
    Ok(())
}

#[async_trait]
impl QuotaTracker for ApiKeyUsageRepository {
    async fn check_limit(&self, api_key: &str) -> AppResult<bool> {
        require_key(api_key)?;

        let key = sqlx::query_as::<_, ApiKey>(
            "SELECT id, app_id, rps_limit, monthly_request_limit, \
                    is_monthly_request_limit_reached, created_at, updated_at \
             FROM api_keys WHERE app_id = $1",
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to check API key limit"))?
        .ok_or_else(|| AppError::not_found("API key not found"))?;

        Ok(key.is_monthly_request_limit_reached)
    }

    async fn create(&self, api_key: &str) -> AppResult<()> {
        require_key(api_key)?;

        sqlx::query(&format!(
            "INSERT INTO api_key_usage (api_key, creation_month) VALUES ($1, {CURRENT_MONTH}) \
             ON CONFLICT (api_key, creation_month) DO NOTHING"
        ))
        .bind(api_key)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to create API key usage"))?;
        Ok(())
    }

    async fn upsert(&self, api_key: &str, delta: i64) -> AppResult<()> {
        require_key(api_key)?;
        if delta <= 0 {
            return Err(AppError::validation(format!(
                "request count delta must be positive, got {delta}"
            )));
        }

        sqlx::query(&format!(
            "INSERT INTO api_key_usage (api_key, request_count, creation_month) \
             VALUES ($1, $2, {CURRENT_MONTH}) \
             ON CONFLICT (api_key, creation_month) DO UPDATE SET \
                request_count = api_key_usage.request_count + EXCLUDED.request_count"
        ))
        .bind(api_key)
        .bind(delta)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to upsert API key usage"))?;

        debug!(delta, "API key usage recorded");
        Ok(())
    }

    async fn update_monthly_limit(&self) -> AppResult<u64> {
        let result = sqlx::query(&format!(
            "UPDATE api_keys AS k SET is_monthly_request_limit_reached = TRUE, updated_at = NOW() \
             FROM api_key_usage AS u \
             WHERE u.api_key = k.app_id \
               AND u.creation_month = {CURRENT_MONTH} \
               AND k.monthly_request_limit > 0 \
               AND u.request_count >= k.monthly_request_limit \
               AND NOT k.is_monthly_request_limit_reached"
        ))
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to flag API keys over their monthly limit"))?;

        info!(rows = result.rows_affected(), "Monthly request limits refreshed");
        Ok(result.rows_affected())
    }

    async fn update_is_monthly_limit_reached(&self) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE api_keys SET is_monthly_request_limit_reached = FALSE, updated_at = NOW() \
             WHERE is_monthly_request_limit_reached",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to reset monthly limit flags"))?;

        info!(rows = result.rows_affected(), "Monthly request limit flags reset");
        Ok(result.rows_affected())
    }

    async fn get_usage(&self, api_key: &str, month: NaiveDate) -> AppResult<Option<ApiKeyUsage>> {
        sqlx::query_as::<_, ApiKeyUsage>(
            "SELECT api_key, request_count, creation_month, created_at FROM api_key_usage \
             WHERE api_key = $1 AND creation_month = $2",
        )
        .bind(api_key)
        .bind(month_start(month))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to find API key usage"))
    }
}
