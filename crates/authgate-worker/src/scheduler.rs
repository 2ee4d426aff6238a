//! Cron scheduler for quota maintenance and session cleanup.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use authgate_core::config::AppConfig;
use authgate_core::error::AppError;
use authgate_database::SessionStore;
use authgate_service::QuotaService;

use crate::jobs::{
    JobExecutionError, JobHandler, QuotaRefreshJobHandler, QuotaResetJobHandler,
    SessionCleanupJobHandler,
};

/// Cron-based scheduler for periodic background tasks
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Names of the registered jobs
    registered: Vec<String>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler")
            .field("registered", &self.registered)
            .finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new() -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            registered: Vec::new(),
        })
    }

    /// Register the quota and session cleanup tasks from configuration
    pub async fn register_default_tasks(
        &mut self,
        config: &AppConfig,
        quota: QuotaService,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<(), AppError> {
        let timeout = Duration::from_millis(config.request.default_timeout_ms);

        if config.quota.enabled {
            self.register(
                &config.quota.refresh_cron,
                Arc::new(QuotaRefreshJobHandler::new(quota.clone(), timeout)),
            )
            .await?;
            self.register(
                &config.quota.reset_cron,
                Arc::new(QuotaResetJobHandler::new(quota, timeout)),
            )
            .await?;
        } else {
            tracing::info!("Quota jobs disabled");
        }

        self.register(
            &config.session.cleanup_cron,
            Arc::new(SessionCleanupJobHandler::new(sessions, timeout)),
        )
        .await?;

        tracing::info!(jobs = ?self.registered, "All scheduled tasks registered");
        Ok(())
    }

    /// Register one handler on a cron schedule
    pub async fn register(
        &mut self,
        schedule: &str,
        handler: Arc<dyn JobHandler>,
    ) -> Result<(), AppError> {
        let job_type = handler.job_type().to_string();
        let task = Arc::clone(&handler);
        let job = CronJob::new_async(schedule, move |_uuid, _lock| {
            let handler = Arc::clone(&task);
            Box::pin(async move {
                match handler.execute().await {
                    Ok(rows) => {
                        tracing::debug!(job = handler.job_type(), rows, "Scheduled job completed");
                    }
                    Err(JobExecutionError::Transient(e)) => {
                        tracing::warn!(job = handler.job_type(), "Scheduled job failed, will retry next run: {}", e);
                    }
                    Err(e) => {
                        tracing::error!(job = handler.job_type(), "Scheduled job failed: {}", e);
                    }
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid schedule '{}' for {}: {}",
                schedule, job_type, e
            ))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add {} schedule: {}", job_type, e))
        })?;

        tracing::info!("Registered: {} ({})", job_type, schedule);
        self.registered.push(job_type);
        Ok(())
    }

    /// Names of the registered jobs, in registration order
    pub fn registered(&self) -> &[String] {
        &self.registered
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}
