//! Built-in job handler implementations.

pub mod cleanup;
pub mod quota;

use async_trait::async_trait;

use authgate_core::error::{AppError, ErrorKind};

pub use cleanup::SessionCleanupJobHandler;
pub use quota::{QuotaRefreshJobHandler, QuotaResetJobHandler};

/// Trait for scheduled job implementations
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Name used in logs and schedule registration
    fn job_type(&self) -> &str;

    /// Run the job once. Returns the number of rows it touched.
    async fn execute(&self) -> Result<u64, JobExecutionError>;
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Permanent failure, the next run will hit it again
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// Transient failure, the next run may succeed
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(AppError),
}

impl From<AppError> for JobExecutionError {
    fn from(err: AppError) -> Self {
        match err.kind {
            kind if kind.is_retryable() => Self::Transient(err.message),
            ErrorKind::Validation | ErrorKind::Configuration | ErrorKind::ConstraintViolation => {
                Self::Permanent(err.message)
            }
            _ => Self::Internal(err),
        }
    }
}
