//! Request context carrying the caller's deadline.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use authgate_core::config::RequestConfig;
use authgate_core::result::AppResult;

/// Default deadline when no configuration is at hand.
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Context for one inbound call.
///
/// Built by the handler layer and passed into every service method so
/// each store operation runs under the caller's deadline. When the
/// deadline passes, the in-flight future is dropped. Stores that can
/// block on the server (strict session admission waiting on its scope
/// lock) cancel the running statement on drop; other statements are
/// bounded by the pool's `statement_timeout`.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id for logs.
    pub request_id: Uuid,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
    /// Instant after which the call is abandoned.
    pub deadline: Instant,
}

impl RequestContext {
    /// Creates a context whose deadline is `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            request_time: Utc::now(),
            deadline: Instant::now() + timeout,
        }
    }

    /// Creates a context with the configured default deadline.
    pub fn from_config(config: &RequestConfig) -> Self {
        Self::new(Duration::from_millis(config.default_timeout_ms))
    }

    /// Replaces the deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = deadline;
        self
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has already passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Runs `operation` until it completes or the deadline passes.
    ///
    /// An elapsed deadline yields `ErrorKind::Cancelled`.
    pub async fn run<T, F>(&self, operation: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        tokio::time::timeout_at(self.deadline, operation).await?
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authgate_core::error::{AppError, ErrorKind};

    #[tokio::test(start_paused = true)]
    async fn test_run_completes_before_deadline() {
        let ctx = RequestContext::new(Duration::from_secs(1));
        let value = ctx.run(async { Ok::<_, AppError>(7) }).await.expect("value");
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cancels_after_deadline() {
        let ctx = RequestContext::new(Duration::from_millis(50));
        let err = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, AppError>(())
            })
            .await
            .expect_err("deadline");
        assert_eq!(err.kind, ErrorKind::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_saturates() {
        let ctx = RequestContext::new(Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(20)).await;
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_from_config() {
        let config = RequestConfig {
            default_timeout_ms: 250,
        };
        let ctx = RequestContext::from_config(&config);
        assert!(ctx.remaining() <= Duration::from_millis(250));
    }
}
