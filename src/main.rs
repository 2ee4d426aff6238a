//! Authgate Server
//!
//! Main entry point that wires the store, services and scheduled jobs
//! together and runs until a shutdown signal arrives.

use std::sync::Arc;

use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use authgate_core::config::AppConfig;
use authgate_core::error::AppError;
use authgate_database::DatabasePool;
use authgate_database::repositories::{ApiKeyUsageRepository, SessionRepository};
use authgate_database::{QuotaTracker, SessionStore};
use authgate_service::{QuotaService, SessionService};
use authgate_worker::CronScheduler;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("AUTHGATE_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Authgate v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    tracing::info!("Connecting to database...");
    let db = DatabasePool::connect(&config.database).await?;
    if !db.health_check().await? {
        return Err(AppError::database("Database health check returned an unexpected value"));
    }

    tracing::info!("Running database migrations...");
    authgate_database::migration::run_migrations(db.pool()).await?;
    tracing::info!("Database migrations complete");

    // ── Step 2: Repositories ─────────────────────────────────────
    let session_store: Arc<dyn SessionStore> =
        Arc::new(SessionRepository::new(db.pool().clone(), &config.session));
    let quota_tracker: Arc<dyn QuotaTracker> =
        Arc::new(ApiKeyUsageRepository::new(db.pool().clone()));
    tracing::info!(admission = %config.session.admission, "Session admission configured");

    // ── Step 3: Services ─────────────────────────────────────────
    let session_service = SessionService::new(Arc::clone(&session_store));
    let quota_service = QuotaService::new(Arc::clone(&quota_tracker));
    tracing::debug!(?session_service, ?quota_service, "Services initialized");

    // ── Step 4: Scheduled jobs ───────────────────────────────────
    let mut scheduler = CronScheduler::new().await?;
    scheduler
        .register_default_tasks(&config, quota_service.clone(), Arc::clone(&session_store))
        .await?;
    scheduler.start().await?;

    tracing::info!("Authgate running, waiting for shutdown signal");

    // ── Step 5: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!("Scheduler shutdown failed: {}", e);
    }
    db.close().await;

    tracing::info!("Authgate shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
