//! Scheduled background tasks for Authgate.
//!
//! This crate provides:
//! - A cron scheduler that runs job handlers on configured schedules
//! - Built-in handlers for monthly quota maintenance and expired session cleanup

pub mod jobs;
pub mod scheduler;

pub use jobs::{JobExecutionError, JobHandler};
pub use scheduler::CronScheduler;
