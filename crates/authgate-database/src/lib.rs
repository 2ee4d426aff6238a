//! # authgate-database
//!
//! PostgreSQL connection management, named-parameter query binding and
//! the repositories behind session admission and API key quota
//! accounting.

pub mod connection;
pub mod error;
pub mod migration;
pub mod query;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use store::{QuotaTracker, SessionStore};
