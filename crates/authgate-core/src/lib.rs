//! # authgate-core
//!
//! Core crate for Authgate. Contains configuration
//! schemas, bound query values, pagination and session limit types, and
//! the unified error system.
//!
//! This crate has **no** internal dependencies on other Authgate crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
