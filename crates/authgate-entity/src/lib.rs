//! # authgate-entity
//!
//! Domain entity models for Authgate. Every struct in this crate
//! represents a database table row or a request value object. Row
//! entities additionally derive `sqlx::FromRow`.

pub mod api_key;
pub mod session;
