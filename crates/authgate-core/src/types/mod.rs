//! Core type definitions used across the Authgate workspace.

pub mod filter;
pub mod pagination;
pub mod session_limit;

pub use filter::FilterValue;
pub use pagination::{OffsetPage, Paged};
pub use session_limit::SessionLimit;
