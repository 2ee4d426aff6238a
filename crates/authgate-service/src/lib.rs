//! # authgate-service
//!
//! Service layer for Authgate. Each service wraps a store trait from
//! `authgate-database` and runs every store call under the caller's
//! [`RequestContext`] deadline.
//!
//! Services follow constructor injection: stores are provided at
//! construction time as `Arc<dyn ..>` trait objects.

pub mod context;
pub mod quota;
pub mod session;

pub use context::RequestContext;
pub use quota::QuotaService;
pub use session::{CreateSessionRequest, SessionService};
