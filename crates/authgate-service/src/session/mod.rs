//! Session admission and management.

pub mod service;

pub use service::{CreateSessionRequest, SessionService};
