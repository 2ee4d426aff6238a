//! Repository implementations for sessions and API key usage.

pub mod api_key_usage;
pub mod session;

pub use api_key_usage::ApiKeyUsageRepository;
pub use session::SessionRepository;
