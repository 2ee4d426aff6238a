//! API key quota entities.

pub mod model;
pub mod usage;

pub use model::ApiKey;
pub use usage::ApiKeyUsage;
