//! Session domain entities.

pub mod model;
pub mod request;
pub mod scope;

pub use model::Session;
pub use request::{CreateSession, SessionListFilter, UpdateSession};
pub use scope::{DeleteScope, ResolvedDeleteScope, SessionScope};
