//! Session entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::scope::SessionScope;

/// A live login session.
///
/// Sessions are admitted per scope key (client type, auth user,
/// environment) and removed on explicit deletion, expiry sweeps or
/// eviction by a newer session in the same scope.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    /// Unique session identifier.
    pub id: Uuid,
    /// Project the session is bound to.
    pub project_id: Option<Uuid>,
    /// Client type that opened the session.
    pub client_type_id: Option<Uuid>,
    /// The user this session belongs to.
    pub user_id: Uuid,
    /// Identity used by the auth flow; part of the scope key.
    pub user_id_auth: Option<Uuid>,
    /// Role granted for the session.
    pub role_id: Option<Uuid>,
    /// Environment the session is bound to; `None` is its own scope.
    pub env_id: Option<Uuid>,
    /// IP address the session was opened or last refreshed from.
    pub ip: String,
    /// Opaque payload owned by the caller.
    pub data: String,
    /// Set on every update, never on create.
    pub is_changed: bool,
    /// When the session expires.
    pub expires_at: DateTime<Utc>,
    /// Creation time, formatted with the configured time layout.
    pub created_at: String,
    /// Last update time, formatted with the configured time layout.
    pub updated_at: String,
}

impl Session {
    /// Check whether the session has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// The scope key this session competes in, when fully populated.
    pub fn scope(&self) -> Option<SessionScope> {
        Some(SessionScope {
            client_type_id: self.client_type_id?,
            user_id_auth: self.user_id_auth?,
            env_id: self.env_id,
        })
    }
}
