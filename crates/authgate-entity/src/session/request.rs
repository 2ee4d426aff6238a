//! Request value objects for session writes and listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use authgate_core::types::{OffsetPage, SessionLimit};

use super::scope::SessionScope;

/// Data required to admit a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
    /// Scope the session competes in.
    pub scope: SessionScope,
    /// Capacity bound for the scope.
    pub limit: SessionLimit,
    /// The user this session belongs to.
    pub user_id: Uuid,
    /// Project the session is bound to.
    pub project_id: Option<Uuid>,
    /// Role granted for the session.
    pub role_id: Option<Uuid>,
    /// IP address of the client.
    pub ip: String,
    /// Opaque payload.
    pub data: String,
    /// When the session expires.
    pub expires_at: DateTime<Utc>,
}

/// A sparse session update.
///
/// `ip` and `expires_at` are always rewritten. Every optional field is
/// only written when present and non-empty; omitted fields keep their
/// stored value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSession {
    /// Session to update.
    pub id: Uuid,
    /// New client IP.
    pub ip: String,
    /// New expiry.
    pub expires_at: DateTime<Utc>,
    /// New project.
    #[serde(default)]
    pub project_id: Option<Uuid>,
    /// New environment.
    #[serde(default)]
    pub env_id: Option<Uuid>,
    /// New client type.
    #[serde(default)]
    pub client_type_id: Option<Uuid>,
    /// New role.
    #[serde(default)]
    pub role_id: Option<Uuid>,
    /// New payload.
    #[serde(default)]
    pub data: Option<String>,
}

impl UpdateSession {
    /// Create an update touching only the mandatory fields.
    pub fn new(id: Uuid, ip: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id,
            ip: ip.into(),
            expires_at,
            project_id: None,
            env_id: None,
            client_type_id: None,
            role_id: None,
            data: None,
        }
    }
}

/// Filter for listing sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionListFilter {
    /// Substring matched against the session IP.
    #[serde(default)]
    pub search: Option<String>,
    /// Exact owning user.
    #[serde(default)]
    pub user_id: Option<Uuid>,
    /// Exact client type.
    #[serde(default)]
    pub client_type_id: Option<Uuid>,
    /// Page window.
    #[serde(flatten)]
    pub page: OffsetPage,
}
