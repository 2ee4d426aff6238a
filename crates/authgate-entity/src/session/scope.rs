//! Scope keys that bound how many sessions may coexist.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use authgate_core::error::AppError;
use authgate_core::result::AppResult;

/// Identifies which sessions compete for the same capacity bound.
///
/// `env_id` is compared with null-safe equality: an absent environment only
/// matches sessions that also have no environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionScope {
    /// Client type of the login.
    pub client_type_id: Uuid,
    /// Identity used by the auth flow.
    pub user_id_auth: Uuid,
    /// Environment, if the login is environment-bound.
    pub env_id: Option<Uuid>,
}

impl SessionScope {
    /// Create a new scope key.
    pub fn new(client_type_id: Uuid, user_id_auth: Uuid, env_id: Option<Uuid>) -> Self {
        Self {
            client_type_id,
            user_id_auth,
            env_id,
        }
    }

    /// Stable text form hashed into the per-scope advisory lock.
    pub fn lock_key(&self) -> String {
        match self.env_id {
            Some(env) => format!("session:{}:{}:{}", self.client_type_id, self.user_id_auth, env),
            None => format!("session:{}:{}:-", self.client_type_id, self.user_id_auth),
        }
    }
}

impl std::fmt::Display for SessionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.lock_key())
    }
}

/// Scope for deleting every session of a user on one client type and
/// project except a single survivor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteScope {
    /// Client type to match.
    pub client_type_id: Option<Uuid>,
    /// Owning user to match.
    pub user_id: Option<Uuid>,
    /// Project to match.
    pub project_id: Option<Uuid>,
    /// Session that must survive the deletion.
    pub keep_session_id: Option<Uuid>,
}

/// A [`DeleteScope`] with every component present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDeleteScope {
    /// Client type to match.
    pub client_type_id: Uuid,
    /// Owning user to match.
    pub user_id: Uuid,
    /// Project to match.
    pub project_id: Uuid,
    /// Session that must survive the deletion.
    pub keep_session_id: Uuid,
}

impl DeleteScope {
    /// Require all four components; a missing or nil one is a validation error.
    pub fn resolve(&self) -> AppResult<ResolvedDeleteScope> {
        fn required(value: Option<Uuid>, name: &str) -> AppResult<Uuid> {
            value
                .filter(|id| !id.is_nil())
                .ok_or_else(|| AppError::validation(format!("{name} is required")))
        }

        Ok(ResolvedDeleteScope {
            client_type_id: required(self.client_type_id, "client_type_id")?,
            user_id: required(self.user_id, "user_id")?,
            project_id: required(self.project_id, "project_id")?,
            keep_session_id: required(self.keep_session_id, "keep_session_id")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authgate_core::error::ErrorKind;

    #[test]
    fn test_lock_key_distinguishes_missing_env() {
        let client = Uuid::new_v4();
        let user = Uuid::new_v4();
        let env = Uuid::new_v4();

        let without = SessionScope::new(client, user, None);
        let with = SessionScope::new(client, user, Some(env));
        assert_ne!(without.lock_key(), with.lock_key());
        assert!(without.lock_key().ends_with(":-"));
    }

    #[test]
    fn test_delete_scope_requires_every_field() {
        let full = DeleteScope {
            client_type_id: Some(Uuid::new_v4()),
            user_id: Some(Uuid::new_v4()),
            project_id: Some(Uuid::new_v4()),
            keep_session_id: Some(Uuid::new_v4()),
        };
        assert!(full.resolve().is_ok());

        let missing_user = DeleteScope {
            user_id: None,
            ..full.clone()
        };
        let err = missing_user.resolve().expect_err("user_id is mandatory");
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("user_id"));

        let nil_project = DeleteScope {
            project_id: Some(Uuid::nil()),
            ..full
        };
        assert_eq!(
            nil_project.resolve().expect_err("nil project").kind,
            ErrorKind::Validation
        );
    }
}
