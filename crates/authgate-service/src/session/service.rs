//! Session admission, lookup and removal for the handler layer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use authgate_core::error::AppError;
use authgate_core::result::AppResult;
use authgate_core::types::{OffsetPage, Paged, SessionLimit};
use authgate_database::SessionStore;
use authgate_entity::session::{
    CreateSession, DeleteScope, Session, SessionListFilter, SessionScope, UpdateSession,
};

use crate::context::RequestContext;

/// Inbound request to open a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// Client type the session belongs to.
    pub client_type_id: Option<Uuid>,
    /// Authenticated identity.
    pub user_id_auth: Option<Uuid>,
    /// Deployment environment, if any.
    pub env_id: Option<Uuid>,
    /// Maximum live sessions for the scope. Zero means unlimited.
    pub session_limit: i32,
    /// Owning user.
    pub user_id: Uuid,
    /// Project scope.
    pub project_id: Option<Uuid>,
    /// Role granted to the session.
    pub role_id: Option<Uuid>,
    /// Client IP address.
    pub ip: String,
    /// Opaque payload.
    #[serde(default)]
    pub data: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

impl CreateSessionRequest {
    /// Validate the request and turn it into an admission command.
    pub fn into_command(self) -> AppResult<CreateSession> {
        let client_type_id = self
            .client_type_id
            .filter(|id| !id.is_nil())
            .ok_or_else(|| AppError::validation("client_type_id is required"))?;
        let user_id_auth = self
            .user_id_auth
            .filter(|id| !id.is_nil())
            .ok_or_else(|| AppError::validation("user_id_auth is required"))?;
        let limit = SessionLimit::try_from(self.session_limit)?;

        Ok(CreateSession {
            scope: SessionScope::new(client_type_id, user_id_auth, self.env_id),
            limit,
            user_id: self.user_id,
            project_id: self.project_id,
            role_id: self.role_id,
            ip: self.ip,
            data: self.data,
            expires_at: self.expires_at,
        })
    }
}

/// Session service over any [`SessionStore`].
#[derive(Clone)]
pub struct SessionService {
    /// Backing store.
    store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService").finish()
    }
}

impl SessionService {
    /// Creates a new session service.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Admits a new session, evicting the scope's oldest sessions if needed.
    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id))]
    pub async fn create_session(
        &self,
        ctx: &RequestContext,
        req: CreateSessionRequest,
    ) -> AppResult<Uuid> {
        let command = req.into_command()?;
        let id = ctx.run(self.store.create(&command)).await?;

        info!(
            session_id = %id,
            user_id = %command.user_id,
            scope = %command.scope,
            "Session created"
        );
        Ok(id)
    }

    /// Looks up a session by id.
    pub async fn get_session(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Session> {
        ctx.run(self.store.get_by_pk(id)).await
    }

    /// Lists sessions with optional search and exact-match filters.
    pub async fn list_sessions(
        &self,
        ctx: &RequestContext,
        search: Option<String>,
        user_id: Option<Uuid>,
        client_type_id: Option<Uuid>,
        page: OffsetPage,
    ) -> AppResult<Paged<Session>> {
        let filter = SessionListFilter {
            search,
            user_id,
            client_type_id,
            page,
        };
        ctx.run(self.store.get_list(&filter)).await
    }

    /// Applies a sparse update. Returns rows affected.
    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, session_id = %req.id))]
    pub async fn update_session(
        &self,
        ctx: &RequestContext,
        req: UpdateSession,
    ) -> AppResult<u64> {
        ctx.run(self.store.update(&req)).await
    }

    /// Deletes one session.
    pub async fn delete_session(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        ctx.run(self.store.delete(id)).await?;
        info!(session_id = %id, "Session deleted");
        Ok(())
    }

    /// Deletes a user's sessions that have already expired.
    pub async fn delete_expired_sessions(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
    ) -> AppResult<u64> {
        if user_id.is_nil() {
            return Err(AppError::validation("user_id is required"));
        }
        ctx.run(self.store.delete_expired_user_sessions(user_id, Utc::now()))
            .await
    }

    /// Deletes the listed sessions.
    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, count = ids.len()))]
    pub async fn expire_sessions(&self, ctx: &RequestContext, ids: &[Uuid]) -> AppResult<u64> {
        ctx.run(self.store.expire_sessions(ids)).await
    }

    /// Deletes every session of a user's client type and project except
    /// `keep_session_id`.
    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id))]
    pub async fn delete_sessions_by_scope(
        &self,
        ctx: &RequestContext,
        scope: DeleteScope,
    ) -> AppResult<u64> {
        scope.resolve()?;
        ctx.run(self.store.delete_by_params(&scope)).await
    }
}
