//! Session repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use authgate_core::config::{AdmissionMode, SessionConfig};
use authgate_core::error::AppError;
use authgate_core::result::AppResult;
use authgate_core::types::{Paged, SessionLimit};
use authgate_entity::session::{
    CreateSession, DeleteScope, Session, SessionListFilter, SessionScope, UpdateSession,
};

use crate::error::db_err;
use crate::query::{NamedParams, Patch, Predicates, apply_update, bind_named};
use crate::store::SessionStore;

/// Select list shared by every session read; timestamps are formatted with
/// the configured layout.
const SESSION_COLUMNS: &str = "id, project_id, client_type_id, user_id, user_id_auth, role_id, \
     env_id, ip, data, is_changed, expires_at, \
     TO_CHAR(created_at, :time_layout) AS created_at, \
     TO_CHAR(updated_at, :time_layout) AS updated_at";

/// Repository for session admission, lookup and removal.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: PgPool,
    admission: AdmissionMode,
    time_layout: String,
    default_list_limit: u32,
    max_list_limit: u32,
}

impl SessionRepository {
    /// Create a new session repository.
    pub fn new(pool: PgPool, config: &SessionConfig) -> Self {
        Self {
            pool,
            admission: config.admission,
            time_layout: config.time_layout.clone(),
            default_list_limit: config.default_list_limit,
            max_list_limit: config.max_list_limit,
        }
    }

    fn layout_params(&self) -> NamedParams {
        NamedParams::new().with("time_layout", self.time_layout.clone())
    }

    /// Count, evict and insert inside one transaction that holds the
    /// scope's advisory lock until commit or rollback.
    ///
    /// Dropping the returned future before it completes cancels the
    /// statement still running on the server, including a wait on the
    /// scope lock.
    async fn create_serialized(&self, data: &CreateSession) -> AppResult<Uuid> {
        let mut tx = AdmissionTx::begin(&self.pool).await?;

        lock_scope(tx.conn()?, &data.scope).await?;
        let evicted = evict_over_limit(tx.conn()?, &data.scope, data.limit).await?;
        let id = insert_session(tx.conn()?, data).await?;
        tx.commit().await?;

        debug!(session_id = %id, scope = %data.scope, evicted, "Session admitted");
        Ok(id)
    }

    /// Run the admission statements independently on one pooled connection.
    async fn create_relaxed(&self, data: &CreateSession) -> AppResult<Uuid> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_err("Failed to acquire connection for session admission"))?;

        let evicted = evict_over_limit(&mut conn, &data.scope, data.limit).await?;
        let id = insert_session(&mut conn, data).await?;

        debug!(session_id = %id, scope = %data.scope, evicted, "Session admitted (relaxed)");
        Ok(id)
    }
}

/// Strict admission transaction bound to its server backend.
///
/// If dropped before [`AdmissionTx::commit`], the backend's running
/// statement is cancelled over a separate connection and the transaction
/// is rolled back in the background. The pooled connection stays owned by
/// that task until the rollback finishes.
struct AdmissionTx {
    pool: PgPool,
    backend_pid: i32,
    tx: Option<Transaction<'static, Postgres>>,
}

impl AdmissionTx {
    async fn begin(pool: &PgPool) -> AppResult<Self> {
        let mut tx = pool
            .begin()
            .await
            .map_err(db_err("Failed to begin session admission"))?;
        let backend_pid = sqlx::query_scalar::<_, i32>("SELECT pg_backend_pid()")
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err("Failed to begin session admission"))?;

        Ok(Self {
            pool: pool.clone(),
            backend_pid,
            tx: Some(tx),
        })
    }

    fn conn(&mut self) -> AppResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::internal("Session admission already finished"))
    }

    async fn commit(mut self) -> AppResult<()> {
        match self.tx.take() {
            Some(tx) => tx
                .commit()
                .await
                .map_err(db_err("Failed to commit session admission")),
            None => Ok(()),
        }
    }
}

impl Drop for AdmissionTx {
    fn drop(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let pool = self.pool.clone();
        let backend_pid = self.backend_pid;
        runtime.spawn(async move {
            if let Err(e) = cancel_backend(&pool, backend_pid).await {
                warn!(backend_pid, "Failed to cancel abandoned session admission: {}", e);
            }
            if let Err(e) = tx.rollback().await {
                debug!(backend_pid, "Rollback of abandoned session admission failed: {}", e);
            }
        });
    }
}

/// Cancel whatever `backend_pid` is running. Uses a connection outside the
/// pool so it still works when every pooled connection is busy.
async fn cancel_backend(pool: &PgPool, backend_pid: i32) -> Result<(), sqlx::Error> {
    let options = pool.connect_options();
    let mut conn = PgConnection::connect_with(&options).await?;
    let cancelled = sqlx::query_scalar::<_, bool>("SELECT pg_cancel_backend($1)")
        .bind(backend_pid)
        .fetch_one(&mut conn)
        .await?;
    conn.close().await?;

    debug!(backend_pid, cancelled, "Cancelled abandoned session admission");
    Ok(())
}

/// Predicates matching every session of a scope.
fn scope_predicates(scope: &SessionScope) -> Predicates {
    let mut predicates = Predicates::new();
    predicates
        .and("client_type_id = :client_type_id", "client_type_id", scope.client_type_id)
        .and("user_id_auth = :user_id_auth", "user_id_auth", scope.user_id_auth)
        .and("env_id IS NOT DISTINCT FROM :env_id", "env_id", scope.env_id);
    predicates
}

/// Serialize admission for one scope until the transaction ends.
async fn lock_scope(conn: &mut PgConnection, scope: &SessionScope) -> AppResult<()> {
    let params = NamedParams::new().with("scope_key", scope.lock_key());
    let bound = bind_named(
        "SELECT pg_advisory_xact_lock(hashtextextended(:scope_key, 0))",
        &params,
    );
    sqlx::query_with(&bound.sql, bound.arguments()?)
        .execute(&mut *conn)
        .await
        .map_err(db_err("Failed to lock session scope"))?;
    Ok(())
}

async fn count_scope(conn: &mut PgConnection, scope: &SessionScope) -> AppResult<i64> {
    let bound = scope_predicates(scope).render(
        "SELECT COUNT(*) FROM sessions",
        "",
        &NamedParams::new(),
    );
    sqlx::query_scalar_with::<_, i64, _>(&bound.sql, bound.arguments()?)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err("Failed to count sessions in scope"))
}

/// Delete the oldest sessions of the scope so one more insert keeps it at
/// the limit. Returns the number of evicted sessions.
async fn evict_over_limit(
    conn: &mut PgConnection,
    scope: &SessionScope,
    limit: SessionLimit,
) -> AppResult<u64> {
    if limit == SessionLimit::Unlimited {
        return Ok(0);
    }

    let count = count_scope(conn, scope).await?;
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    let to_evict = limit.evictions_for(count);
    if to_evict == 0 {
        return Ok(0);
    }

    let bound = scope_predicates(scope).render(
        "DELETE FROM sessions WHERE id IN (SELECT id FROM sessions",
        " ORDER BY created_at ASC, id ASC LIMIT :evict)",
        &NamedParams::new().with("evict", i64::from(to_evict)),
    );
    let result = sqlx::query_with(&bound.sql, bound.arguments()?)
        .execute(&mut *conn)
        .await
        .map_err(db_err("Failed to evict oldest sessions"))?;

    info!(
        scope = %scope,
        live = count,
        limit = ?limit.as_max(),
        evicted = result.rows_affected(),
        "Evicted oldest sessions to admit a new one"
    );
    Ok(result.rows_affected())
}

async fn insert_session(conn: &mut PgConnection, data: &CreateSession) -> AppResult<Uuid> {
    let id = Uuid::new_v4();
    let mut patch = Patch::new();
    patch
        .set("id", id)
        .set("user_id", data.user_id)
        .set("client_type_id", data.scope.client_type_id)
        .set("user_id_auth", data.scope.user_id_auth)
        .set("ip", data.ip.clone())
        .set("data", data.data.clone())
        .set("expires_at", data.expires_at)
        .set_if_some("project_id", data.project_id)
        .set_if_some("env_id", data.scope.env_id)
        .set_if_some("role_id", data.role_id);

    let bound = patch.render_insert("sessions")?;
    sqlx::query_with(&bound.sql, bound.arguments()?)
        .execute(&mut *conn)
        .await
        .map_err(db_err("Failed to create session"))?;
    Ok(id)
}

/// Escape `LIKE` wildcards so a search term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn validate_scope(scope: &SessionScope) -> AppResult<()> {
    if scope.client_type_id.is_nil() {
        return Err(AppError::validation("client_type_id is required"));
    }
    if scope.user_id_auth.is_nil() {
        return Err(AppError::validation("user_id_auth is required"));
    }
    Ok(())
}

#[async_trait]
impl SessionStore for SessionRepository {
    async fn create(&self, data: &CreateSession) -> AppResult<Uuid> {
        validate_scope(&data.scope)?;
        if data.user_id.is_nil() {
            return Err(AppError::validation("user_id is required"));
        }

        match self.admission {
            AdmissionMode::Strict => self.create_serialized(data).await,
            AdmissionMode::Relaxed => self.create_relaxed(data).await,
        }
    }

    async fn get_by_pk(&self, id: Uuid) -> AppResult<Session> {
        let params = self.layout_params().with("id", id);
        let bound = bind_named(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = :id"),
            &params,
        );
        sqlx::query_as_with::<_, Session, _>(&bound.sql, bound.arguments()?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find session"))?
            .ok_or_else(|| AppError::not_found(format!("Session {id} not found")))
    }

    async fn get_list(&self, filter: &SessionListFilter) -> AppResult<Paged<Session>> {
        let page = filter
            .page
            .normalized(self.default_list_limit, self.max_list_limit);

        let mut predicates = Predicates::new();
        predicates
            .and_if(
                "ip ILIKE '%' || :search || '%'",
                "search",
                filter.search.as_deref().map(escape_like),
            )
            .and_if("user_id = :user_id", "user_id", filter.user_id)
            .and_if(
                "client_type_id = :client_type_id",
                "client_type_id",
                filter.client_type_id,
            );

        let count_query = predicates.render("SELECT COUNT(*) FROM sessions", "", &NamedParams::new());
        let count = sqlx::query_scalar_with::<_, i64, _>(&count_query.sql, count_query.arguments()?)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("Failed to count sessions"))?;

        let extra = self
            .layout_params()
            .with("limit", i64::from(page.limit))
            .with("offset", i64::from(page.offset));
        let list_query = predicates.render(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions"),
            " ORDER BY sessions.created_at DESC, sessions.id LIMIT :limit OFFSET :offset",
            &extra,
        );
        let sessions = sqlx::query_as_with::<_, Session, _>(&list_query.sql, list_query.arguments()?)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to list sessions"))?;

        Ok(Paged::new(sessions, count))
    }

    async fn update(&self, data: &UpdateSession) -> AppResult<u64> {
        let mut patch = Patch::new();
        patch
            .set("ip", data.ip.clone())
            .set("expires_at", data.expires_at)
            .set_expr("is_changed", "TRUE")
            .set_expr("updated_at", "NOW()")
            .set_if_some("project_id", data.project_id)
            .set_if_some("env_id", data.env_id)
            .set_if_some("client_type_id", data.client_type_id)
            .set_if_some("role_id", data.role_id)
            .set_if_some("data", data.data.clone());

        let rows = apply_update(&self.pool, "sessions", "id", data.id, &patch).await?;
        debug!(session_id = %data.id, columns = ?patch.columns(), rows, "Session updated");
        Ok(rows)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let bound = bind_named(
            "DELETE FROM sessions WHERE id = :id",
            &NamedParams::new().with("id", id),
        );
        let result = sqlx::query_with(&bound.sql, bound.arguments()?)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to delete session"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Session {id} not found")));
        }
        Ok(())
    }

    async fn delete_expired_user_sessions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut predicates = Predicates::new();
        predicates
            .and("user_id = :user_id", "user_id", user_id)
            .and("expires_at < :now", "now", now);

        let bound = predicates.render("DELETE FROM sessions", "", &NamedParams::new());
        let result = sqlx::query_with(&bound.sql, bound.arguments()?)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to delete expired user sessions"))?;

        debug!(user_id = %user_id, rows = result.rows_affected(), "Expired user sessions deleted");
        Ok(result.rows_affected())
    }

    async fn expire_sessions(&self, ids: &[Uuid]) -> AppResult<u64> {
        if ids.is_empty() {
            return Err(AppError::validation("At least one session id is required"));
        }

        let bound = bind_named(
            "DELETE FROM sessions WHERE id = ANY(:ids)",
            &NamedParams::new().with("ids", ids.to_vec()),
        );
        let result = sqlx::query_with(&bound.sql, bound.arguments()?)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to expire sessions"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("No matching sessions to expire"));
        }
        info!(requested = ids.len(), rows = result.rows_affected(), "Sessions expired");
        Ok(result.rows_affected())
    }

    async fn delete_by_params(&self, scope: &DeleteScope) -> AppResult<u64> {
        let scope = scope.resolve()?;

        let mut predicates = Predicates::new();
        predicates
            .and("client_type_id = :client_type_id", "client_type_id", scope.client_type_id)
            .and("user_id = :user_id", "user_id", scope.user_id)
            .and("project_id = :project_id", "project_id", scope.project_id)
            .and("id <> :keep_session_id", "keep_session_id", scope.keep_session_id);

        let bound = predicates.render("DELETE FROM sessions", "", &NamedParams::new());
        let result = sqlx::query_with(&bound.sql, bound.arguments()?)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to delete sessions by scope"))?;

        info!(
            user_id = %scope.user_id,
            keep = %scope.keep_session_id,
            rows = result.rows_affected(),
            "Deleted sessions by scope"
        );
        Ok(result.rows_affected())
    }

    async fn count_in_scope(&self, scope: &SessionScope) -> AppResult<i64> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_err("Failed to acquire connection"))?;
        count_scope(&mut conn, scope).await
    }

    async fn delete_all_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let bound = bind_named(
            "DELETE FROM sessions WHERE expires_at < :now",
            &NamedParams::new().with("now", now),
        );
        let result = sqlx::query_with(&bound.sql, bound.arguments()?)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to cleanup sessions"))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("10.0.0.1"), "10.0.0.1");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }

    #[test]
    fn test_scope_predicates_use_null_safe_env() {
        let scope = SessionScope::new(Uuid::new_v4(), Uuid::new_v4(), None);
        let bound = scope_predicates(&scope).render("SELECT COUNT(*) FROM sessions", "", &NamedParams::new());
        assert_eq!(
            bound.sql,
            "SELECT COUNT(*) FROM sessions WHERE client_type_id = $1 AND user_id_auth = $2 \
             AND env_id IS NOT DISTINCT FROM $3"
        );
        assert_eq!(bound.args.len(), 3);
    }

    #[test]
    fn test_session_columns_share_layout_slot() {
        let params = NamedParams::new()
            .with("time_layout", "YYYY")
            .with("id", Uuid::nil());
        let bound = bind_named(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = :id"),
            &params,
        );
        assert_eq!(bound.sql.matches("$1").count(), 2);
        assert!(bound.sql.ends_with("WHERE id = $2"));
        assert_eq!(bound.args.len(), 2);
    }

    #[test]
    fn test_validate_scope_rejects_nil_ids() {
        let scope = SessionScope::new(Uuid::nil(), Uuid::new_v4(), None);
        assert!(validate_scope(&scope).is_err());
        let scope = SessionScope::new(Uuid::new_v4(), Uuid::nil(), None);
        assert!(validate_scope(&scope).is_err());
    }
}
