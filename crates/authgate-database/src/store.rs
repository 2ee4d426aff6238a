//! Store traits implemented by the PostgreSQL repositories.
//!
//! Services depend on these traits rather than on the concrete
//! repositories so the admission and quota flows can run against any
//! backend that honours the same contracts.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use authgate_core::result::AppResult;
use authgate_core::types::Paged;
use authgate_entity::api_key::ApiKeyUsage;
use authgate_entity::session::{
    CreateSession, DeleteScope, Session, SessionListFilter, SessionScope, UpdateSession,
};

/// Persistent record of live sessions with per-scope admission control.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Admit a new session, evicting the oldest sessions of its scope when
    /// the scope is at capacity. Returns the new session id.
    async fn create(&self, data: &CreateSession) -> AppResult<Uuid>;

    /// Point lookup. A missing row is `ErrorKind::NotFound`.
    async fn get_by_pk(&self, id: Uuid) -> AppResult<Session>;

    /// One page of sessions plus the unpaginated total.
    async fn get_list(&self, filter: &SessionListFilter) -> AppResult<Paged<Session>>;

    /// Sparse update. Returns rows affected.
    async fn update(&self, data: &UpdateSession) -> AppResult<u64>;

    /// Delete one session. A missing row is `ErrorKind::NotFound`.
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Delete a user's sessions that expired before `now`.
    async fn delete_expired_user_sessions(&self, user_id: Uuid, now: DateTime<Utc>)
    -> AppResult<u64>;

    /// Delete the listed sessions. Zero rows affected is `ErrorKind::NotFound`.
    async fn expire_sessions(&self, ids: &[Uuid]) -> AppResult<u64>;

    /// Delete every session of a fully specified scope except the survivor.
    async fn delete_by_params(&self, scope: &DeleteScope) -> AppResult<u64>;

    /// Number of sessions currently held by a scope.
    async fn count_in_scope(&self, scope: &SessionScope) -> AppResult<i64>;

    /// Delete every session that expired before `now`.
    async fn delete_all_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

/// Monthly API key usage counters and the limit-reached flag.
#[async_trait]
pub trait QuotaTracker: Send + Sync + 'static {
    /// Whether the key's monthly limit has been flagged as reached.
    async fn check_limit(&self, api_key: &str) -> AppResult<bool>;

    /// Make sure a zero counter exists for the current month.
    async fn create(&self, api_key: &str) -> AppResult<()>;

    /// Add `delta` to the current month's counter, inserting it if absent.
    async fn upsert(&self, api_key: &str, delta: i64) -> AppResult<()>;

    /// Flag every key whose current-month usage reached its limit.
    async fn update_monthly_limit(&self) -> AppResult<u64>;

    /// Clear every reached flag.
    async fn update_is_monthly_limit_reached(&self) -> AppResult<u64>;

    /// Counter for one key and month, if any requests were recorded.
    async fn get_usage(&self, api_key: &str, month: NaiveDate) -> AppResult<Option<ApiKeyUsage>>;
}
