//! Integration tests for session admission, listing and removal.
//!
//! Exercises the repository against a real database to verify that:
//! - A scope never holds more sessions than its limit after `create`
//! - The oldest sessions of a scope are evicted first
//! - An absent environment is its own scope
//! - Updates are sparse and deletes report missing rows

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use authgate_core::config::{AdmissionMode, SessionConfig};
use authgate_core::error::ErrorKind;
use authgate_core::types::{OffsetPage, SessionLimit};
use authgate_database::SessionStore;
use authgate_database::repositories::SessionRepository;
use authgate_entity::session::{
    CreateSession, DeleteScope, SessionListFilter, SessionScope, UpdateSession,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn repo(pool: PgPool, admission: AdmissionMode) -> SessionRepository {
    SessionRepository::new(
        pool,
        &SessionConfig {
            admission,
            ..SessionConfig::default()
        },
    )
}

fn new_session(scope: SessionScope, limit: u32, user_id: Uuid) -> CreateSession {
    CreateSession {
        scope,
        limit: SessionLimit::from(limit),
        user_id,
        project_id: None,
        role_id: None,
        ip: "10.0.0.1".to_string(),
        data: "{}".to_string(),
        expires_at: Utc::now() + Duration::hours(1),
    }
}

fn random_scope() -> SessionScope {
    SessionScope::new(Uuid::new_v4(), Uuid::new_v4(), None)
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_evicts_oldest_when_full(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let scope = random_scope();
    let user = Uuid::new_v4();

    let s1 = repo.create(&new_session(scope, 2, user)).await.expect("s1");
    let s2 = repo.create(&new_session(scope, 2, user)).await.expect("s2");
    let s3 = repo.create(&new_session(scope, 2, user)).await.expect("s3");

    assert_matches!(repo.get_by_pk(s1).await, Err(e) if e.kind == ErrorKind::NotFound);
    assert!(repo.get_by_pk(s2).await.is_ok());
    assert!(repo.get_by_pk(s3).await.is_ok());
    assert_eq!(repo.count_in_scope(&scope).await.expect("count"), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_shrinks_overfull_scope_to_limit(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let scope = random_scope();
    let user = Uuid::new_v4();

    for _ in 0..5 {
        repo.create(&new_session(scope, 0, user)).await.expect("unlimited create");
    }
    assert_eq!(repo.count_in_scope(&scope).await.expect("count"), 5);

    let newest = repo.create(&new_session(scope, 2, user)).await.expect("limited create");
    assert_eq!(repo.count_in_scope(&scope).await.expect("count"), 2);
    assert!(repo.get_by_pk(newest).await.is_ok());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_limit_applies_per_scope(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let client = Uuid::new_v4();
    let auth = Uuid::new_v4();
    let env = Uuid::new_v4();
    let no_env = SessionScope::new(client, auth, None);
    let with_env = SessionScope::new(client, auth, Some(env));
    let user = Uuid::new_v4();

    repo.create(&new_session(no_env, 1, user)).await.expect("no env");
    repo.create(&new_session(with_env, 1, user)).await.expect("with env");
    repo.create(&new_session(with_env, 1, user)).await.expect("with env again");

    assert_eq!(repo.count_in_scope(&no_env).await.expect("count"), 1);
    assert_eq!(repo.count_in_scope(&with_env).await.expect("count"), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_creates_respect_limit(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let scope = random_scope();
    let user = Uuid::new_v4();

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.create(&new_session(scope, 3, user)).await })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        result.expect("task panicked").expect("create failed");
    }

    assert_eq!(repo.count_in_scope(&scope).await.expect("count"), 3);
}

/// Backends of this test database blocked on an advisory lock, other than
/// the one asking.
async fn advisory_lock_waiters(pool: &PgPool) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM pg_stat_activity \
         WHERE datname = current_database() \
           AND wait_event_type = 'Lock' AND wait_event = 'advisory' \
           AND pid <> pg_backend_pid()",
    )
    .fetch_one(pool)
    .await
    .expect("count lock waiters")
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_abandoned_create_stops_waiting_on_scope_lock(pool: PgPool) {
    let repo = repo(pool.clone(), AdmissionMode::Strict);
    let scope = random_scope();

    let mut holder = pool.begin().await.expect("begin holder");
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(scope.lock_key())
        .execute(&mut *holder)
        .await
        .expect("hold scope lock");

    let attempt = tokio::time::timeout(
        std::time::Duration::from_millis(200),
        repo.create(&new_session(scope, 1, Uuid::new_v4())),
    )
    .await;
    assert!(attempt.is_err(), "create should still be waiting on the scope lock");

    let mut waiters = advisory_lock_waiters(&pool).await;
    for _ in 0..40 {
        if waiters == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        waiters = advisory_lock_waiters(&pool).await;
    }
    assert_eq!(waiters, 0);

    holder.rollback().await.expect("release scope lock");
    assert_eq!(repo.count_in_scope(&scope).await.expect("count"), 0);

    // The scope is usable again once the holder is gone.
    repo.create(&new_session(scope, 1, Uuid::new_v4())).await.expect("create");
    assert_eq!(repo.count_in_scope(&scope).await.expect("count"), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_relaxed_admission_sequential(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Relaxed);
    let scope = random_scope();
    let user = Uuid::new_v4();

    for _ in 0..4 {
        repo.create(&new_session(scope, 2, user)).await.expect("create");
    }
    assert_eq!(repo.count_in_scope(&scope).await.expect("count"), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_writes_only_supplied_fields(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let project = Uuid::new_v4();
    let mut data = new_session(random_scope(), 1, Uuid::new_v4());
    data.project_id = Some(project);

    let id = repo.create(&data).await.expect("create");
    let session = repo.get_by_pk(id).await.expect("get");

    assert_eq!(session.project_id, Some(project));
    assert_eq!(session.role_id, None);
    assert_eq!(session.env_id, None);
    assert!(!session.is_changed);
    assert_eq!(session.created_at.len(), "2026-01-01 00:00:00".len());
    assert_eq!(session.scope(), Some(data.scope));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_rejects_nil_scope(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let scope = SessionScope::new(Uuid::nil(), Uuid::new_v4(), None);

    let err = repo
        .create(&new_session(scope, 1, Uuid::new_v4()))
        .await
        .expect_err("nil client type");
    assert_eq!(err.kind, ErrorKind::Validation);
}

// ---------------------------------------------------------------------------
// Lookup and listing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_get_by_pk_not_found(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let err = repo.get_by_pk(Uuid::new_v4()).await.expect_err("missing");
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_get_list_filters_and_paginates(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let user = Uuid::new_v4();
    let other_user = Uuid::new_v4();

    for i in 0..3 {
        let mut data = new_session(random_scope(), 0, user);
        data.ip = format!("192.168.1.{i}");
        repo.create(&data).await.expect("create");
    }
    let mut data = new_session(random_scope(), 0, other_user);
    data.ip = "10.1.1.1".to_string();
    repo.create(&data).await.expect("create");

    let by_user = repo
        .get_list(&SessionListFilter {
            user_id: Some(user),
            page: OffsetPage::new(0, 2),
            ..SessionListFilter::default()
        })
        .await
        .expect("list");
    assert_eq!(by_user.count, 3);
    assert_eq!(by_user.items.len(), 2);

    let second_page = repo
        .get_list(&SessionListFilter {
            user_id: Some(user),
            page: OffsetPage::new(2, 2),
            ..SessionListFilter::default()
        })
        .await
        .expect("list");
    assert_eq!(second_page.count, 3);
    assert_eq!(second_page.items.len(), 1);

    let by_ip = repo
        .get_list(&SessionListFilter {
            search: Some("168.1".to_string()),
            ..SessionListFilter::default()
        })
        .await
        .expect("list");
    assert_eq!(by_ip.count, 3);
    assert!(by_ip.items.iter().all(|s| s.user_id == user));

    let wildcard = repo
        .get_list(&SessionListFilter {
            search: Some("%".to_string()),
            ..SessionListFilter::default()
        })
        .await
        .expect("list");
    assert_eq!(wildcard.count, 0);
}

// ---------------------------------------------------------------------------
// Updates and removal
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_update_is_sparse(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let project = Uuid::new_v4();
    let mut data = new_session(random_scope(), 1, Uuid::new_v4());
    data.project_id = Some(project);
    data.data = "original".to_string();
    let id = repo.create(&data).await.expect("create");

    let role = Uuid::new_v4();
    let mut update = UpdateSession::new(id, "172.16.0.9", Utc::now() + Duration::hours(2));
    update.role_id = Some(role);
    update.data = Some(String::new());

    let rows = repo.update(&update).await.expect("update");
    assert_eq!(rows, 1);

    let session = repo.get_by_pk(id).await.expect("get");
    assert_eq!(session.ip, "172.16.0.9");
    assert_eq!(session.role_id, Some(role));
    assert_eq!(session.project_id, Some(project));
    assert_eq!(session.data, "original");
    assert!(session.is_changed);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_update_missing_session_affects_nothing(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let update = UpdateSession::new(Uuid::new_v4(), "127.0.0.1", Utc::now());
    assert_eq!(repo.update(&update).await.expect("update"), 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_delete(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let id = repo
        .create(&new_session(random_scope(), 1, Uuid::new_v4()))
        .await
        .expect("create");

    repo.delete(id).await.expect("delete");
    let err = repo.delete(id).await.expect_err("already deleted");
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_delete_expired_user_sessions(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let user = Uuid::new_v4();

    let mut expired = new_session(random_scope(), 0, user);
    expired.expires_at = Utc::now() - Duration::minutes(5);
    let expired_id = repo.create(&expired).await.expect("expired");
    let live_id = repo
        .create(&new_session(random_scope(), 0, user))
        .await
        .expect("live");
    assert!(repo.get_by_pk(expired_id).await.expect("expired row").is_expired());
    assert!(!repo.get_by_pk(live_id).await.expect("live row").is_expired());

    let rows = repo
        .delete_expired_user_sessions(user, Utc::now())
        .await
        .expect("delete expired");
    assert_eq!(rows, 1);
    assert!(repo.get_by_pk(expired_id).await.is_err());
    assert!(repo.get_by_pk(live_id).await.is_ok());

    let rows = repo
        .delete_expired_user_sessions(user, Utc::now())
        .await
        .expect("nothing left");
    assert_eq!(rows, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_expire_sessions(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let a = repo
        .create(&new_session(random_scope(), 0, Uuid::new_v4()))
        .await
        .expect("a");
    let b = repo
        .create(&new_session(random_scope(), 0, Uuid::new_v4()))
        .await
        .expect("b");

    assert_eq!(repo.expire_sessions(&[a, b, Uuid::new_v4()]).await.expect("expire"), 2);

    let err = repo
        .expire_sessions(&[Uuid::new_v4(), Uuid::new_v4()])
        .await
        .expect_err("nothing matched");
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = repo.expire_sessions(&[]).await.expect_err("empty list");
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_delete_by_params_keeps_survivor(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let user = Uuid::new_v4();
    let project = Uuid::new_v4();
    let scope = random_scope();

    let mut ids = Vec::new();
    for _ in 0..3 {
        let mut data = new_session(scope, 0, user);
        data.project_id = Some(project);
        ids.push(repo.create(&data).await.expect("create"));
    }

    let rows = repo
        .delete_by_params(&DeleteScope {
            client_type_id: Some(scope.client_type_id),
            user_id: Some(user),
            project_id: Some(project),
            keep_session_id: Some(ids[1]),
        })
        .await
        .expect("delete by params");

    assert_eq!(rows, 2);
    assert!(repo.get_by_pk(ids[1]).await.is_ok());
    assert_eq!(repo.count_in_scope(&scope).await.expect("count"), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_delete_by_params_requires_user(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let scope = random_scope();
    let id = repo
        .create(&new_session(scope, 0, Uuid::new_v4()))
        .await
        .expect("create");

    let err = repo
        .delete_by_params(&DeleteScope {
            client_type_id: Some(scope.client_type_id),
            user_id: None,
            project_id: Some(Uuid::new_v4()),
            keep_session_id: Some(Uuid::new_v4()),
        })
        .await
        .expect_err("missing user");

    assert_eq!(err.kind, ErrorKind::Validation);
    assert!(repo.get_by_pk(id).await.is_ok());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_delete_all_expired(pool: PgPool) {
    let repo = repo(pool, AdmissionMode::Strict);
    let mut expired = new_session(random_scope(), 0, Uuid::new_v4());
    expired.expires_at = Utc::now() - Duration::hours(1);
    repo.create(&expired).await.expect("expired");
    repo.create(&expired).await.expect("expired again");
    repo.create(&new_session(random_scope(), 0, Uuid::new_v4()))
        .await
        .expect("live");

    assert_eq!(repo.delete_all_expired(Utc::now()).await.expect("cleanup"), 2);
}
