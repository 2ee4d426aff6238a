//! Classification of sqlx errors into application error kinds.
//!
//! Only not-found and retry-safe failures are singled out; everything the
//! caller cannot act on stays a generic database error.

use authgate_core::error::{AppError, ErrorKind};

/// SQLSTATE codes that indicate a retry may succeed.
const TRANSIENT_SQLSTATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
    "57014", // query_canceled (statement_timeout)
    "57P01", // admin_shutdown
    "08000", // connection_exception
    "08003", // connection_does_not_exist
    "08006", // connection_failure
];

/// Map a sqlx error to the kind the caller should act on.
pub fn classify(err: &sqlx::Error) -> ErrorKind {
    match err {
        sqlx::Error::RowNotFound => ErrorKind::NotFound,
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::WorkerCrashed => ErrorKind::Transient,
        sqlx::Error::Database(db) => classify_sqlstate(db.code().as_deref()),
        sqlx::Error::Configuration(_) => ErrorKind::Configuration,
        _ => ErrorKind::Database,
    }
}

/// Map a PostgreSQL SQLSTATE to an error kind.
pub fn classify_sqlstate(code: Option<&str>) -> ErrorKind {
    match code {
        Some(code) if TRANSIENT_SQLSTATES.contains(&code) => ErrorKind::Transient,
        Some(code) if code.starts_with("23") => ErrorKind::ConstraintViolation,
        _ => ErrorKind::Database,
    }
}

/// Build a `map_err` adapter that classifies the error and keeps it as source.
pub fn db_err(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(classify(&e), message, e)
}
