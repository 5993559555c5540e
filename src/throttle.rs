//! Failed-attempt accounting for login and password-reset flows.
//!
//! The throttle only counts; it never decides. Lockout thresholds are policy
//! owned by the caller. Counts are a best-effort deterrent: concurrent bursts
//! may slightly under- or over-count, which is acceptable since the throttle
//! is not a hard security boundary.

use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::Error;

/// Trailing window consulted by [`count_recent`] unless the caller overrides it.
pub const DEFAULT_WINDOW_MINUTES: i64 = 15;

/// Age beyond which [`purge_old`] drops rows. Always at least the window, so
/// purging never affects a live count.
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

/// Which attempt namespace to account against.
///
/// Login and password-reset attempts live in separate tables with identical
/// shape, so a login lockout and a reset lockout never interfere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptKind {
    Login,
    PasswordReset,
}

impl AttemptKind {
    // Table names come from this fixed enum, never from user input.
    fn table(self) -> &'static str {
        match self {
            Self::Login => "login_attempts",
            Self::PasswordReset => "password_reset_attempts",
        }
    }
}

/// Append a timestamped failure row. Side effect only.
///
/// # Errors
///
/// Returns `Error::Storage` when the store is unreachable.
pub async fn record_failure(
    pool: &PgPool,
    kind: AttemptKind,
    user_id: Uuid,
    ip_address: &str,
) -> Result<(), Error> {
    let query = format!(
        "INSERT INTO {} (user_id, ip_address, attempted_at) VALUES ($1, $2, NOW())",
        kind.table()
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    sqlx::query(&query)
        .bind(user_id)
        .bind(ip_address)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(())
}

/// Count failures for a user within the trailing window.
///
/// The result feeds a caller-defined lockout policy; this function takes no
/// decision itself.
///
/// # Errors
///
/// Returns `Error::Storage` when the store is unreachable.
pub async fn count_recent(
    pool: &PgPool,
    kind: AttemptKind,
    user_id: Uuid,
    window_minutes: i64,
) -> Result<i64, Error> {
    let query = format!(
        "SELECT COUNT(*) AS count FROM {} \
         WHERE user_id = $1 AND attempted_at >= NOW() - ($2 * INTERVAL '1 minute')",
        kind.table()
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .bind(window_minutes)
        .fetch_one(pool)
        .instrument(span)
        .await?;
    Ok(row.get("count"))
}

/// Delete every failure row for the user, resetting the counter to zero.
/// Invoked after a verified successful authentication.
///
/// # Errors
///
/// Returns `Error::Storage` when the store is unreachable.
pub async fn clear_on_success(pool: &PgPool, kind: AttemptKind, user_id: Uuid) -> Result<(), Error> {
    let query = format!("DELETE FROM {} WHERE user_id = $1", kind.table());
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query.as_str()
    );
    sqlx::query(&query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(())
}

/// Bulk-delete stale rows to keep storage bounded. Returns the number of rows
/// removed. Maintenance only, externally scheduled.
///
/// # Errors
///
/// Returns `Error::Storage` when the store is unreachable.
pub async fn purge_old(
    pool: &PgPool,
    kind: AttemptKind,
    older_than_hours: i64,
) -> Result<u64, Error> {
    let query = format!(
        "DELETE FROM {} WHERE attempted_at < NOW() - ($1 * INTERVAL '1 hour')",
        kind.table()
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query.as_str()
    );
    let result = sqlx::query(&query)
        .bind(older_than_hours)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected())
}
