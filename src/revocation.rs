//! Ledger of revoked JWTs, keyed by the `jti` claim.
//!
//! Records are written on logout or security events and never mutated. Once
//! `is_revoked` reports true for an id it stays true until the record is
//! purged, and purging is only safe after the token's own expiry, so a
//! revoked token can never flip back to valid.

use serde::Serialize;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{is_unique_violation, Error};

/// A single revoked token.
#[derive(Debug, Serialize)]
pub struct RevokedToken {
    pub jti: String,
    pub user_id: Uuid,
    pub revoked_at_unix: i64,
    pub expires_at_unix: i64,
}

/// Record a token as revoked.
///
/// # Errors
///
/// Returns `Error::DuplicateKey` when the `jti` is already present; callers
/// should treat that as "already revoked" (idempotent outcome).
pub async fn revoke(
    pool: &PgPool,
    jti: &str,
    user_id: Uuid,
    expires_at_unix: i64,
) -> Result<RevokedToken, Error> {
    let query = r"
        INSERT INTO revoked_tokens (jti, user_id, revoked_at, expires_at)
        VALUES ($1, $2, NOW(), TO_TIMESTAMP($3))
        RETURNING EXTRACT(EPOCH FROM revoked_at)::BIGINT AS revoked_at_unix
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(jti)
        .bind(user_id)
        .bind(expires_at_unix)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(RevokedToken {
            jti: jti.to_string(),
            user_id,
            revoked_at_unix: row.get("revoked_at_unix"),
            expires_at_unix,
        }),
        Err(err) if is_unique_violation(&err) => Err(Error::DuplicateKey),
        Err(err) => Err(err.into()),
    }
}

/// Check whether a token id has been revoked.
///
/// This is an indexed existence probe on the `jti` primary key; never-revoked
/// ids answer false without touching expired rows.
///
/// # Errors
///
/// Returns `Error::Storage` when the store is unreachable.
pub async fn is_revoked(pool: &PgPool, jti: &str) -> Result<bool, Error> {
    let query = "SELECT 1 FROM revoked_tokens WHERE jti = $1 LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(jti)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.is_some())
}

/// Delete records whose tokens have expired on their own.
///
/// Maintenance only; invoked by an external scheduler, never inline with
/// request handling. Returns the number of rows removed.
///
/// # Errors
///
/// Returns `Error::Storage` when the store is unreachable.
pub async fn purge_expired(pool: &PgPool) -> Result<u64, Error> {
    let query = "DELETE FROM revoked_tokens WHERE expires_at < NOW()";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query).execute(pool).instrument(span).await?;
    Ok(result.rows_affected())
}
