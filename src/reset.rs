//! Single-use, time-limited password reset tokens.
//!
//! Tokens carry 32 bytes of OS entropy and are stored raw under a unique
//! constraint; collisions are negligible and enforced by the store rather
//! than checked in advance. Lookup is exact-match against the indexed column,
//! never prefix or pattern based. Redemption is a conditional write on
//! `used = FALSE` inside the caller's transaction, so concurrent redemptions
//! of the same token produce exactly one winner.

use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{is_unique_violation, Error};

/// Default validity of an issued token.
pub const DEFAULT_RESET_TTL_HOURS: i64 = 1;

/// A persisted reset token. The `token` field is the secret handed to the
/// user; it is serialized only so callers composing the reset email can reach
/// it, and must never appear in responses after issuance.
#[derive(Debug, Serialize)]
pub struct ResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at_unix: i64,
    pub used: bool,
    pub created_at_unix: i64,
}

impl ResetToken {
    /// A token is redeemable iff it is unused and unexpired.
    #[must_use]
    pub fn is_valid(&self, now_unix: i64) -> bool {
        !self.used && now_unix < self.expires_at_unix
    }

    /// Typed form of [`is_valid`](Self::is_valid) for redemption flows: the
    /// two failures are reported distinctly so callers can pick the
    /// user-facing message.
    ///
    /// # Errors
    ///
    /// `Error::TokenAlreadyUsed` for a spent token, `Error::TokenExpired` for
    /// one past its expiry.
    pub fn ensure_valid(&self, now_unix: i64) -> Result<(), Error> {
        if self.used {
            return Err(Error::TokenAlreadyUsed);
        }
        if now_unix >= self.expires_at_unix {
            return Err(Error::TokenExpired);
        }
        Ok(())
    }
}

fn generate_reset_token() -> Result<String, Error> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|_| Error::TokenGeneration)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Create and persist a fresh reset token for the user.
///
/// # Errors
///
/// Returns `Error::TokenGeneration` if the OS RNG fails,
/// `Error::DuplicateKey` on the (negligible) token collision, and
/// `Error::Storage` when the store is unreachable.
pub async fn issue(pool: &PgPool, user_id: Uuid, ttl_hours: i64) -> Result<ResetToken, Error> {
    let token = generate_reset_token()?;

    let query = r"
        INSERT INTO password_reset_tokens (user_id, token, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 hour'))
        RETURNING
            id,
            EXTRACT(EPOCH FROM expires_at)::BIGINT AS expires_at_unix,
            EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(&token)
        .bind(ttl_hours)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(ResetToken {
            id: row.get("id"),
            user_id,
            token,
            expires_at_unix: row.get("expires_at_unix"),
            used: false,
            created_at_unix: row.get("created_at_unix"),
        }),
        Err(err) if is_unique_violation(&err) => Err(Error::DuplicateKey),
        Err(err) => Err(err.into()),
    }
}

/// Fetch a token record by exact match.
///
/// # Errors
///
/// Returns `Error::Storage` when the store is unreachable.
pub async fn lookup(pool: &PgPool, token: &str) -> Result<Option<ResetToken>, Error> {
    let query = r"
        SELECT
            id,
            user_id,
            token,
            EXTRACT(EPOCH FROM expires_at)::BIGINT AS expires_at_unix,
            used,
            EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix
        FROM password_reset_tokens
        WHERE token = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    Ok(row.map(|row| ResetToken {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token: row.get("token"),
        expires_at_unix: row.get("expires_at_unix"),
        used: row.get("used"),
        created_at_unix: row.get("created_at_unix"),
    }))
}

/// Mark a token used, inside the caller's transaction.
///
/// The caller is expected to have checked [`ResetToken::is_valid`] already
/// and to perform the password change in the same transaction, so redemption
/// and the change commit or roll back together. The update is conditioned on
/// `used = FALSE`: under concurrent redemption exactly one writer matches and
/// the loser observes `Error::TokenAlreadyUsed`.
///
/// # Errors
///
/// `Error::TokenAlreadyUsed` when another redemption won the race,
/// `Error::NotFound` when the record no longer exists, `Error::Storage` when
/// the store is unreachable.
pub async fn redeem(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    record: &ResetToken,
) -> Result<(), Error> {
    let query = r"
        UPDATE password_reset_tokens
        SET used = TRUE
        WHERE id = $1
          AND used = FALSE
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(record.id)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await?;

    if row.is_some() {
        return Ok(());
    }

    // Zero rows matched: either the row is gone or someone else redeemed it.
    let query = "SELECT 1 FROM password_reset_tokens WHERE id = $1 LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let exists = sqlx::query(query)
        .bind(record.id)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await?
        .is_some();

    if exists {
        Err(Error::TokenAlreadyUsed)
    } else {
        Err(Error::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    const NOW: i64 = 1_700_000_000;

    fn record(used: bool, expires_at_unix: i64) -> ResetToken {
        ResetToken {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            token: "token".to_string(),
            expires_at_unix,
            used,
            created_at_unix: NOW - 60,
        }
    }

    #[test]
    fn unused_unexpired_is_valid() {
        assert!(record(false, NOW + 3600).is_valid(NOW));
    }

    #[test]
    fn used_is_invalid_even_if_unexpired() {
        assert!(!record(true, NOW + 3600).is_valid(NOW));
    }

    #[test]
    fn expired_is_invalid_even_if_unused() {
        assert!(!record(false, NOW - 1).is_valid(NOW));
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        // now == expires_at is already expired.
        assert!(!record(false, NOW).is_valid(NOW));
    }

    #[test]
    fn ensure_valid_distinguishes_failures() {
        assert!(record(false, NOW + 3600).ensure_valid(NOW).is_ok());
        assert!(matches!(
            record(true, NOW + 3600).ensure_valid(NOW),
            Err(Error::TokenAlreadyUsed)
        ));
        assert!(matches!(
            record(false, NOW - 1).ensure_valid(NOW),
            Err(Error::TokenExpired)
        ));
        // A token that is both used and expired reports "used" first, the
        // same precedence the redeem conditional applies.
        assert!(matches!(
            record(true, NOW - 1).ensure_valid(NOW),
            Err(Error::TokenAlreadyUsed)
        ));
    }

    #[test]
    fn generated_tokens_carry_32_bytes_and_are_url_safe() {
        let token = generate_reset_token().unwrap();
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .unwrap();
        assert_eq!(decoded.len(), 32);
        assert!(!token.contains(['+', '/', '=']));
    }

    #[test]
    fn generated_tokens_differ() {
        let first = generate_reset_token().unwrap();
        let second = generate_reset_token().unwrap();
        assert_ne!(first, second);
    }
}
