//! Error taxonomy for the credential core.
//!
//! Every failure here is per-request; nothing is fatal to the process.
//! Optional subsystems outside this crate (e.g. a cache client) are expected
//! to degrade to "feature disabled" on their own rather than surface through
//! this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed token or signature mismatch. The two cases are deliberately
    /// indistinguishable so callers cannot be used as a validation oracle.
    #[error("invalid token")]
    InvalidToken,
    /// Unique-constraint violation. For revocation this is an idempotent
    /// outcome: the id was already revoked.
    #[error("duplicate key")]
    DuplicateKey,
    #[error("token already used")]
    TokenAlreadyUsed,
    #[error("token expired")]
    TokenExpired,
    #[error("not found")]
    NotFound,
    #[error("failed to generate token")]
    TokenGeneration,
    #[error("storage error")]
    Storage(#[from] sqlx::Error),
}

/// SQLSTATE 23505, Postgres unique violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
