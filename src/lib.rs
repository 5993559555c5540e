//! # Sesio (session & credential core)
//!
//! `sesio` is the authentication core behind a CRUD chat backend. It owns the
//! pieces with real invariants — signed fallback tokens, revocation, attempt
//! throttling, single-use reset tokens, cookie policy — and leaves routing,
//! ORM models, and upstream providers to its callers.
//!
//! ## Credential flow
//!
//! An inbound request carries either a bearer/JWT credential or a fallback
//! session cookie. [`token::TokenCodec`] verifies the fallback cookie;
//! [`revocation`] answers whether a JWT's `jti` has been revoked; [`throttle`]
//! gates login and reset endpoints before and after credential checks;
//! [`reset`] backs the out-of-band email reset flow.
//!
//! - **Fallback tokens** are deterministic HMAC-SHA256 signatures with no
//!   expiry of their own; the cookie `Max-Age` from [`cookie::CookiePolicy`]
//!   bounds their validity.
//! - **Secrets** are HMAC key material only, held as
//!   [`secrecy::SecretString`]; they are never logged and never surfaced.
//! - **Storage** is a shared Postgres pool. Every check re-queries; nothing
//!   is cached in-process across requests. Periodic purges
//!   ([`revocation::purge_expired`], [`throttle::purge_old`]) are triggered by
//!   an external scheduler, not a built-in timer.
//!
//! ## Wiring
//!
//! Build an [`AuthConfig`], wrap it with a pool in an [`AuthState`] at
//! startup, and inject the state into handlers. `sql/schema.sql` documents
//! the expected tables.

pub mod cookie;
pub mod error;
pub mod reset;
pub mod revocation;
pub mod state;
pub mod throttle;
pub mod token;

pub use cookie::{CookieAttributes, CookiePolicy, Environment, SESSION_COOKIE_NAME};
pub use error::Error;
pub use reset::ResetToken;
pub use revocation::RevokedToken;
pub use state::{AuthConfig, AuthState};
pub use throttle::AttemptKind;
pub use token::TokenCodec;
