//! Configuration and process-level context.
//!
//! `AuthState` is constructed once at startup and passed into handlers; there
//! is no global, lazily-created client handle. The pool it owns is safe for
//! concurrent use, lives for the process lifetime, and is torn down
//! explicitly via [`AuthState::shutdown`].

use secrecy::SecretString;
use sqlx::PgPool;

use crate::cookie::{CookiePolicy, Environment};
use crate::reset::DEFAULT_RESET_TTL_HOURS;
use crate::throttle::{DEFAULT_RETENTION_HOURS, DEFAULT_WINDOW_MINUTES};
use crate::token::TokenCodec;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;

/// Auth core configuration. The JWT secret is required; the session secret is
/// an optional, separate key for fallback session tokens. Both are HMAC key
/// material only: never logged (secrecy redacts them from `Debug`) and never
/// returned to callers.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    jwt_secret: SecretString,
    session_secret: Option<SecretString>,
    environment: Environment,
    cookie_domain: Option<String>,
    session_ttl_seconds: i64,
    throttle_window_minutes: i64,
    attempt_retention_hours: i64,
    reset_ttl_hours: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            session_secret: None,
            environment: Environment::Development,
            cookie_domain: None,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            throttle_window_minutes: DEFAULT_WINDOW_MINUTES,
            attempt_retention_hours: DEFAULT_RETENTION_HOURS,
            reset_ttl_hours: DEFAULT_RESET_TTL_HOURS,
        }
    }

    #[must_use]
    pub fn with_session_secret(mut self, secret: SecretString) -> Self {
        self.session_secret = Some(secret);
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_cookie_domain(mut self, domain: String) -> Self {
        self.cookie_domain = Some(domain);
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_throttle_window_minutes(mut self, minutes: i64) -> Self {
        self.throttle_window_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_attempt_retention_hours(mut self, hours: i64) -> Self {
        self.attempt_retention_hours = hours;
        self
    }

    #[must_use]
    pub fn with_reset_ttl_hours(mut self, hours: i64) -> Self {
        self.reset_ttl_hours = hours;
        self
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn throttle_window_minutes(&self) -> i64 {
        self.throttle_window_minutes
    }

    #[must_use]
    pub fn attempt_retention_hours(&self) -> i64 {
        self.attempt_retention_hours
    }

    #[must_use]
    pub fn reset_ttl_hours(&self) -> i64 {
        self.reset_ttl_hours
    }
}

/// Shared context handed to request handlers: the connection pool plus the
/// codec and cookie policy derived from configuration.
pub struct AuthState {
    pool: PgPool,
    config: AuthConfig,
    codec: TokenCodec,
    cookies: CookiePolicy,
}

impl AuthState {
    #[must_use]
    pub fn new(pool: PgPool, config: AuthConfig) -> Self {
        let codec = TokenCodec::new(config.jwt_secret.clone(), config.session_secret.clone());
        let cookies = CookiePolicy::new(config.environment)
            .with_configured_domain(config.cookie_domain.clone())
            .with_max_age_seconds(config.session_ttl_seconds);
        Self {
            pool,
            config,
            codec,
            cookies,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    #[must_use]
    pub fn cookies(&self) -> &CookiePolicy {
        &self.cookies
    }

    /// Close the pool. Called from the process shutdown hook.
    pub async fn shutdown(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new(SecretString::from("jwt-secret".to_string()))
    }

    #[test]
    fn defaults_and_overrides() {
        let config = config();
        assert_eq!(config.environment(), Environment::Development);
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);
        assert_eq!(config.throttle_window_minutes(), DEFAULT_WINDOW_MINUTES);
        assert_eq!(config.attempt_retention_hours(), DEFAULT_RETENTION_HOURS);
        assert_eq!(config.reset_ttl_hours(), DEFAULT_RESET_TTL_HOURS);

        let config = config
            .with_environment(Environment::Production)
            .with_cookie_domain("sesio.dev".to_string())
            .with_session_ttl_seconds(3600)
            .with_throttle_window_minutes(5)
            .with_attempt_retention_hours(48)
            .with_reset_ttl_hours(2);
        assert_eq!(config.environment(), Environment::Production);
        assert_eq!(config.session_ttl_seconds(), 3600);
        assert_eq!(config.throttle_window_minutes(), 5);
        assert_eq!(config.attempt_retention_hours(), 48);
        assert_eq!(config.reset_ttl_hours(), 2);
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = config().with_session_secret(SecretString::from("hunter2".to_string()));
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("jwt-secret"));
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn state_derives_codec_and_cookie_policy() {
        let pool = PgPool::connect_lazy("postgres://localhost/sesio").unwrap();
        let config = config()
            .with_environment(Environment::Production)
            .with_cookie_domain("sesio.dev".to_string());
        let state = AuthState::new(pool, config);

        let token = state.codec().generate("user-42");
        assert_eq!(state.codec().validate(&token).unwrap(), "user-42");

        let cookie = state.cookies().session_cookie("tok").unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Domain=sesio.dev"));
    }
}
