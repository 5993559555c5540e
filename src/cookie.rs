//! Session cookie policy and header helpers.
//!
//! The policy is a pure decision: given the environment and optional
//! overrides it resolves the final cookie attributes, so it can be unit
//! tested without a live response object. Rendering produces `Set-Cookie`
//! header values for axum handlers.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};

pub const SESSION_COOKIE_NAME: &str = "sesio_session";

const DEFAULT_MAX_AGE_SECONDS: i64 = 12 * 60 * 60;

/// Deployment environment, as far as cookies care.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    /// `"production"` maps to [`Environment::Production`]; everything else is
    /// treated as development.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }
}

/// Resolved cookie attributes. `HttpOnly`, `SameSite=Lax`, and `Path=/` are
/// fixed; only `Secure`, `Domain`, and `Max-Age` vary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieAttributes {
    pub secure: bool,
    pub domain: Option<String>,
    pub http_only: bool,
    pub same_site: &'static str,
    pub path: &'static str,
    pub max_age_seconds: i64,
}

#[derive(Clone, Debug)]
pub struct CookiePolicy {
    environment: Environment,
    secure_override: Option<bool>,
    domain_override: Option<String>,
    configured_domain: Option<String>,
    max_age_seconds: i64,
}

impl CookiePolicy {
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            secure_override: None,
            domain_override: None,
            configured_domain: None,
            max_age_seconds: DEFAULT_MAX_AGE_SECONDS,
        }
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure_override = Some(secure);
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: String) -> Self {
        self.domain_override = Some(domain);
        self
    }

    #[must_use]
    pub fn with_configured_domain(mut self, domain: Option<String>) -> Self {
        self.configured_domain = domain;
        self
    }

    #[must_use]
    pub fn with_max_age_seconds(mut self, seconds: i64) -> Self {
        self.max_age_seconds = seconds;
        self
    }

    /// Resolve the final attributes: explicit overrides win, then the
    /// configured fallback, then environment defaults.
    #[must_use]
    pub fn attributes(&self) -> CookieAttributes {
        CookieAttributes {
            secure: self
                .secure_override
                .unwrap_or(self.environment == Environment::Production),
            domain: self
                .domain_override
                .clone()
                .or_else(|| self.configured_domain.clone()),
            http_only: true,
            same_site: "Lax",
            path: "/",
            max_age_seconds: self.max_age_seconds,
        }
    }

    /// Build the `Set-Cookie` value carrying a session token.
    ///
    /// # Errors
    ///
    /// Fails only if the rendered cookie is not a valid header value, e.g. a
    /// token containing control characters.
    pub fn session_cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        self.render(token, self.max_age_seconds)
    }

    /// Build the `Set-Cookie` value that clears the session cookie.
    ///
    /// # Errors
    ///
    /// Fails only if the rendered cookie is not a valid header value.
    pub fn clear_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        self.render("", 0)
    }

    fn render(&self, token: &str, max_age: i64) -> Result<HeaderValue, InvalidHeaderValue> {
        let attributes = self.attributes();
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={token}; Path={}; HttpOnly; SameSite={}; Max-Age={max_age}",
            attributes.path, attributes.same_site
        );
        if attributes.secure {
            cookie.push_str("; Secure");
        }
        if let Some(domain) = &attributes.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        HeaderValue::from_str(&cookie)
    }
}

/// Pull the session credential out of request headers: a bearer token when
/// present, otherwise the session cookie.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

/// Pull a bearer token out of the `Authorization` header, if any.
#[must_use]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
