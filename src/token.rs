//! Fallback session tokens signed with HMAC-SHA256.
//!
//! Token format: `<subject>:<hex signature>` where the signature is
//! HMAC-SHA256 over the subject bytes. Generation is deterministic by design:
//! the token carries no randomness and no expiry, so callers must bound its
//! validity elsewhere (for cookies, via `Max-Age`). This is the
//! legacy-compatibility path, not the primary credential.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies fallback session tokens.
///
/// Verification walks an ordered list of candidate keys and accepts the first
/// match: the session-specific secret when configured, then the JWT secret
/// for backward compatibility.
pub struct TokenCodec {
    signing_key: SecretString,
    verify_keys: Vec<SecretString>,
}

impl TokenCodec {
    #[must_use]
    pub fn new(jwt_secret: SecretString, session_secret: Option<SecretString>) -> Self {
        let mut verify_keys = Vec::with_capacity(2);
        if let Some(secret) = &session_secret {
            verify_keys.push(secret.clone());
        }
        verify_keys.push(jwt_secret.clone());

        Self {
            signing_key: session_secret.unwrap_or(jwt_secret),
            verify_keys,
        }
    }

    /// Produce `"{subject}:{hex(signature)}"` for the given subject.
    #[must_use]
    pub fn generate(&self, subject: &str) -> String {
        let signature = sign(&self.signing_key, subject);
        format!("{subject}:{}", hex::encode(signature))
    }

    /// Verify a token and return its subject.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidToken` for any malformed input (missing
    /// separator, non-hex signature) or signature mismatch; the cases are not
    /// distinguished.
    pub fn validate(&self, token: &str) -> Result<String, Error> {
        let (subject, signature_hex) = token.split_once(':').ok_or(Error::InvalidToken)?;
        let signature = hex::decode(signature_hex).map_err(|_| Error::InvalidToken)?;

        for key in &self.verify_keys {
            let mut mac = HmacSha256::new_from_slice(key.expose_secret().as_bytes())
                .expect("HMAC key length is valid");
            mac.update(subject.as_bytes());
            // verify_slice is constant time.
            if mac.verify_slice(&signature).is_ok() {
                return Ok(subject.to_string());
            }
        }

        Err(Error::InvalidToken)
    }
}

fn sign(key: &SecretString, subject: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key.expose_secret().as_bytes())
        .expect("HMAC key length is valid");
    mac.update(subject.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    // HMAC-SHA256("s3cret", "user-42"), stable because the codec is deterministic.
    const GOLDEN_USER_42: &str =
        "user-42:1136c48073bd2ba64f2a18895ff27ecfa11e24ccd2d86972ace148983668a992";

    fn codec(jwt: &str, session: Option<&str>) -> TokenCodec {
        TokenCodec::new(
            SecretString::from(jwt.to_string()),
            session.map(|s| SecretString::from(s.to_string())),
        )
    }

    #[test]
    fn generate_matches_golden_vector() {
        let codec = codec("s3cret", None);
        assert_eq!(codec.generate("user-42"), GOLDEN_USER_42);
    }

    #[test]
    fn generate_prefers_session_secret() {
        // Signing key is the session secret when configured, not the JWT secret.
        let codec = codec("jwt-secret", Some("s3cret"));
        assert_eq!(codec.generate("user-42"), GOLDEN_USER_42);
    }

    #[test]
    fn signature_is_64_hex_chars() {
        let token = codec("s3cret", None).generate("user-42");
        let (subject, signature) = token.split_once(':').unwrap();
        assert_eq!(subject, "user-42");
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn validate_round_trip() {
        let codec = codec("s3cret", None);
        let token = codec.generate("user-42");
        assert_eq!(codec.validate(&token).unwrap(), "user-42");
    }

    #[test]
    fn validate_rejects_zeroed_signature() {
        let codec = codec("s3cret", None);
        let token = format!("user-42:{}", "0".repeat(64));
        assert!(matches!(codec.validate(&token), Err(Error::InvalidToken)));
    }

    #[test]
    fn validate_rejects_tampered_signature() {
        let codec = codec("s3cret", None);
        let token = codec.generate("user-42");
        // Flip the last nibble of the signature.
        let mut tampered = token[..token.len() - 1].to_string();
        tampered.push(if token.ends_with('2') { '3' } else { '2' });
        assert!(matches!(
            codec.validate(&tampered),
            Err(Error::InvalidToken)
        ));
    }

    #[test]
    fn validate_rejects_tampered_subject() {
        let codec = codec("s3cret", None);
        let token = codec.generate("user-42");
        let tampered = token.replacen("user-42", "user-43", 1);
        assert!(matches!(
            codec.validate(&tampered),
            Err(Error::InvalidToken)
        ));
    }

    #[test]
    fn validate_rejects_malformed_input() {
        let codec = codec("s3cret", None);
        assert!(matches!(codec.validate(""), Err(Error::InvalidToken)));
        assert!(matches!(codec.validate("user-42"), Err(Error::InvalidToken)));
        assert!(matches!(
            codec.validate("user-42:not-hex"),
            Err(Error::InvalidToken)
        ));
    }

    #[test]
    fn validate_accepts_either_configured_secret() {
        let session_only = codec("unused", Some("new-secret"));
        let jwt_only = codec("old-secret", None);
        let rotated = codec("old-secret", Some("new-secret"));

        // Tokens signed with the session secret and tokens signed with the
        // old JWT secret both verify against the rotated codec.
        let new_token = session_only.generate("alice");
        let old_token = jwt_only.generate("alice");
        assert_eq!(rotated.validate(&new_token).unwrap(), "alice");
        assert_eq!(rotated.validate(&old_token).unwrap(), "alice");
    }

    #[test]
    fn validate_rejects_unknown_secret() {
        let stranger = codec("some-other-secret", None);
        let rotated = codec("old-secret", Some("new-secret"));
        let token = stranger.generate("alice");
        assert!(matches!(rotated.validate(&token), Err(Error::InvalidToken)));
    }

    #[test]
    fn subject_may_not_smuggle_separator() {
        // Split is on the first colon, so a subject containing one can never
        // round-trip; the recomputed signature covers a shorter prefix.
        let codec = codec("s3cret", None);
        let token = codec.generate("user:42");
        assert!(matches!(codec.validate(&token), Err(Error::InvalidToken)));
    }
}
