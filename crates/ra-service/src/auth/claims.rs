//! Claims extracted from a verified identity token.
//!
//! `TokenClaims` lives only for the duration of one authentication call. The
//! subject and email identify a person, so both are redacted in Debug output.

use crate::errors::AuthError;
use serde::Deserialize;
use std::fmt;

/// `aud` may be a single string or an array of strings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub(crate) enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    /// True only when the token names exactly one audience equal to `expected`.
    pub(crate) fn is_exactly(&self, expected: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == expected,
            Audience::Many(auds) => matches!(auds.as_slice(), [only] if only == expected),
        }
    }
}

/// Claims as they appear on the wire. Only deserialized after signature,
/// audience, issuer, and expiry validation by `jsonwebtoken`.
#[derive(Debug, Deserialize)]
pub(crate) struct RawClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
    pub iss: String,
    pub aud: Audience,
}

/// Claims from a token whose signature, audience, issuer, and expiry have
/// been verified.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Provider subject identifier (`sub`), if present.
    pub subject_id: Option<String>,

    /// Email address reported by the provider, if present.
    pub email: Option<String>,

    /// Expiration timestamp (Unix epoch seconds).
    pub expiry: i64,

    /// Issuer URL.
    pub issuer: String,

    /// Audience (the configured client identifier).
    pub audience: String,

    /// Key ID the token was verified with.
    pub key_id: String,
}

impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("subject_id", &self.subject_id.as_ref().map(|_| "[REDACTED]"))
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("expiry", &self.expiry)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("key_id", &self.key_id)
            .finish()
    }
}

impl TokenClaims {
    /// The subject and email needed to sync a user record.
    ///
    /// Empty strings count as absent.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IncompleteClaims` naming the first missing claim.
    pub fn identity(&self) -> Result<(&str, &str), AuthError> {
        let subject = self
            .subject_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::IncompleteClaims("sub"))?;

        let email = self
            .email
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::IncompleteClaims("email"))?;

        Ok((subject, email))
    }
}
