//! Builder patterns for test data construction
//!
//! Provides a fluent API for creating identity token claims.

use crate::test_ids::{TEST_CLIENT_ID, TEST_ISSUER};
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for identity token claims as a managed identity provider issues them.
///
/// Defaults produce a token the service accepts: audience `TEST_CLIENT_ID`,
/// issuer `TEST_ISSUER`, expiring in one hour.
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new()
///     .for_subject("abc123")
///     .with_email("a@x.com")
///     .expires_in(3600)
///     .build();
/// let token = keypair.sign(&claims)?;
/// ```
pub struct TestTokenBuilder {
    sub: Option<String>,
    email: Option<String>,
    aud: Value,
    iss: String,
    exp: i64,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        Self {
            sub: Some("test-subject".to_string()),
            email: Some("test@example.com".to_string()),
            aud: Value::String(TEST_CLIENT_ID.to_string()),
            iss: TEST_ISSUER.to_string(),
            exp: (Utc::now() + Duration::seconds(3600)).timestamp(),
        }
    }

    /// Set the subject (`sub`)
    pub fn for_subject(mut self, subject: &str) -> Self {
        self.sub = Some(subject.to_string());
        self
    }

    /// Omit the `sub` claim entirely
    pub fn without_subject(mut self) -> Self {
        self.sub = None;
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Omit the `email` claim entirely
    pub fn without_email(mut self) -> Self {
        self.email = None;
        self
    }

    /// Set a single-valued audience
    pub fn with_audience(mut self, aud: &str) -> Self {
        self.aud = Value::String(aud.to_string());
        self
    }

    /// Set an array-valued audience
    pub fn with_audiences(mut self, auds: &[&str]) -> Self {
        self.aud = json!(auds);
        self
    }

    pub fn with_issuer(mut self, iss: &str) -> Self {
        self.iss = iss.to_string();
        self
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set an absolute expiration timestamp
    pub fn expires_at(mut self, timestamp: i64) -> Self {
        self.exp = timestamp;
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = Map::new();
        if let Some(sub) = self.sub {
            claims.insert("sub".to_string(), Value::String(sub));
        }
        if let Some(email) = self.email {
            claims.insert("email".to_string(), Value::String(email));
        }
        claims.insert("aud".to_string(), self.aud);
        claims.insert("iss".to_string(), Value::String(self.iss));
        claims.insert("exp".to_string(), json!(self.exp));
        claims.insert("token_use".to_string(), Value::String("id".to_string()));
        Value::Object(claims)
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
