//! Request authentication.
//!
//! Turns an `Authorization` header value into a [`UserRecord`] or the single
//! [`Unauthenticated`] failure. The specific cause is logged and counted here
//! and goes no further.

use crate::auth::jwt::JwtValidator;
use crate::errors::{AuthError, Unauthenticated};
use crate::models::UserRecord;
use crate::observability::metrics;
use crate::services::UserResolver;
use std::sync::Arc;
use tracing::instrument;

/// Extract the token from `Bearer <token>`.
///
/// The header must split on whitespace into exactly two parts and the scheme
/// is matched case-insensitively.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Some(token),
        _ => None,
    }
}

/// Composes token verification and user resolution.
#[derive(Clone)]
pub struct RequestAuthenticator {
    validator: Arc<JwtValidator>,
    resolver: Arc<dyn UserResolver>,
}

impl RequestAuthenticator {
    pub fn new(validator: Arc<JwtValidator>, resolver: Arc<dyn UserResolver>) -> Self {
        Self {
            validator,
            resolver,
        }
    }

    pub fn validator(&self) -> &Arc<JwtValidator> {
        &self.validator
    }

    /// Authenticate a request from its `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` for every failure: malformed header, invalid
    /// token, missing claims, unavailable key set or user store.
    #[instrument(skip_all, name = "ra.auth.authenticate")]
    pub async fn authenticate(&self, authorization: &str) -> Result<UserRecord, Unauthenticated> {
        let Some(token) = parse_bearer(authorization) else {
            tracing::debug!(
                target: "ra.auth.authenticator",
                cause = "malformed_header",
                "Authentication failed"
            );
            metrics::record_auth_request("malformed_header");
            return Err(Unauthenticated);
        };

        match self.authenticate_token(token).await {
            Ok(user) => {
                tracing::debug!(target: "ra.auth.authenticator", user_id = %user.id, "Request authenticated");
                metrics::record_auth_request("success");
                Ok(user)
            }
            Err(e) => {
                log_failure(&e);
                metrics::record_auth_request(e.cause());
                Err(Unauthenticated)
            }
        }
    }

    async fn authenticate_token(&self, token: &str) -> Result<UserRecord, AuthError> {
        let claims = self.validator.verify(token).await?;
        self.resolver.resolve(&claims).await
    }
}

fn log_failure(error: &AuthError) {
    match error {
        AuthError::KeySetUnavailable(_) => tracing::warn!(
            target: "ra.auth.authenticator",
            cause = error.cause(),
            error = %error,
            "Authentication failed: identity provider keys unavailable"
        ),
        AuthError::StoreUnavailable(_) => tracing::error!(
            target: "ra.auth.authenticator",
            cause = error.cause(),
            error = %error,
            "Authentication failed: user store unavailable"
        ),
        AuthError::UserConflict => tracing::warn!(
            target: "ra.auth.authenticator",
            cause = error.cause(),
            "Authentication failed: user conflict"
        ),
        AuthError::InvalidToken(_) | AuthError::IncompleteClaims(_) => tracing::debug!(
            target: "ra.auth.authenticator",
            cause = error.cause(),
            error = %error,
            "Authentication failed"
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::{Jwk, JwksClient, SigningKey, SigningKeySet};
    use crate::models::PlanTier;
    use crate::services::MockUserResolver;
    use chrono::Utc;
    use ra_test_utils::{TestKeypair, TestTokenBuilder, TEST_CLIENT_ID, TEST_ISSUER, TEST_KID};
    use std::time::Duration;
    use uuid::Uuid;

    fn user() -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            external_subject_id: "abc123".to_string(),
            plan_tier: PlanTier::Trial,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn authenticator_with(
        resolver: Arc<MockUserResolver>,
    ) -> (RequestAuthenticator, TestKeypair) {
        let keypair = TestKeypair::ed25519(1, TEST_KID).unwrap();
        let jwk: Jwk = serde_json::from_value(keypair.jwk_json()).unwrap();

        let client = JwksClient::new(
            "http://127.0.0.1:9/.well-known/jwks.json".to_string(),
            Duration::from_millis(200),
        );
        client
            .install(SigningKeySet::new(vec![SigningKey::from_jwk(&jwk).unwrap()]))
            .await;

        let validator = Arc::new(JwtValidator::new(
            Arc::new(client),
            TEST_ISSUER.to_string(),
            TEST_CLIENT_ID.to_string(),
        ));

        (RequestAuthenticator::new(validator, resolver), keypair)
    }

    #[test]
    fn test_parse_bearer_accepts_any_scheme_case() {
        assert_eq!(parse_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(parse_bearer("bearer abc"), Some("abc"));
        assert_eq!(parse_bearer("BEARER abc"), Some("abc"));
        assert_eq!(parse_bearer("  Bearer \t abc  "), Some("abc"));
    }

    #[test]
    fn test_parse_bearer_rejects_malformed_headers() {
        for header in [
            "",
            "Bearer",
            "Bearer ",
            "abc.def.ghi",
            "Basic dXNlcjpwYXNz",
            "Bearer abc def",
            "Token abc",
        ] {
            assert_eq!(parse_bearer(header), None, "header {header:?} should be rejected");
        }
    }

    #[tokio::test]
    async fn test_valid_token_resolves_user() {
        let expected = user();
        let resolver = Arc::new(MockUserResolver::returning(expected.clone()));
        let (authenticator, keypair) = authenticator_with(resolver.clone()).await;
        let token = keypair
            .sign(&TestTokenBuilder::new().for_subject("abc123").with_email("a@x.com").build())
            .unwrap();

        let user = authenticator
            .authenticate(&format!("Bearer {token}"))
            .await
            .unwrap();

        assert_eq!(user, expected);
        assert_eq!(resolver.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_header_never_reaches_resolver() {
        let resolver = Arc::new(MockUserResolver::returning(user()));
        let (authenticator, keypair) = authenticator_with(resolver.clone()).await;
        let token = keypair.sign(&TestTokenBuilder::new().build()).unwrap();

        for header in [token.clone(), format!("Basic {token}"), format!("Bearer {token} x")] {
            assert_eq!(authenticator.authenticate(&header).await, Err(Unauthenticated));
        }
        assert_eq!(resolver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_token_never_reaches_resolver() {
        let resolver = Arc::new(MockUserResolver::returning(user()));
        let (authenticator, keypair) = authenticator_with(resolver.clone()).await;
        let token = keypair
            .sign(&TestTokenBuilder::new().expires_in(-10).build())
            .unwrap();

        assert_eq!(
            authenticator.authenticate(&format!("Bearer {token}")).await,
            Err(Unauthenticated)
        );
        assert_eq!(resolver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_incomplete_claims_collapse_to_unauthenticated() {
        let resolver = Arc::new(MockUserResolver::returning(user()));
        let (authenticator, keypair) = authenticator_with(resolver.clone()).await;
        let token = keypair
            .sign(&TestTokenBuilder::new().without_email().build())
            .unwrap();

        assert_eq!(
            authenticator.authenticate(&format!("Bearer {token}")).await,
            Err(Unauthenticated)
        );
        assert_eq!(resolver.call_count(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_collapses_to_unauthenticated() {
        let resolver = Arc::new(MockUserResolver::failing(AuthError::StoreUnavailable(
            "connection refused".to_string(),
        )));
        let (authenticator, keypair) = authenticator_with(resolver).await;
        let token = keypair.sign(&TestTokenBuilder::new().build()).unwrap();

        assert_eq!(
            authenticator.authenticate(&format!("bearer {token}")).await,
            Err(Unauthenticated)
        );
    }
}
