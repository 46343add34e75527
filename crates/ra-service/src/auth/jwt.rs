//! Token verification against the identity provider's published keys.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (via `common::jwt`)
//! - The key is chosen by `kid` from the trusted key set; the token header
//!   `alg` must equal the algorithm that key was published for
//! - `aud` must be exactly the configured client identifier
//! - `iss` must equal the configured issuer URL
//! - `exp` must be strictly in the future, with no leeway
//! - The raw token is never logged

use crate::auth::claims::{RawClaims, TokenClaims};
use crate::auth::jwks::JwksClient;
use crate::errors::AuthError;
use crate::observability::metrics;
use common::jwt::{decode_unverified_header, is_expired};
use jsonwebtoken::{decode, Algorithm, Validation};
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

/// JWT validator bound to one issuer and one app client.
pub struct JwtValidator {
    /// Key-set cache shared with the rest of the process.
    jwks_client: Arc<JwksClient>,

    /// Expected `iss`.
    issuer: String,

    /// Expected `aud`.
    client_id: String,
}

impl JwtValidator {
    /// Create a new JWT validator.
    ///
    /// # Arguments
    ///
    /// * `jwks_client` - Key-set cache for the provider's public keys
    /// * `issuer` - Exact issuer URL tokens must carry
    /// * `client_id` - App client identifier tokens must carry as audience
    pub fn new(jwks_client: Arc<JwksClient>, issuer: String, client_id: String) -> Self {
        Self {
            jwks_client,
            issuer,
            client_id,
        }
    }

    pub fn jwks_client(&self) -> &Arc<JwksClient> {
        &self.jwks_client
    }

    /// Verify a compact JWS and return its claims.
    ///
    /// # Errors
    ///
    /// - `AuthError::KeySetUnavailable` if the key set had to be fetched and
    ///   the fetch failed
    /// - `AuthError::InvalidToken` for every credential problem: malformed
    ///   token, unknown key, bad signature, wrong algorithm, audience, or
    ///   issuer, and expiry
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let result = self.verify_inner(token).await;

        match &result {
            Ok(claims) => {
                tracing::debug!(target: "ra.auth.jwt", kid = %claims.key_id, "Token validated successfully");
                metrics::record_token_validation("success");
            }
            Err(e) => metrics::record_token_validation(e.cause()),
        }

        result
    }

    async fn verify_inner(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let header = decode_unverified_header(token).map_err(|e| {
            tracing::debug!(target: "ra.auth.jwt", error = ?e, "Token header rejected");
            AuthError::InvalidToken("malformed token".to_string())
        })?;

        let key_set = self.jwks_client.get_keys().await?;

        // No refetch on an unknown kid; rotation is picked up at the next TTL expiry.
        let key = key_set.get(&header.kid).ok_or_else(|| {
            tracing::debug!(target: "ra.auth.jwt", kid = %header.kid, "Token kid not in key set");
            AuthError::InvalidToken("unknown key id".to_string())
        })?;

        let header_alg = header
            .alg
            .as_deref()
            .and_then(|alg| Algorithm::from_str(alg).ok());
        if header_alg != Some(key.algorithm) {
            tracing::debug!(
                target: "ra.auth.jwt",
                kid = %key.key_id,
                header_alg = header.alg.as_deref().unwrap_or(""),
                key_alg = ?key.algorithm,
                "Token algorithm does not match key"
            );
            return Err(AuthError::InvalidToken("algorithm mismatch".to_string()));
        }

        let mut validation = Validation::new(key.algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);

        let token_data = decode::<RawClaims>(token, &key.key_material, &validation).map_err(|e| {
            tracing::debug!(target: "ra.auth.jwt", error = %e, "Token verification failed");
            AuthError::InvalidToken(format!("verification failed: {:?}", e.kind()))
        })?;
        let raw = token_data.claims;

        // jsonwebtoken accepts exp == now and any overlapping audience; both
        // are tightened here.
        if is_expired(raw.exp) {
            tracing::debug!(target: "ra.auth.jwt", exp = raw.exp, "Token expired");
            return Err(AuthError::InvalidToken("expired".to_string()));
        }

        if !raw.aud.is_exactly(&self.client_id) {
            tracing::debug!(target: "ra.auth.jwt", "Token audience is not exactly the client id");
            return Err(AuthError::InvalidToken("audience mismatch".to_string()));
        }

        Ok(TokenClaims {
            subject_id: raw.sub,
            email: raw.email,
            expiry: raw.exp,
            issuer: raw.iss,
            audience: self.client_id.clone(),
            key_id: key.key_id.clone(),
        })
    }
}
