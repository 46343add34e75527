//! Key-set cache for the identity provider's public signing keys.
//!
//! Fetches the provider's `/.well-known/jwks.json` document and keeps the
//! parsed key set for a fixed TTL (one hour). Refresh is lazy: the first
//! `get_keys()` call after expiry fetches a new set and swaps it in whole.
//!
//! # Concurrency
//!
//! - Readers take a short read guard and clone an `Arc<SigningKeySet>`
//! - The network fetch runs with no lock held, so a slow refresh never blocks
//!   readers of a still-valid set
//! - Concurrent refreshes after expiry are redundant, last writer wins
//! - A failed refresh never touches the existing cache

use crate::errors::AuthError;
use crate::observability::metrics;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// TTL for a fetched key set (1 hour).
pub const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Default bound on the JWKS HTTP fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON Web Key as published by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA", "EC" or "OKP").
    pub kty: String,

    /// Key ID - matched against the token header's `kid`.
    #[serde(default)]
    pub kid: Option<String>,

    /// Declared algorithm (e.g. "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use; only "sig" keys are usable.
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Curve name for EC/OKP keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// EC x coordinate or OKP public key (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// A verification key ready for use with `jsonwebtoken`.
#[derive(Clone)]
pub struct SigningKey {
    /// Key ID.
    pub key_id: String,

    /// The only algorithm this key verifies.
    pub algorithm: Algorithm,

    /// Public key material.
    pub key_material: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Why a JWK could not be turned into a [`SigningKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwkRejection {
    MissingKid,
    NotForSigning,
    UnsupportedKeyType,
    AlgorithmMismatch,
    MissingComponent(&'static str),
    InvalidComponent,
}

impl SigningKey {
    /// Build a verification key from a published JWK.
    ///
    /// The algorithm comes from the JWK's `alg` when present, otherwise from
    /// its key type (and curve for EC). Symmetric algorithms are never
    /// accepted.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, JwkRejection> {
        let key_id = jwk
            .kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or(JwkRejection::MissingKid)?
            .to_string();

        if let Some(key_use) = &jwk.key_use {
            if key_use != "sig" {
                return Err(JwkRejection::NotForSigning);
            }
        }

        let algorithm = resolve_algorithm(jwk)?;

        let key_material = match jwk.kty.as_str() {
            "RSA" => {
                let n = jwk.n.as_deref().ok_or(JwkRejection::MissingComponent("n"))?;
                let e = jwk.e.as_deref().ok_or(JwkRejection::MissingComponent("e"))?;
                DecodingKey::from_rsa_components(n, e)
            }
            "EC" => {
                let x = jwk.x.as_deref().ok_or(JwkRejection::MissingComponent("x"))?;
                let y = jwk.y.as_deref().ok_or(JwkRejection::MissingComponent("y"))?;
                DecodingKey::from_ec_components(x, y)
            }
            "OKP" => {
                let x = jwk.x.as_deref().ok_or(JwkRejection::MissingComponent("x"))?;
                DecodingKey::from_ed_components(x)
            }
            _ => return Err(JwkRejection::UnsupportedKeyType),
        }
        .map_err(|_| JwkRejection::InvalidComponent)?;

        Ok(Self {
            key_id,
            algorithm,
            key_material,
        })
    }
}

fn resolve_algorithm(jwk: &Jwk) -> Result<Algorithm, JwkRejection> {
    let family: &[Algorithm] = match jwk.kty.as_str() {
        "RSA" => &[
            Algorithm::RS256,
            Algorithm::RS384,
            Algorithm::RS512,
            Algorithm::PS256,
            Algorithm::PS384,
            Algorithm::PS512,
        ],
        "EC" => &[Algorithm::ES256, Algorithm::ES384],
        "OKP" => &[Algorithm::EdDSA],
        _ => return Err(JwkRejection::UnsupportedKeyType),
    };

    let algorithm = match &jwk.alg {
        Some(alg) => Algorithm::from_str(alg).map_err(|_| JwkRejection::AlgorithmMismatch)?,
        None => match (jwk.kty.as_str(), jwk.crv.as_deref()) {
            ("RSA", _) => Algorithm::RS256,
            ("EC", Some("P-384")) => Algorithm::ES384,
            ("EC", _) => Algorithm::ES256,
            _ => Algorithm::EdDSA,
        },
    };

    if family.contains(&algorithm) {
        Ok(algorithm)
    } else {
        Err(JwkRejection::AlgorithmMismatch)
    }
}

/// An immutable snapshot of the provider's signing keys.
#[derive(Debug)]
pub struct SigningKeySet {
    keys: HashMap<String, SigningKey>,
    fetched_at: Instant,
}

impl SigningKeySet {
    /// Build a set stamped with the current instant.
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(|key| (key.key_id.clone(), key))
                .collect(),
            fetched_at: Instant::now(),
        }
    }

    /// Parse a JWKS document, skipping keys that cannot be used.
    pub fn from_jwks(jwks: JwksResponse) -> Self {
        let keys = jwks
            .keys
            .iter()
            .filter_map(|jwk| match SigningKey::from_jwk(jwk) {
                Ok(key) => Some(key),
                Err(reason) => {
                    tracing::warn!(
                        target: "ra.auth.jwks",
                        kid = jwk.kid.as_deref().unwrap_or(""),
                        kty = %jwk.kty,
                        reason = ?reason,
                        "Skipping unusable JWK"
                    );
                    None
                }
            })
            .collect();

        Self::new(keys)
    }

    /// Exact, case-sensitive lookup by key ID.
    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key IDs in this set, sorted.
    pub fn key_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// When this set was fetched.
    pub fn fetched_instant(&self) -> Instant {
        self.fetched_at
    }

    /// Whether the set is still within `ttl` of its fetch time.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// JWKS client with a TTL-bound key-set cache.
///
/// Construct once at startup and share it by `Arc`.
pub struct JwksClient {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    /// Cached key set.
    cache: RwLock<Option<Arc<SigningKeySet>>>,

    /// How long a fetched set stays valid.
    cache_ttl: Duration,

    /// Bound on a single fetch.
    fetch_timeout: Duration,
}

impl JwksClient {
    /// Create a client with the production TTL.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL of the provider's JWKS document
    /// * `fetch_timeout` - Bound on each fetch; expiry surfaces as `KeySetUnavailable`
    pub fn new(jwks_url: String, fetch_timeout: Duration) -> Self {
        Self::with_ttl(jwks_url, fetch_timeout, JWKS_CACHE_TTL)
    }

    /// Create a client with a custom cache TTL.
    pub fn with_ttl(jwks_url: String, fetch_timeout: Duration, cache_ttl: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "ra.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(None),
            cache_ttl,
            fetch_timeout,
        }
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Return the cached key set if it is still fresh, otherwise fetch a new one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySetUnavailable` if a fetch was needed and failed.
    /// The previous cache (if any) is left as it was.
    #[instrument(skip_all)]
    pub async fn get_keys(&self) -> Result<Arc<SigningKeySet>, AuthError> {
        if let Some(cached) = self.cached().await {
            if cached.is_fresh(self.cache_ttl) {
                tracing::debug!(target: "ra.auth.jwks", key_count = cached.len(), "JWKS cache hit");
                return Ok(cached);
            }
            tracing::debug!(target: "ra.auth.jwks", "JWKS cache expired");
        }

        self.refresh().await
    }

    /// The currently cached set, fresh or not. Never touches the network.
    pub async fn cached(&self) -> Option<Arc<SigningKeySet>> {
        self.cache.read().await.clone()
    }

    /// Fetch the key set and replace the cache with it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySetUnavailable` on connect errors, timeouts,
    /// non-success statuses, unparseable bodies, or a document with no usable
    /// keys.
    #[instrument(skip_all)]
    pub async fn refresh(&self) -> Result<Arc<SigningKeySet>, AuthError> {
        let start = Instant::now();
        let result = self.fetch().await;
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_jwks_refresh(status, start.elapsed());

        let key_set = Arc::new(result?);

        tracing::info!(
            target: "ra.auth.jwks",
            key_count = key_set.len(),
            "JWKS cache refreshed"
        );

        let mut cache = self.cache.write().await;
        *cache = Some(Arc::clone(&key_set));

        Ok(key_set)
    }

    async fn fetch(&self) -> Result<SigningKeySet, AuthError> {
        tracing::debug!(target: "ra.auth.jwks", url = %self.jwks_url, "Fetching JWKS from identity provider");

        let request = async {
            let response = self
                .http_client
                .get(&self.jwks_url)
                .send()
                .await
                .map_err(|e| {
                    tracing::error!(target: "ra.auth.jwks", error = %e, "Failed to fetch JWKS");
                    AuthError::KeySetUnavailable(format!("request failed: {e}"))
                })?;

            if !response.status().is_success() {
                tracing::error!(
                    target: "ra.auth.jwks",
                    status = %response.status(),
                    "JWKS endpoint returned error"
                );
                return Err(AuthError::KeySetUnavailable(format!(
                    "endpoint returned HTTP {}",
                    response.status()
                )));
            }

            response.json::<JwksResponse>().await.map_err(|e| {
                tracing::error!(target: "ra.auth.jwks", error = %e, "Failed to parse JWKS response");
                AuthError::KeySetUnavailable(format!("unparseable response: {e}"))
            })
        };

        let jwks = tokio::time::timeout(self.fetch_timeout, request)
            .await
            .map_err(|_| {
                tracing::error!(
                    target: "ra.auth.jwks",
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "JWKS fetch timed out"
                );
                AuthError::KeySetUnavailable("fetch timed out".to_string())
            })??;

        let key_set = SigningKeySet::from_jwks(jwks);
        if key_set.is_empty() {
            tracing::error!(target: "ra.auth.jwks", "JWKS response contained no usable keys");
            return Err(AuthError::KeySetUnavailable(
                "no usable keys in response".to_string(),
            ));
        }

        Ok(key_set)
    }

    /// Install a key set directly, bypassing the network.
    #[cfg(test)]
    pub(crate) async fn install(&self, key_set: SigningKeySet) {
        *self.cache.write().await = Some(Arc::new(key_set));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // Public half of a 2048-bit RSA test key.
    const TEST_RSA_N: &str = "ujA7O7WykvdNml1xLBT0o3Uwt0tmyI-hK3X67Doq3L9-T03JH90IYcE8AgxKd62mAv2xw0mCsrc8MsiyAQsgZjmWK2iKvgP5x2sKFTTcg6I8ETtEYNeIHbBRvIRrdCmUfgbhEw1Orjs6Vt7yqd4fGXjR4Gz5LfRMqv2-oyax08C4UmXvTdbNvNjVdRUq2NLBhmUueHG9HtzH-r6ofKvHyXt5eTmWHoOkvv5DRRXLWFEbtzQM3dJlQdl_I1ro5j9SeBuS9DS5pgpqG3-cqIc5TTW948QoJYCNO192hF2y8Y_hi4yLlpZx9_EMRv9ceJHp6zmFSuaBrgDMIUMYuU4GXw";
    const TEST_RSA_E: &str = "AQAB";

    fn rsa_jwk(kid: &str) -> Jwk {
        serde_json::from_value(serde_json::json!({
            "kty": "RSA",
            "kid": kid,
            "alg": "RS256",
            "use": "sig",
            "n": TEST_RSA_N,
            "e": TEST_RSA_E,
        }))
        .unwrap()
    }

    #[test]
    fn test_jwks_response_deserialization() {
        let json = r#"{
            "keys": [
                {"kty": "RSA", "kid": "key-1", "alg": "RS256", "use": "sig", "n": "AQAB", "e": "AQAB"},
                {"kty": "OKP", "kid": "key-2", "crv": "Ed25519", "x": "dGVzdA"}
            ]
        }"#;

        let jwks: JwksResponse = serde_json::from_str(json).unwrap();

        assert_eq!(jwks.keys.len(), 2);
        assert_eq!(jwks.keys.first().unwrap().kid.as_deref(), Some("key-1"));
        assert_eq!(jwks.keys.get(1).unwrap().crv.as_deref(), Some("Ed25519"));
    }

    #[test]
    fn test_signing_key_from_rsa_jwk() {
        let key = SigningKey::from_jwk(&rsa_jwk("rsa-1")).unwrap();

        assert_eq!(key.key_id, "rsa-1");
        assert_eq!(key.algorithm, Algorithm::RS256);
    }

    #[test]
    fn test_signing_key_defaults_rsa_algorithm() {
        let mut jwk = rsa_jwk("rsa-1");
        jwk.alg = None;

        let key = SigningKey::from_jwk(&jwk).unwrap();
        assert_eq!(key.algorithm, Algorithm::RS256);
    }

    #[test]
    fn test_signing_key_rejects_missing_or_empty_kid() {
        let mut jwk = rsa_jwk("rsa-1");
        jwk.kid = None;
        assert_eq!(
            SigningKey::from_jwk(&jwk).unwrap_err(),
            JwkRejection::MissingKid
        );

        jwk.kid = Some(String::new());
        assert_eq!(
            SigningKey::from_jwk(&jwk).unwrap_err(),
            JwkRejection::MissingKid
        );
    }

    #[test]
    fn test_signing_key_rejects_encryption_keys() {
        let mut jwk = rsa_jwk("rsa-1");
        jwk.key_use = Some("enc".to_string());

        assert_eq!(
            SigningKey::from_jwk(&jwk).unwrap_err(),
            JwkRejection::NotForSigning
        );
    }

    #[test]
    fn test_signing_key_rejects_symmetric_algorithm_on_rsa_key() {
        let mut jwk = rsa_jwk("rsa-1");
        jwk.alg = Some("HS256".to_string());

        assert_eq!(
            SigningKey::from_jwk(&jwk).unwrap_err(),
            JwkRejection::AlgorithmMismatch
        );
    }

    #[test]
    fn test_signing_key_rejects_cross_family_algorithm() {
        let mut jwk = rsa_jwk("rsa-1");
        jwk.alg = Some("EdDSA".to_string());

        assert_eq!(
            SigningKey::from_jwk(&jwk).unwrap_err(),
            JwkRejection::AlgorithmMismatch
        );
    }

    #[test]
    fn test_signing_key_rejects_unknown_key_type() {
        let mut jwk = rsa_jwk("oct-1");
        jwk.kty = "oct".to_string();

        assert_eq!(
            SigningKey::from_jwk(&jwk).unwrap_err(),
            JwkRejection::UnsupportedKeyType
        );
    }

    #[test]
    fn test_signing_key_requires_rsa_components() {
        let mut jwk = rsa_jwk("rsa-1");
        jwk.n = None;

        assert_eq!(
            SigningKey::from_jwk(&jwk).unwrap_err(),
            JwkRejection::MissingComponent("n")
        );
    }

    #[test]
    fn test_key_set_skips_unusable_keys() {
        let mut broken = rsa_jwk("broken");
        broken.kty = "oct".to_string();

        let set = SigningKeySet::from_jwks(JwksResponse {
            keys: vec![rsa_jwk("good"), broken],
        });

        assert_eq!(set.len(), 1);
        assert!(set.get("good").is_some());
        assert!(set.get("broken").is_none());
    }

    #[test]
    fn test_key_set_lookup_is_case_sensitive() {
        let set = SigningKeySet::from_jwks(JwksResponse {
            keys: vec![rsa_jwk("Key-A")],
        });

        assert!(set.get("Key-A").is_some());
        assert!(set.get("key-a").is_none());
    }

    #[test]
    fn test_key_set_freshness() {
        let key = SigningKey::from_jwk(&rsa_jwk("rsa-1")).unwrap();
        let set = SigningKeySet::new(vec![key]);

        assert!(set.is_fresh(JWKS_CACHE_TTL));
        assert!(!set.is_fresh(Duration::ZERO));
    }

    #[test]
    fn test_signing_key_debug_hides_material() {
        let key = SigningKey::from_jwk(&rsa_jwk("rsa-1")).unwrap();
        let debug = format!("{:?}", key);

        assert!(debug.contains("rsa-1"));
        assert!(!debug.contains("key_material"));
    }

    #[test]
    fn test_jwks_client_uses_one_hour_ttl() {
        let client = JwksClient::new(
            "http://localhost:4000/.well-known/jwks.json".to_string(),
            DEFAULT_FETCH_TIMEOUT,
        );
        assert_eq!(client.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(
            client.jwks_url(),
            "http://localhost:4000/.well-known/jwks.json"
        );
    }

    #[tokio::test]
    async fn test_fresh_installed_set_is_served_without_fetch() {
        // Port 9 (discard) is never listening; a fetch here would fail.
        let client = JwksClient::new(
            "http://127.0.0.1:9/.well-known/jwks.json".to_string(),
            Duration::from_millis(200),
        );
        client
            .install(SigningKeySet::new(vec![
                SigningKey::from_jwk(&rsa_jwk("rsa-1")).unwrap()
            ]))
            .await;

        let keys = client.get_keys().await.unwrap();
        assert!(keys.get("rsa-1").is_some());
    }

    #[tokio::test]
    async fn test_unreachable_provider_without_cache_is_unavailable() {
        let client = JwksClient::new(
            "http://127.0.0.1:9/.well-known/jwks.json".to_string(),
            Duration::from_millis(200),
        );

        let result = client.get_keys().await;
        assert!(matches!(result, Err(AuthError::KeySetUnavailable(_))));
        assert!(client.cached().await.is_none());
    }
}
