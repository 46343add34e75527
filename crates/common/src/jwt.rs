//! JWT utilities shared across Research Analyst components.
//!
//! This module provides the pieces of token handling that happen before (or
//! after) cryptographic verification:
//! - Size limits for DoS prevention
//! - Unverified header parsing (`kid` and `alg` lookup)
//! - Strict expiry checks against wall-clock time
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Nothing returned by [`decode_unverified_header`] is trusted; it is only
//!   used to pick a key from a trusted key set
//! - Error messages are intentionally generic
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_unverified_header, is_expired};
//!
//! let kid = decode_unverified_header(token)?.kid;
//! // ... verify the signature with the key for `kid` ...
//! if is_expired(claims.exp) {
//!     return Err(InvalidToken);
//! }
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Identity provider ID tokens are typically 1-2KB. Anything larger than this
/// is rejected before base64 decoding or signature verification.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a token before verification.
///
/// All variants share one generic message so callers cannot leak which check
/// failed. The specific reason is logged at debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token is not three base64url segments with a JSON header.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token header has no usable `kid`.
    #[error("The access token is invalid or expired")]
    MissingKid,
}

// =============================================================================
// Header Types
// =============================================================================

/// The parts of a JOSE header this workspace looks at.
///
/// Produced WITHOUT signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedHeader {
    /// Key ID used to select a key from the key set.
    pub kid: String,

    /// Declared signing algorithm, if present.
    pub alg: Option<String>,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    kid: Option<serde_json::Value>,
    #[serde(default)]
    alg: Option<String>,
}

// =============================================================================
// Functions
// =============================================================================

/// Decode the JOSE header of a compact JWT without verifying the signature.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` - not `header.payload.signature`, bad base64 or bad JSON
/// - `MissingKid` - `kid` absent, not a string, or empty
pub fn decode_unverified_header(token: &str) -> Result<UnverifiedHeader, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    let (Some(header_part), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let kid = header
        .kid
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    Ok(UnverifiedHeader {
        kid,
        alg: header.alg,
    })
}

/// Returns `true` unless `exp` is strictly after the current wall-clock time.
#[must_use]
pub fn is_expired(exp: i64) -> bool {
    is_expired_at(exp, chrono::Utc::now().timestamp())
}

/// Deterministic expiry check against an explicit `now` (Unix epoch seconds).
///
/// A token expiring exactly at `now` is already expired.
#[must_use]
pub fn is_expired_at(exp: i64, now: i64) -> bool {
    exp <= now
}

// =============================================================================
// Tests
// =============================================================================
