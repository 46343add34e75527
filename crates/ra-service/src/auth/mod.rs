//! Authentication module for the Research Analyst service.
//!
//! # Components
//!
//! - `jwks` - Key-set cache for the identity provider's public keys
//! - `jwt` - Token verification against the cached key set
//! - `claims` - Claims of a verified token
//! - `authenticator` - Authorization header to user record, in one call

pub mod authenticator;
pub mod claims;
pub mod jwks;
pub mod jwt;

pub use authenticator::{parse_bearer, RequestAuthenticator};
pub use claims::TokenClaims;
pub use jwks::{JwksClient, SigningKey, SigningKeySet};
pub use jwt::JwtValidator;
