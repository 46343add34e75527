//! # RA Test Utilities
//!
//! Shared test utilities for the Research Analyst service.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed Ed25519 and RSA signing keys)
//! - Test data builders (`TestTokenBuilder`)
//! - A mock identity provider serving a JWKS document (`MockIdentityProvider`)
//! - Server test harness (`TestRaServer` for E2E tests)
//! - Fixed test identifiers (pool, client, issuer)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ra_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let keypair = TestKeypair::ed25519(1, TEST_KID)?;
//!     let idp = MockIdentityProvider::start().await;
//!     idp.serve_keys(&[keypair.jwk_json()]).await;
//!
//!     let token = keypair.sign(
//!         &TestTokenBuilder::new()
//!             .for_subject("abc123")
//!             .with_email("a@x.com")
//!             .build(),
//!     )?;
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_idp;
pub mod server_harness;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_idp::*;
pub use server_harness::*;
pub use test_ids::*;
pub use token_builders::*;
