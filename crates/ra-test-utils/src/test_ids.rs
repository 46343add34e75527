//! Fixed identifiers for reproducible tests.

/// Region used by every test configuration.
pub const TEST_REGION: &str = "ap-south-1";

/// User pool identifier used by every test configuration.
pub const TEST_USER_POOL_ID: &str = "ap-south-1_TestPool";

/// App client identifier; tokens built by `TestTokenBuilder` carry it as `aud`.
pub const TEST_CLIENT_ID: &str = "test-app-client";

/// Issuer matching `TEST_REGION` and `TEST_USER_POOL_ID`.
pub const TEST_ISSUER: &str = "https://cognito-idp.ap-south-1.amazonaws.com/ap-south-1_TestPool";

/// Default key ID for the Ed25519 fixture key.
pub const TEST_KID: &str = "test-key-01";

/// Default key ID for the RSA fixture key.
pub const TEST_RSA_KID: &str = "test-rsa-01";
