//! Research Analyst service configuration.
//!
//! Configuration is loaded from environment variables. The database URL is
//! redacted in Debug output. There are no defaults for credentials or for the
//! identity provider pool/client identifiers.

use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default Cognito region.
pub const DEFAULT_COGNITO_REGION: &str = "ap-south-1";

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default timeout for the JWKS fetch in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for the JWKS fetch timeout.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Default maximum database pool size.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Service configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// AWS region hosting the user pool.
    pub cognito_region: String,

    /// Cognito user pool identifier.
    pub user_pool_id: String,

    /// App client identifier; tokens must carry it as their audience.
    pub app_client_id: String,

    /// Expected `iss` claim, derived from region and pool.
    pub issuer: String,

    /// URL of the provider's JWKS document.
    pub jwks_url: String,

    /// Bound on the JWKS HTTP fetch in seconds.
    pub jwks_fetch_timeout_seconds: u64,

    /// Maximum connections in the database pool.
    pub db_max_connections: u32,
}

/// Custom Debug implementation that redacts the database URL.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("cognito_region", &self.cognito_region)
            .field("user_pool_id", &self.user_pool_id)
            .field("app_client_id", &self.app_client_id)
            .field("issuer", &self.issuer)
            .field("jwks_url", &self.jwks_url)
            .field("jwks_fetch_timeout_seconds", &self.jwks_fetch_timeout_seconds)
            .field("db_max_connections", &self.db_max_connections)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidJwksFetchTimeout(String),

    #[error("Invalid database pool configuration: {0}")]
    InvalidDbMaxConnections(String),
}

/// Build the issuer URL for a Cognito user pool.
pub fn cognito_issuer(region: &str, user_pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}")
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = required(vars, "DATABASE_URL")?;
        let user_pool_id = required(vars, "COGNITO_USER_POOL_ID")?;
        let app_client_id = required(vars, "COGNITO_APP_CLIENT_ID")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let cognito_region = vars
            .get("COGNITO_REGION")
            .cloned()
            .unwrap_or_else(|| DEFAULT_COGNITO_REGION.to_string());

        let issuer = cognito_issuer(&cognito_region, &user_pool_id);

        let jwks_url = vars
            .get("JWKS_URL")
            .cloned()
            .unwrap_or_else(|| format!("{issuer}/.well-known/jwks.json"));

        let jwks_fetch_timeout_seconds =
            if let Some(value_str) = vars.get("JWKS_FETCH_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidJwksFetchTimeout(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidJwksFetchTimeout(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be greater than 0".to_string(),
                    ));
                }

                if value > MAX_JWKS_FETCH_TIMEOUT_SECONDS {
                    return Err(ConfigError::InvalidJwksFetchTimeout(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must not exceed {} seconds, got {}",
                        MAX_JWKS_FETCH_TIMEOUT_SECONDS, value
                    )));
                }

                value
            } else {
                DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS
            };

        let db_max_connections = if let Some(value_str) = vars.get("DB_MAX_CONNECTIONS") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidDbMaxConnections(format!(
                    "DB_MAX_CONNECTIONS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidDbMaxConnections(
                    "DB_MAX_CONNECTIONS must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_DB_MAX_CONNECTIONS
        };

        Ok(Config {
            database_url,
            bind_address,
            cognito_region,
            user_pool_id,
            app_client_id,
            issuer,
            jwks_url,
            jwks_fetch_timeout_seconds,
            db_max_connections,
        })
    }
}
