//! Operator check for the authentication flow.
//!
//! Loads the service configuration from the environment, fetches the
//! identity provider's key set, then reads one token from stdin, verifies it
//! and syncs the user. Exits non-zero if any step fails.
//!
//! ```text
//! $ echo "$ID_TOKEN" | ra-auth-check
//! Fetched 2 signing keys from https://cognito-idp...
//! Token verified (kid=abc...)
//! User 5f0c... (trial): created
//! ```

use anyhow::{bail, Context, Result};
use ra_service::auth::{JwksClient, JwtValidator};
use ra_service::config::Config;
use ra_service::services::PgUserResolver;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ra_service=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let jwks_client = Arc::new(JwksClient::new(
        config.jwks_url.clone(),
        Duration::from_secs(config.jwks_fetch_timeout_seconds),
    ));

    let keys = jwks_client
        .get_keys()
        .await
        .context("Failed to fetch signing keys")?;
    println!(
        "Fetched {} signing keys from {}",
        keys.len(),
        jwks_client.jwks_url()
    );

    let token = read_token().context("Failed to read token from stdin")?;

    let validator = JwtValidator::new(
        jwks_client,
        config.issuer.clone(),
        config.app_client_id.clone(),
    );
    let claims = validator
        .verify(&token)
        .await
        .context("Token verification failed")?;
    println!("Token verified (kid={})", claims.key_id);

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let (user, action) = PgUserResolver::new(pool)
        .sync(&claims)
        .await
        .context("User sync failed")?;
    println!("User {} ({}): {}", user.id, user.plan_tier, action.as_str());

    Ok(())
}

/// First non-blank line of stdin, trimmed.
fn read_token() -> Result<String> {
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let token = line.trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }
    bail!("no token on stdin")
}
