//! Test server harness for E2E testing
//!
//! Provides `TestRaServer` for spawning real service instances in tests.

use crate::test_ids::{TEST_CLIENT_ID, TEST_REGION, TEST_USER_POOL_ID};
use ra_service::auth::{JwksClient, JwtValidator, RequestAuthenticator};
use ra_service::config::Config;
use ra_service::observability::metrics::init_metrics_recorder;
use ra_service::routes::{self, AppState};
use ra_service::services::PgUserResolver;
use sqlx::PgPool;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Test harness for spawning the service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[sqlx::test(migrations = "../../migrations")]
/// async fn test_me_e2e(pool: PgPool) -> Result<()> {
///     let idp = MockIdentityProvider::start().await;
///     let server = TestRaServer::spawn(pool, &idp.jwks_url()).await?;
///
///     let response = reqwest::Client::new()
///         .get(format!("{}/api/v1/me", server.url()))
///         .bearer_auth(token)
///         .send()
///         .await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestRaServer {
    addr: SocketAddr,
    pool: PgPool,
    config: Config,
    jwks_client: Arc<JwksClient>,
    _handle: JoinHandle<()>,
}

impl TestRaServer {
    /// Spawn a server on a random local port whose key set comes from
    /// `jwks_url`.
    ///
    /// The fetch timeout is one second so unavailable-provider tests finish
    /// quickly.
    pub async fn spawn(pool: PgPool, jwks_url: &str) -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://test/test".to_string(),
            ),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("COGNITO_REGION".to_string(), TEST_REGION.to_string()),
            (
                "COGNITO_USER_POOL_ID".to_string(),
                TEST_USER_POOL_ID.to_string(),
            ),
            (
                "COGNITO_APP_CLIENT_ID".to_string(),
                TEST_CLIENT_ID.to_string(),
            ),
            ("JWKS_URL".to_string(), jwks_url.to_string()),
            ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "1".to_string()),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let jwks_client = Arc::new(JwksClient::new(
            config.jwks_url.clone(),
            Duration::from_secs(config.jwks_fetch_timeout_seconds),
        ));
        let validator = Arc::new(JwtValidator::new(
            Arc::clone(&jwks_client),
            config.issuer.clone(),
            config.app_client_id.clone(),
        ));
        let resolver = Arc::new(PgUserResolver::new(pool.clone()));
        let authenticator = Arc::new(RequestAuthenticator::new(validator, resolver));

        let state = Arc::new(AppState {
            pool: pool.clone(),
            authenticator,
        });

        // The global recorder can only be installed once per test process.
        let metrics_handle = match init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => {
                use metrics_exporter_prometheus::PrometheusBuilder;
                PrometheusBuilder::new().build_recorder().handle()
            }
        };

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            pool,
            config,
            jwks_client,
            _handle: handle,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The key-set cache the server authenticates with.
    pub fn jwks_client(&self) -> &Arc<JwksClient> {
        &self.jwks_client
    }
}

impl Drop for TestRaServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_idp::MockIdentityProvider;

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_server_spawns_successfully(pool: PgPool) -> Result<(), anyhow::Error> {
        let idp = MockIdentityProvider::start().await;
        let server = TestRaServer::spawn(pool, &idp.jwks_url()).await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await?, "OK");

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_server_uses_provider_url(pool: PgPool) -> Result<(), anyhow::Error> {
        let idp = MockIdentityProvider::start().await;
        let server = TestRaServer::spawn(pool, &idp.jwks_url()).await?;

        assert_eq!(server.config().jwks_url, idp.jwks_url());
        assert_eq!(server.jwks_client().jwks_url(), idp.jwks_url());

        Ok(())
    }
}
