//! Mock identity provider serving a JWKS document over HTTP.

use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the service fetches the key set from.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// A wiremock server standing in for the provider's well-known endpoint.
///
/// Mocks mounted with an expected call count are verified when the provider
/// is dropped.
pub struct MockIdentityProvider {
    server: MockServer,
}

impl MockIdentityProvider {
    /// Start a provider with nothing mounted (every request gets a 404).
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Full URL of the JWKS document.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Serve `keys` for any number of requests.
    pub async fn serve_keys(&self, keys: &[Value]) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(keys)))
            .mount(&self.server)
            .await;
    }

    /// Serve `keys` and require exactly `calls` requests.
    pub async fn serve_keys_expecting(&self, keys: &[Value], calls: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(keys)))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Serve `keys` for at most `times` requests; later requests fall through
    /// to whatever is mounted next.
    pub async fn serve_keys_times(&self, keys: &[Value], times: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(keys)))
            .up_to_n_times(times)
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Respond with `status` and an empty body.
    pub async fn fail_with(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Serve `keys` only after `delay`.
    pub async fn serve_keys_slowly(&self, keys: &[Value], delay: Duration) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jwks_document(keys))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Respond 200 with a body that is not a JWKS document.
    pub async fn serve_garbage(&self) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&self.server)
            .await;
    }

    /// Require that the endpoint is never called.
    pub async fn expect_no_fetch(&self) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.server)
            .await;
    }

    /// Number of requests received so far.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

/// Wrap keys in a `{"keys": [...]}` document.
pub fn jwks_document(keys: &[Value]) -> Value {
    json!({ "keys": keys })
}
