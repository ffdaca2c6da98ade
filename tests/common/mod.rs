//! Shared helpers for integration tests against a WireMock server.

#![allow(dead_code)]

use integrations_zscaler::{
    Credential, RetryConfig, Service, ServiceClient, ZscalerConfig, ZscalerConfigBuilder,
};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Customer id used for private-access tests.
pub const CUSTOMER_ID: &str = "216196257331281920";

/// Installs a test log writer once; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Starts a fresh mock server.
pub async fn setup_mock_server() -> MockServer {
    init_tracing();
    MockServer::start().await
}

/// Retry settings fast enough for tests.
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    }
}

fn no_env(_: &str) -> Option<String> {
    None
}

/// Builder for `service` pointed at the mock server.
pub fn builder(service: Service, server: &MockServer) -> ZscalerConfigBuilder {
    ZscalerConfig::builder(service)
        .override_url(server.uri())
        .retry(fast_retry(3))
}

/// Internet-access config with legacy API key credentials.
pub fn zia_config(server: &MockServer) -> ZscalerConfig {
    builder(Service::InternetAccess, server)
        .credential(Credential::legacy("abcdef123456", "admin@example.com", "pw"))
        .build_with_env(no_env)
        .expect("valid config")
}

/// Private-access config with OAuth client credentials.
pub fn zpa_config(server: &MockServer) -> ZscalerConfig {
    builder(Service::PrivateAccess, server)
        .client_id("X")
        .client_secret("Y")
        .customer_id(CUSTOMER_ID)
        .build_with_env(no_env)
        .expect("valid config")
}

/// Digital-experience config with hashed key credentials.
pub fn zdx_config(server: &MockServer) -> ZscalerConfig {
    builder(Service::DigitalExperience, server)
        .client_id("K")
        .client_secret("S")
        .build_with_env(no_env)
        .expect("valid config")
}

/// Client-connector config with session-token credentials.
pub fn zcc_config(server: &MockServer) -> ZscalerConfig {
    builder(Service::ClientConnector, server)
        .client_id("id")
        .client_secret("secret")
        .build_with_env(no_env)
        .expect("valid config")
}

/// Sandbox config with a static token.
pub fn sandbox_config(server: &MockServer) -> ZscalerConfig {
    builder(Service::Sandbox, server)
        .sandbox_token("sbx")
        .build_with_env(no_env)
        .expect("valid config")
}

/// Mounts a ZCC login returning JWT `J`.
pub async fn mount_zcc_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/login"))
        .respond_with(success_response(json!({"jwtToken": "J"})))
        .mount(server)
        .await;
}

/// Mounts a ZDX login returning bearer token `T`.
pub async fn mount_zdx_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(success_response(
            json!({"token": "T", "token_type": "Bearer", "expires_in": 3600}),
        ))
        .mount(server)
        .await;
}

/// A client-connector client with a mounted login.
pub async fn zcc_client(server: &MockServer) -> ServiceClient {
    mount_zcc_login(server).await;
    ServiceClient::new(zcc_config(server)).expect("client")
}

/// JSON success response.
pub fn success_response(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// JSON error response.
pub fn error_response(status: u16, body: Value) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(body)
}

/// `count` records with sequential ids starting at `start`.
pub fn records(start: u64, count: u64) -> Value {
    Value::Array(
        (start..start + count)
            .map(|id| json!({"id": id, "deviceName": format!("device-{}", id)}))
            .collect(),
    )
}
