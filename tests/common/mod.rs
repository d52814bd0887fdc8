//! Shared helpers for the control-plane integration tests.

#![allow(dead_code)]

use cyral_provider::client::TOKEN_PATH;
use cyral_provider::testing::{ProviderTester, TEST_CLIENT_ID, TEST_CLIENT_SECRET};
use cyral_provider::{Client, ClientConfig};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Access token handed out by the mocked token endpoint.
pub const TEST_TOKEN: &str = "test-access-token";

/// Token endpoint answering every client-credentials request.
pub fn token_mock() -> Mock {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TEST_TOKEN,
            "token_type": "bearer",
            "expires_in": 3600
        })))
}

/// A mock control plane with the token endpoint mounted.
pub async fn control_plane() -> MockServer {
    let server = MockServer::start().await;
    token_mock().mount(&server).await;
    server
}

/// A configured provider pointed at `server`.
pub async fn tester(server: &MockServer) -> ProviderTester {
    ProviderTester::cyral(&server.uri())
        .await
        .expect("provider should configure")
}

/// A bare API client pointed at `server`.
pub fn client(server: &MockServer) -> Client {
    Client::new(&ClientConfig {
        client_id: TEST_CLIENT_ID.to_string(),
        client_secret: TEST_CLIENT_SECRET.to_string(),
        control_plane: server.uri(),
        tls_skip_verify: false,
    })
    .expect("client should build")
}
