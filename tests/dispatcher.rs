//! Dispatcher behavior against a mocked control plane.

mod common;

use cyral_provider::client::Method;
use cyral_provider::core::{
    IdBasedResponse, IgnoreHttpNotFound, OperationSequence, OperationType,
    ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use cyral_provider::{ProviderError, ResourceData};
use serde::{Deserialize, Serialize};
use serde_json::json;
use wiremock::matchers::{bearer_token, body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[derive(Debug, Serialize)]
struct WidgetRequest {
    name: String,
}

impl SchemaReader for WidgetRequest {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        Ok(Self {
            name: data.require_str("name")?.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WidgetResponse {
    name: String,
    color: String,
}

impl SchemaWriter for WidgetResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        data.set("name", self.name.clone());
        data.set("color", self.color.clone());
        Ok(())
    }
}

fn create_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new("WidgetCreate", OperationType::Create, Method::POST, |_, client| {
        Ok(client.url("/v1/widgets"))
    })
    .with_request::<WidgetRequest>()
    .with_response::<IdBasedResponse>()
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new("WidgetRead", OperationType::Read, Method::GET, |data, client| {
        Ok(client.url(&format!("/v1/widgets/{}", data.require_id()?)))
    })
    .with_response::<WidgetResponse>()
}

fn widget_config() -> ResourceData {
    ResourceData::from_state(json!({"name": "w"})).unwrap()
}

#[tokio::test]
async fn test_create_then_read_populates_state() {
    let server = common::control_plane().await;
    Mock::given(method("POST"))
        .and(path("/v1/widgets"))
        .and(bearer_token(common::TEST_TOKEN))
        .and(body_json(json!({"name": "w"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "w-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/widgets/w-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"name": "w", "color": "blue"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client(&server);
    let mut data = widget_config();
    let diagnostics = OperationSequence::create(create_step(), read_step())
        .run(&mut data, &client)
        .await;

    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(data.id(), Some("w-1"));
    assert_eq!(data.get_str("color"), Some("blue"));
}

#[tokio::test]
async fn test_failed_step_stops_the_sequence() {
    let server = common::control_plane().await;
    Mock::given(method("POST"))
        .and(path("/v1/widgets"))
        .respond_with(ResponseTemplate::new(400).set_body_string("name already taken"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/widgets/w-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = common::client(&server);
    let mut data = widget_config();
    let err = OperationSequence::create(create_step(), read_step())
        .try_run(&mut data, &client)
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(400));
    let message = err.to_string();
    assert!(message.contains("WidgetCreate"), "{}", message);
    assert!(message.contains("name already taken"), "{}", message);
    assert_eq!(data.id(), None);
}

#[tokio::test]
async fn test_failure_becomes_single_diagnostic() {
    let server = common::control_plane().await;
    Mock::given(method("GET"))
        .and(path("/v1/widgets/w-1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = common::client(&server);
    let mut data = ResourceData::from_state(json!({"id": "w-1"})).unwrap();
    let diagnostics = OperationSequence::read(read_step()).run(&mut data, &client).await;

    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].is_error());
}

#[tokio::test]
async fn test_blank_response_skips_writer() {
    let server = common::control_plane().await;
    Mock::given(method("GET"))
        .and(path("/v1/widgets/w-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  \n"))
        .mount(&server)
        .await;

    let client = common::client(&server);
    let mut data = ResourceData::from_state(json!({"id": "w-1", "color": "red"})).unwrap();
    read_step().execute(&mut data, &client).await.unwrap();

    assert_eq!(data.get_str("color"), Some("red"));
}

#[tokio::test]
async fn test_not_found_handler_clears_id_and_continues() {
    let server = common::control_plane().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/widgets/w-1"))
        .respond_with(ResponseTemplate::new(404).set_body_string("widget not found"))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client(&server);
    let mut data = ResourceData::from_state(json!({"id": "w-1"})).unwrap();
    let delete = ResourceOperationConfig::new(
        "WidgetDelete",
        OperationType::Delete,
        Method::DELETE,
        |data, client| Ok(client.url(&format!("/v1/widgets/{}", data.require_id()?))),
    )
    .with_error_handler(IgnoreHttpNotFound::new("Widget"));

    let diagnostics = OperationSequence::delete(delete).run(&mut data, &client).await;

    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(data.id(), None);
}

#[tokio::test]
async fn test_not_found_handler_propagates_other_errors() {
    let server = common::control_plane().await;
    Mock::given(method("GET"))
        .and(path("/v1/widgets/w-1"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let client = common::client(&server);
    let mut data = ResourceData::from_state(json!({"id": "w-1"})).unwrap();
    let err = read_step()
        .with_error_handler(IgnoreHttpNotFound::new("Widget"))
        .execute(&mut data, &client)
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(403));
    assert_eq!(data.id(), Some("w-1"));
}

#[tokio::test]
async fn test_token_is_fetched_once() {
    let server = wiremock::MockServer::start().await;
    common::token_mock().expect(1).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/widgets/w-1"))
        .and(bearer_token(common::TEST_TOKEN))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"name": "w", "color": "blue"})),
        )
        .expect(3)
        .mount(&server)
        .await;

    let client = common::client(&server);
    for _ in 0..3 {
        let mut data = ResourceData::from_state(json!({"id": "w-1"})).unwrap();
        read_step().execute(&mut data, &client).await.unwrap();
    }
}

#[tokio::test]
async fn test_token_failure_is_authentication_error() {
    let server = wiremock::MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(cyral_provider::client::TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = common::client(&server);
    let mut data = ResourceData::from_state(json!({"id": "w-1"})).unwrap();
    let err = read_step().execute(&mut data, &client).await.unwrap_err();

    assert!(matches!(err.root(), ProviderError::Authentication(_)), "{}", err);
}
