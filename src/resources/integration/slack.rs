//! `cyral_integration_slack_alerts`.

use serde::{Deserialize, Serialize};

use crate::client::Method;
use crate::core::{
    passthrough_importer, IdBasedResponse, OperationSequence, OperationType, ResourceDefinition,
    ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::resources::{fixed_url, id_url, ignore_not_found};
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;

const SLACK_PATH: &str = "/v1/integrations/notifications/slack";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlackAlertsIntegration {
    pub name: String,
    pub url: String,
}

impl SchemaReader for SlackAlertsIntegration {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        Ok(Self {
            name: data.require_str("name")?.to_string(),
            url: data.require_str("url")?.to_string(),
        })
    }
}

impl SchemaWriter for SlackAlertsIntegration {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        data.set("name", self.name.clone());
        data.set("url", self.url.clone());
        Ok(())
    }
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new(
        "SlackAlertsIntegrationRead",
        OperationType::Read,
        Method::GET,
        id_url(SLACK_PATH),
    )
    .with_response::<SlackAlertsIntegration>()
    .with_error_handler(ignore_not_found("Slack alerts integration"))
}

/// `cyral_integration_slack_alerts`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_integration_slack_alerts",
        Schema::resource(0)
            .with_description("Sends Cyral alerts to a Slack webhook.")
            .with_attribute("name", Attribute::required_string())
            .with_attribute("url", Attribute::required_string().sensitive()),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "SlackAlertsIntegrationCreate",
                OperationType::Create,
                Method::POST,
                fixed_url(SLACK_PATH),
            )
            .with_request::<SlackAlertsIntegration>()
            .with_response::<IdBasedResponse>(),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "SlackAlertsIntegrationDelete",
                OperationType::Delete,
                Method::DELETE,
                id_url(SLACK_PATH),
            )
            .with_error_handler(ignore_not_found("Slack alerts integration")),
        ),
    )
    .with_update(OperationSequence::update(
        ResourceOperationConfig::new(
            "SlackAlertsIntegrationUpdate",
            OperationType::Update,
            Method::PUT,
            id_url(SLACK_PATH),
        )
        .with_request::<SlackAlertsIntegration>(),
        read_step(),
    ))
    .with_importer(passthrough_importer())
}
