//! `cyral_integration_splunk`.

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

const SPLUNK_PATH: &str = "/v1/integrations/splunk";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplunkIntegration {
    pub name: String,
    #[serde(default)]
    pub access_token: String,
    pub port: i64,
    pub host: String,
    #[serde(default)]
    pub index: String,
    #[serde(rename = "useTLS", default)]
    pub use_tls: bool,
}

impl SchemaReader for SplunkIntegration {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        Ok(Self {
            name: data.require_str("name")?.to_string(),
            access_token: data.require_str("access_token")?.to_string(),
            port: data.get_i64("port").ok_or_else(|| {
                ProviderError::Validation("attribute 'port' is required".to_string())
            })?,
            host: data.require_str("host")?.to_string(),
            index: data.get_string("index"),
            use_tls: data.get_bool("use_tls").unwrap_or(false),
        })
    }
}

impl SchemaWriter for SplunkIntegration {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        data.set("name", self.name.clone());
        // Reads may redact the token.
        if !self.access_token.is_empty() {
            data.set("access_token", self.access_token.clone());
        }
        data.set("port", self.port);
        data.set("host", self.host.clone());
        data.set("index", self.index.clone());
        data.set("use_tls", self.use_tls);
        Ok(())
    }
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new(
        "SplunkIntegrationRead",
        OperationType::Read,
        Method::GET,
        id_url(SPLUNK_PATH),
    )
    .with_response::<SplunkIntegration>()
    .with_error_handler(ignore_not_found("Splunk integration"))
}

/// `cyral_integration_splunk`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_integration_splunk",
        Schema::resource(0)
            .with_description("Ships Cyral logs to Splunk.")
            .with_attribute("name", Attribute::required_string())
            .with_attribute("access_token", Attribute::required_string().sensitive())
            .with_attribute("port", Attribute::required_int64())
            .with_attribute("host", Attribute::required_string())
            .with_attribute("index", Attribute::optional_string())
            .with_attribute("use_tls", Attribute::optional_bool().with_default(false)),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "SplunkIntegrationCreate",
                OperationType::Create,
                Method::POST,
                fixed_url(SPLUNK_PATH),
            )
            .with_request::<SplunkIntegration>()
            .with_response::<IdBasedResponse>(),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "SplunkIntegrationDelete",
                OperationType::Delete,
                Method::DELETE,
                id_url(SPLUNK_PATH),
            )
            .with_error_handler(ignore_not_found("Splunk integration")),
        ),
    )
    .with_update(OperationSequence::update(
        ResourceOperationConfig::new(
            "SplunkIntegrationUpdate",
            OperationType::Update,
            Method::PUT,
            id_url(SPLUNK_PATH),
        )
        .with_request::<SplunkIntegration>(),
        read_step(),
    ))
    .with_importer(passthrough_importer())
}
