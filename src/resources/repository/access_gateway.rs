//! `cyral_repository_access_gateway`: the sidecar binding used to reach a repository.

use serde::{Deserialize, Serialize};

use crate::client::{Client, Method};
use crate::core::{
    passthrough_importer, OperationSequence, OperationType, ResourceDefinition,
    ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::resources::{id_or, ignore_not_found, segment};
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGateway {
    pub sidecar_id: String,
    pub binding_id: String,
}

impl SchemaReader for AccessGateway {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        Ok(Self {
            sidecar_id: data.require_str("sidecar_id")?.to_string(),
            binding_id: data.require_str("binding_id")?.to_string(),
        })
    }
}

impl SchemaWriter for AccessGateway {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let repository_id = id_or(data, "repository_id")?.to_string();
        data.set_id(repository_id.clone());
        data.set("repository_id", repository_id);
        data.set("sidecar_id", self.sidecar_id.clone());
        data.set("binding_id", self.binding_id.clone());
        Ok(())
    }
}

fn gateway_url(data: &ResourceData, client: &Client) -> Result<String, ProviderError> {
    Ok(client.url(&format!(
        "/v1/repos/{}/accessGateway",
        segment(id_or(data, "repository_id")?)
    )))
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new("RepositoryAccessGatewayRead", OperationType::Read, Method::GET, gateway_url)
        .with_response::<AccessGateway>()
        .with_error_handler(ignore_not_found("Repository access gateway"))
}

fn put_step(name: &str, kind: OperationType) -> ResourceOperationConfig {
    ResourceOperationConfig::new(name, kind, Method::PUT, gateway_url).with_request::<AccessGateway>()
}

fn schema() -> Schema {
    Schema::resource(0)
        .with_description("Selects the sidecar binding through which a repository is accessed.")
        .with_attribute("repository_id", Attribute::required_string().with_force_new())
        .with_attribute("sidecar_id", Attribute::required_string())
        .with_attribute("binding_id", Attribute::required_string())
}

/// `cyral_repository_access_gateway`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_repository_access_gateway",
        schema(),
        OperationSequence::create(
            put_step("RepositoryAccessGatewayCreate", OperationType::Create),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "RepositoryAccessGatewayDelete",
                OperationType::Delete,
                Method::DELETE,
                gateway_url,
            )
            .with_error_handler(ignore_not_found("Repository access gateway")),
        ),
    )
    .with_update(OperationSequence::update(
        put_step("RepositoryAccessGatewayUpdate", OperationType::Update),
        read_step(),
    ))
    .with_importer(passthrough_importer())
}
