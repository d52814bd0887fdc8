//! `cyral_sidecar_credentials`: the OAuth client a sidecar authenticates with.

use serde::{Deserialize, Serialize};

use crate::client::Method;
use crate::core::{
    passthrough_importer, OperationSequence, OperationType, ResourceDefinition,
    ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::resources::{fixed_url, id_url, ignore_not_found};
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;

const ACCOUNTS_PATH: &str = "/v1/users/sidecarAccounts";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSidecarCredentialsRequest {
    pub sidecar_id: String,
}

impl SchemaReader for CreateSidecarCredentialsRequest {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        Ok(Self {
            sidecar_id: data.require_str("sidecar_id")?.to_string(),
        })
    }
}

/// Create response. The secret is only ever returned here.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSidecarCredentialsResponse {
    pub client_id: String,
    pub client_secret: String,
}

impl SchemaWriter for CreateSidecarCredentialsResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        data.set_id(self.client_id.clone());
        data.set("client_id", self.client_id.clone());
        data.set("client_secret", self.client_secret.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadSidecarCredentialsResponse {
    pub sidecar_id: String,
    pub client_id: String,
}

impl SchemaWriter for ReadSidecarCredentialsResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        data.set("sidecar_id", self.sidecar_id.clone());
        data.set("client_id", self.client_id.clone());
        Ok(())
    }
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new(
        "SidecarCredentialsRead",
        OperationType::Read,
        Method::GET,
        id_url(ACCOUNTS_PATH),
    )
    .with_response::<ReadSidecarCredentialsResponse>()
    .with_error_handler(ignore_not_found("Sidecar credentials"))
}

fn schema() -> Schema {
    Schema::resource(0)
        .with_description("Credentials a sidecar uses to reach the control plane.")
        .with_attribute("sidecar_id", Attribute::required_string().with_force_new())
        .with_attribute("client_id", Attribute::computed_string())
        .with_attribute("client_secret", Attribute::computed_string().sensitive())
}

/// `cyral_sidecar_credentials`. No update: any change replaces the account.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_sidecar_credentials",
        schema(),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "SidecarCredentialsCreate",
                OperationType::Create,
                Method::POST,
                fixed_url(ACCOUNTS_PATH),
            )
            .with_request::<CreateSidecarCredentialsRequest>()
            .with_response::<CreateSidecarCredentialsResponse>(),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "SidecarCredentialsDelete",
                OperationType::Delete,
                Method::DELETE,
                id_url(ACCOUNTS_PATH),
            )
            .with_error_handler(ignore_not_found("Sidecar credentials")),
        ),
    )
    .with_importer(passthrough_importer())
}
