//! `cyral_service_account`: an API client for automation.

use serde::{Deserialize, Serialize};

use super::{fixed_url, id_url, ignore_not_found};
use crate::client::Method;
use crate::core::{
    passthrough_importer, OperationSequence, OperationType, ResourceDefinition,
    ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;

const SERVICE_ACCOUNTS_PATH: &str = "/v1/users/serviceAccounts";

/// Create and patch body. Also the read response, which adds `clientId`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    pub display_name: String,
    #[serde(default, skip_serializing)]
    pub client_id: String,
    #[serde(default)]
    pub role_ids: Vec<String>,
}

impl SchemaReader for ServiceAccount {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        Ok(Self {
            display_name: data.require_str("display_name")?.to_string(),
            client_id: String::new(),
            role_ids: data.get_string_list("role_ids"),
        })
    }
}

impl SchemaWriter for ServiceAccount {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        data.set("display_name", self.display_name.clone());
        data.set("role_ids", self.role_ids.clone());
        if !self.client_id.is_empty() {
            data.set("client_id", self.client_id.clone());
        }
        Ok(())
    }
}

/// The secret is only returned here.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceAccountResponse {
    pub client_id: String,
    pub client_secret: String,
}

impl SchemaWriter for CreateServiceAccountResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        data.set_id(self.client_id.clone());
        data.set("client_id", self.client_id.clone());
        data.set("client_secret", self.client_secret.clone());
        Ok(())
    }
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new(
        "ServiceAccountRead",
        OperationType::Read,
        Method::GET,
        id_url(SERVICE_ACCOUNTS_PATH),
    )
    .with_response::<ServiceAccount>()
    .with_error_handler(ignore_not_found("Service account"))
}

fn schema() -> Schema {
    Schema::resource(0)
        .with_description("A service account and its client credentials.")
        .with_attribute("display_name", Attribute::required_string())
        .with_attribute("role_ids", Attribute::optional_string_set())
        .with_attribute("client_id", Attribute::computed_string())
        .with_attribute("client_secret", Attribute::computed_string().sensitive())
}

/// `cyral_service_account`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_service_account",
        schema(),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "ServiceAccountCreate",
                OperationType::Create,
                Method::POST,
                fixed_url(SERVICE_ACCOUNTS_PATH),
            )
            .with_request::<ServiceAccount>()
            .with_response::<CreateServiceAccountResponse>(),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "ServiceAccountDelete",
                OperationType::Delete,
                Method::DELETE,
                id_url(SERVICE_ACCOUNTS_PATH),
            )
            .with_error_handler(ignore_not_found("Service account")),
        ),
    )
    .with_update(OperationSequence::update(
        ResourceOperationConfig::new(
            "ServiceAccountUpdate",
            OperationType::Update,
            Method::PATCH,
            id_url(SERVICE_ACCOUNTS_PATH),
        )
        .with_request::<ServiceAccount>(),
        read_step(),
    ))
    .with_importer(passthrough_importer())
}
