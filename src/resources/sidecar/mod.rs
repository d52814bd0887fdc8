//! `cyral_sidecar` and its listeners, credentials and lookups.

use serde::{Deserialize, Serialize};

use super::{fixed_url, id_url, ignore_not_found, opt_string};
use crate::client::Method;
use crate::core::{
    passthrough_importer, IdBasedResponse, OperationSequence, OperationType, ResourceDefinition,
    ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;

pub mod credentials;
pub mod data;
pub mod listener;

const SIDECARS_PATH: &str = "/v1/sidecars";

/// Deployment methods accepted by the control plane.
pub const DEPLOYMENT_METHODS: &[&str] = &[
    "docker",
    "cft-ec2",
    "terraform",
    "helm3",
    "automated",
    "custom",
    "terraformGKE",
    "singleContainer",
    "linux",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidecarProperties {
    #[serde(rename = "deploymentMethod")]
    pub deployment_method: String,
    #[serde(
        rename = "activityLogIntegrationID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub activity_log_integration_id: Option<String>,
    #[serde(
        rename = "diagnosticLogIntegrationID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub diagnostic_log_integration_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarData {
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_endpoint: String,
    #[serde(default)]
    pub properties: SidecarProperties,
}

impl SchemaReader for SidecarData {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        Ok(Self {
            name: data.require_str("name")?.to_string(),
            labels: data.get_string_list("labels"),
            user_endpoint: data.get_string("user_endpoint"),
            properties: SidecarProperties {
                deployment_method: data.require_str("deployment_method")?.to_string(),
                activity_log_integration_id: opt_string(data, "activity_log_integration_id"),
                diagnostic_log_integration_id: opt_string(data, "diagnostic_log_integration_id"),
            },
        })
    }
}

impl SchemaWriter for SidecarData {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        data.set("name", self.name.clone());
        data.set("labels", self.labels.clone());
        if self.user_endpoint.is_empty() {
            data.set_null("user_endpoint");
        } else {
            data.set("user_endpoint", self.user_endpoint.clone());
        }
        data.set("deployment_method", self.properties.deployment_method.clone());
        data.set_opt(
            "activity_log_integration_id",
            self.properties.activity_log_integration_id.clone(),
        );
        data.set_opt(
            "diagnostic_log_integration_id",
            self.properties.diagnostic_log_integration_id.clone(),
        );
        Ok(())
    }
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new("SidecarRead", OperationType::Read, Method::GET, id_url(SIDECARS_PATH))
        .with_response::<SidecarData>()
        .with_error_handler(ignore_not_found("Sidecar"))
}

fn schema() -> Schema {
    Schema::resource(0)
        .with_description("A Cyral sidecar deployment.")
        .with_attribute("name", Attribute::required_string())
        .with_attribute(
            "deployment_method",
            Attribute::required_string().with_allowed_values(DEPLOYMENT_METHODS),
        )
        .with_attribute("labels", Attribute::optional_string_list())
        .with_attribute("user_endpoint", Attribute::optional_string())
        .with_attribute("activity_log_integration_id", Attribute::optional_string())
        .with_attribute("diagnostic_log_integration_id", Attribute::optional_string())
}

/// `cyral_sidecar`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_sidecar",
        schema(),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "SidecarCreate",
                OperationType::Create,
                Method::POST,
                fixed_url(SIDECARS_PATH),
            )
            .with_request::<SidecarData>()
            .with_response::<IdBasedResponse>(),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "SidecarDelete",
                OperationType::Delete,
                Method::DELETE,
                id_url(SIDECARS_PATH),
            )
            .with_error_handler(ignore_not_found("Sidecar")),
        ),
    )
    .with_update(OperationSequence::update(
        ResourceOperationConfig::new(
            "SidecarUpdate",
            OperationType::Update,
            Method::PUT,
            id_url(SIDECARS_PATH),
        )
        .with_request::<SidecarData>(),
        read_step(),
    ))
    .with_importer(passthrough_importer())
}
