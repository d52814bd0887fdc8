//! `cyral_policy` together with its rules and Rego instances.

use serde::{Deserialize, Serialize};

use super::{fixed_url, id_url, ignore_not_found};
use crate::client::Method;
use crate::core::{
    passthrough_importer, IdBasedResponse, OperationSequence, OperationType, ResourceDefinition,
    ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;

pub mod rego;
pub mod rule;

const POLICIES_PATH: &str = "/v1/policies";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing)]
    pub created: String,
    #[serde(default, skip_serializing)]
    pub last_updated: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub meta: PolicyMetadata,
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(default)]
    pub data_tags: Vec<String>,
}

impl SchemaReader for Policy {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        Ok(Self {
            meta: PolicyMetadata {
                name: data.require_str("name")?.to_string(),
                description: data.get_string("description"),
                enabled: data.get_bool("enabled").unwrap_or(false),
                tags: data.get_string_list("tags"),
                version: data.get_string("version"),
                ..PolicyMetadata::default()
            },
            data: data.get_string_list("data"),
            data_tags: data.get_string_list("data_label_tags"),
        })
    }
}

impl SchemaWriter for Policy {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let meta = &self.meta;
        data.set("name", meta.name.clone());
        data.set("description", meta.description.clone());
        data.set("enabled", meta.enabled);
        data.set("tags", meta.tags.clone());
        data.set("version", meta.version.clone());
        data.set("type", meta.kind.clone());
        data.set("created", meta.created.clone());
        data.set("last_updated", meta.last_updated.clone());
        data.set("data", self.data.clone());
        data.set("data_label_tags", self.data_tags.clone());
        Ok(())
    }
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new("PolicyRead", OperationType::Read, Method::GET, id_url(POLICIES_PATH))
        .with_response::<Policy>()
        .with_error_handler(ignore_not_found("Policy"))
}

fn schema() -> Schema {
    Schema::resource(0)
        .with_description("A data access policy.")
        .with_attribute("name", Attribute::required_string())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("enabled", Attribute::optional_bool().with_default(false))
        .with_attribute("tags", Attribute::optional_string_list())
        .with_attribute("data", Attribute::optional_string_list())
        .with_attribute("data_label_tags", Attribute::optional_string_list())
        .with_attribute("version", Attribute::optional_string())
        .with_attribute("type", Attribute::computed_string())
        .with_attribute("created", Attribute::computed_string())
        .with_attribute("last_updated", Attribute::computed_string())
}

/// `cyral_policy`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_policy",
        schema(),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "PolicyCreate",
                OperationType::Create,
                Method::POST,
                fixed_url(POLICIES_PATH),
            )
            .with_request::<Policy>()
            .with_response::<IdBasedResponse>(),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "PolicyDelete",
                OperationType::Delete,
                Method::DELETE,
                id_url(POLICIES_PATH),
            )
            .with_error_handler(ignore_not_found("Policy")),
        ),
    )
    .with_update(OperationSequence::update(
        ResourceOperationConfig::new(
            "PolicyUpdate",
            OperationType::Update,
            Method::PUT,
            id_url(POLICIES_PATH),
        )
        .with_request::<Policy>(),
        read_step(),
    ))
    .with_importer(passthrough_importer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_server_fields() {
        let data = ResourceData::from_state(json!({
            "name": "pii",
            "enabled": true,
            "data": ["EMAIL"],
            "data_label_tags": ["PII"],
            "created": "2023-01-01",
        }))
        .unwrap();
        let wire = serde_json::to_value(Policy::read_from_schema(&data).unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({
                "meta": {"name": "pii", "description": "", "enabled": true, "tags": []},
                "data": ["EMAIL"],
                "dataTags": ["PII"],
            })
        );
    }

    #[test]
    fn test_read_sets_computed_fields() {
        let policy: Policy = serde_json::from_value(json!({
            "meta": {
                "name": "pii",
                "type": "terraform",
                "created": "2023-01-01T00:00:00Z",
                "lastUpdated": "2023-02-01T00:00:00Z",
            },
        }))
        .unwrap();
        let mut data = ResourceData::new();
        data.set_id("p1");
        policy.write_to_schema(&mut data).unwrap();

        assert_eq!(data.get_str("type"), Some("terraform"));
        assert_eq!(data.get_str("last_updated"), Some("2023-02-01T00:00:00Z"));
        assert_eq!(data.get_bool("enabled"), Some(false));
    }
}
