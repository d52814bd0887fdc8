//! `cyral_rego_policy_instance`: an instance of a Rego policy template.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::{Client, Method};
use crate::core::{
    composed_id_importer, OperationSequence, OperationType, ResourceDefinition,
    ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::ids::{marshal_composed_id, unmarshal_named_id, ID_SEPARATOR};
use crate::resources::{ignore_not_found, opt_string, segment};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};
use crate::state::ResourceData;

const ID_FIELDS: &[&str] = &["category", "policy_id"];
const INSTANCES_PATH: &str = "/v1/regopolicies/instances";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegoPolicyScope {
    #[serde(default)]
    pub repo_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegoPolicyInstance {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub template_id: String,
    /// JSON document, exchanged as an encoded string.
    #[serde(default)]
    pub parameters: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<RegoPolicyScope>,
}

/// Who changed the instance, and when.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeInfo {
    #[serde(default)]
    pub actor: String,
    #[serde(default)]
    pub actor_type: String,
    #[serde(default)]
    pub timestamp: String,
}

impl ChangeInfo {
    fn to_state(&self) -> Value {
        json!({
            "actor": self.actor,
            "actor_type": self.actor_type,
            "timestamp": self.timestamp,
        })
    }
}

/// Create and update body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegoPolicyInstanceRequest {
    pub instance: RegoPolicyInstance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl SchemaReader for RegoPolicyInstanceRequest {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        Ok(Self {
            instance: RegoPolicyInstance {
                name: data.require_str("name")?.to_string(),
                description: data.get_string("description"),
                template_id: data.require_str("template_id")?.to_string(),
                parameters: data.get_string("parameters"),
                enabled: data.get_bool("enabled").unwrap_or(false),
                tags: data.get_string_list("tags"),
                scope: data.get_block("scope").map(|b| RegoPolicyScope {
                    repo_ids: b.get_string_list("repo_ids"),
                }),
            },
            duration: opt_string(data, "duration"),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRegoPolicyInstanceResponse {
    pub instance: RegoPolicyInstance,
    #[serde(default)]
    pub created: ChangeInfo,
    #[serde(default)]
    pub last_updated: ChangeInfo,
}

impl SchemaWriter for ReadRegoPolicyInstanceResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let ids = unmarshal_named_id(data.require_id()?, ID_SEPARATOR, ID_FIELDS)?;
        let instance = &self.instance;

        data.set("category", ids[0].clone());
        data.set("policy_id", ids[1].clone());
        data.set("name", instance.name.clone());
        data.set("description", instance.description.clone());
        data.set("template_id", instance.template_id.clone());
        data.set_opt(
            "parameters",
            Some(instance.parameters.clone()).filter(|p| !p.is_empty()),
        );
        data.set("enabled", instance.enabled);
        data.set("tags", instance.tags.clone());
        data.set_opt(
            "scope",
            instance
                .scope
                .as_ref()
                .map(|s| json!({"repo_ids": s.repo_ids})),
        );
        data.set("created", self.created.to_state());
        data.set("last_updated", self.last_updated.to_state());
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRegoPolicyInstanceResponse {
    pub id: String,
}

impl SchemaWriter for CreateRegoPolicyInstanceResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let category = data.require_str("category")?.to_string();
        data.set("policy_id", self.id.clone());
        data.set_id(marshal_composed_id(&[category.as_str(), self.id.as_str()], ID_SEPARATOR));
        Ok(())
    }
}

fn instance_url(data: &ResourceData, client: &Client) -> Result<String, ProviderError> {
    let ids = unmarshal_named_id(data.require_id()?, ID_SEPARATOR, ID_FIELDS)?;
    Ok(client.url(&format!(
        "{}/{}/{}",
        INSTANCES_PATH,
        segment(&ids[0]),
        segment(&ids[1])
    )))
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new(
        "RegoPolicyInstanceRead",
        OperationType::Read,
        Method::GET,
        instance_url,
    )
    .with_response::<ReadRegoPolicyInstanceResponse>()
    .with_error_handler(ignore_not_found("Rego policy instance"))
}

fn change_info_type() -> AttributeType {
    AttributeType::object([
        ("actor", AttributeType::String),
        ("actor_type", AttributeType::String),
        ("timestamp", AttributeType::String),
    ])
}

fn schema() -> Schema {
    Schema::resource(0)
        .with_description("An instance of a Rego policy template.")
        .with_attribute("category", Attribute::required_string().with_force_new())
        .with_attribute("policy_id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("template_id", Attribute::required_string().with_force_new())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute(
            "parameters",
            Attribute::optional_string().with_description("JSON-encoded template parameters."),
        )
        .with_attribute("enabled", Attribute::optional_bool().with_default(false))
        .with_attribute("tags", Attribute::optional_string_list())
        .with_block(
            "scope",
            NestedBlock::single(
                Block::new().with_attribute("repo_ids", Attribute::optional_string_list()),
            ),
        )
        .with_attribute("duration", Attribute::optional_string())
        .with_attribute("created", Attribute::new(change_info_type(), AttributeFlags::computed()))
        .with_attribute(
            "last_updated",
            Attribute::new(change_info_type(), AttributeFlags::computed()),
        )
}

/// `cyral_rego_policy_instance`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_rego_policy_instance",
        schema(),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "RegoPolicyInstanceCreate",
                OperationType::Create,
                Method::POST,
                |data, client| {
                    Ok(client.url(&format!(
                        "{}/{}",
                        INSTANCES_PATH,
                        segment(data.require_str("category")?)
                    )))
                },
            )
            .with_request::<RegoPolicyInstanceRequest>()
            .with_response::<CreateRegoPolicyInstanceResponse>(),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "RegoPolicyInstanceDelete",
                OperationType::Delete,
                Method::DELETE,
                instance_url,
            )
            .with_error_handler(ignore_not_found("Rego policy instance")),
        ),
    )
    .with_update(OperationSequence::update(
        ResourceOperationConfig::new(
            "RegoPolicyInstanceUpdate",
            OperationType::Update,
            Method::PUT,
            instance_url,
        )
        .with_request::<RegoPolicyInstanceRequest>(),
        read_step(),
    ))
    .with_importer(composed_id_importer(ID_FIELDS))
}
