//! `cyral_repository_binding`: binds a repository to sidecar listeners.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::{Client, Method};
use crate::core::{
    composed_id_importer, OperationSequence, OperationType, ResourceDefinition,
    ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::ids::{marshal_composed_id, unmarshal_named_id, ID_SEPARATOR};
use crate::resources::{ignore_not_found, segment};
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::state::ResourceData;

const ID_FIELDS: &[&str] = &["sidecar_id", "binding_id"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerBinding {
    pub listener_id: String,
    #[serde(default)]
    pub node_index: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub repo_id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub listener_bindings: Vec<ListenerBinding>,
}

/// Request body and read response: `{"binding": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingEnvelope {
    pub binding: Binding,
}

impl SchemaReader for BindingEnvelope {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        let listener_bindings = data
            .get_block_list("listener_binding")
            .into_iter()
            .map(|b| {
                Ok(ListenerBinding {
                    listener_id: b.require_str("listener_id")?.to_string(),
                    node_index: b.get_i64("node_index").unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        Ok(Self {
            binding: Binding {
                id: data.get_string("binding_id"),
                repo_id: data.require_str("repository_id")?.to_string(),
                enabled: data.get_bool("enabled").unwrap_or(true),
                listener_bindings,
            },
        })
    }
}

impl SchemaWriter for BindingEnvelope {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let binding = &self.binding;
        data.set("repository_id", binding.repo_id.clone());
        data.set("enabled", binding.enabled);
        let listeners: Vec<Value> = binding
            .listener_bindings
            .iter()
            .map(|l| json!({"listener_id": l.listener_id, "node_index": l.node_index}))
            .collect();
        data.set("listener_binding", listeners);
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBindingResponse {
    pub binding_id: String,
}

impl SchemaWriter for CreateBindingResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let sidecar_id = data.require_str("sidecar_id")?.to_string();
        data.set("binding_id", self.binding_id.clone());
        data.set_id(marshal_composed_id(&[sidecar_id.as_str(), self.binding_id.as_str()], ID_SEPARATOR));
        Ok(())
    }
}

fn binding_url(data: &ResourceData, client: &Client) -> Result<String, ProviderError> {
    let ids = unmarshal_named_id(data.require_id()?, ID_SEPARATOR, ID_FIELDS)?;
    Ok(client.url(&format!(
        "/v1/sidecars/{}/bindings/{}",
        segment(&ids[0]),
        segment(&ids[1])
    )))
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new("RepositoryBindingRead", OperationType::Read, Method::GET, binding_url)
        .with_response::<BindingEnvelope>()
        .with_error_handler(ignore_not_found("Repository binding"))
}

fn schema() -> Schema {
    Schema::resource(0)
        .with_description("Binds a repository to one or more sidecar listeners.")
        .with_attribute("sidecar_id", Attribute::required_string().with_force_new())
        .with_attribute("repository_id", Attribute::required_string().with_force_new())
        .with_attribute("binding_id", Attribute::computed_string())
        .with_attribute("enabled", Attribute::optional_bool().with_default(true))
        .with_block(
            "listener_binding",
            NestedBlock::list(
                Block::new()
                    .with_attribute("listener_id", Attribute::required_string())
                    .with_attribute("node_index", Attribute::optional_int64().with_default(0)),
            ),
        )
}

/// `cyral_repository_binding`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_repository_binding",
        schema(),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "RepositoryBindingCreate",
                OperationType::Create,
                Method::POST,
                |data, client| {
                    Ok(client.url(&format!(
                        "/v1/sidecars/{}/bindings",
                        segment(data.require_str("sidecar_id")?)
                    )))
                },
            )
            .with_request::<BindingEnvelope>()
            .with_response::<CreateBindingResponse>(),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "RepositoryBindingDelete",
                OperationType::Delete,
                Method::DELETE,
                binding_url,
            )
            .with_error_handler(ignore_not_found("Repository binding")),
        ),
    )
    .with_update(OperationSequence::update(
        ResourceOperationConfig::new(
            "RepositoryBindingUpdate",
            OperationType::Update,
            Method::PUT,
            binding_url,
        )
        .with_request::<BindingEnvelope>(),
        read_step(),
    ))
    .with_importer(composed_id_importer(ID_FIELDS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_enabled() {
        let data = ResourceData::from_state(json!({
            "sidecar_id": "sc1",
            "repository_id": "repo1",
            "listener_binding": [{"listener_id": "l1"}],
        }))
        .unwrap();

        let wire = serde_json::to_value(BindingEnvelope::read_from_schema(&data).unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({"binding": {
                "repoId": "repo1",
                "enabled": true,
                "listenerBindings": [{"listenerId": "l1", "nodeIndex": 0}],
            }})
        );
    }

    #[test]
    fn test_create_response_composes_id() {
        let mut data = ResourceData::from_state(json!({"sidecar_id": "sc1"})).unwrap();
        CreateBindingResponse {
            binding_id: "b1".to_string(),
        }
        .write_to_schema(&mut data)
        .unwrap();

        assert_eq!(data.id(), Some("sc1/b1"));
        assert_eq!(data.get_str("binding_id"), Some("b1"));
    }
}
