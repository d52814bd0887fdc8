//! `cyral_sidecar_listener`: a host/port a sidecar accepts connections on.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::{Client, Method};
use crate::core::{
    composed_id_importer, OperationSequence, OperationType, ResourceDefinition,
    ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::ids::{marshal_composed_id, unmarshal_named_id, ID_SEPARATOR};
use crate::resources::repository::REPO_TYPES;
use crate::resources::{ignore_not_found, segment};
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::state::ResourceData;

const ID_FIELDS: &[&str] = &["sidecar_id", "listener_id"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkAddress {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    pub port: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MySqlSettings {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub db_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub character_set: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyModeSettings {
    #[serde(default)]
    pub proxy_mode: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub repo_types: Vec<String>,
    pub network_address: NetworkAddress,
    #[serde(rename = "mysqlSettings", default, skip_serializing_if = "Option::is_none")]
    pub mysql_settings: Option<MySqlSettings>,
    #[serde(rename = "s3Settings", default, skip_serializing_if = "Option::is_none")]
    pub s3_settings: Option<ProxyModeSettings>,
    #[serde(rename = "dynamoDbSettings", default, skip_serializing_if = "Option::is_none")]
    pub dynamodb_settings: Option<ProxyModeSettings>,
}

/// Create and update body: `{"listener": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerEnvelope {
    pub listener: Listener,
}

impl SchemaReader for ListenerEnvelope {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        let address = data.get_block("network_address").ok_or_else(|| {
            ProviderError::Validation("attribute 'network_address' is required".to_string())
        })?;
        let port = address.get_i64("port").ok_or_else(|| {
            ProviderError::Validation("attribute 'network_address.port' is required".to_string())
        })?;
        let proxy_mode = |block: &str| {
            data.get_block(block).map(|b| ProxyModeSettings {
                proxy_mode: b.get_bool("proxy_mode").unwrap_or(false),
            })
        };

        Ok(Self {
            listener: Listener {
                id: data.get_string("listener_id"),
                repo_types: data.get_string_list("repo_types"),
                network_address: NetworkAddress {
                    host: address.get_string("host"),
                    port,
                },
                mysql_settings: data.get_block("mysql_settings").map(|b| MySqlSettings {
                    db_version: b.get_string("db_version"),
                    character_set: b.get_string("character_set"),
                }),
                s3_settings: proxy_mode("s3_settings"),
                dynamodb_settings: proxy_mode("dynamodb_settings"),
            },
        })
    }
}

/// `GET` response: `{"listenerConfig": {"listener": {...}}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadListenerResponse {
    pub listener_config: ListenerEnvelope,
}

impl SchemaWriter for ReadListenerResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let ids = unmarshal_named_id(data.require_id()?, ID_SEPARATOR, ID_FIELDS)?;
        let listener = &self.listener_config.listener;

        data.set("sidecar_id", ids[0].clone());
        data.set("listener_id", ids[1].clone());
        data.set("repo_types", listener.repo_types.clone());

        let mut address = json!({"port": listener.network_address.port});
        if !listener.network_address.host.is_empty() {
            address["host"] = json!(listener.network_address.host);
        }
        data.set("network_address", address);

        data.set_opt(
            "mysql_settings",
            listener.mysql_settings.as_ref().map(|s| {
                json!({"db_version": s.db_version, "character_set": s.character_set})
            }),
        );
        let proxy_mode = |s: &Option<ProxyModeSettings>| -> Option<Value> {
            s.as_ref().map(|s| json!({"proxy_mode": s.proxy_mode}))
        };
        data.set_opt("s3_settings", proxy_mode(&listener.s3_settings));
        data.set_opt("dynamodb_settings", proxy_mode(&listener.dynamodb_settings));
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListenerResponse {
    pub listener_id: String,
}

impl SchemaWriter for CreateListenerResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let sidecar_id = data.require_str("sidecar_id")?.to_string();
        data.set("listener_id", self.listener_id.clone());
        data.set_id(marshal_composed_id(
            &[sidecar_id.as_str(), self.listener_id.as_str()],
            ID_SEPARATOR,
        ));
        Ok(())
    }
}

fn listener_url(data: &ResourceData, client: &Client) -> Result<String, ProviderError> {
    let ids = unmarshal_named_id(data.require_id()?, ID_SEPARATOR, ID_FIELDS)?;
    Ok(client.url(&format!(
        "/v1/sidecars/{}/listeners/{}",
        segment(&ids[0]),
        segment(&ids[1])
    )))
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new("SidecarListenerRead", OperationType::Read, Method::GET, listener_url)
        .with_response::<ReadListenerResponse>()
        .with_error_handler(ignore_not_found("Sidecar listener"))
}

fn proxy_mode_block() -> NestedBlock {
    NestedBlock::single(
        Block::new().with_attribute("proxy_mode", Attribute::optional_bool().with_default(false)),
    )
}

fn schema() -> Schema {
    Schema::resource(0)
        .with_description("A network address on which a sidecar listens.")
        .with_attribute("sidecar_id", Attribute::required_string().with_force_new())
        .with_attribute("listener_id", Attribute::computed_string())
        .with_attribute(
            "repo_types",
            Attribute::required_string_list().with_allowed_values(REPO_TYPES),
        )
        .with_block(
            "network_address",
            NestedBlock::single(
                Block::new()
                    .with_attribute("host", Attribute::optional_string())
                    .with_attribute("port", Attribute::required_int64()),
            )
            .required(),
        )
        .with_block(
            "mysql_settings",
            NestedBlock::single(
                Block::new()
                    .with_attribute("db_version", Attribute::optional_string())
                    .with_attribute("character_set", Attribute::optional_string()),
            ),
        )
        .with_block("s3_settings", proxy_mode_block())
        .with_block("dynamodb_settings", proxy_mode_block())
}

/// `cyral_sidecar_listener`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_sidecar_listener",
        schema(),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "SidecarListenerCreate",
                OperationType::Create,
                Method::POST,
                |data, client| {
                    Ok(client.url(&format!(
                        "/v1/sidecars/{}/listeners",
                        segment(data.require_str("sidecar_id")?)
                    )))
                },
            )
            .with_request::<ListenerEnvelope>()
            .with_response::<CreateListenerResponse>(),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "SidecarListenerDelete",
                OperationType::Delete,
                Method::DELETE,
                listener_url,
            )
            .with_error_handler(ignore_not_found("Sidecar listener")),
        ),
    )
    .with_update(OperationSequence::update(
        ResourceOperationConfig::new(
            "SidecarListenerUpdate",
            OperationType::Update,
            Method::PUT,
            listener_url,
        )
        .with_request::<ListenerEnvelope>(),
        read_step(),
    ))
    .with_importer(composed_id_importer(ID_FIELDS))
}
