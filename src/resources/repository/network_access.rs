//! `cyral_repository_network_access_policy`: source-IP rules for a repository.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::{Client, Method};
use crate::core::{
    passthrough_importer, OperationSequence, OperationType, ResourceDefinition,
    ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::resources::{id_or, ignore_not_found, segment};
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::state::ResourceData;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAccessRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub db_accounts: Vec<String>,
    #[serde(default)]
    pub source_ips: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAccessRules {
    #[serde(default)]
    pub rules_block_access: bool,
    #[serde(default)]
    pub rules: Vec<NetworkAccessRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAccessPolicy {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub network_access_rules: NetworkAccessRules,
}

fn enabled_by_default() -> bool {
    true
}

impl SchemaReader for NetworkAccessPolicy {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        let rules = data
            .get_block_list("network_access_rule")
            .into_iter()
            .map(|rule| {
                Ok(NetworkAccessRule {
                    name: rule.require_str("name")?.to_string(),
                    description: rule.get_string("description"),
                    db_accounts: rule.get_string_list("db_accounts"),
                    source_ips: rule.get_string_list("source_ips"),
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        Ok(Self {
            enabled: data.get_bool("enabled").unwrap_or(true),
            network_access_rules: NetworkAccessRules {
                rules_block_access: data.get_bool("network_access_rules_block_access").unwrap_or(false),
                rules,
            },
        })
    }
}

impl SchemaWriter for NetworkAccessPolicy {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let repository_id = id_or(data, "repository_id")?.to_string();
        data.set_id(repository_id.clone());
        data.set("repository_id", repository_id);
        data.set("enabled", self.enabled);
        data.set(
            "network_access_rules_block_access",
            self.network_access_rules.rules_block_access,
        );

        let rules: Vec<Value> = self
            .network_access_rules
            .rules
            .iter()
            .map(|rule| {
                json!({
                    "name": rule.name,
                    "description": rule.description,
                    "db_accounts": rule.db_accounts,
                    "source_ips": rule.source_ips,
                })
            })
            .collect();
        data.set("network_access_rule", rules);
        Ok(())
    }
}

fn policy_url(data: &ResourceData, client: &Client) -> Result<String, ProviderError> {
    Ok(client.url(&format!(
        "/v1/repos/{}/network-access",
        segment(id_or(data, "repository_id")?)
    )))
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new(
        "RepositoryNetworkAccessPolicyRead",
        OperationType::Read,
        Method::GET,
        policy_url,
    )
    .with_response::<NetworkAccessPolicy>()
    .with_error_handler(ignore_not_found("Repository network access policy"))
}

fn schema() -> Schema {
    Schema::resource(0)
        .with_description("Restricts which source addresses may reach a repository.")
        .with_attribute("repository_id", Attribute::required_string().with_force_new())
        .with_attribute("enabled", Attribute::optional_bool().with_default(true))
        .with_attribute(
            "network_access_rules_block_access",
            Attribute::optional_bool().with_default(false),
        )
        .with_block(
            "network_access_rule",
            NestedBlock::list(
                Block::new()
                    .with_attribute("name", Attribute::required_string())
                    .with_attribute("description", Attribute::optional_string())
                    .with_attribute("db_accounts", Attribute::optional_string_list())
                    .with_attribute("source_ips", Attribute::optional_string_list()),
            ),
        )
}

/// `cyral_repository_network_access_policy`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_repository_network_access_policy",
        schema(),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "RepositoryNetworkAccessPolicyCreate",
                OperationType::Create,
                Method::POST,
                policy_url,
            )
            .with_request::<NetworkAccessPolicy>(),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "RepositoryNetworkAccessPolicyDelete",
                OperationType::Delete,
                Method::DELETE,
                policy_url,
            )
            .with_error_handler(ignore_not_found("Repository network access policy")),
        ),
    )
    .with_update(OperationSequence::update(
        ResourceOperationConfig::new(
            "RepositoryNetworkAccessPolicyUpdate",
            OperationType::Update,
            Method::PUT,
            policy_url,
        )
        .with_request::<NetworkAccessPolicy>(),
        read_step(),
    ))
    .with_importer(passthrough_importer())
}
