//! `cyral_policy_rule`: who may read, update or delete which data of a policy.
//!
//! The resource ID is `{policy_id}/{policy_rule_id}`. State written by schema
//! version 0 stored only the rule ID; the v0 upgrader prefixes the policy ID.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::{Client, Method};
use crate::core::{
    composed_id_importer, OperationSequence, OperationType, ResourceDefinition,
    ResourceOperationConfig, SchemaReader, SchemaWriter, StateUpgrader,
};
use crate::error::ProviderError;
use crate::ids::{marshal_composed_id, unmarshal_named_id, ID_SEPARATOR};
use crate::resources::{ignore_not_found, segment};
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::state::{BlockRef, ResourceData};

const ID_FIELDS: &[&str] = &["policy_id", "policy_rule_id"];
const SEVERITIES: &[&str] = &["low", "medium", "high"];
const CONTENT_BLOCKS: &[&str] = &["deletes", "reads", "updates"];

/// Current schema version of `cyral_policy_rule`.
pub const SCHEMA_VERSION: u64 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetRewrite {
    pub dataset: String,
    pub repo: String,
    pub substitution: String,
    #[serde(default)]
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleContents {
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(default)]
    pub dataset_rewrites: Vec<DatasetRewrite>,
    #[serde(default = "default_rows")]
    pub rows: i64,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default)]
    pub rate_limit: i64,
}

fn default_rows() -> i64 {
    1
}

fn default_severity() -> String {
    "low".to_string()
}

impl RuleContents {
    fn from_block(block: BlockRef<'_>) -> Result<Self, ProviderError> {
        let dataset_rewrites = block
            .get_block_list("dataset_rewrites")
            .into_iter()
            .map(|rewrite| {
                Ok(DatasetRewrite {
                    dataset: rewrite.require_str("dataset")?.to_string(),
                    repo: rewrite.require_str("repo")?.to_string(),
                    substitution: rewrite.require_str("substitution")?.to_string(),
                    parameters: rewrite.get_string_list("parameters"),
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        Ok(Self {
            data: block.get_string_list("data"),
            dataset_rewrites,
            rows: block.get_i64("rows").unwrap_or_else(default_rows),
            severity: block
                .get_str("severity")
                .map(str::to_string)
                .unwrap_or_else(default_severity),
            rate_limit: block.get_i64("rate_limit").unwrap_or_default(),
        })
    }

    fn to_state(&self) -> Value {
        let rewrites: Vec<Value> = self
            .dataset_rewrites
            .iter()
            .map(|r| {
                json!({
                    "dataset": r.dataset,
                    "repo": r.repo,
                    "substitution": r.substitution,
                    "parameters": r.parameters,
                })
            })
            .collect();
        json!({
            "data": self.data,
            "dataset_rewrites": rewrites,
            "rows": self.rows,
            "severity": self.severity,
            "rate_limit": self.rate_limit,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identities {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub db_roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub deletes: Vec<RuleContents>,
    #[serde(default)]
    pub reads: Vec<RuleContents>,
    #[serde(default)]
    pub updates: Vec<RuleContents>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identities: Option<Identities>,
    #[serde(default)]
    pub hosts: Vec<String>,
}

impl PolicyRule {
    fn contents(&self, name: &str) -> &[RuleContents] {
        match name {
            "deletes" => &self.deletes,
            "reads" => &self.reads,
            _ => &self.updates,
        }
    }
}

impl SchemaReader for PolicyRule {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        let contents = |name: &str| {
            data.get_block_list(name)
                .into_iter()
                .map(RuleContents::from_block)
                .collect::<Result<Vec<_>, ProviderError>>()
        };

        Ok(Self {
            id: data.get_string("policy_rule_id"),
            deletes: contents("deletes")?,
            reads: contents("reads")?,
            updates: contents("updates")?,
            identities: data.get_block("identities").map(|b| Identities {
                db_roles: b.get_string_list("db_roles"),
                groups: b.get_string_list("groups"),
                services: b.get_string_list("services"),
                users: b.get_string_list("users"),
            }),
            hosts: data.get_string_list("hosts"),
        })
    }
}

impl SchemaWriter for PolicyRule {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let ids = unmarshal_named_id(data.require_id()?, ID_SEPARATOR, ID_FIELDS)?;
        data.set("policy_id", ids[0].clone());
        data.set("policy_rule_id", ids[1].clone());

        for name in CONTENT_BLOCKS {
            let blocks: Vec<Value> = self.contents(name).iter().map(RuleContents::to_state).collect();
            data.set(*name, blocks);
        }
        data.set_opt(
            "identities",
            self.identities.as_ref().map(|i| {
                json!({
                    "db_roles": i.db_roles,
                    "groups": i.groups,
                    "services": i.services,
                    "users": i.users,
                })
            }),
        );
        data.set("hosts", self.hosts.clone());
        Ok(())
    }
}

/// `POST /v1/policies/{policy_id}/rules` response.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePolicyRuleResponse {
    pub id: String,
}

impl SchemaWriter for CreatePolicyRuleResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let policy_id = data.require_str("policy_id")?.to_string();
        data.set("policy_rule_id", self.id.clone());
        data.set_id(marshal_composed_id(&[policy_id.as_str(), self.id.as_str()], ID_SEPARATOR));
        Ok(())
    }
}

/// Rewrites a v0 state `id` of `{rule_id}` into `{policy_id}/{rule_id}`.
pub fn upgrade_v0(mut state: Value) -> Result<Value, ProviderError> {
    let obj = state
        .as_object_mut()
        .ok_or_else(|| ProviderError::Validation("policy rule state is not an object".to_string()))?;
    let policy_id = obj
        .get("policy_id")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Validation("policy rule state has no policy_id".to_string()))?
        .to_string();
    let rule_id = obj
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Validation("policy rule state has no id".to_string()))?
        .to_string();

    obj.insert(
        "id".to_string(),
        Value::String(marshal_composed_id(&[policy_id, rule_id], ID_SEPARATOR)),
    );
    Ok(state)
}

fn rule_url(data: &ResourceData, client: &Client) -> Result<String, ProviderError> {
    let ids = unmarshal_named_id(data.require_id()?, ID_SEPARATOR, ID_FIELDS)?;
    Ok(client.url(&format!(
        "/v1/policies/{}/rules/{}",
        segment(&ids[0]),
        segment(&ids[1])
    )))
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new("PolicyRuleRead", OperationType::Read, Method::GET, rule_url)
        .with_response::<PolicyRule>()
        .with_error_handler(ignore_not_found("Policy rule"))
}

fn contents_block() -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute("data", Attribute::optional_string_list())
            .with_block(
                "dataset_rewrites",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("dataset", Attribute::required_string())
                        .with_attribute("repo", Attribute::required_string())
                        .with_attribute("substitution", Attribute::required_string())
                        .with_attribute("parameters", Attribute::optional_string_list()),
                ),
            )
            .with_attribute("rows", Attribute::optional_int64().with_default(1))
            .with_attribute(
                "severity",
                Attribute::optional_string()
                    .with_allowed_values(SEVERITIES)
                    .with_default("low"),
            )
            .with_attribute("rate_limit", Attribute::optional_int64()),
    )
}

fn schema() -> Schema {
    Schema::resource(SCHEMA_VERSION)
        .with_description("A rule of a Cyral policy.")
        .with_attribute("policy_id", Attribute::required_string().with_force_new())
        .with_attribute("policy_rule_id", Attribute::computed_string())
        .with_block("deletes", contents_block())
        .with_block("reads", contents_block())
        .with_block("updates", contents_block())
        .with_block(
            "identities",
            NestedBlock::single(
                Block::new()
                    .with_attribute("db_roles", Attribute::optional_string_list())
                    .with_attribute("groups", Attribute::optional_string_list())
                    .with_attribute("services", Attribute::optional_string_list())
                    .with_attribute("users", Attribute::optional_string_list()),
            ),
        )
        .with_attribute("hosts", Attribute::optional_string_list())
}

/// `cyral_policy_rule`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_policy_rule",
        schema(),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "PolicyRuleCreate",
                OperationType::Create,
                Method::POST,
                |data, client| {
                    Ok(client.url(&format!(
                        "/v1/policies/{}/rules",
                        segment(data.require_str("policy_id")?)
                    )))
                },
            )
            .with_request::<PolicyRule>()
            .with_response::<CreatePolicyRuleResponse>(),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new("PolicyRuleDelete", OperationType::Delete, Method::DELETE, rule_url)
                .with_error_handler(ignore_not_found("Policy rule")),
        ),
    )
    .with_update(OperationSequence::update(
        ResourceOperationConfig::new("PolicyRuleUpdate", OperationType::Update, Method::PUT, rule_url)
            .with_request::<PolicyRule>(),
        read_step(),
    ))
    .with_importer(composed_id_importer(ID_FIELDS))
    .with_state_upgrader(StateUpgrader::new(0, upgrade_v0))
}
