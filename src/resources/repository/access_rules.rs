//! `cyral_repository_access_rules`: who may use a repository user account, and when.

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
use crate::state::{BlockRef, ResourceData};

const ID_FIELDS: &[&str] = &["repository_id", "user_account_id"];
const IDENTITY_TYPES: &[&str] = &["username", "email", "group"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRuleConfig {
    #[serde(default)]
    pub policy_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    pub identity: Identity,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub valid_from: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub valid_until: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<AccessRuleConfig>,
}

impl AccessRule {
    fn from_block(rule: BlockRef<'_>) -> Result<Self, ProviderError> {
        let identity = rule.get_block("identity").ok_or_else(|| {
            ProviderError::Validation("every rule needs an identity block".to_string())
        })?;
        Ok(Self {
            identity: Identity {
                kind: identity.require_str("type")?.to_string(),
                name: identity.require_str("name")?.to_string(),
            },
            valid_from: rule.get_string("valid_from"),
            valid_until: rule.get_string("valid_until"),
            config: rule.get_block("config").map(|c| AccessRuleConfig {
                policy_ids: c.get_string_list("policy_ids"),
            }),
        })
    }

    fn to_state(&self) -> Value {
        let mut rule = json!({
            "identity": {"type": self.identity.kind, "name": self.identity.name},
        });
        if !self.valid_from.is_empty() {
            rule["valid_from"] = json!(self.valid_from);
        }
        if !self.valid_until.is_empty() {
            rule["valid_until"] = json!(self.valid_until);
        }
        if let Some(config) = &self.config {
            rule["config"] = json!({"policy_ids": config.policy_ids});
        }
        rule
    }
}

/// Request body and read response: `{"accessRules": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRulesEnvelope {
    #[serde(default)]
    pub access_rules: Vec<AccessRule>,
}

impl SchemaReader for AccessRulesEnvelope {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        let access_rules = data
            .get_block_list("rule")
            .into_iter()
            .map(AccessRule::from_block)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { access_rules })
    }
}

impl SchemaWriter for AccessRulesEnvelope {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let ids = match data.id() {
            Some(id) => unmarshal_named_id(id, ID_SEPARATOR, ID_FIELDS)?,
            None => vec![
                data.require_str("repository_id")?.to_string(),
                data.require_str("user_account_id")?.to_string(),
            ],
        };
        data.set_id(marshal_composed_id(&ids, ID_SEPARATOR));
        data.set("repository_id", ids[0].clone());
        data.set("user_account_id", ids[1].clone());
        let rules: Vec<Value> = self.access_rules.iter().map(AccessRule::to_state).collect();
        data.set("rule", rules);
        Ok(())
    }
}

fn rules_url(data: &ResourceData, client: &Client) -> Result<String, ProviderError> {
    let (repository_id, user_account_id) = match data.id() {
        Some(id) => {
            let ids = unmarshal_named_id(id, ID_SEPARATOR, ID_FIELDS)?;
            (ids[0].clone(), ids[1].clone())
        },
        None => (
            data.require_str("repository_id")?.to_string(),
            data.require_str("user_account_id")?.to_string(),
        ),
    };
    Ok(client.url(&format!(
        "/v1/repos/{}/userAccounts/{}/accessRules",
        segment(&repository_id),
        segment(&user_account_id)
    )))
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new("RepositoryAccessRulesRead", OperationType::Read, Method::GET, rules_url)
        .with_response::<AccessRulesEnvelope>()
        .with_error_handler(ignore_not_found("Repository access rules"))
}

fn put_step(name: &str, kind: OperationType) -> ResourceOperationConfig {
    ResourceOperationConfig::new(name, kind, Method::PUT, rules_url)
        .with_request::<AccessRulesEnvelope>()
}

fn schema() -> Schema {
    let rule = Block::new()
        .with_block(
            "identity",
            NestedBlock::single(
                Block::new()
                    .with_attribute(
                        "type",
                        Attribute::required_string().with_allowed_values(IDENTITY_TYPES),
                    )
                    .with_attribute("name", Attribute::required_string()),
            )
            .required(),
        )
        .with_attribute("valid_from", Attribute::optional_string())
        .with_attribute("valid_until", Attribute::optional_string())
        .with_block(
            "config",
            NestedBlock::single(
                Block::new().with_attribute("policy_ids", Attribute::optional_string_list()),
            ),
        );

    Schema::resource(0)
        .with_description("Access rules attached to a repository user account.")
        .with_attribute("repository_id", Attribute::required_string().with_force_new())
        .with_attribute("user_account_id", Attribute::required_string().with_force_new())
        .with_block("rule", NestedBlock::list(rule).with_min_items(1))
}

/// `cyral_repository_access_rules`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_repository_access_rules",
        schema(),
        OperationSequence::create(
            put_step("RepositoryAccessRulesCreate", OperationType::Create),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "RepositoryAccessRulesDelete",
                OperationType::Delete,
                Method::DELETE,
                rules_url,
            )
            .with_error_handler(ignore_not_found("Repository access rules")),
        ),
    )
    .with_update(OperationSequence::update(
        put_step("RepositoryAccessRulesUpdate", OperationType::Update),
        read_step(),
    ))
    .with_importer(composed_id_importer(ID_FIELDS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let data = ResourceData::from_state(json!({
            "repository_id": "r1",
            "user_account_id": "u1",
            "rule": [{
                "identity": {"type": "group", "name": "analysts"},
                "valid_until": "2030-01-01T00:00:00Z",
                "config": {"policy_ids": ["p1"]},
            }],
        }))
        .unwrap();
        let wire = serde_json::to_value(AccessRulesEnvelope::read_from_schema(&data).unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({"accessRules": [{
                "identity": {"type": "group", "name": "analysts"},
                "validUntil": "2030-01-01T00:00:00Z",
                "config": {"policyIds": ["p1"]},
            }]})
        );
    }

    #[test]
    fn test_read_after_create_sets_composed_id() {
        let mut data = ResourceData::from_state(json!({
            "repository_id": "r1",
            "user_account_id": "u1",
        }))
        .unwrap();
        let response: AccessRulesEnvelope = serde_json::from_value(json!({
            "accessRules": [{"identity": {"type": "email", "name": "a@b.c"}}]
        }))
        .unwrap();
        response.write_to_schema(&mut data).unwrap();

        assert_eq!(data.id(), Some("r1/u1"));
        let rules = data.get_block_list("rule");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].get_block("identity").unwrap().get_str("type"), Some("email"));
        assert!(rules[0].get("valid_from").is_none());
    }

    #[test]
    fn test_schema_requires_a_rule() {
        let diagnostics = crate::validation::validate(
            &schema(),
            &json!({"repository_id": "r1", "user_account_id": "u1", "rule": []}),
        );
        assert_eq!(diagnostics.len(), 1);
    }
}
