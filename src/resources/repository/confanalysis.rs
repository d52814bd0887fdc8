//! `cyral_repository_conf_analysis`: log and analysis settings of a repository.

use serde::{Deserialize, Serialize};

use crate::client::{Client, Method};
use crate::core::{
    passthrough_importer, OperationSequence, OperationType, ResourceDefinition,
    ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::resources::{id_or, ignore_not_found, segment};
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;

const REDACT_MODES: &[&str] = &["all", "none", "watched"];
const LOG_GROUPS: &[&str] = &[
    "everything",
    "dql",
    "dml",
    "ddl",
    "sensitive & dql",
    "sensitive & dml",
    "sensitive & ddl",
    "privileged",
    "port-scan",
    "auth-failure",
    "full-table-scan",
    "violations",
    "connections",
    "sensitive",
    "data-classification",
    "audit",
    "error",
    "new-connections",
    "closed-connections",
];
const ANNOTATION_GROUPS: &[&str] = &["identity", "client", "repo", "sidecar"];

const BOOL_FIELDS: &[&str] = &[
    "alert_on_violation",
    "disable_pre_configured_alerts",
    "block_on_violation",
    "disable_filter_analysis",
    "rewrite_on_violation",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivityConfig {
    #[serde(default)]
    pub redact: String,
    #[serde(default)]
    pub alert_on_violation: bool,
    #[serde(default)]
    pub disable_pre_configured_alerts: bool,
    #[serde(default)]
    pub block_on_violation: bool,
    #[serde(default)]
    pub disable_filter_analysis: bool,
    #[serde(default)]
    pub rewrite_on_violation: bool,
    #[serde(default)]
    pub comment_annotation_groups: Vec<String>,
    #[serde(default)]
    pub log_groups: Vec<String>,
}

/// Request body and read response: `{"config": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserActivityEnvelope {
    pub config: UserActivityConfig,
}

impl SchemaReader for UserActivityEnvelope {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        let flag = |key: &str| data.get_bool(key).unwrap_or(false);
        Ok(Self {
            config: UserActivityConfig {
                redact: data.get_str("redact").unwrap_or("all").to_string(),
                alert_on_violation: flag("alert_on_violation"),
                disable_pre_configured_alerts: flag("disable_pre_configured_alerts"),
                block_on_violation: flag("block_on_violation"),
                disable_filter_analysis: flag("disable_filter_analysis"),
                rewrite_on_violation: flag("rewrite_on_violation"),
                comment_annotation_groups: data.get_string_list("comment_annotation_groups"),
                log_groups: data.get_string_list("log_groups"),
            },
        })
    }
}

impl SchemaWriter for UserActivityEnvelope {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let repository_id = id_or(data, "repository_id")?.to_string();
        data.set_id(repository_id.clone());
        data.set("repository_id", repository_id);

        let config = &self.config;
        data.set("redact", config.redact.clone());
        data.set("alert_on_violation", config.alert_on_violation);
        data.set("disable_pre_configured_alerts", config.disable_pre_configured_alerts);
        data.set("block_on_violation", config.block_on_violation);
        data.set("disable_filter_analysis", config.disable_filter_analysis);
        data.set("rewrite_on_violation", config.rewrite_on_violation);
        data.set("comment_annotation_groups", config.comment_annotation_groups.clone());
        data.set("log_groups", config.log_groups.clone());
        Ok(())
    }
}

fn analysis_url(data: &ResourceData, client: &Client) -> Result<String, ProviderError> {
    Ok(client.url(&format!(
        "/v1/repos/{}/conf/analysis",
        segment(id_or(data, "repository_id")?)
    )))
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new("ConfAnalysisResourceRead", OperationType::Read, Method::GET, analysis_url)
        .with_response::<UserActivityEnvelope>()
        .with_error_handler(ignore_not_found("Repository conf analysis"))
}

fn put_step(name: &str, kind: OperationType) -> ResourceOperationConfig {
    ResourceOperationConfig::new(name, kind, Method::PUT, analysis_url)
        .with_request::<UserActivityEnvelope>()
}

fn schema() -> Schema {
    let schema = Schema::resource(0)
        .with_description("Log and analysis settings of a repository.")
        .with_attribute("repository_id", Attribute::required_string().with_force_new())
        .with_attribute(
            "redact",
            Attribute::optional_string()
                .with_allowed_values(REDACT_MODES)
                .with_default("all"),
        )
        .with_attribute(
            "comment_annotation_groups",
            Attribute::optional_string_set().with_allowed_values(ANNOTATION_GROUPS),
        )
        .with_attribute(
            "log_groups",
            Attribute::optional_string_set().with_allowed_values(LOG_GROUPS),
        );

    BOOL_FIELDS.iter().fold(schema, |schema, name| {
        schema.with_attribute(*name, Attribute::optional_bool().with_default(false))
    })
}

/// `cyral_repository_conf_analysis`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_repository_conf_analysis",
        schema(),
        OperationSequence::create(
            put_step("ConfAnalysisResourceCreate", OperationType::Create),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "ConfAnalysisResourceDelete",
                OperationType::Delete,
                Method::DELETE,
                analysis_url,
            )
            .with_error_handler(ignore_not_found("Repository conf analysis")),
        ),
    )
    .with_update(OperationSequence::update(
        put_step("ConfAnalysisResourceUpdate", OperationType::Update),
        read_step(),
    ))
    .with_importer(passthrough_importer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let data = ResourceData::from_state(json!({
            "repository_id": "repo-1",
            "block_on_violation": true,
            "log_groups": ["dml", "violations"],
        }))
        .unwrap();
        let wire = serde_json::to_value(UserActivityEnvelope::read_from_schema(&data).unwrap()).unwrap();

        assert_eq!(wire["config"]["redact"], "all");
        assert_eq!(wire["config"]["blockOnViolation"], true);
        assert_eq!(wire["config"]["alertOnViolation"], false);
        assert_eq!(wire["config"]["logGroups"], json!(["dml", "violations"]));
    }

    #[test]
    fn test_schema_rejects_unknown_log_group() {
        let diagnostics = crate::validation::validate(
            &schema(),
            &json!({"repository_id": "r", "log_groups": ["nope"]}),
        );
        assert_eq!(diagnostics.len(), 1);
    }
}
