//! `cyral_datalabel`: custom data labels, as a resource and as a lookup.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{id_or, ignore_not_found, opt_string, segment};
use crate::client::{Client, Method};
use crate::core::{
    passthrough_importer, DataSourceDefinition, OperationSequence, OperationType,
    ResourceDefinition, ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};
use crate::state::ResourceData;

const DATALABELS_PATH: &str = "/v1/datalabels";
const RULE_TYPES: &[&str] = &["UNKNOWN", "REGO"];
const RULE_STATUSES: &[&str] = &["ENABLED", "DISABLED"];
const LABEL_TYPES: &[&str] = &["UNKNOWN", "PREDEFINED", "CUSTOM"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRule {
    #[serde(default = "default_rule_type")]
    pub rule_type: String,
    #[serde(default)]
    pub rule_code: String,
    #[serde(default = "default_rule_status")]
    pub rule_status: String,
}

fn default_rule_type() -> String {
    "UNKNOWN".to_string()
}

fn default_rule_status() -> String {
    "ENABLED".to_string()
}

impl Default for ClassificationRule {
    fn default() -> Self {
        Self {
            rule_type: default_rule_type(),
            rule_code: String::new(),
            rule_status: default_rule_status(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataLabel {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_rule: Option<ClassificationRule>,
}

impl DataLabel {
    fn classification_rule_state(&self) -> Option<Value> {
        self.classification_rule.as_ref().map(|rule| {
            json!({
                "rule_type": rule.rule_type,
                "rule_code": rule.rule_code,
                "rule_status": rule.rule_status,
            })
        })
    }
}

impl SchemaReader for DataLabel {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        let classification_rule = data.get_block("classification_rule").map(|b| ClassificationRule {
            rule_type: b.get_str("rule_type").map(str::to_string).unwrap_or_else(default_rule_type),
            rule_code: b.get_string("rule_code"),
            rule_status: b
                .get_str("rule_status")
                .map(str::to_string)
                .unwrap_or_else(default_rule_status),
        });
        Ok(Self {
            name: data.require_str("name")?.to_string(),
            kind: String::new(),
            description: data.get_string("description"),
            tags: data.get_string_list("tags"),
            classification_rule,
        })
    }
}

impl SchemaWriter for DataLabel {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        data.set_id(self.name.clone());
        data.set("name", self.name.clone());
        data.set("description", self.description.clone());
        data.set("tags", self.tags.clone());
        data.set_opt("classification_rule", self.classification_rule_state());
        Ok(())
    }
}

fn label_url(data: &ResourceData, client: &Client) -> Result<String, ProviderError> {
    Ok(client.url(&format!(
        "{}/{}",
        DATALABELS_PATH,
        segment(id_or(data, "name")?)
    )))
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new("DataLabelResourceRead", OperationType::Read, Method::GET, label_url)
        .with_response::<DataLabel>()
        .with_error_handler(ignore_not_found("Data label"))
}

fn put_step(name: &str, kind: OperationType) -> ResourceOperationConfig {
    ResourceOperationConfig::new(name, kind, Method::PUT, label_url).with_request::<DataLabel>()
}

fn schema() -> Schema {
    Schema::resource(0)
        .with_description("A custom data label.")
        .with_attribute("name", Attribute::required_string().with_force_new())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("tags", Attribute::optional_string_list())
        .with_block(
            "classification_rule",
            NestedBlock::single(
                Block::new()
                    .with_attribute(
                        "rule_type",
                        Attribute::optional_string()
                            .with_allowed_values(RULE_TYPES)
                            .with_default("UNKNOWN"),
                    )
                    .with_attribute("rule_code", Attribute::optional_string())
                    .with_attribute(
                        "rule_status",
                        Attribute::optional_string()
                            .with_allowed_values(RULE_STATUSES)
                            .with_default("ENABLED"),
                    ),
            ),
        )
}

/// `cyral_datalabel` resource.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_datalabel",
        schema(),
        OperationSequence::create(put_step("DataLabelResourceCreate", OperationType::Create), read_step()),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "DataLabelResourceDelete",
                OperationType::Delete,
                Method::DELETE,
                label_url,
            )
            .with_error_handler(ignore_not_found("Data label")),
        ),
    )
    .with_update(OperationSequence::update(
        put_step("DataLabelResourceUpdate", OperationType::Update),
        read_step(),
    ))
    .with_importer(passthrough_importer())
}

/// `GET /v1/datalabels` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ListDataLabelsResponse {
    #[serde(default)]
    pub labels: Vec<DataLabel>,
}

impl SchemaWriter for ListDataLabelsResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = opt_string(data, "name");
        let list: Vec<Value> = self
            .labels
            .iter()
            .filter(|label| name.as_deref().map_or(true, |n| label.name == n))
            .map(|label| {
                json!({
                    "name": label.name,
                    "type": label.kind,
                    "description": label.description,
                    "tags": label.tags,
                    "classification_rule": label.classification_rule_state(),
                })
            })
            .collect();
        data.set("datalabel_list", list);

        let id = format!(
            "{}-{}",
            name.unwrap_or_default(),
            data.get_string("type")
        );
        data.set_id(if id == "-" { "all".to_string() } else { id });
        Ok(())
    }
}

/// `cyral_datalabel` data source.
pub fn data_source() -> DataSourceDefinition {
    let entry = AttributeType::object([
        ("name", AttributeType::String),
        ("type", AttributeType::String),
        ("description", AttributeType::String),
        ("tags", AttributeType::list(AttributeType::String)),
        (
            "classification_rule",
            AttributeType::object([
                ("rule_type", AttributeType::String),
                ("rule_code", AttributeType::String),
                ("rule_status", AttributeType::String),
            ]),
        ),
    ]);

    DataSourceDefinition::new(
        "cyral_datalabel",
        Schema::resource(0)
            .with_description("Lists data labels, optionally filtered by name and type.")
            .with_attribute("name", Attribute::optional_string())
            .with_attribute("type", Attribute::optional_string().with_allowed_values(LABEL_TYPES))
            .with_attribute(
                "datalabel_list",
                Attribute::new(AttributeType::list(entry), AttributeFlags::computed()),
            ),
        OperationSequence::read(
            ResourceOperationConfig::new(
                "DataLabelDataSourceRead",
                OperationType::Read,
                Method::GET,
                |data, client| {
                    let label_type = opt_string(data, "type").unwrap_or_default();
                    Ok(client.url(&format!("{}?type={}", DATALABELS_PATH, segment(&label_type))))
                },
            )
            .with_response::<ListDataLabelsResponse>(),
        ),
    )
}
