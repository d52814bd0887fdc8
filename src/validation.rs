//! Local validation of configuration against a [`Schema`].
//!
//! Everything here runs before any request reaches the control plane, so a
//! misconfigured resource fails at validate time with attribute-level
//! diagnostics instead of an opaque API error.
//!
//! # Example
//!
//! ```
//! use cyral_provider::schema::{Attribute, Schema};
//! use cyral_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::resource(0)
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute(
//!         "client_tls",
//!         Attribute::optional_string().with_allowed_values(&["enable", "disable"]),
//!     );
//!
//! assert!(validate(&schema, &json!({"name": "pg"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "pg", "client_tls": "maybe"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("client_tls".to_string()));
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Validate a configuration value against a schema.
///
/// Returns one diagnostic per problem; an empty vector means the value is valid.
///
/// # Rules
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped
/// - Values must match the declared type
/// - String attributes with allowed values must use one of them
/// - Conflicting attributes may not both be set
/// - Exactly-one-of groups must have exactly one member set
/// - Nested blocks are validated recursively with their item constraints
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut validator = Validator::default();
    validator.block(&schema.block, value, "");
    validator.diagnostics
}

/// Like [`validate`], returning `Err` with the diagnostics when invalid.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether the value is valid against the schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

#[derive(Default)]
struct Validator {
    diagnostics: Vec<Diagnostic>,
}

impl Validator {
    fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn block(&mut self, block: &Block, value: &Value, path: &str) {
        let obj = match value {
            Value::Object(map) => map,
            Value::Null => return,
            other => {
                let mut diag = Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(other)));
                if !path.is_empty() {
                    diag = diag.with_attribute(path);
                }
                self.push(diag);
                return;
            },
        };

        for (name, attr) in &block.attributes {
            let attr_path = join_path(path, name);
            self.attribute(attr, obj.get(name), &attr_path);
            if is_set(obj.get(name)) {
                self.conflicts(attr, name, obj, path);
            }
        }

        for (name, nested) in &block.blocks {
            let block_path = join_path(path, name);
            self.nested_block(nested, obj.get(name), &block_path);
        }

        for group in &block.exactly_one_of {
            self.exactly_one_of(group, obj, path);
        }
    }

    fn attribute(&mut self, attr: &Attribute, value: Option<&Value>, path: &str) {
        if attr.flags.is_computed_only() {
            return;
        }

        match value {
            None | Some(Value::Null) => {
                if attr.flags.required {
                    self.push(
                        Diagnostic::error(format!("Missing required attribute '{}'", path))
                            .with_detail("This attribute is required and must be provided")
                            .with_attribute(path),
                    );
                }
            },
            Some(v) => {
                let before = self.diagnostics.len();
                self.attribute_type(&attr.attr_type, v, path);
                if self.diagnostics.len() == before && !attr.allowed_values.is_empty() {
                    self.allowed_value(attr, v, path);
                }
            },
        }
    }

    fn allowed_value(&mut self, attr: &Attribute, value: &Value, path: &str) {
        if let Value::Array(items) = value {
            for (i, item) in items.iter().enumerate() {
                self.allowed_value(attr, item, &format!("{}[{}]", path, i));
            }
            return;
        }
        let Some(s) = value.as_str() else {
            return;
        };
        if !attr.allowed_values.iter().any(|allowed| allowed == s) {
            self.push(
                Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                    .with_detail(format!(
                        "Expected one of [{}], got \"{}\"",
                        attr.allowed_values.join(", "),
                        s
                    ))
                    .with_attribute(path),
            );
        }
    }

    fn conflicts(&mut self, attr: &Attribute, name: &str, obj: &Map<String, Value>, path: &str) {
        for other in &attr.conflicts_with {
            // Report each pair once, from the lexically smaller side.
            if is_set(obj.get(other)) && name < other.as_str() {
                self.push(
                    Diagnostic::error(format!(
                        "Conflicting attributes '{}' and '{}'",
                        join_path(path, name),
                        join_path(path, other)
                    ))
                    .with_detail("Only one of these attributes may be set")
                    .with_attribute(join_path(path, name)),
                );
            }
        }
    }

    fn exactly_one_of(&mut self, group: &[String], obj: &Map<String, Value>, path: &str) {
        let set: Vec<&String> = group.iter().filter(|n| is_set(obj.get(*n))).collect();
        if set.len() == 1 {
            return;
        }

        let members = group
            .iter()
            .map(|n| format!("'{}'", join_path(path, n)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut diag = Diagnostic::error(format!("Exactly one of {} must be set", members))
            .with_detail(format!("{} of them are set", set.len()));
        if !path.is_empty() {
            diag = diag.with_attribute(path);
        }
        self.push(diag);
    }

    fn attribute_type(&mut self, attr_type: &AttributeType, value: &Value, path: &str) {
        match attr_type {
            AttributeType::String => {
                if !value.is_string() {
                    self.push(type_error(path, "string", value));
                }
            },
            AttributeType::Int64 => {
                if !is_int64(value) {
                    self.push(type_error(path, "int64", value));
                }
            },
            AttributeType::Float64 => {
                if !value.is_number() {
                    self.push(type_error(path, "float64", value));
                }
            },
            AttributeType::Bool => {
                if !value.is_boolean() {
                    self.push(type_error(path, "bool", value));
                }
            },
            AttributeType::List(element_type) | AttributeType::Set(element_type) => {
                let expected = if matches!(attr_type, AttributeType::Set(_)) {
                    "set"
                } else {
                    "list"
                };
                match value.as_array() {
                    Some(items) => {
                        for (i, item) in items.iter().enumerate() {
                            self.attribute_type(element_type, item, &format!("{}.{}", path, i));
                        }
                    },
                    None => self.push(type_error(path, expected, value)),
                }
            },
            AttributeType::Map(value_type) => match value.as_object() {
                Some(obj) => {
                    for (key, val) in obj {
                        self.attribute_type(value_type, val, &format!("{}.{}", path, key));
                    }
                },
                None => self.push(type_error(path, "map", value)),
            },
            AttributeType::Object(attrs) => match value.as_object() {
                Some(obj) => self.object_type(attrs, obj, path),
                None => self.push(type_error(path, "object", value)),
            },
            AttributeType::Dynamic => {},
        }
    }

    fn object_type(
        &mut self,
        attrs: &HashMap<String, AttributeType>,
        obj: &Map<String, Value>,
        path: &str,
    ) {
        for (name, attr_type) in attrs {
            if let Some(value) = obj.get(name) {
                if !value.is_null() {
                    self.attribute_type(attr_type, value, &join_path(path, name));
                }
            }
        }
    }

    fn nested_block(&mut self, nested: &NestedBlock, value: Option<&Value>, path: &str) {
        match nested.nesting_mode {
            BlockNestingMode::Single => self.single_block(nested, value, path),
            BlockNestingMode::List | BlockNestingMode::Set => self.list_block(nested, value, path),
            BlockNestingMode::Map => self.map_block(nested, value, path),
        }
    }

    fn single_block(&mut self, nested: &NestedBlock, value: Option<&Value>, path: &str) {
        match value {
            None | Some(Value::Null) => {
                if nested.min_items > 0 {
                    self.push(
                        Diagnostic::error(format!("Missing required block '{}'", path))
                            .with_detail("At least one block is required")
                            .with_attribute(path),
                    );
                }
            },
            // A single block may also arrive as a one-element list.
            Some(Value::Array(items)) => {
                if items.len() > 1 {
                    self.push(
                        Diagnostic::error(format!("Block '{}' allows at most 1 item(s), got {}", path, items.len()))
                            .with_attribute(path),
                    );
                } else if items.is_empty() && nested.min_items > 0 {
                    self.push(
                        Diagnostic::error(format!("Missing required block '{}'", path))
                            .with_detail("At least one block is required")
                            .with_attribute(path),
                    );
                }
                if let Some(item) = items.first() {
                    self.block(&nested.block, item, path);
                }
            },
            Some(v) => self.block(&nested.block, v, path),
        }
    }

    fn item_count(&mut self, nested: &NestedBlock, len: usize, path: &str) {
        let len = len as u32;
        if len < nested.min_items {
            self.push(
                Diagnostic::error(format!(
                    "Block '{}' requires at least {} item(s), got {}",
                    path, nested.min_items, len
                ))
                .with_attribute(path),
            );
        }
        if nested.max_items > 0 && len > nested.max_items {
            self.push(
                Diagnostic::error(format!(
                    "Block '{}' allows at most {} item(s), got {}",
                    path, nested.max_items, len
                ))
                .with_attribute(path),
            );
        }
    }

    fn list_block(&mut self, nested: &NestedBlock, value: Option<&Value>, path: &str) {
        match value {
            None | Some(Value::Null) => self.item_count(nested, 0, path),
            Some(Value::Array(items)) => {
                self.item_count(nested, items.len(), path);
                for (i, item) in items.iter().enumerate() {
                    self.block(&nested.block, item, &format!("{}.{}", path, i));
                }
            },
            Some(v) => self.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            ),
        }
    }

    fn map_block(&mut self, nested: &NestedBlock, value: Option<&Value>, path: &str) {
        match value {
            None | Some(Value::Null) => self.item_count(nested, 0, path),
            Some(Value::Object(obj)) => {
                self.item_count(nested, obj.len(), path);
                for (key, item) in obj {
                    self.block(&nested.block, item, &format!("{}.{}", path, key));
                }
            },
            Some(v) => self.push(
                Diagnostic::error(format!("Expected map for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            ),
        }
    }
}

fn is_set(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64()
                || n.as_f64().is_some_and(|f| {
                    f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
                })
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block, NestedBlock, Schema};
    use serde_json::json;

    #[test]
    fn test_required_string() {
        let schema = Schema::resource(0).with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "pg-prod"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_computed_id_is_skipped() {
        let schema = Schema::resource(0);
        assert!(validate(&schema, &json!({"id": 42})).is_empty());
    }

    #[test]
    fn test_allowed_values() {
        let schema = Schema::resource(0).with_attribute(
            "auth_type",
            Attribute::optional_string().with_allowed_values(&["ACCESS_TOKEN", "AWS_IAM"]),
        );

        assert!(validate(&schema, &json!({"auth_type": "AWS_IAM"})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());

        let diagnostics = validate(&schema, &json!({"auth_type": "PASSWORD"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].detail.as_ref().unwrap().contains("ACCESS_TOKEN"));
    }

    #[test]
    fn test_conflicting_attributes_reported_once() {
        let schema = Schema::resource(0)
            .with_attribute(
                "idp_metadata_url",
                Attribute::optional_string().with_conflicts_with(&["idp_metadata_xml"]),
            )
            .with_attribute(
                "idp_metadata_xml",
                Attribute::optional_string().with_conflicts_with(&["idp_metadata_url"]),
            );

        let diagnostics = validate(
            &schema,
            &json!({"idp_metadata_url": "https://idp", "idp_metadata_xml": "<xml/>"}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Conflicting"));

        assert!(validate(&schema, &json!({"idp_metadata_url": "https://idp"})).is_empty());
    }

    #[test]
    fn test_exactly_one_of_nested_blocks() {
        let scheme = Block::new()
            .with_block(
                "aws_iam",
                NestedBlock::single(Block::new().with_attribute("role_arn", Attribute::required_string())),
            )
            .with_block(
                "cyral_storage",
                NestedBlock::single(
                    Block::new().with_attribute("password", Attribute::required_string().sensitive()),
                ),
            )
            .with_exactly_one_of(&["aws_iam", "cyral_storage"]);
        let schema = Schema::resource(0).with_block("auth_scheme", NestedBlock::single(scheme).required());

        let ok = json!({"auth_scheme": {"aws_iam": {"role_arn": "arn:aws:iam::1:role/x"}}});
        assert!(validate(&schema, &ok).is_empty());

        let none = json!({"auth_scheme": {}});
        let diagnostics = validate(&schema, &none);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.starts_with("Exactly one of"));
        assert_eq!(diagnostics[0].attribute, Some("auth_scheme".to_string()));

        let both = json!({"auth_scheme": {
            "aws_iam": {"role_arn": "arn"},
            "cyral_storage": {"password": "secret"}
        }});
        assert_eq!(validate(&schema, &both).len(), 1);

        let missing = validate(&schema, &json!({}));
        assert_eq!(missing.len(), 1);
        assert!(missing[0].summary.contains("Missing required block"));
    }

    #[test]
    fn test_list_block_item_constraints() {
        let schema = Schema::resource(0).with_block(
            "repo_node",
            NestedBlock::list(Block::new().with_attribute("port", Attribute::optional_int64()))
                .required(),
        );

        let diagnostics = validate(&schema, &json!({"repo_node": []}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));

        let diagnostics = validate(&schema, &json!({"repo_node": [{"port": "5432"}]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("repo_node.0.port".to_string()));

        assert!(validate(&schema, &json!({"repo_node": [{"port": 5432}]})).is_empty());
    }

    #[test]
    fn test_single_block_as_one_element_list() {
        let schema = Schema::resource(0).with_block(
            "network_address",
            NestedBlock::single(Block::new().with_attribute("port", Attribute::required_int64()))
                .required(),
        );

        assert!(validate(&schema, &json!({"network_address": [{"port": 3306}]})).is_empty());
        let diagnostics = validate(&schema, &json!({"network_address": [{"port": 1}, {"port": 2}]}));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_set_of_strings_element_types() {
        let schema = Schema::resource(0).with_attribute("log_groups", Attribute::optional_string_set());

        assert!(validate(&schema, &json!({"log_groups": ["a", "b"]})).is_empty());
        let diagnostics = validate(&schema, &json!({"log_groups": ["a", 2]}));
        assert_eq!(diagnostics[0].attribute, Some("log_groups.1".to_string()));
        assert!(!is_valid(&schema, &json!({"log_groups": "a"})));
    }

    #[test]
    fn test_validate_result() {
        let schema = Schema::resource(0).with_attribute("name", Attribute::required_string());
        assert!(validate_result(&schema, &json!({"name": "x"})).is_ok());
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
    }
}
