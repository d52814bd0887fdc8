//! Result types returned by the provider lifecycle calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A change to a single top-level attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Attribute name.
    pub path: String,
    /// The value before the change (`None` when the attribute is new).
    pub before: Option<Value>,
    /// The value after the change (`None` when the attribute goes away).
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Attribute that had no prior value.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Attribute whose value disappears.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Attribute whose value changed.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// The result of a plan call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State expected after apply. `null` for a deletion plan.
    pub planned_state: Value,
    /// Top-level attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether applying the plan destroys and recreates the resource.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Plan result with no changes.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Plan result with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether the plan changes anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// A resource brought under management by an import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// State as read back from the control plane.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Names of everything the provider serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names, sorted.
    pub resources: Vec<String>,
    /// Data source type names, sorted.
    pub data_sources: Vec<String>,
    /// Capability flags.
    pub capabilities: ServerCapabilities,
}

/// Capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether `plan` accepts a `null` proposed state.
    pub plan_destroy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("name", json!("pg"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("pg")));

        let removed = AttributeChange::removed("labels", json!(["prod"]));
        assert_eq!(removed.before, Some(json!(["prod"])));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("enabled", json!(true), json!(false));
        assert_eq!(modified.before, Some(json!(true)));
        assert_eq!(modified.after, Some(json!(false)));
    }

    #[test]
    fn test_plan_result() {
        let no_change = PlanResult::no_change(json!({"id": "repo-1"}));
        assert!(!no_change.has_changes());
        assert!(!no_change.requires_replace);

        let replace = PlanResult::with_changes(
            json!({"id": null, "repository_id": "repo-2"}),
            vec![AttributeChange::modified(
                "repository_id",
                json!("repo-1"),
                json!("repo-2"),
            )],
            true,
        );
        assert!(replace.has_changes());
        assert!(replace.requires_replace);
    }

    #[test]
    fn test_imported_resource_serializes() {
        let imported = ImportedResource::new("cyral_policy_rule", json!({"id": "p1/r1"}));
        let encoded = serde_json::to_value(&imported).unwrap();
        assert_eq!(encoded["resource_type"], "cyral_policy_rule");
        assert_eq!(encoded["state"]["id"], "p1/r1");
    }
}
