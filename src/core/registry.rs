//! Resource and data source definitions and the registry that holds them.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use super::operation::OperationSequence;
use crate::error::ProviderError;
use crate::ids::{unmarshal_named_id, ID_SEPARATOR};
use crate::schema::{ProviderSchema, Schema};
use crate::state::ResourceData;

/// Turns an import ID into the data the read step starts from.
pub type Importer = Box<dyn Fn(&str) -> Result<ResourceData, ProviderError> + Send + Sync>;

type UpgradeFn = Box<dyn Fn(Value) -> Result<Value, ProviderError> + Send + Sync>;

/// Upgrades stored state written under schema `version` to `version + 1`.
pub struct StateUpgrader {
    /// Schema version of the state this upgrader accepts.
    pub version: u64,
    upgrade: UpgradeFn,
}

impl StateUpgrader {
    /// Create an upgrader for state at `version`.
    pub fn new<F>(version: u64, upgrade: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ProviderError> + Send + Sync + 'static,
    {
        Self {
            version,
            upgrade: Box::new(upgrade),
        }
    }

    /// Apply the upgrade.
    pub fn upgrade(&self, state: Value) -> Result<Value, ProviderError> {
        (self.upgrade)(state)
    }
}

impl fmt::Debug for StateUpgrader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateUpgrader")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Importer that uses the import ID as the resource ID.
pub fn passthrough_importer() -> Importer {
    Box::new(|id| {
        let mut data = ResourceData::new();
        data.set_id(id);
        Ok(data)
    })
}

/// Importer for composed IDs. Each part of the ID seeds the attribute of the
/// same position in `fields`.
pub fn composed_id_importer(fields: &'static [&'static str]) -> Importer {
    Box::new(move |id| {
        let parts = unmarshal_named_id(id, ID_SEPARATOR, fields)?;
        let mut data = ResourceData::new();
        for (field, part) in fields.iter().zip(parts) {
            data.set(*field, part);
        }
        data.set_id(id);
        Ok(data)
    })
}

/// A managed resource type.
pub struct ResourceDefinition {
    /// Resource type name, e.g. `cyral_repository`.
    pub name: String,
    /// Resource schema.
    pub schema: Schema,
    /// Create lifecycle.
    pub create: OperationSequence,
    /// Read lifecycle.
    pub read: OperationSequence,
    /// Update lifecycle. `None` means every change forces replacement.
    pub update: Option<OperationSequence>,
    /// Delete lifecycle.
    pub delete: OperationSequence,
    importer: Option<Importer>,
    state_upgraders: Vec<StateUpgrader>,
}

impl fmt::Debug for ResourceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDefinition")
            .field("name", &self.name)
            .field("version", &self.schema.version)
            .field("updatable", &self.update.is_some())
            .field("importable", &self.importer.is_some())
            .field("state_upgraders", &self.state_upgraders)
            .finish()
    }
}

impl ResourceDefinition {
    /// A resource with create, read and delete. Add update with
    /// [`with_update`](Self::with_update).
    pub fn new(
        name: impl Into<String>,
        schema: Schema,
        create: OperationSequence,
        read: OperationSequence,
        delete: OperationSequence,
    ) -> Self {
        Self {
            name: name.into(),
            schema,
            create,
            read,
            update: None,
            delete,
            importer: None,
            state_upgraders: Vec::new(),
        }
    }

    /// Add the update lifecycle.
    pub fn with_update(mut self, update: OperationSequence) -> Self {
        self.update = Some(update);
        self
    }

    /// Make the resource importable.
    pub fn with_importer(mut self, importer: Importer) -> Self {
        self.importer = Some(importer);
        self
    }

    /// Register a state upgrader.
    pub fn with_state_upgrader(mut self, upgrader: StateUpgrader) -> Self {
        self.state_upgraders.push(upgrader);
        self.state_upgraders.sort_by_key(|u| u.version);
        self
    }

    /// Whether a change to `name` requires replacing the resource.
    pub fn requires_replace(&self, name: &str) -> bool {
        if name == "id" {
            return false;
        }
        self.update.is_none() || self.schema.block.is_force_new(name)
    }

    /// Seed data for importing `id`.
    pub fn import(&self, id: &str) -> Result<ResourceData, ProviderError> {
        match &self.importer {
            Some(importer) => importer(id),
            None => Err(ProviderError::Unimplemented(format!(
                "import is not supported for {}",
                self.name
            ))),
        }
    }

    /// Upgrade state written under `from_version` to the current schema
    /// version. Upgraders run in ascending version order.
    pub fn upgrade_state(&self, from_version: u64, state: Value) -> Result<Value, ProviderError> {
        if from_version > self.schema.version {
            return Err(ProviderError::Validation(format!(
                "state version {} of {} is newer than schema version {}",
                from_version, self.name, self.schema.version
            )));
        }
        self.state_upgraders
            .iter()
            .filter(|u| u.version >= from_version && u.version < self.schema.version)
            .try_fold(state, |state, upgrader| upgrader.upgrade(state))
    }
}

/// A read-only data source type.
pub struct DataSourceDefinition {
    /// Data source type name.
    pub name: String,
    /// Data source schema.
    pub schema: Schema,
    /// Read lifecycle.
    pub read: OperationSequence,
}

impl fmt::Debug for DataSourceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl DataSourceDefinition {
    /// Create a data source definition.
    pub fn new(name: impl Into<String>, schema: Schema, read: OperationSequence) -> Self {
        Self {
            name: name.into(),
            schema,
            read,
        }
    }
}

/// Every resource and data source the provider serves.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    resources: HashMap<String, ResourceDefinition>,
    data_sources: HashMap<String, DataSourceDefinition>,
}

impl ProviderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource type. Names must be unique.
    pub fn register_resource(&mut self, definition: ResourceDefinition) -> Result<(), ProviderError> {
        if self.resources.contains_key(&definition.name) {
            return Err(ProviderError::Configuration(format!(
                "resource {} registered twice",
                definition.name
            )));
        }
        self.resources.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Add a data source type. Names must be unique.
    pub fn register_data_source(
        &mut self,
        definition: DataSourceDefinition,
    ) -> Result<(), ProviderError> {
        if self.data_sources.contains_key(&definition.name) {
            return Err(ProviderError::Configuration(format!(
                "data source {} registered twice",
                definition.name
            )));
        }
        self.data_sources.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Look up a resource type.
    pub fn resource(&self, name: &str) -> Result<&ResourceDefinition, ProviderError> {
        self.resources
            .get(name)
            .ok_or_else(|| ProviderError::UnknownResource(name.to_string()))
    }

    /// Look up a data source type.
    pub fn data_source(&self, name: &str) -> Result<&DataSourceDefinition, ProviderError> {
        self.data_sources
            .get(name)
            .ok_or_else(|| ProviderError::UnknownResource(name.to_string()))
    }

    /// Resource type names, sorted.
    pub fn resource_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.keys().cloned().collect();
        names.sort();
        names
    }

    /// Data source type names, sorted.
    pub fn data_source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.data_sources.keys().cloned().collect();
        names.sort();
        names
    }

    /// Combined schema with the given provider block schema.
    pub fn provider_schema(&self, provider: Schema) -> ProviderSchema {
        let schema = self
            .resources
            .values()
            .fold(ProviderSchema::new().with_provider_config(provider), |s, r| {
                s.with_resource(r.name.clone(), r.schema.clone())
            });
        self.data_sources.values().fold(schema, |s, d| {
            s.with_data_source(d.name.clone(), d.schema.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    fn definition(name: &str, version: u64) -> ResourceDefinition {
        ResourceDefinition::new(
            name,
            Schema::resource(version)
                .with_attribute("policy_id", Attribute::required_string().with_force_new())
                .with_attribute("name", Attribute::optional_string()),
            OperationSequence::default(),
            OperationSequence::default(),
            OperationSequence::default(),
        )
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ProviderRegistry::new();
        registry.register_resource(definition("cyral_x", 0)).unwrap();
        let err = registry.register_resource(definition("cyral_x", 0)).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_unknown_lookup() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.resource("cyral_missing").unwrap_err(),
            ProviderError::UnknownResource(_)
        ));
        assert!(registry.data_source("cyral_missing").is_err());
    }

    #[test]
    fn test_requires_replace() {
        let without_update = definition("cyral_x", 0);
        assert!(without_update.requires_replace("name"));
        assert!(!without_update.requires_replace("id"));

        let with_update = definition("cyral_x", 0).with_update(OperationSequence::default());
        assert!(with_update.requires_replace("policy_id"));
        assert!(!with_update.requires_replace("name"));
    }

    #[test]
    fn test_composed_id_importer() {
        let importer = composed_id_importer(&["policy_id", "policy_rule_id"]);
        let data = importer("p1/r1").unwrap();
        assert_eq!(data.id(), Some("p1/r1"));
        assert_eq!(data.get_str("policy_id"), Some("p1"));
        assert_eq!(data.get_str("policy_rule_id"), Some("r1"));

        let err = importer("r1").unwrap_err();
        assert!(err.to_string().contains("{policy_id}/{policy_rule_id}"));
    }

    #[test]
    fn test_import_without_importer() {
        assert!(matches!(
            definition("cyral_x", 0).import("x").unwrap_err(),
            ProviderError::Unimplemented(_)
        ));
        let data = definition("cyral_x", 0)
            .with_importer(passthrough_importer())
            .import("abc")
            .unwrap();
        assert_eq!(data.id(), Some("abc"));
    }

    #[test]
    fn test_upgraders_run_in_order_from_version() {
        let def = definition("cyral_x", 2)
            .with_state_upgrader(StateUpgrader::new(1, |mut s| {
                s["trail"] = json!(format!("{}1", s["trail"].as_str().unwrap_or_default()));
                Ok(s)
            }))
            .with_state_upgrader(StateUpgrader::new(0, |mut s| {
                s["trail"] = json!("0");
                Ok(s)
            }));

        assert_eq!(def.upgrade_state(0, json!({})).unwrap()["trail"], "01");
        assert_eq!(def.upgrade_state(1, json!({"trail": "x"})).unwrap()["trail"], "x1");
        assert_eq!(def.upgrade_state(2, json!({"trail": "x"})).unwrap()["trail"], "x");
        assert!(def.upgrade_state(3, json!({})).is_err());
    }

    #[test]
    fn test_provider_schema_collects_everything() {
        let mut registry = ProviderRegistry::new();
        registry.register_resource(definition("cyral_b", 0)).unwrap();
        registry.register_resource(definition("cyral_a", 0)).unwrap();
        registry
            .register_data_source(DataSourceDefinition::new(
                "cyral_d",
                Schema::v0(),
                OperationSequence::default(),
            ))
            .unwrap();

        assert_eq!(registry.resource_names(), vec!["cyral_a", "cyral_b"]);
        let schema = registry.provider_schema(Schema::v0());
        assert_eq!(schema.resources.len(), 2);
        assert!(schema.data_sources.contains_key("cyral_d"));
    }
}
