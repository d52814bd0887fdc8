//! The Cyral provider.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::client::Client;
use crate::config::ProviderConfig;
use crate::core::{ProviderRegistry, ResourceDefinition};
use crate::error::ProviderError;
use crate::resources;
use crate::schema::{Block, Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::state::ResourceData;
use crate::types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
use crate::validation;

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// [`ProviderService`] backed by the Cyral control-plane API.
pub struct CyralProvider {
    registry: ProviderRegistry,
    client: RwLock<Option<Arc<Client>>>,
    env: EnvLookup,
}

impl std::fmt::Debug for CyralProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CyralProvider")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl CyralProvider {
    /// Provider serving every Cyral resource and data source.
    pub fn new() -> Result<Self, ProviderError> {
        Ok(Self::with_registry(resources::registry()?))
    }

    /// Provider serving the given registry.
    pub fn with_registry(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            client: RwLock::new(None),
            env: Arc::new(|key| std::env::var(key).ok()),
        }
    }

    /// Replace the environment lookup used for configuration fallbacks.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    /// The registry this provider serves.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Whether `configure` has succeeded.
    pub async fn is_configured(&self) -> bool {
        self.client.read().await.is_some()
    }

    async fn client(&self) -> Result<Arc<Client>, ProviderError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| ProviderError::Configuration("provider not configured".to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderService for CyralProvider {
    fn schema(&self) -> ProviderSchema {
        self.registry.provider_schema(ProviderConfig::schema())
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.registry.resource_names(),
            data_sources: self.registry.data_source_names(),
            capabilities: crate::types::ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validation::validate(&ProviderConfig::schema(), &config))
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let env = Arc::clone(&self.env);
        let resolved = ProviderConfig::from_value(&config)?
            .with_env_from(move |key| (*env)(key))
            .resolve();

        let client_config = match resolved {
            Ok(c) => c,
            Err(err) => return Ok(vec![Diagnostic::from(&err)]),
        };

        let client = Client::new(&client_config)?;
        info!(control_plane = %client.control_plane(), "Provider configured");
        *self.client.write().await = Some(Arc::new(client));
        Ok(vec![])
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        *self.client.write().await = None;
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let definition = self.registry.resource(resource_type)?;
        Ok(validation::validate(&definition.schema, &config))
    }

    #[instrument(skip(self, state), fields(resource_type = %resource_type))]
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let definition = self.registry.resource(resource_type)?;
        let version = u64::try_from(version).map_err(|_| {
            ProviderError::Validation(format!("invalid state version {}", version))
        })?;
        definition.upgrade_state(version, state)
    }

    #[instrument(skip(self, prior_state, proposed_state, _config), fields(resource_type = %resource_type))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let definition = self.registry.resource(resource_type)?;
        plan_resource(definition, prior_state, proposed_state)
    }

    #[instrument(skip(self, planned_state), fields(resource_type = %resource_type))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let definition = self.registry.resource(resource_type)?;
        let client = self.client().await?;

        let mut data = ResourceData::from_state(planned_state)?;
        data.clear_id();
        definition.create.try_run(&mut data, &client).await?;

        if data.id().is_none() {
            return Err(ProviderError::NotFound(format!(
                "{} could not be read back after create",
                resource_type
            )));
        }
        info!(id = data.id().unwrap_or_default(), "Resource created");
        Ok(data.into_state())
    }

    #[instrument(skip(self, current_state), fields(resource_type = %resource_type))]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let definition = self.registry.resource(resource_type)?;
        let client = self.client().await?;

        let mut data = ResourceData::from_state(current_state)?;
        definition.read.try_run(&mut data, &client).await?;
        if data.id().is_none() {
            debug!("Resource is gone");
        }
        Ok(data.into_state())
    }

    #[instrument(skip(self, prior_state, planned_state), fields(resource_type = %resource_type))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let definition = self.registry.resource(resource_type)?;
        let update = definition.update.as_ref().ok_or_else(|| {
            ProviderError::Unimplemented(format!("{} does not support in-place update", resource_type))
        })?;
        let client = self.client().await?;

        let prior = ResourceData::from_state(prior_state)?;
        let mut data = ResourceData::from_state(planned_state)?;
        if data.id().is_none() {
            data.set_id(prior.require_id()?);
        }
        update.try_run(&mut data, &client).await?;
        Ok(data.into_state())
    }

    #[instrument(skip(self, current_state), fields(resource_type = %resource_type))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let definition = self.registry.resource(resource_type)?;
        let client = self.client().await?;

        let mut data = ResourceData::from_state(current_state)?;
        definition.delete.try_run(&mut data, &client).await
    }

    #[instrument(skip(self), fields(resource_type = %resource_type))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let definition = self.registry.resource(resource_type)?;
        let client = self.client().await?;

        let mut data = definition.import(id)?;
        definition.read.try_run(&mut data, &client).await?;
        if data.id().is_none() {
            return Err(ProviderError::NotFound(format!("{} {}", resource_type, id)));
        }
        Ok(vec![ImportedResource::new(resource_type, data.into_state())])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let definition = self.registry.data_source(data_source_type)?;
        Ok(validation::validate(&definition.schema, &config))
    }

    #[instrument(skip(self, config), fields(data_source_type = %data_source_type))]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let definition = self.registry.data_source(data_source_type)?;
        let client = self.client().await?;

        let mut data = ResourceData::from_state(config)?;
        definition.read.try_run(&mut data, &client).await?;
        Ok(data.into_state())
    }
}

/// Compute the planned state of `definition` from prior and proposed state.
///
/// Absent optional attributes get their schema default at every depth.
/// Computed values and the ID carry over from prior state. Each top-level
/// attribute whose value differs beyond unset-equivalence is reported. A `null` proposal plans the deletion.
pub fn plan_resource(
    definition: &ResourceDefinition,
    prior_state: Option<Value>,
    proposed_state: Value,
) -> Result<PlanResult, ProviderError> {
    let prior = match prior_state {
        Some(Value::Object(map)) => Some(map),
        Some(Value::Null) | None => None,
        Some(other) => {
            return Err(ProviderError::Validation(format!(
                "expected prior state to be an object, got {}",
                other
            )))
        },
    };

    let mut planned = match proposed_state {
        Value::Null => return Ok(plan_deletion(prior)),
        Value::Object(map) => map,
        other => {
            return Err(ProviderError::Validation(format!(
                "expected proposed state to be an object, got {}",
                other
            )))
        },
    };

    let block = &definition.schema.block;
    apply_defaults(block, &mut planned);

    let Some(prior) = prior else {
        planned.insert("id".to_string(), Value::Null);
        let changes = planned
            .iter()
            .filter(|(k, v)| k.as_str() != "id" && !v.is_null())
            .map(|(k, v)| AttributeChange::added(k.clone(), v.clone()))
            .collect();
        return Ok(PlanResult::with_changes(Value::Object(planned), changes, false));
    };

    for (name, attr) in &block.attributes {
        if attr.flags.computed && is_unset(planned.get(name)) {
            if let Some(value) = prior.get(name).filter(|v| !v.is_null()) {
                planned.insert(name.clone(), value.clone());
            }
        }
    }
    if let Some(id) = prior.get("id") {
        planned.insert("id".to_string(), id.clone());
    }

    let mut defaulted_prior = prior.clone();
    apply_defaults(block, &mut defaulted_prior);

    let keys: BTreeSet<&String> = planned.keys().chain(prior.keys()).collect();
    let mut changes = Vec::new();
    let mut requires_replace = false;
    for key in keys {
        if key == "id" {
            continue;
        }
        let before = defaulted_prior.get(key).unwrap_or(&NULL);
        let after = planned.get(key).unwrap_or(&NULL);
        if equivalent(before, after) {
            continue;
        }
        requires_replace |= definition.requires_replace(key);
        changes.push(AttributeChange::new(
            key.clone(),
            prior.get(key).filter(|v| !v.is_null()).cloned(),
            planned.get(key).filter(|v| !v.is_null()).cloned(),
        ));
    }

    if requires_replace {
        for (name, attr) in &block.attributes {
            if attr.flags.is_computed_only() {
                planned.insert(name.clone(), Value::Null);
            }
        }
        planned.insert("id".to_string(), Value::Null);
    }

    Ok(PlanResult::with_changes(
        Value::Object(planned),
        changes,
        requires_replace,
    ))
}

fn plan_deletion(prior: Option<Map<String, Value>>) -> PlanResult {
    let changes = prior
        .into_iter()
        .flatten()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| AttributeChange::removed(k, v))
        .collect();
    PlanResult::with_changes(Value::Null, changes, false)
}

static NULL: Value = Value::Null;

fn is_unset(value: Option<&Value>) -> bool {
    value.map_or(true, Value::is_null)
}

/// Fill unset attributes with their schema default, descending into every
/// nested block. A single block may be stored as an object or a list of one.
fn apply_defaults(block: &Block, values: &mut Map<String, Value>) {
    for (name, attr) in &block.attributes {
        if is_unset(values.get(name)) {
            if let Some(default) = &attr.default {
                values.insert(name.clone(), default.clone());
            }
        }
    }
    for (name, nested) in &block.blocks {
        match values.get_mut(name) {
            Some(Value::Object(inner)) => apply_defaults(&nested.block, inner),
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::Object(inner) = item {
                        apply_defaults(&nested.block, inner);
                    }
                }
            },
            _ => {},
        }
    }
}

/// Reads write zero values and empty collections for attributes left out of
/// configuration, so those count as unset.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.values().all(is_empty),
    }
}

/// Deep equality where unset values match one another at every depth.
fn equivalent(a: &Value, b: &Value) -> bool {
    if is_empty(a) && is_empty(b) {
        return true;
    }
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => x.keys().chain(y.keys()).all(|k| {
            equivalent(x.get(k).unwrap_or(&NULL), y.get(k).unwrap_or(&NULL))
        }),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| equivalent(p, q))
        },
        (Value::Array(x), Value::Object(_)) if x.len() == 1 => equivalent(&x[0], b),
        (Value::Object(_), Value::Array(y)) if y.len() == 1 => equivalent(a, &y[0]),
        _ => a == b,
    }
}
