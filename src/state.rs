//! Schema-backed declarative state.
//!
//! [`ResourceData`] holds the configuration or state of one resource instance
//! as seen by the dispatcher: a resource ID slot plus a JSON object keyed by
//! snake_case attribute names. Single nested blocks are stored as objects,
//! repeated blocks as arrays of objects.

use serde_json::{Map, Value};

use crate::error::ProviderError;

/// State of a single resource or data source instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceData {
    id: Option<String>,
    values: Map<String, Value>,
}

impl ResourceData {
    /// Empty data with no ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a state or configuration object. The `id` key, if present,
    /// moves into the ID slot.
    pub fn from_state(state: Value) -> Result<Self, ProviderError> {
        let mut values = match state {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ProviderError::Validation(format!(
                    "expected state to be an object, got {}",
                    other
                )))
            },
        };

        let id = match values.remove("id") {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        };

        Ok(Self { id, values })
    }

    /// Convert back to a state object. A cleared ID is written as `null`.
    pub fn into_state(self) -> Value {
        let mut values = self.values;
        values.insert(
            "id".to_string(),
            self.id.map(Value::String).unwrap_or(Value::Null),
        );
        Value::Object(values)
    }

    /// The resource ID, if set.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The resource ID, or a validation error when it is unset.
    pub fn require_id(&self) -> Result<&str, ProviderError> {
        self.id()
            .ok_or_else(|| ProviderError::Validation("resource ID is not set".to_string()))
    }

    /// Set the resource ID. An empty string clears it.
    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.id = if id.is_empty() { None } else { Some(id) };
    }

    /// Clear the resource ID, marking the resource as gone.
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    /// Read-only view of the root block.
    pub fn root(&self) -> BlockRef<'_> {
        BlockRef { map: &self.values }
    }

    /// Raw non-null value of an attribute.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root().get(key)
    }

    /// String attribute.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.root().get_str(key)
    }

    /// String attribute, or an empty string.
    pub fn get_string(&self, key: &str) -> String {
        self.root().get_string(key)
    }

    /// String attribute that must be present.
    pub fn require_str(&self, key: &str) -> Result<&str, ProviderError> {
        self.root().require_str(key)
    }

    /// Boolean attribute.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.root().get_bool(key)
    }

    /// Integer attribute.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.root().get_i64(key)
    }

    /// List or set of strings. Missing means empty.
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.root().get_string_list(key)
    }

    /// Single nested block.
    pub fn get_block(&self, key: &str) -> Option<BlockRef<'_>> {
        self.root().get_block(key)
    }

    /// Repeated nested block. Missing means empty.
    pub fn get_block_list(&self, key: &str) -> Vec<BlockRef<'_>> {
        self.root().get_block_list(key)
    }

    /// Set an attribute.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Set an attribute from an optional value, writing `null` for `None`.
    pub fn set_opt<V: Into<Value>>(&mut self, key: impl Into<String>, value: Option<V>) {
        let value = value.map(Into::into).unwrap_or(Value::Null);
        self.values.insert(key.into(), value);
    }

    /// Set an attribute to `null`.
    pub fn set_null(&mut self, key: impl Into<String>) {
        self.values.insert(key.into(), Value::Null);
    }

    /// Remove an attribute.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// All attribute values, excluding the ID.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}

/// Read-only view of a JSON object holding block attributes.
#[derive(Debug, Clone, Copy)]
pub struct BlockRef<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> BlockRef<'a> {
    /// Wrap a JSON object.
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    /// Raw non-null value.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    /// String attribute. Empty strings count as unset.
    pub fn get_str(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// String attribute, or an empty string.
    pub fn get_string(&self, key: &str) -> String {
        self.get_str(key).unwrap_or_default().to_string()
    }

    /// String attribute that must be present.
    pub fn require_str(&self, key: &str) -> Result<&'a str, ProviderError> {
        self.get_str(key)
            .ok_or_else(|| ProviderError::Validation(format!("attribute '{}' is required", key)))
    }

    /// Boolean attribute.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Integer attribute. Integral floats are accepted.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        let value = self.get(key)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
    }

    /// List or set of strings. Non-string elements are skipped.
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Single nested block, stored either as an object or a one-element list.
    pub fn get_block(&self, key: &str) -> Option<BlockRef<'a>> {
        match self.get(key)? {
            Value::Object(map) => Some(BlockRef::new(map)),
            Value::Array(items) => items.first().and_then(Value::as_object).map(BlockRef::new),
            _ => None,
        }
    }

    /// Repeated nested block.
    pub fn get_block_list(&self, key: &str) -> Vec<BlockRef<'a>> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .map(BlockRef::new)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_lifted_from_state() {
        let data = ResourceData::from_state(json!({"id": "repo-1", "name": "pg"})).unwrap();
        assert_eq!(data.id(), Some("repo-1"));
        assert!(data.values().get("id").is_none());

        let state = data.into_state();
        assert_eq!(state["id"], "repo-1");
        assert_eq!(state["name"], "pg");
    }

    #[test]
    fn test_cleared_id_serializes_as_null() {
        let mut data = ResourceData::from_state(json!({"id": "p1/r1"})).unwrap();
        data.clear_id();
        assert!(data.id().is_none());
        assert_eq!(data.into_state()["id"], Value::Null);
    }

    #[test]
    fn test_set_null_keeps_key() {
        let mut data = ResourceData::from_state(json!({"user_endpoint": "edge.local"})).unwrap();
        data.set_null("user_endpoint");
        assert_eq!(data.get("user_endpoint"), Some(&Value::Null));
        assert!(data.get_str("user_endpoint").is_none());
    }

    #[test]
    fn test_empty_id_is_absent() {
        let data = ResourceData::from_state(json!({"id": ""})).unwrap();
        assert!(data.id().is_none());
        assert!(data.require_id().is_err());

        let mut data = ResourceData::new();
        data.set_id("");
        assert!(data.id().is_none());
    }

    #[test]
    fn test_non_object_state_rejected() {
        assert!(ResourceData::from_state(json!([1, 2])).is_err());
        assert!(ResourceData::from_state(Value::Null).is_ok());
    }

    #[test]
    fn test_typed_getters() {
        let data = ResourceData::from_state(json!({
            "name": "pg",
            "empty": "",
            "enabled": true,
            "port": 5432,
            "wait_time": 10.0,
            "labels": ["prod", "eu"],
            "connection_draining": [{"auto": true}],
            "repo_node": [{"host": "a"}, {"host": "b"}],
        }))
        .unwrap();

        assert_eq!(data.get_str("name"), Some("pg"));
        assert_eq!(data.get_str("empty"), None);
        assert_eq!(data.get_string("missing"), "");
        assert!(data.require_str("missing").is_err());
        assert_eq!(data.get_bool("enabled"), Some(true));
        assert_eq!(data.get_i64("port"), Some(5432));
        assert_eq!(data.get_i64("wait_time"), Some(10));
        assert_eq!(data.get_string_list("labels"), vec!["prod", "eu"]);
        assert!(data.get_string_list("missing").is_empty());

        let draining = data.get_block("connection_draining").unwrap();
        assert_eq!(draining.get_bool("auto"), Some(true));

        let hosts: Vec<String> = data
            .get_block_list("repo_node")
            .iter()
            .map(|n| n.get_string("host"))
            .collect();
        assert_eq!(hosts, vec!["a", "b"]);
    }

    #[test]
    fn test_setters() {
        let mut data = ResourceData::new();
        data.set("name", "pg");
        data.set("labels", vec!["a".to_string()]);
        data.set_opt::<String>("description", None);

        assert_eq!(data.get_str("name"), Some("pg"));
        assert!(data.get("description").is_none());
        assert_eq!(data.remove("name"), Some(json!("pg")));
        assert!(data.get("name").is_none());
    }
}
