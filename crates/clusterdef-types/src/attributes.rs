//! Attribute store with set-if-present semantics
//!
//! Every cluster, facet and server owns one store. A child layer inherits
//! from its parent with [`AttributeStore::reverse_merge`], which only fills
//! keys the child has not set itself.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Insertion-ordered settings keyed by attribute name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeStore {
    values: Map<String, Value>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a map; null entries are dropped like any other null set.
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut store = Self::new();
        store.merge_overrides(&map);
        store
    }

    /// Store `value` under `key` unless it is null.
    ///
    /// Returns whatever is stored under `key` afterwards, so a null value
    /// reads back the previous setting.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<&Value> {
        let key = key.into();
        let value = value.into();
        if !value.is_null() {
            self.values.insert(key.clone(), value);
        }
        self.values.get(&key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.values.get(key).and_then(Value::as_u64)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Fill keys missing here from `parent`; keys already present win.
    pub fn reverse_merge(&mut self, parent: &AttributeStore) {
        for (key, value) in &parent.values {
            if !self.values.contains_key(key) {
                self.values.insert(key.clone(), value.clone());
            }
        }
    }

    /// Shallow merge where `overrides` win. Null overrides are skipped.
    pub fn merge_overrides(&mut self, overrides: &Map<String, Value>) {
        for (key, value) in overrides {
            self.set(key.clone(), value.clone());
        }
    }

    /// Apply `overrides`, then run `block` against the same store.
    pub fn configure<F, E>(&mut self, overrides: &Map<String, Value>, block: F) -> Result<&mut Self, E>
    where
        F: FnOnce(&mut Self) -> Result<(), E>,
    {
        self.merge_overrides(overrides);
        block(self)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.values.clone()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}

impl From<Map<String, Value>> for AttributeStore {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}
