//! Map values
//!
//! An object keeps flat entries in insertion order (keys are arbitrary
//! values, usually text) and a list of callable signature entries tried in
//! declaration order when the object itself is called.

use crate::{Function, Value};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
    entries: Vec<(Value, Value)>,
    methods: Vec<Function>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a flat entry, replacing the value of an equal key in place
    pub fn insert(&mut self, key: Value, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Append a callable signature entry
    pub fn define(&mut self, method: Function) {
        self.methods.push(method);
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Look up a flat entry by text key
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_text() == Some(name))
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn methods(&self) -> &[Function] {
        &self.methods
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(&key.to_string(), value)?;
        }
        map.end()
    }
}
