//! Ordered property hashes
//!
//! [`Properties`] is the shape passed to `create` and stored in
//! [`Value::Map`]. Entries keep insertion order, which is the order `create`
//! applies them in. The owner association lives in a side slot and is never
//! an entry, so it cannot leak onto an instance as data.

use std::fmt;

use indexmap::IndexMap;

use crate::owner::Owner;
use crate::value::Value;

/// Insertion-ordered key/value hash with an owner slot
#[derive(Clone, Default)]
pub struct Properties {
    entries: IndexMap<String, Value>,
    owner: Option<Owner>,
}

impl Properties {
    /// Create an empty hash
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder-style owner attachment
    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Insert or replace an entry; a replaced key keeps its position
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Get an entry
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Remove an entry, preserving the order of the rest
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    /// Check for an entry
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries (the owner slot does not count)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn owner_slot(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    pub(crate) fn set_owner_slot(&mut self, owner: Owner) {
        self.owner = Some(owner);
    }

    /// Shallow merge: entries of `other` replace or extend this hash
    pub fn merged(&self, other: &Properties) -> Properties {
        let mut out = self.clone();
        for (key, value) in other.iter() {
            out.insert(key, value.clone());
        }
        out
    }
}

impl PartialEq for Properties {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl fmt::Debug for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Properties::new();
        for (key, value) in iter {
            props.insert(key, value);
        }
        props
    }
}

impl IntoIterator for Properties {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
