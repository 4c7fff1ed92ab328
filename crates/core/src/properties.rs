//! Key/value properties attached to physical objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Property under which an assembly outcome describes its own composition.
///
/// Unpack reads the same key back, both as the contents descriptor written
/// by an assembly and as an instance-level outcome override.
pub const CONTENTS_PROPERTY: &str = "unpack_outcomes";

/// Flexible key/value store carried by a physical object.
///
/// Bags are immutable by convention: operations share them by reference
/// (`Arc<PropertyBag>`) and only the operation that currently owns an object
/// replaces or amends its bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag(BTreeMap<String, Value>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// True iff every named property is present, whatever its value.
    pub fn has_all<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> bool {
        names.into_iter().all(|n| self.0.contains_key(n))
    }

    /// True iff every expected key is present with exactly the expected value.
    pub fn has_values(&self, expected: &BTreeMap<String, Value>) -> bool {
        expected.iter().all(|(k, v)| self.0.get(k) == Some(v))
    }

    /// Bulk merge: incoming entries overwrite existing ones.
    pub fn merge(&mut self, entries: impl IntoIterator<Item = (String, Value)>) {
        self.0.extend(entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(String, Value)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Value>> for PropertyBag {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag() -> PropertyBag {
        let mut b = PropertyBag::new();
        b.set("colour", "red");
        b.set("weight", 12);
        b
    }

    #[test]
    fn has_all_requires_every_name() {
        let b = bag();
        assert!(b.has_all(["colour"]));
        assert!(b.has_all(["colour", "weight"]));
        assert!(!b.has_all(["colour", "origin"]));
        // Vacuously true on the empty requirement.
        assert!(PropertyBag::new().has_all([]));
    }

    #[test]
    fn has_values_checks_equality_not_presence() {
        let b = bag();
        let mut expected = BTreeMap::new();
        expected.insert("colour".to_owned(), json!("red"));
        assert!(b.has_values(&expected));
        expected.insert("weight".to_owned(), json!(13));
        assert!(!b.has_values(&expected));
    }

    #[test]
    fn merge_overwrites_existing_entries() {
        let mut b = bag();
        b.merge([("colour".to_owned(), json!("blue")), ("origin".to_owned(), json!("FR"))]);
        assert_eq!(b.get("colour"), Some(&json!("blue")));
        assert_eq!(b.get("origin"), Some(&json!("FR")));
        assert_eq!(b.len(), 3);
    }
}
