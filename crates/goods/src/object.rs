//! Physical object ("goods") records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wareflow_core::{ObjectId, PropertyBag, TypeCode};

/// A physical object tracked by the warehouse.
///
/// The quantity field supports fungible multi-unit goods: a single record may
/// stand for several identical physical units.
///
/// The property bag is shared by reference: cloning an object clones the
/// `Arc`, not the bag. Only the operation currently owning the object amends
/// its properties (via [`PhysObj::update_properties`], which unshares first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysObj {
    pub id: ObjectId,
    pub type_code: TypeCode,
    pub properties: Option<Arc<PropertyBag>>,
    pub quantity: i64,
}

impl PhysObj {
    pub fn new(type_code: TypeCode, quantity: i64) -> Self {
        Self {
            id: ObjectId::new(),
            type_code,
            properties: None,
            quantity,
        }
    }

    pub fn with_properties(mut self, properties: PropertyBag) -> Self {
        self.properties = Some(Arc::new(properties));
        self
    }

    pub fn has_type(&self, code: &TypeCode) -> bool {
        &self.type_code == code
    }

    pub fn get_property(&self, name: &str) -> Option<&Value> {
        self.properties.as_deref()?.get(name)
    }

    /// True iff every named property is present. An empty requirement is
    /// satisfied even by an object with no bag at all.
    pub fn has_properties<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> bool {
        let mut names = names.into_iter().peekable();
        if names.peek().is_none() {
            return true;
        }
        match self.properties.as_deref() {
            Some(bag) => bag.has_all(names),
            None => false,
        }
    }

    /// True iff every expected key is present with exactly the expected value.
    pub fn has_property_values(
        &self,
        expected: &std::collections::BTreeMap<String, Value>,
    ) -> bool {
        if expected.is_empty() {
            return true;
        }
        match self.properties.as_deref() {
            Some(bag) => bag.has_values(expected),
            None => false,
        }
    }

    /// Apply property updates, materializing a bag if needed and unsharing
    /// it if currently referenced by another object.
    pub fn update_properties(&mut self, entries: impl IntoIterator<Item = (String, Value)>) {
        let mut entries = entries.into_iter().peekable();
        if entries.peek().is_none() {
            return;
        }
        let bag = self
            .properties
            .get_or_insert_with(|| Arc::new(PropertyBag::new()));
        Arc::make_mut(bag).merge(entries);
    }

    /// Share another object's bag by reference (clone semantics).
    pub fn clone_properties_from(&mut self, other: &PhysObj) {
        self.properties = other.properties.clone();
    }
}
