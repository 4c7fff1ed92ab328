//! Contracts of the storage collaborators.

use std::sync::Arc;

use wareflow_core::{AvatarId, LocationId, ObjectId, TypeCode, WmsError};
use wareflow_goods::{Avatar, GoodsType, PhysObj};

/// A location (container) row of the warehouse topology.
///
/// The engine only consumes two topology queries (`is_container` and
/// `common_ancestor`); richer hierarchy/aggregation queries belong to the
/// hosting application.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: LocationId,
    pub label: String,
    pub parent: Option<LocationId>,
    pub container: bool,
}

impl Location {
    pub fn container(label: impl Into<String>, parent: Option<LocationId>) -> Self {
        Self {
            id: LocationId::new(),
            label: label.into(),
            parent,
            container: true,
        }
    }
}

/// Storage error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),
    #[error("avatar not found: {0}")]
    AvatarNotFound(AvatarId),
    #[error("location not found: {0}")]
    LocationNotFound(LocationId),
    #[error("goods type not found: {0}")]
    TypeNotFound(TypeCode),
    /// Internal lock poisoning.
    #[error("store lock poisoned")]
    Poisoned,
}

impl From<StoreError> for WmsError {
    fn from(err: StoreError) -> Self {
        WmsError::store(err.to_string())
    }
}

/// Repository for objects, their placements and locations.
///
/// Methods take `&self`; implementations guard mutation with interior
/// mutability. The enclosing transaction (or the single-threaded test
/// harness) is the sole concurrency guard between engine callers.
pub trait GoodsStore: Send + Sync {
    fn insert_object(&self, object: PhysObj) -> Result<(), StoreError>;
    fn object(&self, id: ObjectId) -> Result<PhysObj, StoreError>;
    fn update_object(&self, object: &PhysObj) -> Result<(), StoreError>;
    fn delete_object(&self, id: ObjectId) -> Result<(), StoreError>;

    fn insert_avatar(&self, avatar: Avatar) -> Result<(), StoreError>;
    fn avatar(&self, id: AvatarId) -> Result<Avatar, StoreError>;
    fn update_avatar(&self, avatar: &Avatar) -> Result<(), StoreError>;
    fn delete_avatar(&self, id: AvatarId) -> Result<(), StoreError>;

    fn insert_location(&self, location: Location) -> Result<(), StoreError>;
    fn location(&self, id: LocationId) -> Result<Location, StoreError>;

    /// Whether `id` names a valid container.
    fn is_container(&self, id: LocationId) -> Result<bool, StoreError>;

    /// Nearest common containing ancestor of two locations, inclusive of the
    /// locations themselves. `None` when the two hierarchies are disjoint.
    fn common_ancestor(
        &self,
        a: LocationId,
        b: LocationId,
    ) -> Result<Option<LocationId>, StoreError>;
}

/// Read-only lookup of goods types and their behaviour configuration.
pub trait TypeRegistry: Send + Sync {
    fn goods_type(&self, code: &TypeCode) -> Result<Arc<GoodsType>, StoreError>;
}

/// Monotonic named counters, used by `sequence`-typed outcome-property
/// expressions.
pub trait SequenceGenerator: Send + Sync {
    fn next_value(&self, name: &str) -> Result<i64, StoreError>;
}
