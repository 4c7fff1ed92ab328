//! In-memory store for tests/dev.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use wareflow_core::{AvatarId, LocationId, ObjectId, TypeCode};
use wareflow_goods::{Avatar, GoodsType, PhysObj};

use crate::contract::{GoodsStore, Location, SequenceGenerator, StoreError, TypeRegistry};

/// In-memory implementation of every storage collaborator.
///
/// - No IO / no async
/// - `RwLock`-guarded maps per entity kind
/// - Suitable as the single consistent transactional view the engine assumes
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: RwLock<HashMap<ObjectId, PhysObj>>,
    avatars: RwLock<HashMap<AvatarId, Avatar>>,
    locations: RwLock<HashMap<LocationId, Location>>,
    types: RwLock<HashMap<TypeCode, Arc<GoodsType>>>,
    sequences: RwLock<HashMap<String, i64>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a goods type, replacing any previous one with the same code.
    pub fn register_type(&self, goods_type: GoodsType) -> Result<(), StoreError> {
        let mut types = self.types.write().map_err(|_| StoreError::Poisoned)?;
        types.insert(goods_type.code.clone(), Arc::new(goods_type));
        Ok(())
    }

    /// Convenience: insert a container location and return its id.
    pub fn add_container(
        &self,
        label: &str,
        parent: Option<LocationId>,
    ) -> Result<LocationId, StoreError> {
        let location = Location::container(label, parent);
        let id = location.id;
        self.insert_location(location)?;
        Ok(id)
    }

    /// All avatars of an object, unordered.
    pub fn avatars_of_object(&self, object: ObjectId) -> Result<Vec<Avatar>, StoreError> {
        let avatars = self.avatars.read().map_err(|_| StoreError::Poisoned)?;
        Ok(avatars
            .values()
            .filter(|av| av.object == object)
            .cloned()
            .collect())
    }

    fn ancestry(&self, id: LocationId) -> Result<Vec<LocationId>, StoreError> {
        let locations = self.locations.read().map_err(|_| StoreError::Poisoned)?;
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(loc_id) = cursor {
            let loc = locations
                .get(&loc_id)
                .ok_or(StoreError::LocationNotFound(loc_id))?;
            chain.push(loc_id);
            cursor = loc.parent;
        }
        Ok(chain)
    }
}

impl GoodsStore for InMemoryStore {
    fn insert_object(&self, object: PhysObj) -> Result<(), StoreError> {
        let mut objects = self.objects.write().map_err(|_| StoreError::Poisoned)?;
        objects.insert(object.id, object);
        Ok(())
    }

    fn object(&self, id: ObjectId) -> Result<PhysObj, StoreError> {
        let objects = self.objects.read().map_err(|_| StoreError::Poisoned)?;
        objects.get(&id).cloned().ok_or(StoreError::ObjectNotFound(id))
    }

    fn update_object(&self, object: &PhysObj) -> Result<(), StoreError> {
        let mut objects = self.objects.write().map_err(|_| StoreError::Poisoned)?;
        match objects.get_mut(&object.id) {
            Some(existing) => {
                *existing = object.clone();
                Ok(())
            }
            None => Err(StoreError::ObjectNotFound(object.id)),
        }
    }

    fn delete_object(&self, id: ObjectId) -> Result<(), StoreError> {
        let mut objects = self.objects.write().map_err(|_| StoreError::Poisoned)?;
        objects.remove(&id).map(|_| ()).ok_or(StoreError::ObjectNotFound(id))
    }

    fn insert_avatar(&self, avatar: Avatar) -> Result<(), StoreError> {
        let mut avatars = self.avatars.write().map_err(|_| StoreError::Poisoned)?;
        avatars.insert(avatar.id, avatar);
        Ok(())
    }

    fn avatar(&self, id: AvatarId) -> Result<Avatar, StoreError> {
        let avatars = self.avatars.read().map_err(|_| StoreError::Poisoned)?;
        avatars.get(&id).cloned().ok_or(StoreError::AvatarNotFound(id))
    }

    fn update_avatar(&self, avatar: &Avatar) -> Result<(), StoreError> {
        let mut avatars = self.avatars.write().map_err(|_| StoreError::Poisoned)?;
        match avatars.get_mut(&avatar.id) {
            Some(existing) => {
                *existing = avatar.clone();
                Ok(())
            }
            None => Err(StoreError::AvatarNotFound(avatar.id)),
        }
    }

    fn delete_avatar(&self, id: AvatarId) -> Result<(), StoreError> {
        let mut avatars = self.avatars.write().map_err(|_| StoreError::Poisoned)?;
        avatars.remove(&id).map(|_| ()).ok_or(StoreError::AvatarNotFound(id))
    }

    fn insert_location(&self, location: Location) -> Result<(), StoreError> {
        let mut locations = self.locations.write().map_err(|_| StoreError::Poisoned)?;
        locations.insert(location.id, location);
        Ok(())
    }

    fn location(&self, id: LocationId) -> Result<Location, StoreError> {
        let locations = self.locations.read().map_err(|_| StoreError::Poisoned)?;
        locations
            .get(&id)
            .cloned()
            .ok_or(StoreError::LocationNotFound(id))
    }

    fn is_container(&self, id: LocationId) -> Result<bool, StoreError> {
        let locations = self.locations.read().map_err(|_| StoreError::Poisoned)?;
        Ok(locations.get(&id).is_some_and(|loc| loc.container))
    }

    fn common_ancestor(
        &self,
        a: LocationId,
        b: LocationId,
    ) -> Result<Option<LocationId>, StoreError> {
        let seen: HashSet<LocationId> = self.ancestry(a)?.into_iter().collect();
        for candidate in self.ancestry(b)? {
            if seen.contains(&candidate) {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

impl TypeRegistry for InMemoryStore {
    fn goods_type(&self, code: &TypeCode) -> Result<Arc<GoodsType>, StoreError> {
        let types = self.types.read().map_err(|_| StoreError::Poisoned)?;
        types
            .get(code)
            .cloned()
            .ok_or_else(|| StoreError::TypeNotFound(code.clone()))
    }
}

impl SequenceGenerator for InMemoryStore {
    fn next_value(&self, name: &str) -> Result<i64, StoreError> {
        let mut sequences = self.sequences.write().map_err(|_| StoreError::Poisoned)?;
        let entry = sequences.entry(name.to_owned()).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }
}
