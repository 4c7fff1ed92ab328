//! Shared test fixtures: a small warehouse topology over the in-memory
//! store, plus shorthand constructors for goods and property bags.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use wareflow_core::{AvatarId, LocationId, OpState, PropertyBag, TypeCode};
use wareflow_goods::GoodsType;
use wareflow_store::InMemoryStore;

use crate::engine::Engine;
use crate::hooks::AssemblyHooks;

/// A fixed timestamp at the given hour, so assertions on placement windows
/// stay readable.
pub(crate) fn dt(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, hour, 0, 0).unwrap()
}

pub(crate) fn bag(pairs: &[(&str, Value)]) -> PropertyBag {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

/// Engine over an in-memory store with a three-container topology:
/// `stock` and `outgoing` under a common warehouse, `offsite` disjoint.
pub(crate) struct Fixture {
    pub engine: Engine<InMemoryStore>,
    pub warehouse: LocationId,
    pub stock: LocationId,
    pub outgoing: LocationId,
    pub offsite: LocationId,
}

pub(crate) fn fixture() -> Fixture {
    fixture_with_hooks(AssemblyHooks::new())
}

pub(crate) fn fixture_with_hooks(hooks: AssemblyHooks) -> Fixture {
    let store = InMemoryStore::new();
    let warehouse = store.add_container("warehouse", None).unwrap();
    let stock = store.add_container("stock", Some(warehouse)).unwrap();
    let outgoing = store.add_container("outgoing", Some(warehouse)).unwrap();
    let offsite = store.add_container("offsite", None).unwrap();
    Fixture {
        engine: Engine::with_hooks(store, hooks),
        warehouse,
        stock,
        outgoing,
        offsite,
    }
}

impl Fixture {
    pub fn register(&self, goods_type: GoodsType) {
        self.engine.store().register_type(goods_type).unwrap();
    }

    /// A done arrival into `stock`; returns the present placement.
    pub fn arrive(
        &mut self,
        type_code: &str,
        quantity: i64,
        properties: Option<PropertyBag>,
    ) -> AvatarId {
        let op = self
            .engine
            .create_arrival(
                OpState::Done,
                dt(8),
                TypeCode::from(type_code),
                self.stock,
                properties,
                quantity,
            )
            .unwrap();
        self.engine.operation(op).unwrap().outcomes[0]
    }
}
