//! Storage collaborators consumed by the operations engine.
//!
//! The engine relies on these in-process contracts instead of owning any
//! persistence: a goods/avatar/location repository, a read-only type
//! registry and a monotonic named sequence generator. The in-memory
//! implementations back the test suites and single-process deployments.

pub mod contract;
pub mod memory;

pub use contract::{GoodsStore, Location, SequenceGenerator, StoreError, TypeRegistry};
pub use memory::InMemoryStore;
