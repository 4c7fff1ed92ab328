//! The operation lifecycle and composite-operation rules engine.
//!
//! Physical objects move through typed, stateful operations (arrival, move,
//! assembly, unpack) that consume and produce time-sliced placements. This
//! crate owns the generic planned/started/done state machine, the
//! per-lifecycle-state configuration merging, the input matcher, the
//! property forwarding/conflict detection and the reversal planner.
//!
//! Entry point: [`Engine`], generic over the storage collaborators of
//! `wareflow-store`.

mod arrival;
mod assembly;
mod move_op;
mod unpack;

pub mod engine;
pub mod hooks;
pub mod op;
pub mod revert;
pub mod state_merge;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::Engine;
pub use hooks::{AssemblyHook, AssemblyHooks};
pub use op::{Operation, OperationKind};
pub use state_merge::{MergedRules, merge_check_or_match, merge_map, merge_rules, merge_set};
