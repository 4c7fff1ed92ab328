//! Operation records.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wareflow_core::{AvatarId, LocationId, OpState, OperationId, PropertyBag, TypeCode};

/// Kind-specific fields of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Goods entering the tracked world: no inputs, one outcome.
    Arrival {
        goods_type: TypeCode,
        location: LocationId,
        properties: Option<PropertyBag>,
        quantity: i64,
    },
    /// One input relocated to a destination container.
    Move { destination: LocationId },
    /// Several inputs combined into a single outcome of `outcome_type`,
    /// according to the assembly specification registered under `name`.
    Assembly { outcome_type: TypeCode, name: String },
    /// A single input split into the outcomes its type behaviour describes.
    Unpack { quantity: i64 },
}

/// A typed, stateful action consuming input placements and producing
/// outcome placements.
///
/// Operations are created once and only move forward through lifecycle
/// states; they are mutated exclusively through the engine's lifecycle
/// methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub state: OpState,
    pub dt_start: DateTime<Utc>,
    pub dt_execution: DateTime<Utc>,
    /// Operations that produced this operation's inputs, in input order.
    pub follows: Vec<OperationId>,
    pub inputs: Vec<AvatarId>,
    pub outcomes: Vec<AvatarId>,
    /// Assembly only: for each input specification entry, in order, the ids
    /// of the placements matched to it. Persisted so later lifecycle
    /// transitions can check instead of re-matching.
    pub match_groups: Vec<Vec<AvatarId>>,
}

impl Operation {
    pub fn new(
        kind: OperationKind,
        state: OpState,
        dt_execution: DateTime<Utc>,
        follows: Vec<OperationId>,
        inputs: Vec<AvatarId>,
    ) -> Self {
        Self {
            id: OperationId::new(),
            kind,
            state,
            dt_start: dt_execution,
            dt_execution,
            follows,
            inputs,
            outcomes: Vec::new(),
            match_groups: Vec::new(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            OperationKind::Arrival { .. } => "arrival",
            OperationKind::Move { .. } => "move",
            OperationKind::Assembly { .. } => "assembly",
            OperationKind::Unpack { .. } => "unpack",
        }
    }

    pub fn move_destination(&self) -> Option<LocationId> {
        match &self.kind {
            OperationKind::Move { destination } => Some(*destination),
            _ => None,
        }
    }

    pub fn assembly_params(&self) -> Option<(&TypeCode, &str)> {
        match &self.kind {
            OperationKind::Assembly { outcome_type, name } => Some((outcome_type, name)),
            _ => None,
        }
    }

    pub fn unpack_quantity(&self) -> Option<i64> {
        match &self.kind {
            OperationKind::Unpack { quantity } => Some(*quantity),
            _ => None,
        }
    }

    /// Inputs not assigned to any match group: full input set minus the
    /// matched-identifier set.
    pub fn extra_input_ids(&self) -> Vec<AvatarId> {
        let matched: HashSet<AvatarId> =
            self.match_groups.iter().flatten().copied().collect();
        self.inputs
            .iter()
            .copied()
            .filter(|id| !matched.contains(id))
            .collect()
    }
}
