//! Placements ("avatars"): time-sliced statements of an object's location.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wareflow_core::{AvatarId, AvatarState, LocationId, ObjectId, OperationId};

/// A statement that object `object` is at `location` during
/// `[dt_from, dt_until)`.
///
/// `dt_until == None` means open-ended. While an avatar is unconsumed,
/// `consumed_by` is `None`; the operation taking it as input sets the
/// back-reference and eventually flips the state to `Past`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Avatar {
    pub id: AvatarId,
    pub object: ObjectId,
    pub location: LocationId,
    pub state: AvatarState,
    pub dt_from: DateTime<Utc>,
    pub dt_until: Option<DateTime<Utc>>,
    /// The operation that produced this placement.
    pub outcome_of: OperationId,
    /// The operation consuming this placement, once linked as an input.
    pub consumed_by: Option<OperationId>,
}

impl Avatar {
    pub fn new(
        object: ObjectId,
        location: LocationId,
        state: AvatarState,
        dt_from: DateTime<Utc>,
        outcome_of: OperationId,
    ) -> Self {
        Self {
            id: AvatarId::new(),
            object,
            location,
            state,
            dt_from,
            dt_until: None,
            outcome_of,
            consumed_by: None,
        }
    }

    pub fn with_until(mut self, dt_until: Option<DateTime<Utc>>) -> Self {
        self.dt_until = dt_until;
        self
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_by.is_some()
    }

    /// Close the time window of this placement.
    pub fn close_window(&mut self, at: DateTime<Utc>) {
        self.dt_until = Some(at);
    }

    /// Retire the placement: state `Past`, window closed at `at`.
    pub fn retire(&mut self, at: DateTime<Utc>) {
        self.state = AvatarState::Past;
        self.close_window(at);
    }

    /// Promote a future placement to `Present`, restarting its window.
    pub fn promote(&mut self, at: DateTime<Utc>) {
        self.state = AvatarState::Present;
        self.dt_from = at;
    }
}
