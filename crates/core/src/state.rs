//! Lifecycle states for operations and placements.

use serde::{Deserialize, Serialize};

/// Operation lifecycle state. Totally ordered, no skipping backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpState {
    Planned,
    Started,
    Done,
}

impl OpState {
    /// All states, in lifecycle order.
    pub const ALL: [OpState; 3] = [OpState::Planned, OpState::Started, OpState::Done];

    fn index(self) -> usize {
        match self {
            OpState::Planned => 0,
            OpState::Started => 1,
            OpState::Done => 2,
        }
    }

    /// The states crossed by a jump from `from` to `to`, excluding `from`
    /// and including `to`.
    ///
    /// `from == None` is the creation case: the interval starts at the first
    /// state. A backward jump yields the empty interval.
    pub fn interval(from: Option<OpState>, to: OpState) -> &'static [OpState] {
        let start = match from {
            None => 0,
            Some(s) => s.index() + 1,
        };
        let end = to.index() + 1;
        if start > end {
            &[]
        } else {
            &Self::ALL[start..end]
        }
    }
}

impl core::fmt::Display for OpState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            OpState::Planned => "planned",
            OpState::Started => "started",
            OpState::Done => "done",
        };
        f.write_str(s)
    }
}

/// Placement lifecycle state. Transitions are monotonic
/// `future -> present -> past`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarState {
    Future,
    Present,
    Past,
}

impl core::fmt::Display for AvatarState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            AvatarState::Future => "future",
            AvatarState::Present => "present",
            AvatarState::Past => "past",
        };
        f.write_str(s)
    }
}
