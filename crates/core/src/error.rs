//! Error taxonomy of the operations engine.
//!
//! All of these are synchronous and non-retryable: they signal
//! misconfiguration or inconsistent domain state, not transient failures.
//! The engine never catches or retries them; callers decide what to do at
//! their transaction boundary.

use serde_json::Value;
use thiserror::Error;

use crate::id::ObjectId;
use crate::state::OpState;

/// Result type used across the engine.
pub type WmsResult<T> = Result<T, WmsError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WmsError {
    /// Structural problem with operation inputs (wrong location mix, missing
    /// required behaviour, missing/insufficient properties).
    #[error("operation inputs error: {0}")]
    Inputs(String),

    /// The destination of a move is not a valid container.
    #[error("container expected: {0}")]
    ContainerExpected(String),

    /// Missing or invalid named configuration (e.g. unknown assembly name),
    /// or an invalid lifecycle transition.
    #[error("operation error: {0}")]
    Operation(String),

    /// An assembly input specification entry could not be satisfied by the
    /// available inputs.
    #[error("input specification entry {spec_index} not matched while reaching state {to_state}")]
    InputNotMatched { spec_index: usize, to_state: OpState },

    /// Unmatched inputs remain and the assembly specification forbids them.
    #[error("{count} extra input(s) not allowed by the assembly specification")]
    ExtraInputs { count: usize },

    /// Two inputs forward the same property name with differing values.
    /// `spec_index` is set when the conflict arises from a per-entry forward
    /// list rather than the global one.
    #[error("conflicting values for forwarded property {property:?}: {existing} != {candidate}")]
    PropertyConflict {
        property: String,
        existing: Value,
        candidate: Value,
        spec_index: Option<usize>,
    },

    /// A required property or property value rule is unmet by an input.
    #[error("input object {object} does not satisfy property requirements (required: {required:?})")]
    WrongInputProperties {
        object: ObjectId,
        required: Vec<String>,
        spec_index: Option<usize>,
    },

    /// An outcome-property expression uses an unrecognized evaluation kind.
    #[error("unknown expression type {0:?} in outcome properties")]
    UnknownExpressionType(String),

    /// Failure reported by the storage collaborator.
    #[error("store error: {0}")]
    Store(String),
}

impl WmsError {
    pub fn inputs(msg: impl Into<String>) -> Self {
        Self::Inputs(msg.into())
    }

    pub fn container_expected(msg: impl Into<String>) -> Self {
        Self::ContainerExpected(msg.into())
    }

    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}
