//! Core building blocks of the warehouse graph.
//!
//! Strongly-typed identifiers, lifecycle states, the error taxonomy and the
//! property bag attached to physical objects. No IO, no storage concerns.

pub mod error;
pub mod id;
pub mod properties;
pub mod state;

pub use error::{WmsError, WmsResult};
pub use id::{AvatarId, LocationId, ObjectId, OperationId, TypeCode};
pub use properties::{CONTENTS_PROPERTY, PropertyBag};
pub use state::{AvatarState, OpState};
