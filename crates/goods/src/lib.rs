//! Physical objects, their time-sliced placements and the per-type behaviour
//! configuration driving assembly and unpack operations.
//!
//! Pure data definitions; the lifecycle logic lives in `wareflow-operations`.

pub mod avatar;
pub mod behaviour;
pub mod object;

pub use avatar::Avatar;
pub use behaviour::{
    AssemblySpec, Behaviours, CheckOrMatch, ContentsForm, ContentsScope, ForContents,
    ForwardSpec, GoodsType, InputSpec, PropertyRules, TypedExpr, UnpackBehaviour,
    UnpackOutcomeSpec,
};
pub use object::PhysObj;
