//! Arrival: goods entering the tracked world.

use chrono::{DateTime, Utc};

use wareflow_core::{AvatarState, OpState, WmsError, WmsResult};
use wareflow_goods::{Avatar, PhysObj};
use wareflow_store::GoodsStore;

use crate::op::{Operation, OperationKind};

/// Create the arriving object and its placement.
pub(crate) fn after_insert<S: GoodsStore>(store: &S, op: &mut Operation) -> WmsResult<()> {
    let OperationKind::Arrival {
        goods_type,
        location,
        properties,
        quantity,
    } = &op.kind
    else {
        return Err(WmsError::operation("not an arrival operation"));
    };

    let mut object = PhysObj::new(goods_type.clone(), *quantity);
    if let Some(bag) = properties {
        object = object.with_properties(bag.clone());
    }
    let outcome_state = if op.state == OpState::Done {
        AvatarState::Present
    } else {
        AvatarState::Future
    };
    let avatar = Avatar::new(object.id, *location, outcome_state, op.dt_execution, op.id);
    op.outcomes.push(avatar.id);
    store.insert_object(object)?;
    store.insert_avatar(avatar)?;
    Ok(())
}

/// Promote the arrived placement to `present`.
pub(crate) fn execute<S: GoodsStore>(
    store: &S,
    op: &Operation,
    dt_execution: DateTime<Utc>,
) -> WmsResult<()> {
    for outcome_id in &op.outcomes {
        let mut avatar = store.avatar(*outcome_id)?;
        avatar.promote(dt_execution);
        store.update_avatar(&avatar)?;
    }
    Ok(())
}
