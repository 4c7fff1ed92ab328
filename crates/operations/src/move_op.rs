//! Move: relocating one input to a destination container.

use chrono::{DateTime, Utc};

use wareflow_core::{AvatarState, LocationId, OpState, WmsError, WmsResult};
use wareflow_goods::Avatar;
use wareflow_store::GoodsStore;

use crate::op::Operation;

pub(crate) fn check_destination<S: GoodsStore>(
    store: &S,
    destination: LocationId,
) -> WmsResult<()> {
    if !store.is_container(destination)? {
        return Err(WmsError::container_expected(format!(
            "destination {destination} is not a container"
        )));
    }
    Ok(())
}

/// Create the outcome placement at the destination.
pub(crate) fn after_insert<S: GoodsStore>(
    store: &S,
    op: &mut Operation,
    input: &Avatar,
) -> WmsResult<()> {
    let destination = op
        .move_destination()
        .ok_or_else(|| WmsError::operation("not a move operation"))?;
    let outcome_state = if op.state == OpState::Done {
        AvatarState::Present
    } else {
        AvatarState::Future
    };
    let outcome = Avatar::new(
        input.object,
        destination,
        outcome_state,
        op.dt_execution,
        op.id,
    )
    .with_until(input.dt_until);
    op.outcomes.push(outcome.id);
    store.insert_avatar(outcome)?;
    Ok(())
}

/// Starting a move retires the input early. To avoid a hole in the object's
/// placement history, an intermediate placement is inserted at the nearest
/// common containing ancestor of source and destination, when one exists.
pub(crate) fn start<S: GoodsStore>(
    store: &S,
    op: &mut Operation,
    dt_start: DateTime<Utc>,
) -> WmsResult<()> {
    let destination = op
        .move_destination()
        .ok_or_else(|| WmsError::operation("not a move operation"))?;
    let input_id = *op
        .inputs
        .first()
        .ok_or_else(|| WmsError::operation("move has no input placement"))?;
    let mut input = store.avatar(input_id)?;

    let final_id = *op
        .outcomes
        .first()
        .ok_or_else(|| WmsError::operation("move has no outcome placement"))?;
    let mut final_av = store.avatar(final_id)?;
    final_av.dt_from = dt_start;
    store.update_avatar(&final_av)?;

    input.retire(dt_start);
    store.update_avatar(&input)?;

    if let Some(ancestor) = store.common_ancestor(input.location, destination)? {
        let hop = Avatar::new(
            input.object,
            ancestor,
            AvatarState::Present,
            dt_start,
            op.id,
        )
        .with_until(Some(op.dt_execution));
        op.outcomes.push(hop.id);
        store.insert_avatar(hop)?;
    }
    Ok(())
}

/// Promote the final outcome; retire the intermediate hop if any.
pub(crate) fn execute<S: GoodsStore>(
    store: &S,
    op: &mut Operation,
    dt_execution: DateTime<Utc>,
) -> WmsResult<()> {
    let final_id = *op
        .outcomes
        .first()
        .ok_or_else(|| WmsError::operation("move has no outcome placement"))?;
    let mut final_av = store.avatar(final_id)?;
    final_av.promote(dt_execution);
    store.update_avatar(&final_av)?;

    if let Some(hop_id) = op.outcomes.get(1).copied() {
        let mut hop = store.avatar(hop_id)?;
        hop.retire(dt_execution);
        store.update_avatar(&hop)?;
    }

    let input_id = *op
        .inputs
        .first()
        .ok_or_else(|| WmsError::operation("move has no input placement"))?;
    let mut input = store.avatar(input_id)?;
    if input.state != AvatarState::Past {
        // Executed straight from `planned`: the input retires now.
        input.retire(dt_execution);
        store.update_avatar(&input)?;
    }
    Ok(())
}
