//! Unpack: splitting one input into the outcomes its type describes.
//!
//! Outcome specifications merge the type-level list with the instance-level
//! overrides found in the input's contents property, then fold the global
//! forward/required lists into every non-clone outcome. Unpacks happen in
//! place: outcomes appear where the input was.

use chrono::{DateTime, Utc};

use wareflow_core::{AvatarState, CONTENTS_PROPERTY, WmsError, WmsResult};
use wareflow_goods::{Avatar, ForwardSpec, PhysObj, UnpackOutcomeSpec};
use wareflow_store::{GoodsStore, TypeRegistry};

use crate::op::Operation;

/// An outcome about to be materialized: its specification plus the property
/// treatment decided up front, so that all validation happens before any
/// record is created.
pub(crate) struct PlannedOutcome {
    pub spec: UnpackOutcomeSpec,
    pub props: OutcomeProps,
}

pub(crate) enum OutcomeProps {
    /// Share the input's bag by reference, skipping per-property work.
    CloneBag,
    Update(Vec<(String, serde_json::Value)>),
}

/// Resolve the complete outcome specification list for unpacking
/// `input_obj`.
pub(crate) fn outcome_specs<S: TypeRegistry>(
    store: &S,
    input_obj: &PhysObj,
) -> WmsResult<Vec<UnpackOutcomeSpec>> {
    let gtype = store.goods_type(&input_obj.type_code)?;
    let behaviour = gtype.unpack().ok_or_else(|| {
        WmsError::inputs(format!(
            "type {} of {} has no unpack behaviour",
            input_obj.type_code, input_obj.id
        ))
    })?;

    // Defensive copy: the behaviour is shared configuration.
    let mut specs = behaviour.outcomes.clone();

    if behaviour.uniform_outcomes {
        for spec in &mut specs {
            spec.forward_properties = ForwardSpec::clone_bag();
        }
        return Ok(specs);
    }

    if let Some(value) = input_obj.get_property(CONTENTS_PROPERTY) {
        let instance: Vec<UnpackOutcomeSpec> =
            serde_json::from_value(value.clone()).map_err(|e| {
                WmsError::inputs(format!(
                    "invalid {CONTENTS_PROPERTY} property on {}: {e}",
                    input_obj.id
                ))
            })?;
        specs.extend(instance);
    }
    if specs.is_empty() {
        return Err(WmsError::inputs(format!(
            "unpacking {} yields no outcomes",
            input_obj.id
        )));
    }

    // Instance-level lists take precedence by concatenation, not dedup.
    for spec in &mut specs {
        if spec.forward_properties.is_clone() {
            continue;
        }
        spec.forward_properties
            .extend(behaviour.forward_properties.iter().cloned());
        spec.required_properties
            .extend(behaviour.required_properties.iter().cloned());
    }
    Ok(specs)
}

/// Decide the property treatment for every outcome, raising any
/// missing-requirement error before records are created.
pub(crate) fn plan_outcomes<S: TypeRegistry>(
    store: &S,
    input_obj: &PhysObj,
) -> WmsResult<Vec<PlannedOutcome>> {
    let specs = outcome_specs(store, input_obj)?;
    let mut planned = Vec::with_capacity(specs.len());
    for spec in specs {
        let props = if spec.forward_properties.is_clone() {
            OutcomeProps::CloneBag
        } else {
            OutcomeProps::Update(outcome_props_update(input_obj, &spec)?)
        };
        planned.push(PlannedOutcome { spec, props });
    }
    Ok(planned)
}

/// Compute the property updates for one outcome.
///
/// Direct `properties` come first (lowest precedence, and ignored entirely
/// when the outcome reuses existing records); forwarded properties override
/// them. A forward-listed property absent from the input is an error only
/// when also listed as required.
pub(crate) fn outcome_props_update(
    input_obj: &PhysObj,
    spec: &UnpackOutcomeSpec,
) -> WmsResult<Vec<(String, serde_json::Value)>> {
    let mut updates: Vec<(String, serde_json::Value)> = Vec::new();
    if let Some(direct) = &spec.properties {
        if spec.local_goods_ids.is_none() {
            updates.extend(direct.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    let required = &spec.required_properties;
    if !required.is_empty() && input_obj.properties.is_none() {
        return Err(WmsError::inputs(format!(
            "input {} has no properties, yet its type requires {:?} for unpack",
            input_obj.id, required
        )));
    }
    for name in spec.forward_properties.names() {
        match input_obj.get_property(name) {
            Some(value) => updates.push((name.clone(), value.clone())),
            None => {
                if required.iter().any(|r| r == name) {
                    return Err(WmsError::inputs(format!(
                        "input {} lacks the property {name:?} required for unpack",
                        input_obj.id
                    )));
                }
            }
        }
    }
    Ok(updates)
}

/// Create the outcome objects and placements for every planned outcome.
pub(crate) fn materialize<S: GoodsStore>(
    store: &S,
    op: &mut Operation,
    input_av: &Avatar,
    input_obj: &PhysObj,
    planned: Vec<PlannedOutcome>,
    outcome_state: AvatarState,
) -> WmsResult<()> {
    let unpack_quantity = op
        .unpack_quantity()
        .ok_or_else(|| WmsError::operation("not an unpack operation"))?;

    for PlannedOutcome { spec, props } in planned {
        let target_quantity = spec.quantity * unpack_quantity;
        let objects = match &spec.local_goods_ids {
            Some(ids) => {
                // Reuse the listed records instead of minting new ones; their
                // total quantity must provide exactly the wished amount.
                let mut reused = Vec::with_capacity(ids.len());
                for id in ids {
                    reused.push(store.object(*id)?);
                }
                let total: i64 = reused.iter().map(|o| o.quantity).sum();
                if total != target_quantity {
                    return Err(WmsError::inputs(format!(
                        "outcome spec for {} reuses records providing quantity {total}, \
                         wished {target_quantity}",
                        spec.type_code
                    )));
                }
                for obj in &mut reused {
                    if let OutcomeProps::Update(updates) = &props {
                        obj.update_properties(updates.iter().cloned());
                        store.update_object(obj)?;
                    }
                }
                reused
            }
            None => {
                let mut object = PhysObj::new(spec.type_code.clone(), target_quantity);
                match &props {
                    OutcomeProps::CloneBag => object.clone_properties_from(input_obj),
                    OutcomeProps::Update(updates) => {
                        object.update_properties(updates.iter().cloned());
                    }
                }
                store.insert_object(object.clone())?;
                vec![object]
            }
        };

        for object in objects {
            let avatar = Avatar::new(
                object.id,
                input_av.location,
                outcome_state,
                op.dt_execution,
                op.id,
            )
            .with_until(input_av.dt_until);
            op.outcomes.push(avatar.id);
            store.insert_avatar(avatar)?;
        }
    }
    Ok(())
}

/// Promote outcomes to `present` and retire the input at execution time.
pub(crate) fn execute<S: GoodsStore>(
    store: &S,
    op: &mut Operation,
    dt_execution: DateTime<Utc>,
) -> WmsResult<()> {
    for outcome_id in &op.outcomes {
        let mut avatar = store.avatar(*outcome_id)?;
        avatar.promote(dt_execution);
        store.update_avatar(&avatar)?;
    }
    purge_void_outcomes(store, op)?;

    let input_id = *op
        .inputs
        .first()
        .ok_or_else(|| WmsError::operation("unpack has no input placement"))?;
    let mut input = store.avatar(input_id)?;
    input.retire(dt_execution);
    store.update_avatar(&input)?;
    Ok(())
}

/// Prune outcome records left with non-positive quantity by recombination.
pub(crate) fn purge_void_outcomes<S: GoodsStore>(
    store: &S,
    op: &mut Operation,
) -> WmsResult<()> {
    let mut kept = Vec::with_capacity(op.outcomes.len());
    for outcome_id in &op.outcomes {
        let avatar = store.avatar(*outcome_id)?;
        let object = store.object(avatar.object)?;
        if object.quantity <= 0 {
            store.delete_avatar(avatar.id)?;
            store.delete_object(object.id)?;
        } else {
            kept.push(*outcome_id);
        }
    }
    op.outcomes = kept;
    Ok(())
}
