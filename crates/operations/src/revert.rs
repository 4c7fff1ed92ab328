//! Reversal planning: the operation that would undo a done operation.
//!
//! A reversal is an ordinary planned operation taking the original's
//! outcomes (or, when later operations already consumed them, the outcomes
//! of those followers) as inputs. Executing it restores the prior
//! arrangement of goods without erasing history.

use chrono::{DateTime, Utc};

use wareflow_core::{AvatarId, OpState, OperationId, WmsError, WmsResult};
use wareflow_store::{GoodsStore, SequenceGenerator, TypeRegistry};

use crate::engine::Engine;
use crate::op::OperationKind;

impl<S> Engine<S>
where
    S: GoodsStore + TypeRegistry + SequenceGenerator,
{
    /// Whether a reversal can be planned for this operation.
    ///
    /// A move always can; an assembly can when its outcome type carries an
    /// unpack behaviour to take the assembled object apart again. Arrivals
    /// and unpacks cannot be reversed.
    pub fn is_reversible(&self, id: OperationId) -> WmsResult<bool> {
        let op = self.operation(id)?;
        Ok(match &op.kind {
            OperationKind::Move { .. } => true,
            OperationKind::Assembly { outcome_type, .. } => {
                self.store.goods_type(outcome_type)?.unpack().is_some()
            }
            OperationKind::Arrival { .. } | OperationKind::Unpack { .. } => false,
        })
    }

    /// Plan the single operation reverting `id`, to be executed at
    /// `dt_execution`.
    ///
    /// `follows` names already-planned reversals of operations that consumed
    /// this one's outcomes; their outcomes stand in for the consumed ones.
    pub fn plan_revert_single(
        &mut self,
        id: OperationId,
        dt_execution: DateTime<Utc>,
        follows: &[OperationId],
    ) -> WmsResult<OperationId> {
        let op = self.operation(id)?.clone();
        if op.state != OpState::Done {
            return Err(WmsError::operation(format!(
                "cannot revert operation {} in state {}",
                op.id, op.state
            )));
        }
        match &op.kind {
            OperationKind::Move { .. } => {
                // The placement to move back: the last follower's outcome
                // when the chain continued, this move's own otherwise.
                let moved = match follows.last() {
                    Some(follower) => self.first_outcome(*follower)?,
                    None => self.first_outcome(id)?,
                };
                let input_id = *op
                    .inputs
                    .first()
                    .ok_or_else(|| WmsError::operation("move has no input placement"))?;
                let source = self.store.avatar(input_id)?.location;
                let reversal =
                    self.create_move(OpState::Planned, dt_execution, moved, source)?;
                tracing::debug!(original = %id, reversal = %reversal, "planned move reversal");
                Ok(reversal)
            }
            OperationKind::Assembly { .. } => {
                let mut candidates: Vec<AvatarId> = Vec::new();
                for follower in follows {
                    candidates.extend(self.operation(*follower)?.outcomes.iter().copied());
                }
                for outcome in &op.outcomes {
                    if !self.store.avatar(*outcome)?.is_consumed() {
                        candidates.push(*outcome);
                    }
                }
                let &[input] = candidates.as_slice() else {
                    return Err(WmsError::inputs(format!(
                        "assembly reversal needs exactly one unconsumed outcome, found {}",
                        candidates.len()
                    )));
                };
                let object = self.store.object(self.store.avatar(input)?.object)?;
                let reversal = self.create_unpack(
                    OpState::Planned,
                    dt_execution,
                    input,
                    object.quantity,
                )?;
                tracing::debug!(original = %id, reversal = %reversal, "planned assembly reversal");
                Ok(reversal)
            }
            OperationKind::Arrival { .. } | OperationKind::Unpack { .. } => {
                Err(WmsError::operation(format!(
                    "operation kind {} is not reversible",
                    op.kind_name()
                )))
            }
        }
    }

    fn first_outcome(&self, id: OperationId) -> WmsResult<AvatarId> {
        self.operation(id)?
            .outcomes
            .first()
            .copied()
            .ok_or_else(|| WmsError::operation(format!("operation {id} has no outcome")))
    }
}
