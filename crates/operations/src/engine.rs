//! The operation lifecycle engine.
//!
//! One engine instance is a single consistent transactional view: every
//! mutation (creation or lifecycle transition) is a synchronous, single-pass
//! computation. The engine performs no internal locking; atomicity and
//! isolation between concurrent callers belong to the enclosing store
//! transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use wareflow_core::{
    AvatarId, AvatarState, LocationId, OpState, OperationId, PropertyBag, TypeCode, WmsError,
    WmsResult,
};
use wareflow_goods::{Avatar, PhysObj};
use wareflow_store::{GoodsStore, SequenceGenerator, TypeRegistry};

use crate::assembly::{self, AssemblyRun};
use crate::hooks::AssemblyHooks;
use crate::op::{Operation, OperationKind};
use crate::{arrival, move_op, unpack};

/// Drives every operation kind through planned/started/done.
pub struct Engine<S> {
    pub(crate) store: S,
    pub(crate) ops: HashMap<OperationId, Operation>,
    pub(crate) hooks: AssemblyHooks,
}

impl<S> Engine<S>
where
    S: GoodsStore + TypeRegistry + SequenceGenerator,
{
    pub fn new(store: S) -> Self {
        Self::with_hooks(store, AssemblyHooks::new())
    }

    pub fn with_hooks(store: S, hooks: AssemblyHooks) -> Self {
        Self {
            store,
            ops: HashMap::new(),
            hooks,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn operation(&self, id: OperationId) -> WmsResult<&Operation> {
        self.ops
            .get(&id)
            .ok_or_else(|| WmsError::operation(format!("unknown operation {id}")))
    }

    /// The outcome placements of an operation, in creation order.
    pub fn outcomes_of(&self, id: OperationId) -> WmsResult<Vec<Avatar>> {
        let op = self.operation(id)?;
        let mut outcomes = Vec::with_capacity(op.outcomes.len());
        for outcome_id in &op.outcomes {
            outcomes.push(self.store.avatar(*outcome_id)?);
        }
        Ok(outcomes)
    }

    /// Goods entering the tracked world.
    pub fn create_arrival(
        &mut self,
        state: OpState,
        dt_execution: DateTime<Utc>,
        goods_type: TypeCode,
        location: LocationId,
        properties: Option<PropertyBag>,
        quantity: i64,
    ) -> WmsResult<OperationId> {
        self.store.goods_type(&goods_type)?;
        if !self.store.is_container(location)? {
            return Err(WmsError::container_expected(format!(
                "arrival location {location} is not a container"
            )));
        }
        let mut op = Operation::new(
            OperationKind::Arrival {
                goods_type,
                location,
                properties,
                quantity,
            },
            state,
            dt_execution,
            Vec::new(),
            Vec::new(),
        );
        arrival::after_insert(&self.store, &mut op)?;
        self.insert_op(op)
    }

    /// Relocate one placement to a destination container.
    pub fn create_move(
        &mut self,
        state: OpState,
        dt_execution: DateTime<Utc>,
        input: AvatarId,
        destination: LocationId,
    ) -> WmsResult<OperationId> {
        move_op::check_destination(&self.store, destination)?;
        let mut inputs = self.load_inputs(&[input], state)?;
        let follows = Self::follows_of(&inputs);
        let mut op = Operation::new(
            OperationKind::Move { destination },
            state,
            dt_execution,
            follows,
            vec![input],
        );
        move_op::after_insert(&self.store, &mut op, &inputs[0])?;
        self.link_inputs(&op, &mut inputs)?;
        self.insert_op(op)
    }

    /// Combine inputs into a single outcome of `outcome_type`, according to
    /// the assembly specification registered under `name`.
    pub fn create_assembly(
        &mut self,
        state: OpState,
        dt_execution: DateTime<Utc>,
        inputs: Vec<AvatarId>,
        outcome_type: TypeCode,
        name: &str,
    ) -> WmsResult<OperationId> {
        let mut avatars = self.load_inputs(&inputs, state)?;
        let Some(first) = avatars.first() else {
            return Err(WmsError::inputs("assembly requires at least one input"));
        };
        let location = first.location;
        if avatars.iter().any(|av| av.location != location) {
            return Err(WmsError::inputs("assembly inputs are in different locations"));
        }

        let follows = Self::follows_of(&avatars);
        let mut op = Operation::new(
            OperationKind::Assembly {
                outcome_type: outcome_type.clone(),
                name: name.to_owned(),
            },
            state,
            dt_execution,
            follows,
            inputs,
        );

        // All matching and property rules run before any record is touched.
        let properties = {
            let mut run = AssemblyRun::new(&self.store, &self.hooks, &mut op)?;
            run.check_or_match_inputs(state, true)?;
            run.build_outcome_properties(state, true)?
        };

        let mut object = PhysObj::new(outcome_type, 1);
        if !properties.is_empty() {
            object = object.with_properties(properties);
        }
        let avatar = Avatar::new(
            object.id,
            location,
            Self::outcome_state(state),
            dt_execution,
            op.id,
        );
        op.outcomes.push(avatar.id);
        self.store.insert_object(object)?;
        self.store.insert_avatar(avatar)?;

        self.link_inputs(&op, &mut avatars)?;
        self.insert_op(op)
    }

    /// Split one placement into the outcomes its type behaviour describes.
    pub fn create_unpack(
        &mut self,
        state: OpState,
        dt_execution: DateTime<Utc>,
        input: AvatarId,
        quantity: i64,
    ) -> WmsResult<OperationId> {
        let mut avatars = self.load_inputs(&[input], state)?;
        let input_av = avatars[0].clone();
        let input_obj = self.store.object(input_av.object)?;

        // Raises on a missing unpack behaviour or unmet property
        // requirement before any record is created.
        let planned = unpack::plan_outcomes(&self.store, &input_obj)?;

        let follows = Self::follows_of(&avatars);
        let mut op = Operation::new(
            OperationKind::Unpack { quantity },
            state,
            dt_execution,
            follows,
            vec![input],
        );
        unpack::materialize(
            &self.store,
            &mut op,
            &input_av,
            &input_obj,
            planned,
            Self::outcome_state(state),
        )?;
        if state == OpState::Done {
            unpack::purge_void_outcomes(&self.store, &mut op)?;
        }
        self.link_inputs(&op, &mut avatars)?;
        self.insert_op(op)
    }

    /// Transition a planned operation to `started`.
    pub fn start(&mut self, id: OperationId, dt_start: DateTime<Utc>) -> WmsResult<()> {
        let mut op = self.take_op(id)?;
        let result = self.start_inner(&mut op, dt_start);
        self.ops.insert(id, op);
        result
    }

    fn start_inner(&mut self, op: &mut Operation, dt_start: DateTime<Utc>) -> WmsResult<()> {
        if op.state != OpState::Planned {
            return Err(WmsError::operation(format!(
                "cannot start operation {} from state {}",
                op.id, op.state
            )));
        }
        match op.kind {
            OperationKind::Move { .. } => move_op::start(&self.store, op, dt_start)?,
            OperationKind::Assembly { .. } => {
                let mut run = AssemblyRun::new(&self.store, &self.hooks, op)?;
                run.check_or_match_inputs(OpState::Started, false)?;
                run.apply_deferred_properties(OpState::Started)?;
            }
            OperationKind::Arrival { .. } | OperationKind::Unpack { .. } => {}
        }
        op.dt_start = dt_start;
        op.state = OpState::Started;
        tracing::debug!(operation = %op.id, kind = op.kind_name(), "operation started");
        Ok(())
    }

    /// Transition a planned or started operation to `done`.
    pub fn execute(&mut self, id: OperationId, dt_execution: DateTime<Utc>) -> WmsResult<()> {
        let mut op = self.take_op(id)?;
        let result = self.execute_inner(&mut op, dt_execution);
        self.ops.insert(id, op);
        result
    }

    fn execute_inner(
        &mut self,
        op: &mut Operation,
        dt_execution: DateTime<Utc>,
    ) -> WmsResult<()> {
        if op.state == OpState::Done {
            return Err(WmsError::operation(format!(
                "operation {} is already done",
                op.id
            )));
        }
        match op.kind {
            OperationKind::Arrival { .. } => arrival::execute(&self.store, op, dt_execution)?,
            OperationKind::Move { .. } => move_op::execute(&self.store, op, dt_execution)?,
            OperationKind::Unpack { .. } => unpack::execute(&self.store, op, dt_execution)?,
            OperationKind::Assembly { .. } => {
                let mut run = AssemblyRun::new(&self.store, &self.hooks, op)?;
                run.check_or_match_inputs(OpState::Done, false)?;
                run.apply_deferred_properties(OpState::Done)?;
                assembly::finalize(&self.store, op, dt_execution)?;
            }
        }
        op.dt_execution = dt_execution;
        op.state = OpState::Done;
        tracing::debug!(operation = %op.id, kind = op.kind_name(), "operation executed");
        Ok(())
    }

    fn outcome_state(state: OpState) -> AvatarState {
        if state == OpState::Done {
            AvatarState::Present
        } else {
            AvatarState::Future
        }
    }

    fn take_op(&mut self, id: OperationId) -> WmsResult<Operation> {
        self.ops
            .remove(&id)
            .ok_or_else(|| WmsError::operation(format!("unknown operation {id}")))
    }

    fn insert_op(&mut self, op: Operation) -> WmsResult<OperationId> {
        let id = op.id;
        tracing::debug!(
            operation = %id,
            kind = op.kind_name(),
            state = %op.state,
            "operation created"
        );
        self.ops.insert(id, op);
        Ok(id)
    }

    /// Load the input placements, checking consumption and state
    /// consistency against the operation's target state.
    fn load_inputs(&self, ids: &[AvatarId], state: OpState) -> WmsResult<Vec<Avatar>> {
        let mut avatars = Vec::with_capacity(ids.len());
        for id in ids {
            let av = self.store.avatar(*id)?;
            if av.is_consumed() {
                return Err(WmsError::inputs(format!(
                    "placement {} is already consumed",
                    av.id
                )));
            }
            let consistent = match state {
                OpState::Done => av.state == AvatarState::Present,
                _ => matches!(av.state, AvatarState::Future | AvatarState::Present),
            };
            if !consistent {
                return Err(WmsError::inputs(format!(
                    "placement {} in state {} cannot feed an operation created {}",
                    av.id, av.state, state
                )));
            }
            avatars.push(av);
        }
        Ok(avatars)
    }

    /// Producing operations of the inputs, deduplicated in input order.
    fn follows_of(inputs: &[Avatar]) -> Vec<OperationId> {
        let mut follows = Vec::new();
        for av in inputs {
            if !follows.contains(&av.outcome_of) {
                follows.push(av.outcome_of);
            }
        }
        follows
    }

    /// Mark inputs consumed: back-reference, window closed at execution
    /// time, and `past` already when the operation is created `done`.
    fn link_inputs(&self, op: &Operation, inputs: &mut Vec<Avatar>) -> WmsResult<()> {
        for av in inputs {
            av.consumed_by = Some(op.id);
            av.close_window(op.dt_execution);
            if op.state == OpState::Done {
                av.state = AvatarState::Past;
            }
            self.store.update_avatar(av)?;
        }
        Ok(())
    }
}
