//! Assembly: combining several inputs into a single outcome.
//!
//! The behaviour lives on the outcome's goods type, keyed by assembly name:
//! expected inputs, per-state property rules and the contents-export policy.
//! Matching reconciles the unordered input set against the ordered
//! expected-input list; forwarding propagates input properties to the
//! outcome, rejecting conflicting values.

use std::collections::BTreeMap;

use serde_json::Value;

use wareflow_core::{
    AvatarId, CONTENTS_PROPERTY, OpState, PropertyBag, TypeCode, WmsError, WmsResult,
};
use wareflow_goods::{
    AssemblySpec, Avatar, CheckOrMatch, ContentsForm, ContentsScope, ForContents, ForwardSpec,
    PhysObj, TypedExpr, UnpackOutcomeSpec,
};
use wareflow_store::{GoodsStore, SequenceGenerator, TypeRegistry};

use crate::op::Operation;
use crate::state_merge::{merge_check_or_match, merge_map, merge_rules};
use crate::hooks::AssemblyHooks;

/// One assembly computation against an operation record.
///
/// Holds a defensive copy of the specification: the type's behaviour is
/// shared configuration and must never be mutated through the engine.
pub(crate) struct AssemblyRun<'a, S> {
    store: &'a S,
    hooks: &'a AssemblyHooks,
    op: &'a mut Operation,
    spec: AssemblySpec,
    name: String,
}

impl<'a, S> AssemblyRun<'a, S>
where
    S: GoodsStore + TypeRegistry + SequenceGenerator,
{
    pub fn new(
        store: &'a S,
        hooks: &'a AssemblyHooks,
        op: &'a mut Operation,
    ) -> WmsResult<Self> {
        let (outcome_type, name) = op
            .assembly_params()
            .ok_or_else(|| WmsError::operation("not an assembly operation"))?;
        let spec = lookup_spec(store, outcome_type, name)?;
        let name = name.to_owned();
        Ok(Self {
            store,
            hooks,
            op,
            spec,
            name,
        })
    }

    fn from_state(&self, for_creation: bool) -> Option<OpState> {
        if for_creation { None } else { Some(self.op.state) }
    }

    fn object_of(&self, avatar: AvatarId) -> WmsResult<PhysObj> {
        let av = self.store.avatar(avatar)?;
        Ok(self.store.object(av.object)?)
    }

    /// Inputs with their objects, in ascending avatar id order.
    ///
    /// The matcher's contract assigns no meaning to input ordering; sorting
    /// by id gives the greedy scan a deterministic tie-break.
    fn inputs_with_objects(&self) -> WmsResult<Vec<(Avatar, PhysObj)>> {
        let mut inputs = Vec::with_capacity(self.op.inputs.len());
        for id in &self.op.inputs {
            let av = self.store.avatar(*id)?;
            let obj = self.store.object(av.object)?;
            inputs.push((av, obj));
        }
        inputs.sort_by_key(|(av, _)| av.id);
        Ok(inputs)
    }

    /// Inputs left once every specification entry is satisfied, in
    /// ascending avatar id order.
    fn extra_inputs(&self) -> WmsResult<Vec<(Avatar, PhysObj)>> {
        let extra_ids = self.op.extra_input_ids();
        let mut extras = Vec::with_capacity(extra_ids.len());
        for id in extra_ids {
            let av = self.store.avatar(id)?;
            let obj = self.store.object(av.object)?;
            extras.push((av, obj));
        }
        extras.sort_by_key(|(av, _)| av.id);
        Ok(extras)
    }

    /// Check or match inputs according to the merged directive for this
    /// state jump. `planned` defaults to `match`, later states to `check`.
    ///
    /// Returns `true` iff a match has been performed.
    pub fn check_or_match_inputs(
        &mut self,
        to_state: OpState,
        for_creation: bool,
    ) -> WmsResult<bool> {
        let mut directive = self.spec.inputs_spec_type.clone();
        directive.entry(OpState::Planned).or_insert(CheckOrMatch::Match);
        let is_match =
            merge_check_or_match(&directive, self.from_state(for_creation), to_state);
        if is_match {
            self.match_inputs(to_state, for_creation)?;
        } else {
            self.check_input_properties(to_state, for_creation)?;
        }
        Ok(is_match)
    }

    /// Reconcile the input set against the ordered expected-input list and
    /// persist the resulting match groups on the operation.
    pub fn match_inputs(&mut self, to_state: OpState, for_creation: bool) -> WmsResult<()> {
        let from = self.from_state(for_creation);
        let mut pool = self.inputs_with_objects()?;
        let mut groups = Vec::with_capacity(self.spec.inputs.len());

        for (spec_index, expected) in self.spec.inputs.iter().enumerate() {
            let rules = merge_rules(&expected.properties, from, to_state);
            let mut group = Vec::with_capacity(expected.quantity);
            for _ in 0..expected.quantity {
                let found = pool.iter().position(|(_, obj)| {
                    obj.has_type(&expected.type_code) && rules.satisfied_by(obj)
                });
                match found {
                    Some(pos) => group.push(pool.remove(pos).0.id),
                    None => {
                        return Err(WmsError::InputNotMatched {
                            spec_index,
                            to_state,
                        });
                    }
                }
            }
            groups.push(group);
        }

        if !pool.is_empty() && !self.spec.allow_extra {
            return Err(WmsError::ExtraInputs { count: pool.len() });
        }
        self.op.match_groups = groups;
        Ok(())
    }

    /// Validate every input against the global rules and every matched input
    /// against its entry's rules, without re-matching.
    pub fn check_input_properties(
        &self,
        to_state: OpState,
        for_creation: bool,
    ) -> WmsResult<()> {
        let from = self.from_state(for_creation);

        let global = merge_rules(&self.spec.inputs_properties, from, to_state);
        for (_, obj) in self.inputs_with_objects()? {
            if !global.satisfied_by(&obj) {
                return Err(WmsError::WrongInputProperties {
                    object: obj.id,
                    required: global.required_names(),
                    spec_index: None,
                });
            }
        }

        for (spec_index, (group, entry)) in self
            .op
            .match_groups
            .iter()
            .zip(&self.spec.inputs)
            .enumerate()
        {
            let rules = merge_rules(&entry.properties, from, to_state);
            for avatar in group {
                let obj = self.object_of(*avatar)?;
                if !rules.satisfied_by(&obj) {
                    return Err(WmsError::WrongInputProperties {
                        object: obj.id,
                        required: rules.required_names(),
                        spec_index: Some(spec_index),
                    });
                }
            }
        }
        Ok(())
    }

    /// Forward properties from the inputs into a candidate outcome set,
    /// according to the global and per-entry forward lists.
    pub fn forward_properties(
        &self,
        to_state: OpState,
        for_creation: bool,
    ) -> WmsResult<BTreeMap<String, Value>> {
        let from = self.from_state(for_creation);
        let global_forward = merge_rules(&self.spec.inputs_properties, from, to_state).forward;

        let mut forwarded = BTreeMap::new();
        for (spec_index, (group, entry)) in self
            .op
            .match_groups
            .iter()
            .zip(&self.spec.inputs)
            .enumerate()
        {
            for avatar in group {
                let obj = self.object_of(*avatar)?;
                for name in entry.forward_properties.iter().chain(global_forward.iter()) {
                    extract_property(&mut forwarded, &obj, name, Some(spec_index))?;
                }
            }
        }
        for (_, obj) in self.extra_inputs()? {
            for name in &global_forward {
                extract_property(&mut forwarded, &obj, name, None)?;
            }
        }
        Ok(forwarded)
    }

    /// Build the contents descriptor, unless the policy disables it.
    ///
    /// Entries are sorted by placement id for reproducibility. Properties
    /// already forwarded to the outcome are listed as forward directives
    /// (an unpack recovers them from the outcome); the others are embedded
    /// verbatim. The `records` form adds the object ids so a later unpack
    /// reuses the very same object records.
    fn build_contents(
        &self,
        forwarded: &BTreeMap<String, Value>,
    ) -> WmsResult<Option<Value>> {
        let Some(ForContents(scope, form)) = self.spec.for_contents else {
            return Ok(None);
        };
        let listed = match scope {
            ContentsScope::All => self.inputs_with_objects()?,
            ContentsScope::Extra => self.extra_inputs()?,
        };
        if listed.is_empty() {
            return Ok(None);
        }

        let mut contents = Vec::with_capacity(listed.len());
        for (_, obj) in listed {
            let mut entry = UnpackOutcomeSpec::new(obj.type_code.clone(), obj.quantity);
            if let Some(bag) = obj.properties.as_deref() {
                let mut forward = Vec::new();
                let mut direct = BTreeMap::new();
                for (key, value) in bag.iter() {
                    if forwarded.contains_key(key) {
                        forward.push(key.clone());
                    } else {
                        direct.insert(key.clone(), value.clone());
                    }
                }
                if !direct.is_empty() {
                    entry.properties = Some(direct);
                }
                if !forward.is_empty() {
                    entry.forward_properties = ForwardSpec::Properties(forward);
                }
            }
            if form == ContentsForm::Records {
                entry.local_goods_ids = Some(vec![obj.id]);
            }
            contents.push(entry);
        }
        let value = serde_json::to_value(contents)
            .map_err(|e| WmsError::operation(format!("contents encoding: {e}")))?;
        Ok(Some(value))
    }

    /// Assemble the outcome's property set: forwarded properties, contents
    /// descriptor, evaluated outcome expressions, then the name-dispatched
    /// hook (which overwrites on collision).
    pub fn build_outcome_properties(
        &mut self,
        to_state: OpState,
        for_creation: bool,
    ) -> WmsResult<PropertyBag> {
        let from = self.from_state(for_creation);
        let mut assembled = self.forward_properties(to_state, for_creation)?;
        if let Some(contents) = self.build_contents(&assembled)? {
            assembled.insert(CONTENTS_PROPERTY.to_owned(), contents);
        }

        for (name, expr) in merge_map(&self.spec.outcome_properties, from, to_state) {
            assembled.insert(name, self.eval_typed_expr(&expr)?);
        }

        let mut bag = PropertyBag::from(assembled);
        if let Some(hook) = self.hooks.lookup(&self.name) {
            let updates = hook.build_outcome_properties(&bag, to_state, for_creation)?;
            bag.merge(updates);
        }
        Ok(bag)
    }

    /// Apply the outcome-property expressions and hook for a later state
    /// jump to the already-created outcome object.
    pub fn apply_deferred_properties(&mut self, to_state: OpState) -> WmsResult<()> {
        let from = Some(self.op.state);
        let exprs = merge_map(&self.spec.outcome_properties, from, to_state);
        let mut updates = Vec::with_capacity(exprs.len());
        for (name, expr) in exprs {
            updates.push((name, self.eval_typed_expr(&expr)?));
        }

        let outcome_id = *self
            .op
            .outcomes
            .first()
            .ok_or_else(|| WmsError::operation("assembly has no outcome placement"))?;
        let avatar = self.store.avatar(outcome_id)?;
        let mut object = self.store.object(avatar.object)?;
        object.update_properties(updates);

        if let Some(hook) = self.hooks.lookup(&self.name) {
            let bag = object
                .properties
                .as_deref()
                .cloned()
                .unwrap_or_default();
            let more = hook.build_outcome_properties(&bag, to_state, false)?;
            object.update_properties(more);
        }
        self.store.update_object(&object)?;
        Ok(())
    }

    /// Evaluate a typed outcome-property expression.
    pub fn eval_typed_expr(&self, expr: &TypedExpr) -> WmsResult<Value> {
        match expr.0.as_str() {
            TypedExpr::CONST => Ok(expr.1.clone()),
            TypedExpr::SEQUENCE => {
                let name = expr.1.as_str().ok_or_else(|| {
                    WmsError::operation("sequence expression expects a string argument")
                })?;
                let value = self.store.next_value(name.trim())?;
                Ok(Value::from(value))
            }
            other => Err(WmsError::UnknownExpressionType(other.to_owned())),
        }
    }
}

/// Retire the inputs and promote the outcome at execution time.
pub(crate) fn finalize<S: GoodsStore>(
    store: &S,
    op: &Operation,
    dt_execution: chrono::DateTime<chrono::Utc>,
) -> WmsResult<()> {
    for input_id in &op.inputs {
        let mut input = store.avatar(*input_id)?;
        input.retire(dt_execution);
        store.update_avatar(&input)?;
    }
    let outcome_id = *op
        .outcomes
        .first()
        .ok_or_else(|| WmsError::operation("assembly has no outcome placement"))?;
    let mut outcome = store.avatar(outcome_id)?;
    outcome.promote(dt_execution);
    store.update_avatar(&outcome)?;
    Ok(())
}

/// Read the specification for `(outcome_type, name)` from the type's
/// behaviour, as a defensive copy.
pub(crate) fn lookup_spec<S: TypeRegistry>(
    store: &S,
    outcome_type: &TypeCode,
    name: &str,
) -> WmsResult<AssemblySpec> {
    let gtype = store.goods_type(outcome_type)?;
    if gtype.behaviours.assembly.is_empty() {
        return Err(WmsError::operation(format!(
            "no assembly behaviour on type {outcome_type}"
        )));
    }
    gtype.assembly(name).cloned().ok_or_else(|| {
        WmsError::operation(format!("no such assembly: {name:?} for type {outcome_type}"))
    })
}

/// Read a property from `object` into the accumulator, forbidding conflicts.
fn extract_property(
    accumulator: &mut BTreeMap<String, Value>,
    object: &PhysObj,
    name: &str,
    spec_index: Option<usize>,
) -> WmsResult<()> {
    let Some(candidate) = object.get_property(name) else {
        return Ok(());
    };
    match accumulator.get(name) {
        None => {
            accumulator.insert(name.to_owned(), candidate.clone());
            Ok(())
        }
        Some(existing) if existing == candidate => Ok(()),
        Some(existing) => Err(WmsError::PropertyConflict {
            property: name.to_owned(),
            existing: existing.clone(),
            candidate: candidate.clone(),
            spec_index,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bag, dt, fixture, fixture_with_hooks, Fixture};
    use wareflow_core::AvatarState;
    use wareflow_goods::{GoodsType, InputSpec, PropertyRules};
    use serde_json::json;

    const PACK: &str = "pack";
    const NAME: &str = "default";

    fn register_pack(fx: &Fixture, spec: AssemblySpec) {
        fx.register(GoodsType::new("screen"));
        fx.register(GoodsType::new("board"));
        fx.register(GoodsType::new(PACK).with_assembly(NAME, spec));
    }

    fn screen_and_boards(spec: AssemblySpec) -> (Fixture, AvatarId, AvatarId, AvatarId) {
        let mut fx = fixture();
        register_pack(&fx, spec);
        let screen = fx.arrive("screen", 1, None);
        let b1 = fx.arrive("board", 1, None);
        let b2 = fx.arrive("board", 1, None);
        (fx, screen, b1, b2)
    }

    fn two_entry_spec() -> AssemblySpec {
        AssemblySpec::new(vec![InputSpec::new("screen", 1), InputSpec::new("board", 2)])
    }

    fn assemble_done(
        fx: &mut Fixture,
        inputs: Vec<AvatarId>,
    ) -> WmsResult<wareflow_core::OperationId> {
        fx.engine
            .create_assembly(OpState::Done, dt(9), inputs, TypeCode::from(PACK), NAME)
    }

    fn outcome_object(fx: &Fixture, op: wareflow_core::OperationId) -> PhysObj {
        let avatar = fx.engine.outcomes_of(op).unwrap().remove(0);
        fx.engine.store().object(avatar.object).unwrap()
    }

    #[test]
    fn matching_groups_inputs_per_spec_entry_regardless_of_input_order() {
        let (mut fx, screen, b1, b2) = screen_and_boards(two_entry_spec());
        let op = assemble_done(&mut fx, vec![b1, screen, b2]).unwrap();

        let groups = fx.engine.operation(op).unwrap().match_groups.clone();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec![screen]);
        assert_eq!(groups[1].len(), 2);
        assert!(groups[1].contains(&b1) && groups[1].contains(&b2));

        let outcome = fx.engine.outcomes_of(op).unwrap().remove(0);
        assert_eq!(outcome.state, AvatarState::Present);
        assert_eq!(outcome.location, fx.stock);
        for input in [screen, b1, b2] {
            assert_eq!(
                fx.engine.store().avatar(input).unwrap().state,
                AvatarState::Past
            );
        }
    }

    #[test]
    fn missing_expected_input_reports_the_spec_entry() {
        let (mut fx, screen, b1, _) = screen_and_boards(two_entry_spec());
        let err = assemble_done(&mut fx, vec![screen, b1]).unwrap_err();
        assert_eq!(
            err,
            WmsError::InputNotMatched {
                spec_index: 1,
                to_state: OpState::Done,
            }
        );
    }

    #[test]
    fn extra_inputs_are_rejected_unless_allowed() {
        let (mut fx, screen, b1, b2) = screen_and_boards(two_entry_spec());
        let extra = fx.arrive("screen", 1, None);
        let err = assemble_done(&mut fx, vec![screen, b1, b2, extra]).unwrap_err();
        assert_eq!(err, WmsError::ExtraInputs { count: 1 });

        let mut tolerant = two_entry_spec();
        tolerant.allow_extra = true;
        tolerant.for_contents = None;
        let (mut fx, screen, b1, b2) = screen_and_boards(tolerant);
        let extra = fx.arrive("screen", 1, None);
        let op = assemble_done(&mut fx, vec![screen, b1, b2, extra]).unwrap();
        assert_eq!(fx.engine.operation(op).unwrap().extra_input_ids(), vec![extra]);
    }

    #[test]
    fn per_entry_forward_sets_outcome_properties() {
        let mut spec = two_entry_spec();
        spec.inputs[0].forward_properties = vec!["serial".to_owned()];
        spec.for_contents = None;
        let mut fx = fixture();
        register_pack(&fx, spec);
        let screen = fx.arrive("screen", 1, Some(bag(&[("serial", json!("S-1"))])));
        let b1 = fx.arrive("board", 1, None);
        let b2 = fx.arrive("board", 1, None);

        let op = assemble_done(&mut fx, vec![screen, b1, b2]).unwrap();
        let outcome = outcome_object(&fx, op);
        assert_eq!(outcome.get_property("serial"), Some(&json!("S-1")));
    }

    #[test]
    fn conflicting_forwarded_values_are_rejected() {
        let mut spec = two_entry_spec();
        spec.inputs_properties.insert(
            OpState::Planned,
            PropertyRules {
                forward: vec!["po_ref".to_owned()],
                ..PropertyRules::default()
            },
        );
        let mut fx = fixture();
        register_pack(&fx, spec);
        let screen = fx.arrive("screen", 1, Some(bag(&[("po_ref", json!("PO-1"))])));
        let b1 = fx.arrive("board", 1, Some(bag(&[("po_ref", json!("PO-2"))])));
        let b2 = fx.arrive("board", 1, None);

        let err = assemble_done(&mut fx, vec![screen, b1, b2]).unwrap_err();
        assert!(matches!(
            err,
            WmsError::PropertyConflict { ref property, .. } if property == "po_ref"
        ));
    }

    #[test]
    fn agreeing_forwarded_values_are_forwarded_once() {
        let mut spec = two_entry_spec();
        spec.for_contents = None;
        spec.inputs_properties.insert(
            OpState::Planned,
            PropertyRules {
                forward: vec!["po_ref".to_owned()],
                ..PropertyRules::default()
            },
        );
        let mut fx = fixture();
        register_pack(&fx, spec);
        let shared = bag(&[("po_ref", json!("PO-1"))]);
        let screen = fx.arrive("screen", 1, Some(shared.clone()));
        let b1 = fx.arrive("board", 1, Some(shared.clone()));
        let b2 = fx.arrive("board", 1, Some(shared));

        let op = assemble_done(&mut fx, vec![screen, b1, b2]).unwrap();
        assert_eq!(
            outcome_object(&fx, op).get_property("po_ref"),
            Some(&json!("PO-1"))
        );
    }

    #[test]
    fn later_state_requirements_are_checked_on_execution() {
        let mut spec = two_entry_spec();
        spec.inputs[0].properties.insert(
            OpState::Done,
            PropertyRules {
                required: vec!["tested".to_owned()],
                ..PropertyRules::default()
            },
        );
        let mut fx = fixture();
        register_pack(&fx, spec);
        let screen = fx.arrive("screen", 1, None);
        let b1 = fx.arrive("board", 1, None);
        let b2 = fx.arrive("board", 1, None);

        // No requirement binds at planning time.
        let op = fx
            .engine
            .create_assembly(
                OpState::Planned,
                dt(10),
                vec![screen, b1, b2],
                TypeCode::from(PACK),
                NAME,
            )
            .unwrap();

        let err = fx.engine.execute(op, dt(11)).unwrap_err();
        let screen_obj = fx
            .engine
            .store()
            .object(fx.engine.store().avatar(screen).unwrap().object)
            .unwrap()
            .id;
        assert_eq!(
            err,
            WmsError::WrongInputProperties {
                object: screen_obj,
                required: vec!["tested".to_owned()],
                spec_index: Some(0),
            }
        );

        // Amending the object lets the same execution go through.
        let mut obj = fx.engine.store().object(screen_obj).unwrap();
        obj.update_properties([("tested".to_owned(), json!(true))]);
        fx.engine.store().update_object(&obj).unwrap();
        fx.engine.execute(op, dt(11)).unwrap();
        assert_eq!(fx.engine.operation(op).unwrap().state, OpState::Done);
    }

    #[test]
    fn global_requirements_report_no_spec_entry() {
        let mut spec = two_entry_spec();
        spec.inputs_properties.insert(
            OpState::Done,
            PropertyRules {
                required: vec!["cleared".to_owned()],
                ..PropertyRules::default()
            },
        );
        let mut fx = fixture();
        register_pack(&fx, spec);
        let screen = fx.arrive("screen", 1, None);
        let b1 = fx.arrive("board", 1, None);
        let b2 = fx.arrive("board", 1, None);
        let op = fx
            .engine
            .create_assembly(
                OpState::Planned,
                dt(10),
                vec![screen, b1, b2],
                TypeCode::from(PACK),
                NAME,
            )
            .unwrap();
        let err = fx.engine.execute(op, dt(11)).unwrap_err();
        assert!(matches!(
            err,
            WmsError::WrongInputProperties { spec_index: None, .. }
        ));
    }

    #[test]
    fn contents_descriptor_lists_extras_as_reusable_records() {
        let mut spec = two_entry_spec();
        spec.allow_extra = true;
        spec.for_contents = Some(ForContents(ContentsScope::Extra, ContentsForm::Records));
        spec.inputs_properties.insert(
            OpState::Planned,
            PropertyRules {
                forward: vec!["po_ref".to_owned()],
                ..PropertyRules::default()
            },
        );
        let mut fx = fixture();
        register_pack(&fx, spec);
        let screen = fx.arrive("screen", 1, None);
        let b1 = fx.arrive("board", 1, None);
        let b2 = fx.arrive("board", 1, None);
        let extra = fx.arrive(
            "screen",
            3,
            Some(bag(&[("po_ref", json!("PO-1")), ("grade", json!("B"))])),
        );
        let extra_obj = fx.engine.store().avatar(extra).unwrap().object;

        let op = assemble_done(&mut fx, vec![screen, b1, b2, extra]).unwrap();
        let outcome = outcome_object(&fx, op);
        assert_eq!(outcome.get_property("po_ref"), Some(&json!("PO-1")));

        let contents: Vec<UnpackOutcomeSpec> =
            serde_json::from_value(outcome.get_property(CONTENTS_PROPERTY).unwrap().clone())
                .unwrap();
        assert_eq!(contents.len(), 1);
        let entry = &contents[0];
        assert_eq!(entry.type_code, TypeCode::from("screen"));
        assert_eq!(entry.quantity, 3);
        assert_eq!(entry.local_goods_ids, Some(vec![extra_obj]));
        // Forwarded properties become forward directives, the rest is
        // embedded verbatim.
        assert_eq!(entry.forward_properties.names(), ["po_ref"]);
        assert_eq!(
            entry.properties,
            Some(BTreeMap::from([("grade".to_owned(), json!("B"))]))
        );
    }

    #[test]
    fn contents_descriptor_is_absent_when_nothing_is_listed() {
        let (mut fx, screen, b1, b2) = screen_and_boards(two_entry_spec());
        let op = assemble_done(&mut fx, vec![screen, b1, b2]).unwrap();
        // Default policy lists extras only; there are none.
        assert_eq!(outcome_object(&fx, op).get_property(CONTENTS_PROPERTY), None);
    }

    #[test]
    fn outcome_expressions_accumulate_across_lifecycle_states() {
        let mut spec = two_entry_spec();
        spec.for_contents = None;
        spec.outcome_properties.insert(
            OpState::Planned,
            BTreeMap::from([("planned_at".to_owned(), TypedExpr::constant("plan"))]),
        );
        spec.outcome_properties.insert(
            OpState::Started,
            BTreeMap::from([("started_at".to_owned(), TypedExpr::constant("start"))]),
        );
        spec.outcome_properties.insert(
            OpState::Done,
            BTreeMap::from([("done_at".to_owned(), TypedExpr::constant("end"))]),
        );
        let mut fx = fixture();
        register_pack(&fx, spec);
        let screen = fx.arrive("screen", 1, None);
        let b1 = fx.arrive("board", 1, None);
        let b2 = fx.arrive("board", 1, None);

        let op = fx
            .engine
            .create_assembly(
                OpState::Planned,
                dt(10),
                vec![screen, b1, b2],
                TypeCode::from(PACK),
                NAME,
            )
            .unwrap();
        let outcome = outcome_object(&fx, op);
        assert_eq!(outcome.get_property("planned_at"), Some(&json!("plan")));
        assert_eq!(outcome.get_property("started_at"), None);

        fx.engine.start(op, dt(10)).unwrap();
        let outcome = outcome_object(&fx, op);
        assert_eq!(outcome.get_property("started_at"), Some(&json!("start")));
        assert_eq!(outcome.get_property("done_at"), None);

        fx.engine.execute(op, dt(11)).unwrap();
        let outcome = outcome_object(&fx, op);
        assert_eq!(outcome.get_property("done_at"), Some(&json!("end")));
    }

    #[test]
    fn direct_to_done_creation_applies_every_state_expression() {
        let mut spec = two_entry_spec();
        spec.for_contents = None;
        spec.outcome_properties.insert(
            OpState::Started,
            BTreeMap::from([("started_at".to_owned(), TypedExpr::constant("start"))]),
        );
        spec.outcome_properties.insert(
            OpState::Done,
            BTreeMap::from([("done_at".to_owned(), TypedExpr::constant("end"))]),
        );
        let (mut fx, screen, b1, b2) = screen_and_boards(spec);
        let op = assemble_done(&mut fx, vec![screen, b1, b2]).unwrap();
        let outcome = outcome_object(&fx, op);
        assert_eq!(outcome.get_property("started_at"), Some(&json!("start")));
        assert_eq!(outcome.get_property("done_at"), Some(&json!("end")));
    }

    #[test]
    fn sequence_expressions_draw_from_the_named_counter() {
        let mut spec = two_entry_spec();
        spec.for_contents = None;
        spec.outcome_properties.insert(
            OpState::Done,
            BTreeMap::from([("serial".to_owned(), TypedExpr::sequence("PACK_SER"))]),
        );
        let (mut fx, screen, b1, b2) = screen_and_boards(spec);
        let op = assemble_done(&mut fx, vec![screen, b1, b2]).unwrap();
        assert_eq!(outcome_object(&fx, op).get_property("serial"), Some(&json!(1)));

        let screen = fx.arrive("screen", 1, None);
        let b1 = fx.arrive("board", 1, None);
        let b2 = fx.arrive("board", 1, None);
        let op = assemble_done(&mut fx, vec![screen, b1, b2]).unwrap();
        assert_eq!(outcome_object(&fx, op).get_property("serial"), Some(&json!(2)));
    }

    #[test]
    fn unknown_expression_kind_is_rejected() {
        let mut spec = two_entry_spec();
        spec.outcome_properties.insert(
            OpState::Done,
            BTreeMap::from([(
                "serial".to_owned(),
                TypedExpr("interpolate".to_owned(), json!("x")),
            )]),
        );
        let (mut fx, screen, b1, b2) = screen_and_boards(spec);
        let err = assemble_done(&mut fx, vec![screen, b1, b2]).unwrap_err();
        assert_eq!(err, WmsError::UnknownExpressionType("interpolate".to_owned()));
    }

    #[test]
    fn hook_entries_overwrite_assembled_properties() {
        let mut hooks = AssemblyHooks::new();
        hooks.register(NAME, |assembled: &PropertyBag, _: OpState, _: bool| {
            let grade = if assembled.contains("po_ref") { "A" } else { "B" };
            Ok(vec![
                ("grade".to_owned(), json!(grade)),
                ("inspected".to_owned(), json!(true)),
            ])
        });
        let mut spec = two_entry_spec();
        spec.for_contents = None;
        spec.outcome_properties.insert(
            OpState::Done,
            BTreeMap::from([("inspected".to_owned(), TypedExpr::constant(false))]),
        );
        let mut fx = fixture_with_hooks(hooks);
        register_pack(&fx, spec);
        let screen = fx.arrive("screen", 1, None);
        let b1 = fx.arrive("board", 1, None);
        let b2 = fx.arrive("board", 1, None);

        let op = assemble_done(&mut fx, vec![screen, b1, b2]).unwrap();
        let outcome = outcome_object(&fx, op);
        assert_eq!(outcome.get_property("grade"), Some(&json!("B")));
        // The hook runs last and wins over the expression.
        assert_eq!(outcome.get_property("inspected"), Some(&json!(true)));
    }

    #[test]
    fn unknown_assembly_name_is_an_operation_error() {
        let (mut fx, screen, b1, b2) = screen_and_boards(two_entry_spec());
        let err = fx
            .engine
            .create_assembly(
                OpState::Done,
                dt(9),
                vec![screen, b1, b2],
                TypeCode::from(PACK),
                "soldering",
            )
            .unwrap_err();
        assert!(matches!(err, WmsError::Operation(_)));
    }
}
