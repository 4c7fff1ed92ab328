//! Merging of state-keyed configuration over lifecycle state jumps.
//!
//! Behaviour parameters are keyed by the operation state at which they
//! apply. When an operation jumps from one state to another (possibly
//! skipping intermediate states, e.g. created directly `done`), the
//! parameters of every crossed state are merged: sets by union, mappings by
//! overlay (later states win on a recurring key), and check-or-match
//! directives by "match dominates check".

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use wareflow_core::OpState;
use wareflow_goods::{CheckOrMatch, PhysObj, PropertyRules};

/// Union of a set-typed parameter across the `(from, to]` interval.
pub fn merge_set<T: Clone + Ord>(
    spec: &BTreeMap<OpState, Vec<T>>,
    from: Option<OpState>,
    to: OpState,
) -> BTreeSet<T> {
    let mut merged = BTreeSet::new();
    for state in OpState::interval(from, to) {
        if let Some(step) = spec.get(state) {
            merged.extend(step.iter().cloned());
        }
    }
    merged
}

/// Overlay of a mapping-typed parameter across the `(from, to]` interval.
pub fn merge_map<K: Clone + Ord, V: Clone>(
    spec: &BTreeMap<OpState, BTreeMap<K, V>>,
    from: Option<OpState>,
    to: OpState,
) -> BTreeMap<K, V> {
    let mut merged = BTreeMap::new();
    for state in OpState::interval(from, to) {
        if let Some(step) = spec.get(state) {
            merged.extend(step.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    merged
}

/// `true` iff any state in the `(from, to]` interval requests a match.
pub fn merge_check_or_match(
    spec: &BTreeMap<OpState, CheckOrMatch>,
    from: Option<OpState>,
    to: OpState,
) -> bool {
    OpState::interval(from, to)
        .iter()
        .any(|state| spec.get(state) == Some(&CheckOrMatch::Match))
}

/// Property rules merged over a state jump.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedRules {
    pub required: BTreeSet<String>,
    pub required_values: BTreeMap<String, Value>,
    pub forward: BTreeSet<String>,
}

impl MergedRules {
    /// Whether an object bears every required property and value.
    pub fn satisfied_by(&self, object: &PhysObj) -> bool {
        object.has_properties(self.required.iter().map(String::as_str))
            && object.has_property_values(&self.required_values)
    }

    pub fn required_names(&self) -> Vec<String> {
        self.required.iter().cloned().collect()
    }
}

/// Merge the `required`/`required_values`/`forward` sub-parameters of
/// state-keyed property rules over the `(from, to]` interval.
pub fn merge_rules(
    spec: &BTreeMap<OpState, PropertyRules>,
    from: Option<OpState>,
    to: OpState,
) -> MergedRules {
    let mut merged = MergedRules::default();
    for state in OpState::interval(from, to) {
        if let Some(step) = spec.get(state) {
            merged.required.extend(step.required.iter().cloned());
            merged
                .required_values
                .extend(step.required_values.iter().map(|(k, v)| (k.clone(), v.clone())));
            merged.forward.extend(step.forward.iter().cloned());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn set_spec_at(state: OpState, items: &[&str]) -> BTreeMap<OpState, Vec<String>> {
        let mut spec = BTreeMap::new();
        spec.insert(state, items.iter().map(|s| (*s).to_owned()).collect());
        spec
    }

    #[test]
    fn set_param_at_started_is_included_when_interval_starts_before_it() {
        let spec = set_spec_at(OpState::Started, &["foo"]);
        assert!(merge_set(&spec, None, OpState::Done).contains("foo"));
        assert!(merge_set(&spec, Some(OpState::Planned), OpState::Done).contains("foo"));
    }

    #[test]
    fn set_param_at_started_is_excluded_when_interval_starts_at_it() {
        let spec = set_spec_at(OpState::Started, &["foo"]);
        assert!(merge_set(&spec, Some(OpState::Started), OpState::Done).is_empty());
    }

    #[test]
    fn empty_spec_merges_to_empty_values() {
        let spec: BTreeMap<OpState, Vec<String>> = BTreeMap::new();
        assert!(merge_set(&spec, None, OpState::Done).is_empty());
        let map_spec: BTreeMap<OpState, BTreeMap<String, Value>> = BTreeMap::new();
        assert!(merge_map(&map_spec, None, OpState::Done).is_empty());
        let cm_spec: BTreeMap<OpState, CheckOrMatch> = BTreeMap::new();
        assert!(!merge_check_or_match(&cm_spec, None, OpState::Done));
    }

    #[test]
    fn mapping_keys_from_later_states_win() {
        let mut spec = BTreeMap::new();
        spec.insert(
            OpState::Planned,
            BTreeMap::from([("serial".to_owned(), json!(1)), ("origin".to_owned(), json!("FR"))]),
        );
        spec.insert(OpState::Done, BTreeMap::from([("serial".to_owned(), json!(2))]));
        let merged = merge_map(&spec, None, OpState::Done);
        assert_eq!(merged["serial"], json!(2));
        assert_eq!(merged["origin"], json!("FR"));
    }

    #[test]
    fn match_dominates_check() {
        let mut spec = BTreeMap::new();
        spec.insert(OpState::Planned, CheckOrMatch::Check);
        spec.insert(OpState::Started, CheckOrMatch::Match);
        spec.insert(OpState::Done, CheckOrMatch::Check);
        assert!(merge_check_or_match(&spec, None, OpState::Done));
        assert!(merge_check_or_match(&spec, Some(OpState::Planned), OpState::Started));
        assert!(!merge_check_or_match(&spec, Some(OpState::Started), OpState::Done));
    }

    #[test]
    fn rules_merge_all_three_sub_parameters() {
        let mut spec = BTreeMap::new();
        spec.insert(
            OpState::Planned,
            PropertyRules {
                required: vec!["x".to_owned()],
                ..PropertyRules::default()
            },
        );
        spec.insert(
            OpState::Done,
            PropertyRules {
                forward: vec!["foo".to_owned()],
                required_values: BTreeMap::from([("x".to_owned(), json!(true))]),
                ..PropertyRules::default()
            },
        );
        let merged = merge_rules(&spec, None, OpState::Done);
        assert!(merged.required.contains("x"));
        assert!(merged.forward.contains("foo"));
        assert_eq!(merged.required_values["x"], json!(true));
    }

    fn arb_state() -> impl Strategy<Value = OpState> {
        prop_oneof![
            Just(OpState::Planned),
            Just(OpState::Started),
            Just(OpState::Done)
        ]
    }

    proptest! {
        // Widening the interval on the left never loses contributions.
        #[test]
        fn merged_set_shrinks_as_interval_start_advances(
            keyed in proptest::collection::btree_map(
                arb_state(),
                proptest::collection::vec("[a-z]{1,4}", 0..4),
                0..4,
            ),
            to in arb_state(),
        ) {
            let from_creation = merge_set(&keyed, None, to);
            let from_planned = merge_set(&keyed, Some(OpState::Planned), to);
            let from_started = merge_set(&keyed, Some(OpState::Started), to);
            prop_assert!(from_planned.is_subset(&from_creation));
            prop_assert!(from_started.is_subset(&from_planned));
        }

        // Merging to `done` from creation sees every state's contribution.
        #[test]
        fn creation_to_done_is_the_full_union(
            keyed in proptest::collection::btree_map(
                arb_state(),
                proptest::collection::vec("[a-z]{1,4}", 0..4),
                0..4,
            ),
        ) {
            let merged = merge_set(&keyed, None, OpState::Done);
            for items in keyed.values() {
                for item in items {
                    prop_assert!(merged.contains(item));
                }
            }
        }
    }
}
