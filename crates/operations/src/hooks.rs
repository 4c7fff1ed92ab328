//! Name-dispatched extension hooks for assemblies.
//!
//! Configuration covers the common property manipulations; logic too
//! specific for configuration is registered here per assembly name. The hook
//! runs last during outcome-property building and its entries overwrite on
//! collision (no conflict checking).

use std::collections::HashMap;

use serde_json::Value;

use wareflow_core::{OpState, PropertyBag, WmsResult};

/// Per-assembly-name extension point, called near the end of
/// outcome-property building.
///
/// `assembled` is the property set built so far; the returned entries are
/// applied on top of it with higher precedence than any other source.
pub trait AssemblyHook: Send + Sync {
    fn build_outcome_properties(
        &self,
        assembled: &PropertyBag,
        to_state: OpState,
        for_creation: bool,
    ) -> WmsResult<Vec<(String, Value)>>;
}

impl<F> AssemblyHook for F
where
    F: Fn(&PropertyBag, OpState, bool) -> WmsResult<Vec<(String, Value)>> + Send + Sync,
{
    fn build_outcome_properties(
        &self,
        assembled: &PropertyBag,
        to_state: OpState,
        for_creation: bool,
    ) -> WmsResult<Vec<(String, Value)>> {
        self(assembled, to_state, for_creation)
    }
}

/// Lookup table from formatted assembly name to hook.
///
/// Absence of an entry is a no-op, not an error.
#[derive(Default)]
pub struct AssemblyHooks {
    entries: HashMap<String, Box<dyn AssemblyHook>>,
}

impl AssemblyHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed pattern assembly names are formatted into for dispatch.
    fn key_for(assembly_name: &str) -> String {
        format!("build_outcome_properties_{assembly_name}")
    }

    pub fn register(&mut self, assembly_name: &str, hook: impl AssemblyHook + 'static) {
        self.entries.insert(Self::key_for(assembly_name), Box::new(hook));
    }

    pub fn lookup(&self, assembly_name: &str) -> Option<&dyn AssemblyHook> {
        self.entries.get(&Self::key_for(assembly_name)).map(|b| b.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl core::fmt::Debug for AssemblyHooks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AssemblyHooks")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_misses_are_not_errors() {
        let hooks = AssemblyHooks::new();
        assert!(hooks.lookup("soldering").is_none());
    }

    #[test]
    fn registered_hook_is_found_under_its_assembly_name() {
        let mut hooks = AssemblyHooks::new();
        hooks.register("soldering", |_: &PropertyBag, _: OpState, _: bool| {
            Ok(vec![("welded".to_owned(), Value::Bool(true))])
        });
        let hook = hooks.lookup("soldering").unwrap();
        let updates = hook
            .build_outcome_properties(&PropertyBag::new(), OpState::Done, false)
            .unwrap();
        assert_eq!(updates, vec![("welded".to_owned(), Value::Bool(true))]);
        assert!(hooks.lookup("packing").is_none());
    }
}
