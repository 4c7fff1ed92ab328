//! Per-type behaviour configuration.
//!
//! Behaviours are loaded once per goods type and treated as immutable by the
//! engine, which takes defensive copies before any local list mutation. The
//! serde shapes mirror the JSON behaviour documents these configurations are
//! exchanged as.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wareflow_core::{ObjectId, OpState, TypeCode};

/// A goods type and its behaviour configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodsType {
    pub code: TypeCode,
    #[serde(default)]
    pub behaviours: Behaviours,
}

impl GoodsType {
    pub fn new(code: impl Into<TypeCode>) -> Self {
        Self {
            code: code.into(),
            behaviours: Behaviours::default(),
        }
    }

    pub fn with_unpack(mut self, unpack: UnpackBehaviour) -> Self {
        self.behaviours.unpack = Some(unpack);
        self
    }

    pub fn with_assembly(mut self, name: impl Into<String>, spec: AssemblySpec) -> Self {
        self.behaviours.assembly.insert(name.into(), spec);
        self
    }

    /// The assembly specification registered under `name`, if any.
    pub fn assembly(&self, name: &str) -> Option<&AssemblySpec> {
        self.behaviours.assembly.get(name)
    }

    pub fn unpack(&self) -> Option<&UnpackBehaviour> {
        self.behaviours.unpack.as_ref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Behaviours {
    /// Assembly specifications, keyed by assembly name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub assembly: BTreeMap<String, AssemblySpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unpack: Option<UnpackBehaviour>,
}

/// `check` or `match` directive for input requirements; `match` re-runs the
/// input matcher, `check` only validates the persisted match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOrMatch {
    Check,
    Match,
}

/// Property rules applied while reaching a given operation state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyRules {
    /// Properties that must be present, whatever their value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Property key/value pairs that must be borne exactly.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub required_values: BTreeMap<String, Value>,
    /// Properties to forward to the outcome.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forward: Vec<String>,
}

/// A typed outcome-property expression: `("const", value)` or
/// `("sequence", "SEQ_NAME")`.
///
/// Kept as an open `(kind, argument)` pair rather than a closed enum so that
/// configuration with an unknown kind is representable and rejected at
/// evaluation time with a dedicated error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedExpr(pub String, pub Value);

impl TypedExpr {
    pub const CONST: &'static str = "const";
    pub const SEQUENCE: &'static str = "sequence";

    pub fn constant(value: impl Into<Value>) -> Self {
        Self(Self::CONST.to_owned(), value.into())
    }

    pub fn sequence(name: impl Into<String>) -> Self {
        Self(Self::SEQUENCE.to_owned(), Value::String(name.into()))
    }
}

/// Which inputs the contents descriptor lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentsScope {
    All,
    Extra,
}

/// How the contents descriptor lists them.
///
/// `Records` additionally embeds the source object ids, so that a later
/// unpack reuses the very same object records instead of minting new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentsForm {
    Descriptions,
    Records,
}

/// The `for_contents` pair of an assembly specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForContents(pub ContentsScope, pub ContentsForm);

impl Default for ForContents {
    fn default() -> Self {
        Self(ContentsScope::Extra, ContentsForm::Records)
    }
}

fn default_for_contents() -> Option<ForContents> {
    Some(ForContents::default())
}

/// One expected-input entry of an assembly specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    #[serde(rename = "type")]
    pub type_code: TypeCode,
    pub quantity: usize,
    /// Properties forwarded from inputs matched by this entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forward_properties: Vec<String>,
    /// Per-state matching/checking rules for this entry.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<OpState, PropertyRules>,
}

impl InputSpec {
    pub fn new(type_code: impl Into<TypeCode>, quantity: usize) -> Self {
        Self {
            type_code: type_code.into(),
            quantity,
            forward_properties: Vec::new(),
            properties: BTreeMap::new(),
        }
    }
}

/// An assembly specification, read from the outcome type's behaviour by
/// `(type, name)` and never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblySpec {
    /// Ordered expected-input entries.
    pub inputs: Vec<InputSpec>,
    /// Per-state check-or-match directive. `planned` defaults to `match`,
    /// the other states to `check`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs_spec_type: BTreeMap<OpState, CheckOrMatch>,
    /// Global per-state property rules applied to every input.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs_properties: BTreeMap<OpState, PropertyRules>,
    /// Per-state typed expressions setting properties on the outcome.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outcome_properties: BTreeMap<OpState, BTreeMap<String, TypedExpr>>,
    /// Contents-export policy; `None` disables the contents descriptor.
    #[serde(default = "default_for_contents")]
    pub for_contents: Option<ForContents>,
    /// Whether inputs beyond the expected entries are tolerated.
    #[serde(default)]
    pub allow_extra: bool,
}

impl AssemblySpec {
    pub fn new(inputs: Vec<InputSpec>) -> Self {
        Self {
            inputs,
            inputs_spec_type: BTreeMap::new(),
            inputs_properties: BTreeMap::new(),
            outcome_properties: BTreeMap::new(),
            for_contents: default_for_contents(),
            allow_extra: false,
        }
    }
}

/// The `"clone"` marker usable in place of a forward-property list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloneMarker {
    Clone,
}

/// Forwarding directive of an unpack outcome: either share the input's
/// property bag wholesale, or forward the named properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForwardSpec {
    Marker(CloneMarker),
    Properties(Vec<String>),
}

impl ForwardSpec {
    pub fn clone_bag() -> Self {
        Self::Marker(CloneMarker::Clone)
    }

    pub fn is_clone(&self) -> bool {
        matches!(self, Self::Marker(CloneMarker::Clone))
    }

    pub fn names(&self) -> &[String] {
        match self {
            Self::Marker(_) => &[],
            Self::Properties(names) => names,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Properties(names) if names.is_empty())
    }

    /// Append names; a no-op on the clone marker.
    pub fn extend(&mut self, names: impl IntoIterator<Item = String>) {
        if let Self::Properties(existing) = self {
            existing.extend(names);
        }
    }
}

impl Default for ForwardSpec {
    fn default() -> Self {
        Self::Properties(Vec::new())
    }
}

/// One outcome of an unpack, from the type behaviour, from the input's
/// contents descriptor, or synthesized by an assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnpackOutcomeSpec {
    #[serde(rename = "type")]
    pub type_code: TypeCode,
    /// Unit multiplier: outcome quantity is this times the unpack quantity.
    pub quantity: i64,
    /// Properties set directly on the outcome, overridden by forwarded ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "ForwardSpec::is_empty")]
    pub forward_properties: ForwardSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_properties: Vec<String>,
    /// Existing object records to reuse instead of minting new ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_goods_ids: Option<Vec<ObjectId>>,
}

impl UnpackOutcomeSpec {
    pub fn new(type_code: impl Into<TypeCode>, quantity: i64) -> Self {
        Self {
            type_code: type_code.into(),
            quantity,
            properties: None,
            forward_properties: ForwardSpec::default(),
            required_properties: Vec::new(),
            local_goods_ids: None,
        }
    }

    pub fn forwarding(mut self, names: &[&str]) -> Self {
        self.forward_properties = ForwardSpec::Properties(
            names.iter().map(|n| (*n).to_owned()).collect(),
        );
        self
    }

    pub fn requiring(mut self, names: &[&str]) -> Self {
        self.required_properties = names.iter().map(|n| (*n).to_owned()).collect();
        self
    }
}

/// The `unpack` behaviour of a goods type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnpackBehaviour {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outcomes: Vec<UnpackOutcomeSpec>,
    /// When set, every outcome shares the input's property bag by reference
    /// and all per-property computation is skipped.
    #[serde(default)]
    pub uniform_outcomes: bool,
    /// Forward list merged into every non-clone outcome.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forward_properties: Vec<String>,
    /// Required list merged into every non-clone outcome.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_properties: Vec<String>,
    /// Name of the assembly able to revert this unpack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_assembly: Option<String>,
}

impl UnpackBehaviour {
    pub fn new(outcomes: Vec<UnpackOutcomeSpec>) -> Self {
        Self {
            outcomes,
            ..Self::default()
        }
    }
}
