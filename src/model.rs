//! Data model for the render/assembly engine.
//!
//! Fragments are immutable template sources; nodes instantiate them inside a
//! page tree. The engine never loads anything: callers attach the resolved
//! `Fragment` to each `Node` before handing the set over, and persist the
//! rendered buffers afterwards.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Parameter names owned by the engine. A fragment schema must never declare
/// these; the binder assigns them on every render pass.
pub const RESERVED_PARAMS: &[&str] = &[
    "ID",
    "children",
    "childrenLength",
    "childIndex",
    "cframework",
    "ts",
    "param",
];

/// Whether `name` is reserved (fixed list plus the `parentID_<depth>` family).
pub fn is_reserved_param(name: &str) -> bool {
    RESERVED_PARAMS.contains(&name) || name.starts_with("parentID_")
}

/// One declared parameter of a fragment schema. The sample value is for
/// editor tooling only; the engine ignores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamDecl {
    pub name: String,
    #[serde(default)]
    pub sample: String,
}

/// A reusable, parameterized template source with markup/style/script bodies.
/// Immutable once published; referenced (never embedded) by nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub id: String,
    #[serde(default)]
    pub markup: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
}

impl Fragment {
    /// Declared parameter names that collide with reserved names. The
    /// surrounding system rejects such fragments at save time; the engine
    /// only reports.
    pub fn reserved_violations(&self) -> Vec<&str> {
        self.params
            .iter()
            .map(|p| p.name.as_str())
            .filter(|n| is_reserved_param(n))
            .collect()
    }
}

/// Engine-owned scratch copies of a fragment's three bodies. Discarded after
/// the caller has persisted the output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderBuffers {
    pub markup: String,
    pub style: String,
    pub script: String,
}

impl RenderBuffers {
    pub fn from_fragment(fragment: &Fragment) -> Self {
        RenderBuffers {
            markup: fragment.markup.clone(),
            style: fragment.style.clone(),
            script: fragment.script.clone(),
        }
    }

    /// Apply `f` to each of the three buffers in place.
    pub fn apply<F: Fn(&str) -> String>(&mut self, f: F) {
        self.markup = f(&self.markup);
        self.style = f(&self.style);
        self.script = f(&self.script);
    }
}

/// One instantiation of a fragment inside a page tree.
///
/// Identity and bindings are caller-supplied. `buffers` and `children` are
/// derived render state, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    /// Empty string means this node is a page root.
    #[serde(default)]
    pub parent_id: String,
    /// Sibling-order value, unique within one parent.
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub fragment_id: String,
    /// Resolved by the caller before rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<Fragment>,
    /// Parameter name -> concrete value. String/number/bool values coerce to
    /// literal text; other kinds leave their placeholders unresolved.
    #[serde(default)]
    pub bindings: HashMap<String, Value>,
    #[serde(skip)]
    pub buffers: RenderBuffers,
    #[serde(skip)]
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(id: impl Into<String>, parent_id: impl Into<String>, order: i64) -> Self {
        Node {
            id: id.into(),
            parent_id: parent_id.into(),
            order,
            fragment_id: String::new(),
            fragment: None,
            bindings: HashMap::new(),
            buffers: RenderBuffers::default(),
            children: Vec::new(),
        }
    }

    pub fn with_fragment(mut self, fragment: Fragment) -> Self {
        self.fragment_id = fragment.id.clone();
        self.fragment = Some(fragment);
        self
    }

    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_empty()
    }
}

/// Declares that a node instantiating `parent_fragment` may contain, under
/// `slot`, between `min` and `max` children instantiating `child_fragment`.
/// Consulted by the editor when building a tree; the engine never enforces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRule {
    pub parent_fragment: String,
    pub child_fragment: String,
    #[serde(default)]
    pub slot: String,
    pub min: u32,
    pub max: u32,
    /// Sample binding for editor tooling.
    #[serde(default)]
    pub sample_bindings: HashMap<String, Value>,
}

impl PlacementRule {
    pub fn admits(&self, count: u32) -> bool {
        count >= self.min && count <= self.max
    }
}

/// Page lifecycle states. At most one snapshot occupies `Published` or
/// `Archived` at a time; the publish/rollback transaction around that is
/// caller territory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Edit,
    Published,
    Archived,
}

/// File extension for persisting a rendered markup stream. Markup carrying a
/// `<?` processing marker must be served through the interpreter.
pub fn markup_extension(markup: &str) -> &'static str {
    if markup.contains("<?") {
        "php"
    } else {
        "html"
    }
}
