//! Parameter binder: derives one node's full parameter map and drives block
//! resolution plus substitution over its three render buffers.
//!
//! ## Key Invariants
//!
//! 1. Declared names missing from the node's bindings resolve to `""`, so
//!    toggle blocks keyed on them collapse.
//! 2. Reserved names are assigned here and never read from the fragment
//!    schema: `ID`, `parentID_<n>`, `childrenLength`, `childIndex`,
//!    `cframework`, `ts`.
//! 3. `childIndex` enters the map (and the `{%param%}` JSON) with the node's
//!    bound order value, but its buffer tokens are left for the composing
//!    parent, which rewrites them with the final 0-based position.
//! 4. Names resolve one at a time, blocks first and then the literal, so
//!    content revealed by one name is never scanned as another's tokens.

use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::model::Node;
use crate::placeholder::{resolve_blocks, substitute};
use crate::render::RenderError;

/// Binder switches. `suppress_runtime` is set by the assembler: a reusable
/// fragment must not bake a render-time timestamp or param literal.
#[derive(Debug, Clone, Copy, Default)]
pub struct BindOptions {
    pub suppress_runtime: bool,
}

/// Coerce a bound value to canonical literal text. Strings pass through,
/// numbers and booleans stringify; anything else is unsupported and leaves
/// its placeholders unresolved.
fn coerce(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Build the full parameter map for `node`: every schema-declared name plus
/// the reserved set. `ancestors` holds ancestor identifiers nearest-first,
/// already truncated to the render set.
pub fn build_param_map(
    node: &Node,
    ancestors: &[String],
    opts: BindOptions,
) -> Result<BTreeMap<String, String>, RenderError> {
    let fragment = node
        .fragment
        .as_ref()
        .ok_or_else(|| RenderError::UnresolvedFragment {
            node: node.id.clone(),
        })?;

    let mut map = BTreeMap::new();

    for decl in &fragment.params {
        match node.bindings.get(&decl.name) {
            Some(value) => match coerce(value) {
                Some(text) => {
                    map.insert(decl.name.clone(), text);
                }
                None => {
                    warn!(
                        "node {}: unsupported value kind for parameter '{}', left unresolved",
                        node.id, decl.name
                    );
                }
            },
            None => {
                map.insert(decl.name.clone(), String::new());
            }
        }
    }

    map.insert("ID".to_string(), node.id.clone());
    for (depth, ancestor) in ancestors.iter().enumerate() {
        map.insert(format!("parentID_{}", depth), ancestor.clone());
    }
    if !node.children.is_empty() {
        map.insert("childrenLength".to_string(), node.children.len().to_string());
    }
    map.insert("childIndex".to_string(), node.order.to_string());
    map.insert("cframework".to_string(), String::new());
    if !opts.suppress_runtime {
        map.insert("ts".to_string(), unix_timestamp().to_string());
    }

    Ok(map)
}

/// Run the full bind pass over `node`'s buffers: inject the `{%param%}` JSON
/// literal into the script stream, then resolve blocks and substitute for
/// every name in the map except the deferred `childIndex`.
pub fn bind_node(
    node: &mut Node,
    ancestors: &[String],
    opts: BindOptions,
) -> Result<(), RenderError> {
    let map = build_param_map(node, ancestors, opts)?;
    debug!("binding node {} ({} names)", node.id, map.len());

    if !opts.suppress_runtime {
        // Compact literal, script stream only.
        let literal = serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string());
        node.buffers.script = substitute(&node.buffers.script, "param", &literal);
    }

    for (name, value) in &map {
        if name == "childIndex" {
            continue;
        }
        node.buffers.apply(|text| {
            let resolved = resolve_blocks(text, name, value);
            substitute(&resolved, name, value)
        });
    }

    Ok(())
}
