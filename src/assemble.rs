//! Hygienic assembler: merges one connected subtree into a single node whose
//! buffers can be saved as a new reusable fragment.
//!
//! ## Key Invariants
//!
//! 1. Identifier retemplating: the root renders as the bare `{%ID%}` token,
//!    every descendant as `{%ID%}_<original-id>`, so each future
//!    instantiation of the merged fragment namespaces its descendants by
//!    whatever identity the instantiator supplies.
//! 2. Parameters listed in a node's rename table survive the merge under
//!    their alias as open parameters; everything else is baked in with the
//!    node's concrete bindings.
//! 3. A same-named rename (alias == original, merging equally named
//!    parameters from different source nodes into one shared slot) goes
//!    through a node-local scratch name: original -> scratch before the
//!    bind pass, surviving scratch tokens -> original after it. Without the
//!    indirection the bind pass would bake the declared original, and a
//!    different rename in the same batch could capture identical-looking
//!    tokens mid-substitution.
//! 4. Runtime side effects are suppressed: no `ts` value, no `{%param%}`
//!    literal. A reusable fragment must not bake a render-time timestamp.
//! 5. The pseudo-entry `"children"` in a rename table leaves that node's
//!    `{%children%}` untouched as an open extension slot; its children are
//!    not inlined.

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::collections::HashMap;

use crate::binder::{bind_node, BindOptions};
use crate::model::{Fragment, Node, ParamDecl};
use crate::placeholder::rename_token;
use crate::render::{
    check_parent_refs, check_sibling_orders, finalize_child_index, partition, seed_buffers,
    splice_children, RenderError,
};

/// Original parameter name -> desired alias for one node, plus the optional
/// `"children"` pseudo-entry.
pub type RenameTable = HashMap<String, String>;

/// Result of a merge: one node whose buffers hold the new fragment bodies.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub node: Node,
    /// First fragment id seen per original node id. Diagnostics for editor
    /// tooling; nothing in the engine reads it.
    pub fragment_usage: HashMap<String, String>,
}

impl Assembly {
    /// Package the merged buffers as a fragment. The caller supplies the new
    /// identifier and the surviving parameter schema (the aliases).
    pub fn into_fragment(self, id: impl Into<String>, params: Vec<ParamDecl>) -> Fragment {
        Fragment {
            id: id.into(),
            markup: self.node.buffers.markup,
            style: self.node.buffers.style,
            script: self.node.buffers.script,
            params,
        }
    }
}

lazy_static! {
    static ref NON_IDENT_RE: Regex = Regex::new(r"[^A-Za-z0-9_]").expect("ident pattern");
}

/// Node-local scratch name for a same-named rename.
fn scratch_name(param: &str, node_id: &str) -> String {
    let clean = NON_IDENT_RE.replace_all(node_id, "_");
    format!("{}__{}__tmp", param, clean)
}

/// Merge one connected subtree (exactly one parentless node) into a single
/// node. `renames` maps original node ids to their rename tables.
pub fn assemble(
    mut nodes: Vec<Node>,
    renames: &HashMap<String, RenameTable>,
) -> Result<Assembly, RenderError> {
    debug!("assembling {} nodes into one fragment", nodes.len());
    seed_buffers(&mut nodes)?;
    check_parent_refs(&nodes)?;

    let (mut roots, mut by_parent) = partition(nodes);
    if roots.is_empty() {
        return Err(RenderError::NoRoot);
    }
    if roots.len() > 1 {
        let mut ids: Vec<String> = roots.iter().map(|r| r.id.clone()).collect();
        ids.sort();
        return Err(RenderError::MultipleRoots { roots: ids });
    }
    let root = roots.pop().expect("one root");

    let mut fragment_usage = HashMap::new();
    let node = assemble_node(root, &mut by_parent, &[], renames, true, &mut fragment_usage)?;
    Ok(Assembly {
        node,
        fragment_usage,
    })
}

fn assemble_node(
    mut node: Node,
    by_parent: &mut HashMap<String, Vec<Node>>,
    ancestors: &[String],
    renames: &HashMap<String, RenameTable>,
    is_root: bool,
    fragment_usage: &mut HashMap<String, String>,
) -> Result<Node, RenderError> {
    let orig_id = node.id.clone();
    let fragment_id = node
        .fragment
        .as_ref()
        .map(|f| f.id.clone())
        .unwrap_or_default();
    fragment_usage.entry(orig_id.clone()).or_insert(fragment_id);

    // Retemplate the identifier.
    node.id = if is_root {
        "{%ID%}".to_string()
    } else {
        format!("{{%ID%}}_{}", orig_id)
    };

    let table = renames.get(&orig_id);
    let open_slot = table.map_or(false, |t| t.contains_key("children"));

    // Apply the rename table ahead of the bind pass.
    let mut restores: Vec<(String, String)> = Vec::new();
    if let Some(table) = table {
        for (old, alias) in table {
            if old == "children" {
                continue;
            }
            if alias == old {
                let scratch = scratch_name(old, &orig_id);
                node.buffers.apply(|text| rename_token(text, old, &scratch));
                restores.push((scratch, old.clone()));
            } else {
                node.buffers.apply(|text| rename_token(text, old, alias));
            }
        }
    }

    // Children first, as in rendering, unless the slot stays open.
    if !open_slot {
        let mut kids = by_parent.remove(&orig_id).unwrap_or_default();
        check_sibling_orders(&orig_id, &kids)?;
        kids.sort_by_key(|c| c.order);

        let mut child_ancestors = Vec::with_capacity(ancestors.len() + 1);
        child_ancestors.push(node.id.clone());
        child_ancestors.extend_from_slice(ancestors);

        let mut rendered = Vec::with_capacity(kids.len());
        for kid in kids {
            rendered.push(assemble_node(
                kid,
                by_parent,
                &child_ancestors,
                renames,
                false,
                fragment_usage,
            )?);
        }
        for (index, child) in rendered.iter_mut().enumerate() {
            finalize_child_index(child, index as i64);
        }
        node.children = rendered;
    }

    bind_node(
        &mut node,
        ancestors,
        BindOptions {
            suppress_runtime: true,
        },
    )?;

    for (scratch, old) in restores {
        node.buffers
            .apply(|text| rename_token(text, &scratch, &old));
    }

    if !open_slot {
        splice_children(&mut node);
    }
    // The merged result is one node; inlined children are consumed.
    node.children = Vec::new();
    Ok(node)
}
