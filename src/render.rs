//! Tree renderer: composes a flat node set bottom-up into root buffers.
//!
//! ## Key Invariants
//!
//! 1. Post-order is a correctness requirement: a parent's `{%children%}`
//!    can only be filled once every descendant has finished rendering. The
//!    walk is an explicit recursion with no shared mutable state.
//! 2. Sibling-order values must be unique within one parent; a collision is
//!    fatal and names both offending nodes.
//! 3. Each child's `{%childIndex%}` tokens are rewritten with its final
//!    0-based position after sorting, overriding the order value the binder
//!    placed in the param map.
//! 4. No partial output: any failure below a parent invalidates the batch.

use log::debug;
use std::collections::HashMap;
use std::fmt;

use crate::binder::{bind_node, BindOptions};
use crate::model::{Node, RenderBuffers};
use crate::placeholder::{resolve_blocks, substitute, token};

/// Fatal engine errors. Never retried; the offending identifiers ride along.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A non-root node references a parent id absent from the input set.
    MissingParent { node: String, parent: String },
    /// Two siblings under one parent share an order value.
    DuplicateOrder {
        parent: String,
        first: String,
        second: String,
        order: i64,
    },
    /// Assembly input had more than one parentless node.
    MultipleRoots { roots: Vec<String> },
    /// Assembly input had no parentless node.
    NoRoot,
    /// A node's fragment was not resolved before the engine was called.
    UnresolvedFragment { node: String },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParent { node, parent } => {
                write!(f, "node '{}' references missing parent '{}'", node, parent)
            }
            Self::DuplicateOrder {
                parent,
                first,
                second,
                order,
            } => write!(
                f,
                "duplicate sibling order {} under parent '{}': nodes '{}' and '{}'",
                order, parent, first, second
            ),
            Self::MultipleRoots { roots } => {
                write!(f, "expected one root node, found: {}", roots.join(", "))
            }
            Self::NoRoot => write!(f, "no root node in input set"),
            Self::UnresolvedFragment { node } => {
                write!(f, "node '{}' has no resolved fragment", node)
            }
        }
    }
}

impl std::error::Error for RenderError {}

/// Seed every node's scratch buffers from its fragment, failing on the first
/// node without one.
pub(crate) fn seed_buffers(nodes: &mut [Node]) -> Result<(), RenderError> {
    for node in nodes.iter_mut() {
        let fragment = node
            .fragment
            .as_ref()
            .ok_or_else(|| RenderError::UnresolvedFragment {
                node: node.id.clone(),
            })?;
        node.buffers = RenderBuffers::from_fragment(fragment);
    }
    Ok(())
}

/// Verify every non-root parent reference resolves within the input set.
pub(crate) fn check_parent_refs(nodes: &[Node]) -> Result<(), RenderError> {
    let ids: std::collections::HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    for node in nodes {
        if !node.is_root() && !ids.contains(node.parent_id.as_str()) {
            return Err(RenderError::MissingParent {
                node: node.id.clone(),
                parent: node.parent_id.clone(),
            });
        }
    }
    Ok(())
}

/// Fail on duplicate sibling-order values within one parent's child list,
/// naming both colliding nodes.
pub(crate) fn check_sibling_orders(parent: &str, siblings: &[Node]) -> Result<(), RenderError> {
    let mut seen: HashMap<i64, &str> = HashMap::new();
    for node in siblings {
        if let Some(first) = seen.insert(node.order, &node.id) {
            return Err(RenderError::DuplicateOrder {
                parent: parent.to_string(),
                first: first.to_string(),
                second: node.id.clone(),
                order: node.order,
            });
        }
    }
    Ok(())
}

/// Group non-root nodes by parent id; roots come back separately.
pub(crate) fn partition(nodes: Vec<Node>) -> (Vec<Node>, HashMap<String, Vec<Node>>) {
    let mut roots = Vec::new();
    let mut by_parent: HashMap<String, Vec<Node>> = HashMap::new();
    for node in nodes {
        if node.is_root() {
            roots.push(node);
        } else {
            by_parent.entry(node.parent_id.clone()).or_default().push(node);
        }
    }
    (roots, by_parent)
}

/// Rewrite a rendered child's `childIndex` tokens with its final position.
pub(crate) fn finalize_child_index(node: &mut Node, index: i64) {
    let value = index.to_string();
    node.buffers.apply(|text| {
        let resolved = resolve_blocks(text, "childIndex", &value);
        substitute(&resolved, "childIndex", &value)
    });
}

/// Splice the rendered children's streams into the parent's buffers. Each
/// stream is concatenated independently with newline separators and lands at
/// `{%children%}`, or is appended when the placeholder is absent. Childless
/// parents get the placeholder removed outright.
pub(crate) fn splice_children(node: &mut Node) {
    let children_token = token("children");

    if node.children.is_empty() {
        node.buffers.apply(|text| substitute(text, "children", ""));
        return;
    }

    let kids = &node.children;
    let markup = kids
        .iter()
        .map(|c| c.buffers.markup.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let style = kids
        .iter()
        .map(|c| c.buffers.style.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let script = kids
        .iter()
        .map(|c| c.buffers.script.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    splice_stream(&mut node.buffers.markup, &markup, &children_token);
    splice_stream(&mut node.buffers.style, &style, &children_token);
    splice_stream(&mut node.buffers.script, &script, &children_token);
}

fn splice_stream(buffer: &mut String, concatenated: &str, children_token: &str) {
    if buffer.contains(children_token) {
        *buffer = substitute(buffer, "children", concatenated);
    } else {
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(concatenated);
    }
}

fn render_node(
    mut node: Node,
    by_parent: &mut HashMap<String, Vec<Node>>,
    ancestors: &[String],
) -> Result<Node, RenderError> {
    let mut kids = by_parent.remove(&node.id).unwrap_or_default();
    check_sibling_orders(&node.id, &kids)?;
    kids.sort_by_key(|c| c.order);

    let mut child_ancestors = Vec::with_capacity(ancestors.len() + 1);
    child_ancestors.push(node.id.clone());
    child_ancestors.extend_from_slice(ancestors);

    let mut rendered = Vec::with_capacity(kids.len());
    for kid in kids {
        rendered.push(render_node(kid, by_parent, &child_ancestors)?);
    }
    for (index, child) in rendered.iter_mut().enumerate() {
        finalize_child_index(child, index as i64);
    }
    node.children = rendered;

    bind_node(&mut node, ancestors, BindOptions::default())?;
    splice_children(&mut node);
    Ok(node)
}

/// Render a flat node set for one page+lifecycle, fragments attached.
/// Returns the root nodes with fully resolved buffers, sorted by order.
pub fn render_tree(mut nodes: Vec<Node>) -> Result<Vec<Node>, RenderError> {
    debug!("rendering tree of {} nodes", nodes.len());
    seed_buffers(&mut nodes)?;
    check_parent_refs(&nodes)?;

    let (mut roots, mut by_parent) = partition(nodes);
    check_sibling_orders("", &roots)?;
    roots.sort_by_key(|r| r.order);

    let mut out = Vec::with_capacity(roots.len());
    for root in roots {
        let order = root.order;
        let mut rendered = render_node(root, &mut by_parent, &[])?;
        // Nothing composes above a root, so its childIndex keeps the bound
        // order value.
        finalize_child_index(&mut rendered, order);
        out.push(rendered);
    }
    Ok(out)
}
