//! # Fragment Compiler
//!
//! Publish-time render and assembly engine for a fragment-based site
//! builder: evaluates the `{%name%}` placeholder grammar over template
//! text, resolves conditional inclusion, composes a node tree bottom-up,
//! and can merge a whole subtree into a new reusable fragment without
//! parameter-name collisions.
//!
//! ## Ground Rules
//!
//! 1. **Fragments arrive resolved**: the engine never fetches. A node
//!    without an attached fragment is a fatal error.
//! 2. **Post-order composition**: a parent's `{%children%}` is filled only
//!    after every descendant has finished rendering.
//! 3. **One name per pass**: toggle blocks, then match blocks, then the
//!    literal token, per name. Content revealed by one name is never
//!    scanned as another name's tokens.
//! 4. **No partial output**: structural errors (missing parent, duplicate
//!    sibling order, wrong root count) abort the whole batch and name the
//!    offending nodes.
//! 5. **Pure and synchronous**: string transformations only, no I/O, no
//!    shared mutable state. Independent trees may render on separate
//!    workers without coordination.

mod assemble;
mod binder;
mod model;
mod placeholder;
mod render;

pub use assemble::{assemble, Assembly, RenameTable};
pub use binder::{bind_node, build_param_map, BindOptions};
pub use model::{
    is_reserved_param, markup_extension, Fragment, Lifecycle, Node, ParamDecl, PlacementRule,
    RenderBuffers, RESERVED_PARAMS,
};
pub use placeholder::{rename_token, resolve_blocks, substitute, token};
pub use render::{render_tree, RenderError};

#[cfg(test)]
mod pipeline_tests;
