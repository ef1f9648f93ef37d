//! Traversal over the closed node set.
//!
//! A visitor exposes one entry point per concrete node shape; dispatch is a
//! match on the node's kind tag, no dynamic calls. The walker visits a list
//! first, then its children (materializing them), then moves to the list's
//! next sibling, terminating on the end-of-program atom.

use std::borrow::Cow;

use crate::dialect::Dialect;
use crate::lexer::token::{SourceLoc, TokenId};
use crate::tree::node::{NodeId, NodeKind, Shape};
use crate::tree::ParseTree;

/// An atom or error node as seen during traversal.
pub struct AtomView<'a> {
    pub id: NodeId,
    pub kind: NodeKind,
    pub text: &'a [u8],
    /// Byte offset of the token in the source.
    pub at: u32,
    pub location: SourceLoc,
}

impl AtomView<'_> {
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.text)
    }
}

/// A list or arguments node as seen during traversal.
pub struct ListView<'a> {
    pub id: NodeId,
    pub text: &'a [u8],
    /// Byte offsets of the open and close parens in the source.
    pub open_at: u32,
    pub close_at: u32,
    pub open_location: SourceLoc,
    pub close_location: SourceLoc,
}

impl ListView<'_> {
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.text)
    }
}

/// Double-dispatch surface over the four concrete node shapes. All methods
/// default to doing nothing, so a visitor implements only what it observes.
pub trait Visitor {
    fn visit_atom(&mut self, _atom: &AtomView<'_>) {}
    fn visit_list(&mut self, _list: &ListView<'_>) {}
    fn visit_arguments(&mut self, _arguments: &ListView<'_>) {}
    fn visit_error(&mut self, _error: &AtomView<'_>) {}
}

/// Walks the tree from the root, materializing children through the caching
/// accessor. Children are iterated via their stored sibling links; only
/// top-level advancement consults the index-table successor.
pub fn walk<D: Dialect, V: Visitor>(tree: &mut ParseTree<D>, visitor: &mut V) {
    walk_impl(tree, visitor, true);
}

/// Like [`walk`], but children are re-parsed through the non-caching
/// accessor, leaving previously materialized chains untouched.
pub fn walk_fresh<D: Dialect, V: Visitor>(tree: &mut ParseTree<D>, visitor: &mut V) {
    walk_impl(tree, visitor, false);
}

fn walk_impl<D: Dialect, V: Visitor>(tree: &mut ParseTree<D>, visitor: &mut V, cache: bool) {
    let Some(root) = tree.root() else {
        return;
    };
    let mut current = root;
    loop {
        if tree.node(current).kind() == NodeKind::EndOfProgram {
            break;
        }
        dispatch(tree, current, visitor, cache);
        match tree.next_node(current) {
            Some(next) => current = next,
            None => break,
        }
    }
}

/// Dispatches one node to the matching visitor entry point, recursing into
/// list children.
pub fn dispatch<D: Dialect, V: Visitor>(
    tree: &mut ParseTree<D>,
    id: NodeId,
    visitor: &mut V,
    cache: bool,
) {
    let shape = tree.node(id).shape;
    match shape {
        Shape::Atom { kind, .. } => {
            if kind == NodeKind::EndOfProgram {
                return;
            }
            let view = atom_view(tree, id, kind);
            visitor.visit_atom(&view);
        }
        Shape::Error { .. } => {
            let view = atom_view(tree, id, NodeKind::Error);
            visitor.visit_error(&view);
        }
        Shape::List { open, close, .. } => {
            {
                let view = list_view(tree, id, open, close);
                visitor.visit_list(&view);
            }
            descend(tree, id, visitor, cache);
        }
        Shape::Arguments { open, close, .. } => {
            {
                let view = list_view(tree, id, open, close);
                visitor.visit_arguments(&view);
            }
            descend(tree, id, visitor, cache);
        }
    }
}

fn descend<D: Dialect, V: Visitor>(
    tree: &mut ParseTree<D>,
    id: NodeId,
    visitor: &mut V,
    cache: bool,
) {
    let mut child = if cache {
        tree.children(id)
    } else {
        tree.peek_children(id)
    };
    while let Some(current) = child {
        dispatch(tree, current, visitor, cache);
        child = tree.node(current).next();
    }
}

fn atom_view<D: Dialect>(tree: &ParseTree<D>, id: NodeId, kind: NodeKind) -> AtomView<'_> {
    let token = tree.node(id).head_token();
    AtomView {
        id,
        kind,
        text: tree.node_bytes(id),
        at: tree.token(token).at,
        location: tree.source_location(id),
    }
}

fn list_view<D: Dialect>(
    tree: &ParseTree<D>,
    id: NodeId,
    open: TokenId,
    close: TokenId,
) -> ListView<'_> {
    ListView {
        id,
        text: tree.node_bytes(id),
        open_at: tree.token(open).at,
        close_at: tree.token(close).at,
        open_location: tree.token(open).location(),
        close_location: tree.token(close).location(),
    }
}
