//! Ancestor context maintained during a syntax tree walk.
//!
//! A walker pushes each node before visiting its children and pops it on
//! the way out, so consumers can ask "what are my enclosing node kinds,
//! innermost first" at any leaf or node visit.

use crate::kind::NodeKind;
use crate::tree::NodeId;

/// Stack of enclosing nodes, outermost at the bottom.
#[derive(Debug, Default)]
pub struct SyntaxContext {
    stack: Vec<(NodeKind, NodeId)>,
}

impl SyntaxContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: NodeKind, id: NodeId) {
        self.stack.push((kind, id));
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    /// The innermost enclosing node.
    #[must_use]
    pub fn top(&self) -> Option<(NodeKind, NodeId)> {
        self.stack.last().copied()
    }

    /// Enclosing node kinds, innermost first.
    pub fn kinds(&self) -> impl Iterator<Item = NodeKind> + '_ {
        self.stack.iter().rev().map(|(kind, _)| *kind)
    }

    /// Whether the direct parent has the given kind.
    #[must_use]
    pub fn direct_parent_is(&self, kind: NodeKind) -> bool {
        self.top().map(|(k, _)| k) == Some(kind)
    }

    /// Whether the direct parent has one of the given kinds.
    #[must_use]
    pub fn direct_parent_is_one_of(&self, kinds: &[NodeKind]) -> bool {
        self.top().is_some_and(|(k, _)| kinds.contains(&k))
    }

    /// Whether the innermost ancestors match `kinds` (innermost first).
    #[must_use]
    pub fn direct_parents_are(&self, kinds: &[NodeKind]) -> bool {
        if self.stack.len() < kinds.len() {
            return false;
        }
        self.kinds().zip(kinds.iter()).all(|(have, want)| have == *want)
    }

    /// The nearest ancestor satisfying `pred`, innermost first.
    #[must_use]
    pub fn nearest_parent_matching(
        &self,
        pred: impl Fn(NodeKind) -> bool,
    ) -> Option<NodeId> {
        self.stack
            .iter()
            .rev()
            .find(|(kind, _)| pred(*kind))
            .map(|(_, id)| *id)
    }

    /// The nearest ancestor with the given kind.
    #[must_use]
    pub fn nearest_parent_with_kind(&self, kind: NodeKind) -> Option<NodeId> {
        self.nearest_parent_matching(|k| k == kind)
    }
}
