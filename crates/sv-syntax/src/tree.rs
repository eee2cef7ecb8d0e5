//! Arena-backed concrete syntax tree.
//!
//! Nodes are stored in a flat arena and addressed by `NodeId`, so handles
//! into the tree stay valid for the tree's whole lifetime no matter how it
//! was constructed. Leaves carry the token kind and its source text.

use crate::kind::{NodeKind, TokenKind};
use smol_str::SmolStr;
use std::sync::Arc;
use sv_diagnostics::Span;

/// Index of a node in its `SyntaxTree` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A leaf token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: SmolStr,
    pub span: Span,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, text: impl Into<SmolStr>, span: Span) -> Self {
        Token {
            kind,
            text: text.into(),
            span,
        }
    }
}

/// One child slot of a node: either a nested node or a leaf token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    Node(NodeId),
    Leaf(Token),
}

impl Child {
    /// The node id, if this child is a nested node.
    #[must_use]
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Child::Node(id) => Some(*id),
            Child::Leaf(_) => None,
        }
    }

    /// The token, if this child is a leaf.
    #[must_use]
    pub fn as_leaf(&self) -> Option<&Token> {
        match self {
            Child::Node(_) => None,
            Child::Leaf(tok) => Some(tok),
        }
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    children: Vec<Child>,
}

/// A parsed translation unit: tagged nodes over the original source text.
///
/// The tree owns a shared handle to its source so that any consumer holding
/// a `NodeId` can recover the node's text without reaching back to the
/// file registry.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    source: Arc<str>,
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl SyntaxTree {
    /// The root node (a `SourceFile` for whole-file parses).
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The source text this tree was parsed from.
    #[must_use]
    pub fn source(&self) -> &Arc<str> {
        &self.source
    }

    /// The tag of `node`.
    #[must_use]
    pub fn kind(&self, node: NodeId) -> NodeKind {
        self.nodes[node.index()].kind
    }

    /// Ordered children of `node`.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[Child] {
        &self.nodes[node.index()].children
    }

    /// Child nodes of `node` (leaves skipped).
    pub fn child_nodes(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(node).iter().filter_map(Child::as_node)
    }

    /// First child node with the given tag.
    #[must_use]
    pub fn find_child(&self, node: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.child_nodes(node).find(|&id| self.kind(id) == kind)
    }

    /// Last child that is a node, regardless of tag.
    #[must_use]
    pub fn last_child_node(&self, node: NodeId) -> Option<NodeId> {
        self.children(node).iter().rev().find_map(Child::as_node)
    }

    /// First leaf child with the given token kind.
    #[must_use]
    pub fn find_leaf(&self, node: NodeId, kind: TokenKind) -> Option<&Token> {
        self.children(node)
            .iter()
            .filter_map(Child::as_leaf)
            .find(|tok| tok.kind == kind)
    }

    /// The leftmost leaf of the subtree rooted at `node`.
    #[must_use]
    pub fn leftmost_leaf(&self, node: NodeId) -> Option<&Token> {
        for child in self.children(node) {
            match child {
                Child::Leaf(tok) => return Some(tok),
                Child::Node(id) => {
                    if let Some(tok) = self.leftmost_leaf(*id) {
                        return Some(tok);
                    }
                }
            }
        }
        None
    }

    /// The rightmost leaf of the subtree rooted at `node`.
    #[must_use]
    pub fn rightmost_leaf(&self, node: NodeId) -> Option<&Token> {
        for child in self.children(node).iter().rev() {
            match child {
                Child::Leaf(tok) => return Some(tok),
                Child::Node(id) => {
                    if let Some(tok) = self.rightmost_leaf(*id) {
                        return Some(tok);
                    }
                }
            }
        }
        None
    }

    /// The span covered by the subtree rooted at `node` (empty for a
    /// leafless subtree).
    #[must_use]
    pub fn span_of(&self, node: NodeId) -> Span {
        match (self.leftmost_leaf(node), self.rightmost_leaf(node)) {
            (Some(l), Some(r)) => l.span.merge(r.span),
            _ => Span::DUMMY,
        }
    }

    /// Source text covered by the subtree rooted at `node`.
    #[must_use]
    pub fn text_of(&self, node: NodeId) -> &str {
        let span = self.span_of(node);
        &self.source[span.start as usize..span.end as usize]
    }

    /// Whether `child` is the last node-child of `parent`.
    #[must_use]
    pub fn is_last_child_node(&self, parent: NodeId, child: NodeId) -> bool {
        self.last_child_node(parent) == Some(child)
    }
}

/// Bottom-up tree construction, used by the parser.
#[derive(Debug, Default)]
pub struct SyntaxTreeBuilder {
    nodes: Vec<NodeData>,
}

impl SyntaxTreeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node with the given tag and children.
    pub fn node(&mut self, kind: NodeKind, children: Vec<Child>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData { kind, children });
        id
    }

    /// Finish the tree with `root` as its root node.
    #[must_use]
    pub fn finish(self, root: NodeId, source: Arc<str>) -> SyntaxTree {
        SyntaxTree {
            source,
            nodes: self.nodes,
            root,
        }
    }
}
