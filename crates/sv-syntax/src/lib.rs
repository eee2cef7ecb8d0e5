//! Concrete syntax tree types for the SystemVerilog analysis frontend.
//!
//! This crate provides:
//! - `NodeKind` / `TokenKind` - closed enumerations tagging tree nodes and leaves
//! - `SyntaxTree` - an arena-backed tree of tagged nodes and token leaves
//! - `SyntaxContext` - the ancestor stack maintained by tree walkers

pub mod context;
pub mod kind;
pub mod tree;

pub use context::SyntaxContext;
pub use kind::{NodeKind, TokenKind};
pub use tree::{Child, NodeId, SyntaxTree, SyntaxTreeBuilder, Token};
