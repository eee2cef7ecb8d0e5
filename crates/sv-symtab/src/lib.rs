//! Symbol table construction and name resolution.
//!
//! The symbol table is built in two phases over already-parsed sources:
//!
//! 1. **Build** walks each translation unit's syntax tree, creating a
//!    scope for every declared named entity (modules, packages, classes,
//!    functions, tasks, generate blocks, parameters, nets, variables,
//!    instances, typedefs) and recording every identifier *reference* as
//!    an unresolved chain anchored in the scope where it appeared.
//!    `` `include `` directives pull the included file's tree into the
//!    walk with the current scope unchanged.
//! 2. **Resolve** walks the scope tree and binds each recorded reference
//!    to a symbol, or emits a diagnostic explaining why it cannot.
//!
//! All diagnostics are collected, never raised; a symbol error does not
//! abort the build and a resolution failure does not abort the resolve
//! pass.

pub mod builder;
pub mod refs;
pub mod resolve;
pub mod table;

pub use builder::build_from_tree;
pub use refs::{DependentReferences, RefId, ReferenceComponent};
pub use table::{
    DeclarationTypeInfo, Scope, ScopeId, SymbolInfo, SymbolTable, SyntaxOrigin,
};

use std::fmt;
use thiserror::Error;

// ============================================================================
// Symbol metatypes
// ============================================================================

/// The kind of a declared symbol, treated as a value.
///
/// Used both to label declarations and to constrain references
/// (`Callable` is a lookup-time wildcard satisfied by a function or task).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SymbolType {
    Root,
    Module,
    Package,
    Class,
    Interface,
    Generate,
    Function,
    Task,
    Parameter,
    TypeAlias,
    DataNetVariableInstance,
    Callable,
    #[default]
    Unspecified,
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SymbolType::Root => "<root>",
            SymbolType::Module => "module",
            SymbolType::Package => "package",
            SymbolType::Class => "class",
            SymbolType::Interface => "interface",
            SymbolType::Generate => "generate",
            SymbolType::Function => "function",
            SymbolType::Task => "task",
            SymbolType::Parameter => "parameter",
            SymbolType::TypeAlias => "typedef",
            SymbolType::DataNetVariableInstance => "data/net/var/instance",
            SymbolType::Callable => "<callable>",
            SymbolType::Unspecified => "<unspecified>",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Reference types
// ============================================================================

/// How one component of a reference path is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceType {
    /// Free-standing name, subject to upward scope search.
    Unqualified,
    /// Resolved in the anchoring scope only (base of an out-of-line
    /// definition).
    Immediate,
    /// Member of the scope the parent component resolved to (`::`, and
    /// named parameters).
    DirectMember,
    /// Member of the scope of the *declared type* of the parent
    /// component's symbol (`.`).
    MemberOfTypeOfParent,
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sigil = match self {
            ReferenceType::Unqualified => "@",
            ReferenceType::Immediate => "!",
            ReferenceType::DirectMember => "::",
            ReferenceType::MemberOfTypeOfParent => ".",
        };
        f.write_str(sigil)
    }
}

// ============================================================================
// Error taxonomy
// ============================================================================

/// Diagnostics emitted by the build and resolve passes.
///
/// Order in the returned vectors reflects encounter order, which is
/// deterministic for a fixed parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    /// A name was declared twice in the same scope.
    #[error("Symbol \"{name}\" is already defined in the {scope} scope.")]
    DuplicateSymbol { name: String, scope: String },

    /// Upward search exhausted without a match.
    #[error("Unable to resolve symbol \"{name}\" from context {context}.")]
    UnresolvedUnqualified { name: String, context: String },

    /// No such member in the named scope.
    #[error("No member symbol \"{name}\" in parent scope ({metatype}) {scope}.")]
    UnresolvedMember {
        name: String,
        metatype: SymbolType,
        scope: String,
    },

    /// Symbol found, but the wrong kind for the reference context.
    #[error(
        "Expecting reference \"{name}\" to resolve to a {expected}, but found a {found}."
    )]
    MetatypeMismatch {
        name: String,
        expected: SymbolType,
        found: SymbolType,
    },

    /// Dotted access onto a primitive or implicit type.
    #[error("Type of parent reference {reference} ({type_text}) does not have any members.")]
    TypeHasNoMembers {
        reference: String,
        type_text: String,
    },

    /// An out-of-line definition's metatype disagrees with its prototype.
    #[error("{prototype} {path} cannot be redefined out-of-line as a {redefined}.")]
    OutOfLineRedefinitionConflict {
        prototype: SymbolType,
        path: String,
        redefined: SymbolType,
    },

    /// An included file could not be opened or parsed.
    #[error("`include \"{filename}\": {reason}")]
    IncludeFailure { filename: String, reason: String },

    /// A translation unit could not be opened or parsed.
    #[error("{path}: {reason}")]
    SourceFailure { path: String, reason: String },
}
