//! The scope tree: symbol records arranged in a tree of named scopes.
//!
//! Scopes live in an arena owned by [`SymbolTable`] and are addressed by
//! [`ScopeId`]; the root is always `ScopeId::ROOT`. A symbol *is* its
//! scope node, so resolved references and declared-type pointers are
//! plain ids into the same table.

use crate::refs::{DependentReferences, RefArena, RefId};
use crate::SymbolType;
use smol_str::SmolStr;
use std::fmt::Write;
use std::sync::Arc;
use sv_diagnostics::FileId;
use sv_project::Project;
use sv_syntax::{NodeId, SyntaxTree};

/// Index of a scope in the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    /// The root scope, present in every table.
    pub const ROOT: ScopeId = ScopeId(0);

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A shared view into the syntax construct that introduced a symbol or
/// type. The tree handle keeps the source text reachable for printing.
#[derive(Debug, Clone)]
pub struct SyntaxOrigin {
    pub file: FileId,
    pub tree: Arc<SyntaxTree>,
    pub node: NodeId,
}

impl SyntaxOrigin {
    /// Source text of the originating construct.
    #[must_use]
    pub fn text(&self) -> &str {
        self.tree.text_of(self.node)
    }
}

/// The declared type of a data/net/variable/instance/parameter symbol.
///
/// `user_defined_type` points at the deepest component of the reference
/// chain naming the type; `None` means a primitive or implicit type.
#[derive(Debug, Clone, Default)]
pub struct DeclarationTypeInfo {
    pub syntax_origin: Option<SyntaxOrigin>,
    pub user_defined_type: Option<RefId>,
}

/// The record stored at a scope node.
#[derive(Debug, Default)]
pub struct SymbolInfo {
    /// What kind of entity this symbol is.
    pub metatype: SymbolType,
    /// The source file that introduced the symbol (follows includes).
    pub file_origin: Option<FileId>,
    /// The declaring construct.
    pub syntax_origin: Option<SyntaxOrigin>,
    /// Declared type, for typed symbols.
    pub declared_type: DeclarationTypeInfo,
    /// Reference trees anchored in this scope, in capture order.
    pub local_references_to_bind: Vec<DependentReferences>,
    /// Monotonic counter backing `create_anonymous_scope_name`.
    pub(crate) anonymous_scope_count: u32,
}

impl SymbolInfo {
    #[must_use]
    pub fn new(metatype: SymbolType) -> Self {
        SymbolInfo {
            metatype,
            ..SymbolInfo::default()
        }
    }
}

/// One node of the scope tree.
#[derive(Debug)]
pub struct Scope {
    key: Option<SmolStr>,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    pub info: SymbolInfo,
}

impl Scope {
    /// The declared name. Absent only at the root.
    #[must_use]
    pub fn key(&self) -> Option<&SmolStr> {
        self.key.as_ref()
    }

    #[must_use]
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// Child scopes, in declaration order.
    #[must_use]
    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }
}

/// The symbol table: a tree of scopes plus the reference-node arena.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    pub(crate) refs: RefArena,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Create a table containing only the unnamed root scope.
    #[must_use]
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope {
                key: None,
                parent: None,
                children: Vec::new(),
                info: SymbolInfo::new(SymbolType::Root),
            }],
            refs: RefArena::default(),
        }
    }

    #[must_use]
    pub fn root(&self) -> ScopeId {
        ScopeId::ROOT
    }

    #[must_use]
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub(crate) fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    #[must_use]
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// The reference-node arena (shared by all scopes' reference trees).
    #[must_use]
    pub fn refs(&self) -> &RefArena {
        &self.refs
    }

    pub(crate) fn refs_mut(&mut self) -> &mut RefArena {
        &mut self.refs
    }

    // ========================================================================
    // Lookup and insertion
    // ========================================================================

    /// Exact-match lookup in `scope` only.
    #[must_use]
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        self.scope(scope)
            .children
            .iter()
            .copied()
            .find(|&child| self.scope(child).key.as_deref() == Some(name))
    }

    /// Walk the parent chain starting at `scope`; first match wins.
    #[must_use]
    pub fn lookup_upwards(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(found) = self.lookup_local(id, name) {
                return Some(found);
            }
            current = self.scope(id).parent;
        }
        None
    }

    /// Insert `name` under `parent` if absent. Returns the resident scope
    /// either way, with a flag saying whether insertion happened.
    /// Re-insertion does not replace the existing symbol.
    pub fn try_emplace(
        &mut self,
        parent: ScopeId,
        name: &str,
        info: SymbolInfo,
    ) -> (ScopeId, bool) {
        if let Some(existing) = self.lookup_local(parent, name) {
            return (existing, false);
        }
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            key: Some(SmolStr::new(name)),
            parent: Some(parent),
            children: Vec::new(),
            info,
        });
        self.scope_mut(parent).children.push(id);
        (id, true)
    }

    /// Generate a unique scope name of the form `%anon-<base>-<n>`.
    /// The leading `%` cannot start a user identifier, so generated names
    /// never collide with declared ones.
    pub fn create_anonymous_scope_name(&mut self, scope: ScopeId, base: &str) -> SmolStr {
        let info = &mut self.scope_mut(scope).info;
        let n = info.anonymous_scope_count;
        info.anonymous_scope_count += 1;
        SmolStr::new(format!("%anon-{base}-{n}"))
    }

    /// Full path of a scope: `$root::A::B::c`.
    #[must_use]
    pub fn full_path(&self, id: ScopeId) -> String {
        match (self.scope(id).parent, self.scope(id).key()) {
            (Some(parent), Some(key)) => format!("{}::{}", self.full_path(parent), key),
            _ => "$root".to_string(),
        }
    }

    /// The display name of a scope: its key, or `$root`.
    #[must_use]
    pub fn display_name(&self, id: ScopeId) -> &str {
        self.scope(id)
            .key()
            .map(SmolStr::as_str)
            .unwrap_or("$root")
    }

    /// Scope ids in pre-order (root first, children in declaration order).
    #[must_use]
    pub fn scopes_pre_order(&self) -> Vec<ScopeId> {
        let mut order = Vec::with_capacity(self.scopes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            for &child in self.scope(id).children.iter().rev() {
                stack.push(child);
            }
        }
        order
    }

    // ========================================================================
    // Integrity
    // ========================================================================

    /// Verify that every id stored anywhere in the table refers back into
    /// this table and that parent/child linkage is consistent.
    ///
    /// # Panics
    /// Panics with a description of the first violation found. This is a
    /// verification hook, not a recoverable error path.
    pub fn check_integrity(&self) {
        assert!(
            self.scope(ScopeId::ROOT).parent.is_none()
                && self.scope(ScopeId::ROOT).key.is_none(),
            "root scope must be unnamed and parentless"
        );
        for (index, scope) in self.scopes.iter().enumerate() {
            let id = ScopeId(index as u32);
            if let Some(parent) = scope.parent {
                assert!(
                    parent.index() < self.scopes.len(),
                    "scope {index} has out-of-range parent"
                );
                let key = scope.key().expect("non-root scope must have a key");
                assert_eq!(
                    self.lookup_local(parent, key),
                    Some(id),
                    "parent of {key} cannot find it by local lookup"
                );
            }
            let mut seen = Vec::new();
            for &child in &scope.children {
                assert!(
                    child.index() < self.scopes.len(),
                    "scope {index} has out-of-range child"
                );
                assert_eq!(
                    self.scope(child).parent,
                    Some(id),
                    "child does not link back to its parent"
                );
                let key = self.scope(child).key().expect("child scope must have a key");
                assert!(!seen.contains(&key), "duplicate sibling key {key}");
                seen.push(key);
            }
            if let Some(udt) = scope.info.declared_type.user_defined_type {
                assert!(
                    self.refs.is_valid(udt),
                    "declared type of {} points outside the reference arena",
                    self.display_name(id)
                );
            }
            for dep in &scope.info.local_references_to_bind {
                let root = dep.root.expect("never anchor an empty reference tree");
                assert!(self.refs.is_valid(root), "reference root out of range");
                self.refs.apply_pre_order(root, &mut |arena, node| {
                    if let Some(resolved) = arena.node(node).component.resolved_symbol {
                        assert!(
                            resolved.index() < self.scopes.len(),
                            "resolved symbol out of range"
                        );
                    }
                    for &child in &arena.node(node).children {
                        assert_eq!(
                            arena.node(child).parent,
                            Some(node),
                            "reference child does not link back to its parent"
                        );
                    }
                });
            }
        }
    }

    // ========================================================================
    // Printers
    // ========================================================================

    /// Dump every symbol definition: metatype, file origin, and the
    /// declared type for data/net/var/instance symbols.
    #[must_use]
    pub fn print_symbol_definitions(&self, project: &Project) -> String {
        let mut out = String::new();
        self.print_definitions_rec(self.root(), 0, project, &mut out);
        out
    }

    fn print_definitions_rec(
        &self,
        id: ScopeId,
        indent: usize,
        project: &Project,
        out: &mut String,
    ) {
        let info = &self.scope(id).info;
        let pad = "  ".repeat(indent);
        write!(out, "{pad}{}: metatype: {}", self.display_name(id), info.metatype)
            .expect("string write");
        if let Some(file) = info.file_origin {
            write!(out, ", file: {}", project.file(file).resolved_path().display())
                .expect("string write");
        }
        if info.metatype == SymbolType::DataNetVariableInstance {
            write!(out, ", {}", self.format_declared_type(&info.declared_type))
                .expect("string write");
        }
        out.push('\n');
        for &child in self.scope(id).children() {
            self.print_definitions_rec(child, indent + 1, project, out);
        }
    }

    fn format_declared_type(&self, decl_type: &DeclarationTypeInfo) -> String {
        let source = match &decl_type.syntax_origin {
            Some(origin) => format!("\"{}\"", origin.text()),
            None => "(unknown)".to_string(),
        };
        let type_ref = match decl_type.user_defined_type {
            Some(udt) => self.format_reference_target(udt),
            None => "(primitive)".to_string(),
        };
        format!("type-info {{ source: {source}, type ref: {type_ref} }}")
    }

    fn format_reference_target(&self, node: RefId) -> String {
        let component = &self.refs.node(node).component;
        match component.resolved_symbol {
            Some(symbol) => format!("{component} -> {}", self.full_path(symbol)),
            None => format!("{component} -> <unresolved>"),
        }
    }

    /// Dump every scope's reference list with resolved targets or
    /// `<unresolved>`.
    #[must_use]
    pub fn print_symbol_references(&self) -> String {
        let mut out = String::new();
        self.print_references_rec(self.root(), 0, &mut out);
        out
    }

    fn print_references_rec(&self, id: ScopeId, indent: usize, out: &mut String) {
        let info = &self.scope(id).info;
        let pad = "  ".repeat(indent);
        writeln!(out, "{pad}{}: refs:", self.display_name(id)).expect("string write");
        for dep in &info.local_references_to_bind {
            if let Some(root) = dep.root {
                self.print_reference_tree(root, indent + 1, out);
            }
        }
        for &child in self.scope(id).children() {
            self.print_references_rec(child, indent + 1, out);
        }
    }

    fn print_reference_tree(&self, node: RefId, indent: usize, out: &mut String) {
        let pad = "  ".repeat(indent);
        writeln!(out, "{pad}{}", self.format_reference_target(node)).expect("string write");
        for &child in &self.refs.node(node).children {
            self.print_reference_tree(child, indent + 1, out);
        }
    }
}
