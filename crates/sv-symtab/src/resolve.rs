//! The resolution pass: bind every recorded reference to a symbol.
//!
//! References are arranged in dependency trees; a parent component must
//! resolve before its children can, hence the pre-order traversal of
//! each tree. An already-resolved component is skipped, which makes the
//! pass idempotent.

use crate::refs::RefId;
use crate::table::{ScopeId, SymbolTable};
use crate::{ReferenceType, SymbolError};

impl SymbolTable {
    /// Resolve every reference tree in every scope.
    ///
    /// Diagnostics are returned in encounter order. A failed root leaves
    /// its whole subtree unresolved without cascading errors; a metatype
    /// mismatch is diagnosed without installing a binding, so re-running
    /// the pass re-emits it (callers own deduplication policy).
    pub fn resolve(&mut self) -> Vec<SymbolError> {
        let mut diagnostics = Vec::new();
        for scope in self.scopes_pre_order() {
            for root in self.reference_roots(scope) {
                self.resolve_reference_tree(root, scope, &mut diagnostics);
            }
        }
        diagnostics
    }

    /// Resolve only the root component of each reference tree, against
    /// exactly the scope where it was anchored, without upward search.
    /// Used by tooling that wants only trivially visible bindings.
    pub fn resolve_locally_only(&mut self) {
        for scope in self.scopes_pre_order() {
            for root in self.reference_roots(scope) {
                self.resolve_root_locally(root, scope);
            }
        }
    }

    fn reference_roots(&self, scope: ScopeId) -> Vec<RefId> {
        self.scope(scope)
            .info
            .local_references_to_bind
            .iter()
            .filter_map(|dep| dep.root)
            .collect()
    }

    fn resolve_reference_tree(
        &mut self,
        node: RefId,
        context: ScopeId,
        diagnostics: &mut Vec<SymbolError>,
    ) {
        self.resolve_component(node, context, diagnostics);
        let children = self.refs.node(node).children.clone();
        for child in children {
            self.resolve_reference_tree(child, context, diagnostics);
        }
    }

    fn resolve_component(
        &mut self,
        node: RefId,
        context: ScopeId,
        diagnostics: &mut Vec<SymbolError>,
    ) {
        if self.refs.node(node).component.resolved_symbol.is_some() {
            return; // already bound
        }
        match self.refs.node(node).component.ref_type {
            ReferenceType::Unqualified => {
                self.resolve_unqualified(node, context, diagnostics);
            }
            ReferenceType::Immediate => {
                self.resolve_direct_member(node, context, diagnostics);
            }
            ReferenceType::DirectMember => {
                // Search the scope the parent resolved to; an unresolved
                // parent silently leaves this subtree unresolved.
                let Some(parent_scope) = self.resolved_parent(node) else {
                    return;
                };
                self.resolve_direct_member(node, parent_scope, diagnostics);
            }
            ReferenceType::MemberOfTypeOfParent => {
                let Some(parent_scope) = self.resolved_parent(node) else {
                    return;
                };
                let type_info = &self.scope(parent_scope).info.declared_type;
                let Some(user_defined_type) = type_info.user_defined_type else {
                    // Primitive types do not have members.
                    let parent = self.refs.node(node).parent.expect("checked above");
                    let type_text = type_info
                        .syntax_origin
                        .as_ref()
                        .map(|origin| origin.text().to_string())
                        .unwrap_or_else(|| "implicit".to_string());
                    diagnostics.push(SymbolError::TypeHasNoMembers {
                        reference: self.refs.path_string(parent),
                        type_text,
                    });
                    return;
                };
                // The type's own reference resolved earlier in this pass
                // (its chain is anchored alongside the declaration).
                let Some(type_scope) = self
                    .refs
                    .node(user_defined_type)
                    .component
                    .resolved_symbol
                else {
                    return;
                };
                self.resolve_direct_member(node, type_scope, diagnostics);
            }
        }
    }

    fn resolved_parent(&self, node: RefId) -> Option<ScopeId> {
        let parent = self.refs.node(node).parent?;
        self.refs.node(parent).component.resolved_symbol
    }

    /// Upward search from the anchoring scope; first name match wins,
    /// then the metatype constraint is checked.
    fn resolve_unqualified(
        &mut self,
        node: RefId,
        context: ScopeId,
        diagnostics: &mut Vec<SymbolError>,
    ) {
        let key = self.refs.node(node).component.identifier.clone();
        let Some(resolved) = self.lookup_upwards(context, &key) else {
            diagnostics.push(SymbolError::UnresolvedUnqualified {
                name: key.to_string(),
                context: self.full_path(context),
            });
            return;
        };
        match self
            .refs
            .node(node)
            .component
            .matches_metatype(self.scope(resolved).info.metatype)
        {
            Ok(()) => {
                self.refs.node_mut(node).component.resolved_symbol = Some(resolved);
            }
            Err(mismatch) => diagnostics.push(mismatch),
        }
    }

    /// Exact-match lookup in `context` only.
    fn resolve_direct_member(
        &mut self,
        node: RefId,
        context: ScopeId,
        diagnostics: &mut Vec<SymbolError>,
    ) {
        let key = self.refs.node(node).component.identifier.clone();
        let Some(found) = self.lookup_local(context, &key) else {
            diagnostics.push(SymbolError::UnresolvedMember {
                name: key.to_string(),
                metatype: self.scope(context).info.metatype,
                scope: self.display_name(context).to_string(),
            });
            return;
        };
        match self
            .refs
            .node(node)
            .component
            .matches_metatype(self.scope(found).info.metatype)
        {
            Ok(()) => {
                self.refs.node_mut(node).component.resolved_symbol = Some(found);
            }
            Err(mismatch) => diagnostics.push(mismatch),
        }
    }

    /// Root-only, local-only resolution. Emits no diagnostics; roots that
    /// were pre-resolved during build (self-references, out-of-line
    /// bases) are left alone.
    fn resolve_root_locally(&mut self, node: RefId, context: ScopeId) {
        if self.refs.node(node).component.resolved_symbol.is_some() {
            return;
        }
        if self.refs.node(node).component.ref_type != ReferenceType::Unqualified {
            return;
        }
        let key = self.refs.node(node).component.identifier.clone();
        if let Some(found) = self.lookup_local(context, &key) {
            self.refs.node_mut(node).component.resolved_symbol = Some(found);
        }
    }
}
