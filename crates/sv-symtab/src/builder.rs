//! Per-file syntax tree walk that populates the symbol table.
//!
//! The builder maintains a current scope, a declaration-type capture
//! slot, a reference branch point, the most recent hierarchy operator,
//! and a stack of in-progress reference captures. Every mutation of this
//! walk context is paired with a restore when the owning subtree exits.

use crate::refs::{DependentReferences, RefId, ReferenceComponent};
use crate::table::{DeclarationTypeInfo, ScopeId, SymbolInfo, SymbolTable, SyntaxOrigin};
use crate::{ReferenceType, SymbolError, SymbolType};
use smol_str::SmolStr;
use std::sync::Arc;
use sv_diagnostics::FileId;
use sv_project::Project;
use sv_syntax::{Child, NodeId, NodeKind, SyntaxContext, SyntaxTree, Token, TokenKind};

impl SymbolTable {
    /// Build from every translation unit registered in `project`.
    /// Parse failures are collected and the remaining units still build.
    pub fn build(&mut self, project: &mut Project) -> Vec<SymbolError> {
        let mut diagnostics = Vec::new();
        for unit in project.translation_units() {
            build_file(self, project, unit, &mut diagnostics);
        }
        diagnostics
    }

    /// Build from a single translation unit opened by name.
    pub fn build_single_translation_unit(
        &mut self,
        referenced_path: &str,
        project: &mut Project,
    ) -> Vec<SymbolError> {
        let mut diagnostics = Vec::new();
        match project.open_translation_unit(referenced_path) {
            Ok(unit) => build_file(self, project, unit, &mut diagnostics),
            Err(err) => diagnostics.push(SymbolError::SourceFailure {
                path: referenced_path.to_string(),
                reason: err.to_string(),
            }),
        }
        diagnostics
    }
}

fn build_file(
    table: &mut SymbolTable,
    project: &mut Project,
    file: FileId,
    diagnostics: &mut Vec<SymbolError>,
) {
    if let Err(err) = project.parse(file) {
        diagnostics.push(SymbolError::SourceFailure {
            path: project.file(file).referenced_path().to_string(),
            reason: err.to_string(),
        });
    }
    // Continue with whatever tree exists (none, after a failed parse).
    let Some(tree) = project.file(file).syntax_tree().cloned() else {
        return;
    };
    let mut builder = Builder::new(table, Some(project), file, tree);
    builder.run();
    diagnostics.append(&mut builder.take_diagnostics());
}

/// Build from an already-parsed tree, without a project. `` `include ``
/// directives then produce `IncludeFailure` diagnostics.
pub fn build_from_tree(
    table: &mut SymbolTable,
    file: FileId,
    tree: Arc<SyntaxTree>,
) -> Vec<SymbolError> {
    let mut builder = Builder::new(table, None, file, tree);
    builder.run();
    builder.take_diagnostics()
}

struct Builder<'a> {
    table: &'a mut SymbolTable,
    project: Option<&'a mut Project>,

    /// Origin of symbols declared right now; swapped while walking an
    /// included file.
    file: FileId,
    /// Tree being walked; swapped together with `file`.
    tree: Arc<SyntaxTree>,

    context: SyntaxContext,
    current_scope: ScopeId,
    /// Stack of reference captures, innermost last. A stack is needed for
    /// nested reference contexts (a type inside a type, a call inside a
    /// call).
    reference_builders: Vec<DependentReferences>,
    /// Where sibling-style references (named ports, named parameters)
    /// attach.
    reference_branch_point: Option<RefId>,
    /// Non-`None` only while collecting the declared type of the
    /// enclosing declaration.
    declaration_type_slot: Option<DeclarationTypeInfo>,
    /// Most recently seen `::` or `.` leaf.
    last_hierarchy_operator: Option<TokenKind>,

    diagnostics: Vec<SymbolError>,
}

impl<'a> Builder<'a> {
    fn new(
        table: &'a mut SymbolTable,
        project: Option<&'a mut Project>,
        file: FileId,
        tree: Arc<SyntaxTree>,
    ) -> Self {
        let root_scope = table.root();
        Builder {
            table,
            project,
            file,
            tree,
            context: SyntaxContext::new(),
            current_scope: root_scope,
            reference_builders: Vec::new(),
            reference_branch_point: None,
            declaration_type_slot: None,
            last_hierarchy_operator: None,
            diagnostics: Vec::new(),
        }
    }

    fn run(&mut self) {
        let root = self.tree.root();
        self.visit_node(root);
    }

    fn take_diagnostics(&mut self) -> Vec<SymbolError> {
        std::mem::take(&mut self.diagnostics)
    }

    // ------------------------------------------------------------------
    // Tree walk
    // ------------------------------------------------------------------

    fn visit_node(&mut self, node: NodeId) {
        match self.tree.kind(node) {
            NodeKind::ModuleDeclaration => self.declare_module(node),
            NodeKind::GenerateIfClause => self.declare_generate_if(node),
            NodeKind::GenerateElseClause => self.declare_generate_else(node),
            NodeKind::PackageDeclaration => self.declare_package(node),
            NodeKind::ClassDeclaration => self.declare_class(node),
            NodeKind::FunctionPrototype | NodeKind::FunctionDeclaration => {
                self.declare_function(node)
            }
            NodeKind::FunctionHeader => self.setup_function_header(node),
            NodeKind::TaskPrototype | NodeKind::TaskDeclaration => self.declare_task(node),
            NodeKind::PortList => self.declare_ports(node),
            NodeKind::PortItem
            | NodeKind::PortDeclaration
            | NodeKind::NetDeclaration
            | NodeKind::DataDeclaration
            | NodeKind::TypeDeclaration => self.declare_data(node),
            NodeKind::ParamDeclaration => self.declare_parameter(node),
            NodeKind::DataType => self.descend_data_type(node),
            NodeKind::ReferenceCallBase => self.descend_reference_expression(node),
            NodeKind::NetVariable => self.declare_net(node),
            NodeKind::RegisterVariable => self.declare_register(node),
            NodeKind::GateInstance => self.declare_instance(node),
            NodeKind::QualifiedId => self.handle_qualified_id(node),
            NodeKind::PreprocessorInclude => self.enter_include_file(node),
            _ => self.descend(node),
        }
    }

    /// Visit children with `node` pushed onto the ancestor context.
    fn descend(&mut self, node: NodeId) {
        let tree = self.tree.clone();
        self.context.push(tree.kind(node), node);
        for child in tree.children(node) {
            match child {
                Child::Node(id) => self.visit_node(*id),
                Child::Leaf(tok) => self.visit_leaf(tok),
            }
        }
        self.context.pop();
    }

    /// Visit children with `scope` as the current scope for the duration.
    fn descend_in_scope(&mut self, node: NodeId, scope: ScopeId) {
        let saved = std::mem::replace(&mut self.current_scope, scope);
        self.descend(node);
        self.current_scope = saved;
    }

    fn visit_leaf(&mut self, token: &Token) {
        match token.kind {
            TokenKind::Identifier => self.handle_identifier(token),
            TokenKind::ScopeRes | TokenKind::Dot => {
                self.last_hierarchy_operator = Some(token.kind);
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Reference capture
    // ------------------------------------------------------------------

    /// Run `f` with a fresh reference capture on the stack; on exit,
    /// commit the captured tree (if non-empty) to the current scope.
    fn with_reference_capture<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.reference_builders.push(DependentReferences::default());
        let result = f(self);
        let dep = self.reference_builders.pop().expect("capture stack underflow");
        self.commit_capture(dep);
        result
    }

    fn commit_capture(&mut self, dep: DependentReferences) {
        // Empty captures are non-actionable and must be excluded.
        if !dep.is_empty() {
            self.table
                .scope_mut(self.current_scope)
                .info
                .local_references_to_bind
                .push(dep);
        }
    }

    fn push_component_to_current(&mut self, component: ReferenceComponent) -> RefId {
        let dep = self
            .reference_builders
            .last_mut()
            .expect("not in a reference context");
        dep.push_component(self.table.refs_mut(), component)
    }

    fn descend_reference_expression(&mut self, node: NodeId) {
        // Sub-expressions' references are collected before this one.
        self.with_reference_capture(|b| b.descend(node));
    }

    /// Traverse a data type subtree, collecting type references from the
    /// current context. If a declaration is being typed right now, record
    /// the type's syntax origin and the deepest reference component
    /// naming a user-defined type.
    fn descend_data_type(&mut self, node: NodeId) {
        let last_leaf = self.with_reference_capture(|b| {
            // Clearing the slot keeps nested types (parameters of the
            // type) from re-capturing as the declaration's type.
            let saved_slot = b.declaration_type_slot.take();
            // Named parameter references branch off the first unqualified
            // component encountered below.
            let saved_branch = b.reference_branch_point.take();
            b.descend(node);
            b.reference_branch_point = saved_branch;
            b.declaration_type_slot = saved_slot;
            b.reference_builders
                .last()
                .expect("capture stack")
                .last_leaf(b.table.refs())
        });

        if self.declaration_type_slot.is_some() {
            let origin = if self.tree.leftmost_leaf(node).is_some() {
                Some(self.origin(node))
            } else {
                // A leafless type subtree (implicit type) has no origin.
                None
            };
            let slot = self.declaration_type_slot.as_mut().expect("slot checked above");
            slot.syntax_origin = origin;
            if last_leaf.is_some() {
                slot.user_defined_type = last_leaf;
            }
        }
    }

    // ------------------------------------------------------------------
    // Identifier classification
    // ------------------------------------------------------------------

    fn handle_identifier(&mut self, token: &Token) {
        let text = &token.text;

        if self.context.direct_parent_is(NodeKind::ParamType) {
            // This identifier declares a parameter.
            let origin = self.context.top().expect("inside ParamType").1;
            self.emplace_typed_element(origin, text, SymbolType::Parameter);
            return;
        }

        if self
            .context
            .direct_parents_are(&[NodeKind::UnqualifiedId, NodeKind::PortDeclaration])
            || self
                .context
                .direct_parents_are(&[NodeKind::UnqualifiedId, NodeKind::PortItem])
        {
            // A (non-parameter) port of a module, function, or task.
            let origin = self.context.top().expect("inside UnqualifiedId").1;
            self.emplace_typed_element(origin, text, SymbolType::DataNetVariableInstance);
            return;
        }

        if self
            .context
            .direct_parents_are(&[NodeKind::UnqualifiedId, NodeKind::FunctionHeader])
        {
            // Declaring the function was deferred to this point so that
            // its return type could first be captured as a reference in
            // the enclosing scope. Out-of-line definitions take the
            // qualified-id path instead.
            let Some(decl_syntax) = self.context.nearest_parent_matching(|kind| {
                matches!(
                    kind,
                    NodeKind::FunctionDeclaration | NodeKind::FunctionPrototype
                )
            }) else {
                return;
            };
            let declared = self.emplace_typed_element(decl_syntax, text, SymbolType::Function);
            // Ports and body now belong to the new function scope.
            self.current_scope = declared;
            return;
        }

        if self
            .context
            .direct_parents_are(&[NodeKind::UnqualifiedId, NodeKind::TaskHeader])
        {
            let Some(decl_syntax) = self.context.nearest_parent_matching(|kind| {
                matches!(kind, NodeKind::TaskDeclaration | NodeKind::TaskPrototype)
            }) else {
                return;
            };
            let declared = self.emplace_element(decl_syntax, text, SymbolType::Task);
            self.current_scope = declared;
            return;
        }

        if self.context.direct_parent_is(NodeKind::TypeDeclaration) {
            // typedef <type> <name>;
            let origin = self.context.top().expect("inside TypeDeclaration").1;
            self.emplace_typed_element(origin, text, SymbolType::TypeAlias);
            return;
        }

        // Instance names were already declared (with a self-reference)
        // when the gate instance node was entered.
        if self.context.direct_parent_is(NodeKind::GateInstance) {
            return;
        }

        // Only referencing identifiers remain; without an active capture
        // there is nothing to record.
        if self.reference_builders.is_empty() {
            return;
        }

        let component = ReferenceComponent {
            identifier: text.clone(),
            ref_type: self.infer_reference_type(),
            metatype: self.infer_metatype(),
            resolved_symbol: None,
        };

        // Named ports and named parameters attach as siblings of the same
        // branch point (instances form self-references for this purpose).
        if self
            .context
            .direct_parent_is_one_of(&[NodeKind::ActualNamedPort, NodeKind::ParamByName])
        {
            let branch = self
                .reference_branch_point
                .expect("named argument outside a reference branch");
            self.table.refs_mut().add_child(branch, component);
            return;
        }

        // All other references grow the chain deeper.
        let node = self.push_component_to_current(component);
        if self.reference_branch_point.is_none() {
            // First unqualified component of a type reference: named
            // parameters that follow branch off it.
            self.reference_branch_point = Some(node);
        }
    }

    fn in_out_of_line_header(&self, header: NodeKind) -> bool {
        self.context
            .direct_parents_are(&[NodeKind::UnqualifiedId, NodeKind::QualifiedId, header])
    }

    fn infer_reference_type(&self) -> ReferenceType {
        let current = self
            .reference_builders
            .last()
            .expect("not in a reference context");
        if current.is_empty() || self.last_hierarchy_operator.is_none() {
            // The root component: out-of-line definition bases resolve
            // immediately, everything else by upward search.
            if self.in_out_of_line_header(NodeKind::FunctionHeader)
                || self.in_out_of_line_header(NodeKind::TaskHeader)
            {
                return ReferenceType::Immediate;
            }
            return ReferenceType::Unqualified;
        }
        if self.context.direct_parent_is(NodeKind::ParamByName) {
            // Named parameters are written ".PARAM", but branch off a
            // base that already names the scope to search; no type
            // indirection applies.
            return ReferenceType::DirectMember;
        }
        match self.last_hierarchy_operator {
            Some(TokenKind::Dot) => ReferenceType::MemberOfTypeOfParent,
            _ => ReferenceType::DirectMember,
        }
    }

    fn infer_metatype(&self) -> SymbolType {
        let current = self
            .reference_builders
            .last()
            .expect("not in a reference context");
        if self.in_out_of_line_header(NodeKind::FunctionHeader) {
            return if current.is_empty() {
                SymbolType::Class
            } else {
                SymbolType::Function
            };
        }
        if self.in_out_of_line_header(NodeKind::TaskHeader) {
            return if current.is_empty() {
                SymbolType::Class
            } else {
                SymbolType::Task
            };
        }
        if self.context.direct_parent_is(NodeKind::ActualNamedPort) {
            return SymbolType::DataNetVariableInstance;
        }
        if self.context.direct_parent_is(NodeKind::ParamByName) {
            return SymbolType::Parameter;
        }
        if self.context.direct_parents_are(&[
            NodeKind::UnqualifiedId,
            NodeKind::LocalRoot,
            NodeKind::FunctionCall,
        ]) {
            // Bare call: "function_name(...)".
            return SymbolType::Callable;
        }
        if self.context.direct_parents_are(&[
            NodeKind::UnqualifiedId,
            NodeKind::QualifiedId,
            NodeKind::LocalRoot,
            NodeKind::FunctionCall,
        ]) {
            // Qualified call: only the last component must be callable.
            let unqualified = self
                .context
                .nearest_parent_with_kind(NodeKind::UnqualifiedId)
                .expect("pattern matched");
            let qualified = self
                .context
                .nearest_parent_with_kind(NodeKind::QualifiedId)
                .expect("pattern matched");
            if self.tree.is_last_child_node(qualified, unqualified) {
                return SymbolType::Callable;
            }
        }
        if self
            .context
            .direct_parents_are(&[NodeKind::UnqualifiedId, NodeKind::MethodCallExtension])
        {
            // Method call: "obj.method_name(...)".
            return SymbolType::Callable;
        }
        SymbolType::Unspecified
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn origin(&self, node: NodeId) -> SyntaxOrigin {
        SyntaxOrigin {
            file: self.file,
            tree: self.tree.clone(),
            node,
        }
    }

    fn diagnose_symbol_already_exists(&mut self, name: &str) {
        self.diagnostics.push(SymbolError::DuplicateSymbol {
            name: name.to_string(),
            scope: self.table.full_path(self.current_scope),
        });
    }

    /// Create a named element in the current scope (modules, packages,
    /// classes, tasks, generate blocks).
    fn emplace_element(&mut self, element: NodeId, name: &str, metatype: SymbolType) -> ScopeId {
        let info = SymbolInfo {
            metatype,
            file_origin: Some(self.file),
            syntax_origin: Some(self.origin(element)),
            ..SymbolInfo::default()
        };
        let (scope, inserted) = self.table.try_emplace(self.current_scope, name, info);
        if !inserted {
            self.diagnose_symbol_already_exists(name);
        }
        scope
    }

    /// Create a named typed element in the current scope (nets,
    /// parameters, variables, instances, functions via return type).
    fn emplace_typed_element(
        &mut self,
        element: NodeId,
        name: &str,
        metatype: SymbolType,
    ) -> ScopeId {
        let declared_type = self
            .declaration_type_slot
            .clone()
            .expect("typed element declared outside a declaration type context");
        let info = SymbolInfo {
            metatype,
            file_origin: Some(self.file),
            syntax_origin: Some(self.origin(element)),
            declared_type,
            ..SymbolInfo::default()
        };
        let (scope, inserted) = self.table.try_emplace(self.current_scope, name, info);
        if !inserted {
            self.diagnose_symbol_already_exists(name);
        }
        scope
    }

    fn declare_scoped_element_and_descend(
        &mut self,
        element: NodeId,
        name: &str,
        metatype: SymbolType,
    ) {
        let scope = self.emplace_element(element, name, metatype);
        self.descend_in_scope(element, scope);
    }

    fn declare_module(&mut self, node: NodeId) {
        let Some(name) = self.declared_name(node) else {
            return;
        };
        self.declare_scoped_element_and_descend(node, &name, SymbolType::Module);
    }

    fn declare_package(&mut self, node: NodeId) {
        let Some(name) = self.declared_name(node) else {
            return;
        };
        self.declare_scoped_element_and_descend(node, &name, SymbolType::Package);
    }

    fn declare_class(&mut self, node: NodeId) {
        let Some(name) = self.declared_name(node) else {
            return;
        };
        self.declare_scoped_element_and_descend(node, &name, SymbolType::Class);
    }

    /// The first identifier leaf directly under a declaration node.
    fn declared_name(&self, node: NodeId) -> Option<SmolStr> {
        self.tree
            .find_leaf(node, TokenKind::Identifier)
            .map(|tok| tok.text.clone())
    }

    // ------------------------------------------------------------------
    // Generate constructs
    // ------------------------------------------------------------------

    fn generate_body(&self, clause: NodeId) -> Option<NodeId> {
        self.tree.last_child_node(clause)
    }

    /// The begin-label of a generate block, if it has one.
    fn generate_block_label(&self, block: NodeId) -> Option<SmolStr> {
        let children = self.tree.children(block);
        match (
            children.get(1).and_then(Child::as_leaf),
            children.get(2).and_then(Child::as_leaf),
        ) {
            (Some(colon), Some(label))
                if colon.kind == TokenKind::Colon && label.kind == TokenKind::Identifier =>
            {
                Some(label.text.clone())
            }
            _ => None,
        }
    }

    fn scope_name_from_generate_body(&mut self, body: NodeId) -> SmolStr {
        if self.tree.kind(body) == NodeKind::GenerateBlock {
            if let Some(label) = self.generate_block_label(body) {
                return label;
            }
        }
        self.table
            .create_anonymous_scope_name(self.current_scope, "generate")
    }

    fn declare_generate_if(&mut self, node: NodeId) {
        let Some(body) = self.generate_body(node) else {
            return;
        };
        let name = self.scope_name_from_generate_body(body);
        self.declare_scoped_element_and_descend(node, &name, SymbolType::Generate);
    }

    fn declare_generate_else(&mut self, node: NodeId) {
        let Some(body) = self.generate_body(node) else {
            return;
        };
        if self.tree.kind(body) == NodeKind::ConditionalGenerateConstruct {
            // Chained else-if: flatten. The nested if-clause creates its
            // scope directly under the current one.
            self.descend(body);
        } else {
            let name = self.scope_name_from_generate_body(body);
            self.declare_scoped_element_and_descend(node, &name, SymbolType::Generate);
        }
    }

    // ------------------------------------------------------------------
    // Functions, tasks, ports
    // ------------------------------------------------------------------

    /// Hold the current scope; the declared function enters its own scope
    /// only once its name is seen (after the return type was captured as
    /// a reference in the enclosing scope).
    fn declare_function(&mut self, node: NodeId) {
        let saved = self.current_scope;
        self.descend(node);
        self.current_scope = saved;
    }

    fn declare_task(&mut self, node: NodeId) {
        let saved = self.current_scope;
        self.descend(node);
        self.current_scope = saved;
    }

    /// Capture the declared function's return type while walking the
    /// header; the name identifier consumes the capture.
    fn setup_function_header(&mut self, node: NodeId) {
        let saved = std::mem::replace(
            &mut self.declaration_type_slot,
            Some(DeclarationTypeInfo::default()),
        );
        self.descend(node);
        self.declaration_type_slot = saved;
    }

    /// Port lists of out-of-line definition sites are skipped: the
    /// prototype is the source of truth for port names.
    fn declare_ports(&mut self, port_list: NodeId) {
        for header_kind in [NodeKind::FunctionHeader, NodeKind::TaskHeader] {
            if let Some(header) = self.context.nearest_parent_with_kind(header_kind) {
                if self.tree.find_child(header, NodeKind::QualifiedId).is_some() {
                    return;
                }
            }
        }
        self.descend(port_list);
    }

    // ------------------------------------------------------------------
    // Data, parameters, nets, instances
    // ------------------------------------------------------------------

    /// Open a declaration-type capture for the subtree: any data type
    /// encountered is recorded as the declared type of the elements
    /// declared within.
    fn declare_data(&mut self, node: NodeId) {
        let saved = std::mem::replace(
            &mut self.declaration_type_slot,
            Some(DeclarationTypeInfo::default()),
        );
        self.descend(node);
        self.declaration_type_slot = saved;
    }

    fn declare_parameter(&mut self, node: NodeId) {
        let saved = std::mem::replace(
            &mut self.declaration_type_slot,
            Some(DeclarationTypeInfo::default()),
        );
        self.descend(node);
        self.declaration_type_slot = saved;
    }

    fn declare_net(&mut self, node: NodeId) {
        let Some(name) = self.declared_name(node) else {
            return;
        };
        self.emplace_typed_element(node, &name, SymbolType::DataNetVariableInstance);
        self.descend(node);
    }

    fn declare_register(&mut self, node: NodeId) {
        let Some(name) = self.declared_name(node) else {
            return;
        };
        self.emplace_typed_element(node, &name, SymbolType::DataNetVariableInstance);
        self.descend(node);
    }

    /// Declare one instance and seed its self-reference: the instance
    /// name resolves to the symbol just declared, and its named ports
    /// branch off that root as siblings, to be looked up later through
    /// the instance's declared type.
    fn declare_instance(&mut self, node: NodeId) {
        let Some(name) = self.declared_name(node) else {
            return;
        };
        let instance = self.emplace_typed_element(node, &name, SymbolType::DataNetVariableInstance);

        self.with_reference_capture(|b| {
            let root = b.push_component_to_current(ReferenceComponent {
                identifier: name.clone(),
                ref_type: ReferenceType::Unqualified,
                metatype: SymbolType::DataNetVariableInstance,
                resolved_symbol: Some(instance),
            });
            let saved_branch = std::mem::replace(&mut b.reference_branch_point, Some(root));
            b.descend(node);
            b.reference_branch_point = saved_branch;
        });
    }

    // ------------------------------------------------------------------
    // Out-of-line definitions
    // ------------------------------------------------------------------

    fn handle_qualified_id(&mut self, node: NodeId) {
        match self.context.top().map(|(kind, _)| kind) {
            Some(NodeKind::FunctionHeader) => {
                let decl_syntax = self.context.nearest_parent_matching(|kind| {
                    matches!(
                        kind,
                        NodeKind::FunctionDeclaration | NodeKind::FunctionPrototype
                    )
                });
                if let Some(decl_syntax) = decl_syntax {
                    self.descend_through_out_of_line(node, SymbolType::Function, decl_syntax);
                }
            }
            Some(NodeKind::TaskHeader) => {
                let decl_syntax = self.context.nearest_parent_matching(|kind| {
                    matches!(kind, NodeKind::TaskDeclaration | NodeKind::TaskPrototype)
                });
                if let Some(decl_syntax) = decl_syntax {
                    self.descend_through_out_of_line(node, SymbolType::Task, decl_syntax);
                }
            }
            _ => {
                // An ordinary qualified reference, not a definition.
                self.descend(node);
            }
        }
    }

    fn descend_through_out_of_line(
        &mut self,
        qualified_id: NodeId,
        metatype: SymbolType,
        decl_syntax: NodeId,
    ) {
        match self.lookup_or_inject_out_of_line(qualified_id, metatype, decl_syntax) {
            Ok(inner) => {
                // The rest of the definition populates the inner scope;
                // the enclosing declaration restores the outer scope.
                self.current_scope = inner;
                self.descend(qualified_id);
            }
            Err(err) => {
                // No place to put the definition's locals; skip it.
                self.diagnostics.push(err);
            }
        }
    }

    fn lookup_or_inject_out_of_line(
        &mut self,
        qualified_id: NodeId,
        metatype: SymbolType,
        decl_syntax: NodeId,
    ) -> Result<ScopeId, SymbolError> {
        // Build the "outer::inner" reference; it anchors in the scope
        // containing the definition.
        self.reference_builders.push(DependentReferences::default());
        self.descend(qualified_id);
        let dep = self.reference_builders.pop().expect("capture stack underflow");
        let result = self.resolve_out_of_line_parts(&dep, metatype, decl_syntax);
        self.commit_capture(dep);
        result
    }

    fn resolve_out_of_line_parts(
        &mut self,
        dep: &DependentReferences,
        metatype: SymbolType,
        decl_syntax: NodeId,
    ) -> Result<ScopeId, SymbolError> {
        let base = dep.root.expect("out-of-line id yields a reference");
        debug_assert_eq!(self.table.refs().node(base).children.len(), 1);

        // The base (class name) must resolve immediately, in the current
        // scope only; it is never injected.
        let base_key = self.table.refs().node(base).component.identifier.clone();
        let outer_scope = self
            .table
            .lookup_local(self.current_scope, &base_key)
            .ok_or_else(|| SymbolError::UnresolvedMember {
                name: base_key.to_string(),
                metatype: self.table.scope(self.current_scope).info.metatype,
                scope: self.table.display_name(self.current_scope).to_string(),
            })?;
        self.table
            .refs()
            .node(base)
            .component
            .matches_metatype(self.table.scope(outer_scope).info.metatype)?;
        self.table.refs_mut().node_mut(base).component.resolved_symbol = Some(outer_scope);

        // Look up the inner symbol, or inject it with a non-fatal
        // missing-prototype diagnostic.
        let inner = self.table.refs().node(base).children[0];
        let inner_key = self.table.refs().node(inner).component.identifier.clone();
        let info = SymbolInfo {
            metatype,
            file_origin: Some(self.file),
            syntax_origin: Some(self.origin(decl_syntax)),
            ..SymbolInfo::default()
        };
        let (inner_symbol, injected) = self.table.try_emplace(outer_scope, &inner_key, info);
        if injected {
            self.diagnostics.push(SymbolError::UnresolvedMember {
                name: inner_key.to_string(),
                metatype: self.table.scope(outer_scope).info.metatype,
                scope: self.table.display_name(outer_scope).to_string(),
            });
        } else {
            let original = self.table.scope(inner_symbol).info.metatype;
            if original != metatype {
                return Err(SymbolError::OutOfLineRedefinitionConflict {
                    prototype: original,
                    path: self.table.full_path(inner_symbol),
                    redefined: metatype,
                });
            }
        }
        // The definition reference is resolved on the spot.
        self.table.refs_mut().node_mut(inner).component.resolved_symbol = Some(inner_symbol);
        Ok(inner_symbol)
    }

    // ------------------------------------------------------------------
    // Includes
    // ------------------------------------------------------------------

    fn enter_include_file(&mut self, node: NodeId) {
        let Some(filename_token) = self.tree.find_leaf(node, TokenKind::StringLiteral) else {
            return;
        };
        let filename = strip_outer_quotes(&filename_token.text).to_string();

        let Some(project) = self.project.as_deref_mut() else {
            self.diagnostics.push(SymbolError::IncludeFailure {
                filename,
                reason: "no project is configured to open included files".to_string(),
            });
            return;
        };

        let included = match project.open_included_file(&filename) {
            Ok(file) => file,
            Err(err) => {
                self.diagnostics.push(SymbolError::IncludeFailure {
                    filename,
                    reason: err.to_string(),
                });
                return;
            }
        };
        let tree = match project.parse(included) {
            Ok(tree) => tree,
            Err(err) => {
                // No partial traversal of an unparsable include.
                self.diagnostics.push(SymbolError::IncludeFailure {
                    filename,
                    reason: err.to_string(),
                });
                return;
            }
        };

        // Walk the included tree with the origin file swapped; the
        // current scope is unchanged, so inclusion is textually
        // transparent.
        let saved_file = std::mem::replace(&mut self.file, included);
        let saved_tree = std::mem::replace(&mut self.tree, tree);
        let root = self.tree.root();
        self.visit_node(root);
        self.tree = saved_tree;
        self.file = saved_file;
    }
}

/// `"path"` with the outermost double quotes removed; text without
/// surrounding quotes is returned as-is.
fn strip_outer_quotes(text: &str) -> &str {
    let text = text.strip_prefix('"').unwrap_or(text);
    text.strip_suffix('"').unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(source: &str) -> (SymbolTable, Vec<SymbolError>) {
        let tree = Arc::new(sv_parser::parse(source).expect("test source must parse"));
        let mut table = SymbolTable::new();
        let diagnostics = build_from_tree(&mut table, FileId(0), tree);
        table.check_integrity();
        (table, diagnostics)
    }

    #[test]
    fn test_module_with_wire() {
        let (table, diagnostics) = build("module m; wire w; endmodule");
        assert!(diagnostics.is_empty());
        let m = table.lookup_local(table.root(), "m").expect("m not declared");
        assert_eq!(table.scope(m).info.metatype, SymbolType::Module);
        let w = table.lookup_local(m, "w").expect("w not declared");
        assert_eq!(
            table.scope(w).info.metatype,
            SymbolType::DataNetVariableInstance
        );
        assert_eq!(table.full_path(w), "$root::m::w");
    }

    #[test]
    fn test_duplicate_declaration() {
        let (table, diagnostics) = build("module m; wire w; wire w; endmodule");
        assert_eq!(
            diagnostics,
            vec![SymbolError::DuplicateSymbol {
                name: "w".to_string(),
                scope: "$root::m".to_string(),
            }]
        );
        let m = table.lookup_local(table.root(), "m").unwrap();
        assert_eq!(table.scope(m).children().len(), 1);
    }

    #[test]
    fn test_function_return_type_is_reference_in_enclosing_scope() {
        let (table, diagnostics) =
            build("class C; endclass function C make(); endfunction");
        assert!(diagnostics.is_empty());
        let f = table.lookup_local(table.root(), "make").expect("function");
        assert_eq!(table.scope(f).info.metatype, SymbolType::Function);
        // The return type reference is anchored at $root, where the
        // function declaration appears.
        let root_refs = &table.scope(table.root()).info.local_references_to_bind;
        assert_eq!(root_refs.len(), 1);
        let root_id = root_refs[0].root.unwrap();
        assert_eq!(table.refs().node(root_id).component.identifier, "C");
        // And recorded as the function's declared (return) type.
        assert_eq!(
            table.scope(f).info.declared_type.user_defined_type,
            Some(root_id)
        );
    }

    #[test]
    fn test_out_of_line_injection_with_diagnostic() {
        let (table, diagnostics) =
            build("class C; endclass function int C::g(); return 0; endfunction");
        let c = table.lookup_local(table.root(), "C").expect("class C");
        let g = table.lookup_local(c, "g").expect("injected g");
        assert_eq!(table.scope(g).info.metatype, SymbolType::Function);
        assert_eq!(
            diagnostics,
            vec![SymbolError::UnresolvedMember {
                name: "g".to_string(),
                metatype: SymbolType::Class,
                scope: "C".to_string(),
            }]
        );
    }

    #[test]
    fn test_out_of_line_matches_prototype_silently() {
        let (table, diagnostics) = build(
            "class C; extern function int g(); endclass \
             function int C::g(); return 0; endfunction",
        );
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
        let c = table.lookup_local(table.root(), "C").unwrap();
        let g = table.lookup_local(c, "g").unwrap();
        assert_eq!(table.scope(g).info.metatype, SymbolType::Function);
    }

    #[test]
    fn test_out_of_line_metatype_conflict() {
        let (table, diagnostics) = build(
            "class C; extern task g(); endclass \
             function int C::g(); return 0; endfunction",
        );
        assert_eq!(
            diagnostics,
            vec![SymbolError::OutOfLineRedefinitionConflict {
                prototype: SymbolType::Task,
                path: "$root::C::g".to_string(),
                redefined: SymbolType::Function,
            }]
        );
        // The prototype's record is untouched.
        let c = table.lookup_local(table.root(), "C").unwrap();
        let g = table.lookup_local(c, "g").unwrap();
        assert_eq!(table.scope(g).info.metatype, SymbolType::Task);
    }

    #[test]
    fn test_out_of_line_missing_class_skips_definition() {
        let (table, diagnostics) = build("function int D::g(); return 0; endfunction");
        assert_eq!(
            diagnostics,
            vec![SymbolError::UnresolvedMember {
                name: "D".to_string(),
                metatype: SymbolType::Root,
                scope: "$root".to_string(),
            }]
        );
        assert!(table.lookup_local(table.root(), "g").is_none());
    }

    #[test]
    fn test_generate_scopes_labeled_and_anonymous() {
        let (table, diagnostics) = build(
            "module m; \
             if (1) begin : g1 wire a; end \
             if (1) begin wire b; end \
             endmodule",
        );
        assert!(diagnostics.is_empty());
        let m = table.lookup_local(table.root(), "m").unwrap();
        let g1 = table.lookup_local(m, "g1").expect("labeled generate scope");
        assert_eq!(table.scope(g1).info.metatype, SymbolType::Generate);
        assert!(table.lookup_local(g1, "a").is_some());
        let anon = table
            .lookup_local(m, "%anon-generate-0")
            .expect("anonymous generate scope");
        assert!(table.lookup_local(anon, "b").is_some());
    }

    #[test]
    fn test_else_if_chain_is_flattened() {
        let (table, diagnostics) = build(
            "module m; \
             if (1) begin : a wire x; end \
             else if (2) begin : b wire y; end \
             else begin : c wire z; end \
             endmodule",
        );
        assert!(diagnostics.is_empty());
        let m = table.lookup_local(table.root(), "m").unwrap();
        // All three arms are scopes directly under the module; the
        // chained else introduced no intermediate scope.
        for name in ["a", "b", "c"] {
            let scope = table.lookup_local(m, name).expect("generate arm");
            assert_eq!(table.scope(scope).parent(), Some(m));
        }
    }

    #[test]
    fn test_instance_self_reference_with_named_ports() {
        let (table, diagnostics) = build(
            "module mymod(input wire a, input wire b); endmodule \
             module top; wire x; mymod u1 (.a(x), .b(x)); endmodule",
        );
        assert!(diagnostics.is_empty());
        let top = table.lookup_local(table.root(), "top").unwrap();
        let u1 = table.lookup_local(top, "u1").expect("instance symbol");
        assert_eq!(
            table.scope(u1).info.metatype,
            SymbolType::DataNetVariableInstance
        );

        // Find the self-reference chain: root pre-resolved to u1, named
        // ports as siblings beneath it.
        let refs = &table.scope(top).info.local_references_to_bind;
        let self_ref = refs
            .iter()
            .find_map(|dep| {
                let root = dep.root?;
                (table.refs().node(root).component.identifier == "u1").then_some(root)
            })
            .expect("instance self-reference");
        assert_eq!(
            table.refs().node(self_ref).component.resolved_symbol,
            Some(u1)
        );
        let ports: Vec<_> = table
            .refs()
            .node(self_ref)
            .children
            .iter()
            .map(|&child| table.refs().node(child).component.identifier.clone())
            .collect();
        assert_eq!(ports, vec!["a", "b"]);
    }

    #[test]
    fn test_typedef_declares_type_alias() {
        let (table, diagnostics) = build("class C; endclass typedef C my_c;");
        assert!(diagnostics.is_empty());
        let alias = table.lookup_local(table.root(), "my_c").expect("typedef");
        assert_eq!(table.scope(alias).info.metatype, SymbolType::TypeAlias);
        let udt = table.scope(alias).info.declared_type.user_defined_type;
        let udt = udt.expect("aliased user type recorded");
        assert_eq!(table.refs().node(udt).component.identifier, "C");
    }

    #[test]
    fn test_include_without_project_is_diagnosed() {
        let (_, diagnostics) = build("`include \"defs.svh\"\nmodule m; endmodule");
        assert!(matches!(
            diagnostics.as_slice(),
            [SymbolError::IncludeFailure { filename, .. }] if filename == "defs.svh"
        ));
    }

    #[test]
    fn test_named_parameter_branches_off_type_reference() {
        let (table, diagnostics) = build(
            "module mymod #(parameter W = 1) (); endmodule \
             module top; mymod #(.W(8)) u1 (); endmodule",
        );
        assert!(diagnostics.is_empty());
        let top = table.lookup_local(table.root(), "top").unwrap();
        let refs = &table.scope(top).info.local_references_to_bind;
        let type_root = refs
            .iter()
            .find_map(|dep| {
                let root = dep.root?;
                (table.refs().node(root).component.identifier == "mymod").then_some(root)
            })
            .expect("type reference chain");
        let children = &table.refs().node(type_root).children;
        assert_eq!(children.len(), 1);
        let named = &table.refs().node(children[0]).component;
        assert_eq!(named.identifier, "W");
        assert_eq!(named.ref_type, ReferenceType::DirectMember);
        assert_eq!(named.metatype, SymbolType::Parameter);
    }
}
