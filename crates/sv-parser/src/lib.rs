//! Recursive-descent parser for the supported SystemVerilog subset.
//!
//! The output is a [`SyntaxTree`] of tagged nodes and token leaves; the
//! node shapes are exactly what the symbol-table builder dispatches on
//! (identifier under `UnqualifiedId` under `FunctionHeader`, `ParamByName`
//! for named parameters, `LocalRoot`/`FunctionCall` nesting for calls,
//! and so on). Syntax outside the subset is a `ParseError`.

use std::sync::Arc;
use sv_diagnostics::ParseError;
use sv_lexer::Lexer;
use sv_syntax::{Child, NodeId, NodeKind, SyntaxTree, SyntaxTreeBuilder, Token, TokenKind};

type PResult<T> = Result<T, ParseError>;

/// Parse a whole translation unit.
pub fn parse(source: &str) -> Result<SyntaxTree, ParseError> {
    let tokens = Lexer::new(source).tokenize().map_err(|e| {
        // Lexical failures surface through the same parse entry point.
        ParseError::InvalidSyntax {
            message: e.to_string(),
            span: sv_diagnostics::Span::DUMMY.into(),
        }
    })?;
    Parser::new(tokens).parse_source_file(Arc::from(source))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    builder: SyntaxTreeBuilder,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            builder: SyntaxTreeBuilder::new(),
        }
    }

    // ------------------------------------------------------------------
    // Token cursor helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn peek_kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| t.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn bump(&mut self) -> PResult<Token> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ParseError::UnexpectedEof {
                expected: "more input".to_string(),
            })?;
        self.pos += 1;
        Ok(tok)
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) {
            let tok = self.tokens[self.pos].clone();
            self.pos += 1;
            Some(tok)
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        match self.peek() {
            Some(tok) if tok.kind == kind => {
                let tok = tok.clone();
                self.pos += 1;
                Ok(tok)
            }
            Some(tok) => Err(ParseError::UnexpectedToken {
                expected: kind.to_string(),
                found: format!("'{}'", tok.text),
                span: tok.span.into(),
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: kind.to_string(),
            }),
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        match self.peek() {
            Some(tok) => ParseError::InvalidSyntax {
                message: message.into(),
                span: tok.span.into(),
            },
            None => ParseError::UnexpectedEof {
                expected: message.into(),
            },
        }
    }

    fn node(&mut self, kind: NodeKind, children: Vec<Child>) -> Child {
        Child::Node(self.builder.node(kind, children))
    }

    fn node_id(&mut self, kind: NodeKind, children: Vec<Child>) -> NodeId {
        self.builder.node(kind, children)
    }

    // ------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------

    fn parse_source_file(mut self, source: Arc<str>) -> PResult<SyntaxTree> {
        let mut children = Vec::new();
        while self.peek().is_some() {
            self.parse_item(&mut children)?;
        }
        let root = self.node_id(NodeKind::SourceFile, children);
        Ok(self.builder.finish(root, source))
    }

    /// One description, module item, class item, or block-level declaration.
    /// The same constructs are accepted in every container; the builder
    /// cares about nesting, not host-specific grammar restrictions.
    fn parse_item(&mut self, out: &mut Vec<Child>) -> PResult<()> {
        match self.peek_kind() {
            Some(TokenKind::KwModule) => {
                let item = self.parse_module()?;
                out.push(item);
            }
            Some(TokenKind::KwPackage) => {
                let item = self.parse_package()?;
                out.push(item);
            }
            Some(TokenKind::KwClass) => {
                let item = self.parse_class()?;
                out.push(item);
            }
            Some(TokenKind::KwExtern) => {
                let item = if self.peek_kind_at(1) == Some(TokenKind::KwTask) {
                    self.parse_task()?
                } else {
                    self.parse_function()?
                };
                out.push(item);
            }
            Some(TokenKind::KwFunction) => {
                let item = self.parse_function()?;
                out.push(item);
            }
            Some(TokenKind::KwTask) => {
                let item = self.parse_task()?;
                out.push(item);
            }
            Some(TokenKind::KwTypedef) => {
                let item = self.parse_typedef()?;
                out.push(item);
            }
            Some(TokenKind::KwParameter) | Some(TokenKind::KwLocalParam) => {
                self.parse_param_declarations(out)?;
            }
            Some(TokenKind::KwWire) => {
                let item = self.parse_net_declaration()?;
                out.push(item);
            }
            Some(TokenKind::KwInitial) => {
                let item = self.parse_initial()?;
                out.push(item);
            }
            Some(TokenKind::KwAlways) => {
                let item = self.parse_always()?;
                out.push(item);
            }
            Some(TokenKind::KwAssign) => {
                let item = self.parse_continuous_assign()?;
                out.push(item);
            }
            Some(TokenKind::KwGenerate) => {
                let item = self.parse_generate_region()?;
                out.push(item);
            }
            Some(TokenKind::KwIf) => {
                let item = self.parse_conditional_generate()?;
                out.push(item);
            }
            Some(TokenKind::KwReturn) => {
                let item = self.parse_return()?;
                out.push(item);
            }
            Some(TokenKind::KwBegin) => {
                let item = self.parse_seq_block()?;
                out.push(item);
            }
            Some(TokenKind::Directive) => {
                let item = self.parse_directive()?;
                out.push(item);
            }
            Some(k) if k.is_primitive_type() => {
                let item = self.parse_data_declaration()?;
                out.push(item);
            }
            Some(TokenKind::Identifier) if self.looks_like_declaration() => {
                let item = self.parse_data_declaration()?;
                out.push(item);
            }
            Some(TokenKind::Identifier) | Some(TokenKind::SystemIdentifier) => {
                let item = self.parse_statement()?;
                out.push(item);
            }
            Some(_) => {
                return Err(self.error_here("unsupported construct"));
            }
            None => {}
        }
        Ok(())
    }

    /// Lookahead: does the upcoming `ident ...` start a data declaration or
    /// instantiation (`C c;`, `mymod u1 (...)`, `p::T x;`) rather than a
    /// statement (`x = 1;`, `f();`, `c.f = 0;`)?
    fn looks_like_declaration(&self) -> bool {
        let mut i = self.pos;
        let kind_at = |i: usize| self.tokens.get(i).map(|t| t.kind);
        // type head: ident
        if kind_at(i) != Some(TokenKind::Identifier) {
            return false;
        }
        i += 1;
        loop {
            match kind_at(i) {
                // parameterized type: #(...)
                Some(TokenKind::Hash) if kind_at(i + 1) == Some(TokenKind::LParen) => {
                    i += 2;
                    let mut depth = 1usize;
                    while depth > 0 {
                        match kind_at(i) {
                            Some(TokenKind::LParen) => depth += 1,
                            Some(TokenKind::RParen) => depth -= 1,
                            None => return false,
                            _ => {}
                        }
                        i += 1;
                    }
                }
                Some(TokenKind::ScopeRes) if kind_at(i + 1) == Some(TokenKind::Identifier) => {
                    i += 2;
                }
                Some(TokenKind::LBracket) => {
                    let mut depth = 1usize;
                    i += 1;
                    while depth > 0 {
                        match kind_at(i) {
                            Some(TokenKind::LBracket) => depth += 1,
                            Some(TokenKind::RBracket) => depth -= 1,
                            None => return false,
                            _ => {}
                        }
                        i += 1;
                    }
                }
                _ => break,
            }
        }
        kind_at(i) == Some(TokenKind::Identifier)
    }

    // ------------------------------------------------------------------
    // Design elements
    // ------------------------------------------------------------------

    fn parse_module(&mut self) -> PResult<Child> {
        let mut children = vec![Child::Leaf(self.expect(TokenKind::KwModule)?)];
        children.push(Child::Leaf(self.expect(TokenKind::Identifier)?));
        if self.at(TokenKind::Hash) {
            self.parse_formal_parameter_list(&mut children)?;
        }
        if self.at(TokenKind::LParen) {
            let ports = self.parse_module_port_list()?;
            children.push(ports);
        }
        children.push(Child::Leaf(self.expect(TokenKind::Semicolon)?));
        while !self.at(TokenKind::KwEndModule) {
            if self.peek().is_none() {
                return Err(ParseError::UnexpectedEof {
                    expected: "endmodule".to_string(),
                });
            }
            self.parse_item(&mut children)?;
        }
        children.push(Child::Leaf(self.expect(TokenKind::KwEndModule)?));
        self.parse_optional_end_label(&mut children)?;
        Ok(self.node(NodeKind::ModuleDeclaration, children))
    }

    fn parse_package(&mut self) -> PResult<Child> {
        let mut children = vec![Child::Leaf(self.expect(TokenKind::KwPackage)?)];
        children.push(Child::Leaf(self.expect(TokenKind::Identifier)?));
        children.push(Child::Leaf(self.expect(TokenKind::Semicolon)?));
        while !self.at(TokenKind::KwEndPackage) {
            if self.peek().is_none() {
                return Err(ParseError::UnexpectedEof {
                    expected: "endpackage".to_string(),
                });
            }
            self.parse_item(&mut children)?;
        }
        children.push(Child::Leaf(self.expect(TokenKind::KwEndPackage)?));
        self.parse_optional_end_label(&mut children)?;
        Ok(self.node(NodeKind::PackageDeclaration, children))
    }

    fn parse_class(&mut self) -> PResult<Child> {
        let mut children = vec![Child::Leaf(self.expect(TokenKind::KwClass)?)];
        children.push(Child::Leaf(self.expect(TokenKind::Identifier)?));
        children.push(Child::Leaf(self.expect(TokenKind::Semicolon)?));
        while !self.at(TokenKind::KwEndClass) {
            if self.peek().is_none() {
                return Err(ParseError::UnexpectedEof {
                    expected: "endclass".to_string(),
                });
            }
            self.parse_item(&mut children)?;
        }
        children.push(Child::Leaf(self.expect(TokenKind::KwEndClass)?));
        self.parse_optional_end_label(&mut children)?;
        Ok(self.node(NodeKind::ClassDeclaration, children))
    }

    fn parse_optional_end_label(&mut self, children: &mut Vec<Child>) -> PResult<()> {
        if let Some(colon) = self.eat(TokenKind::Colon) {
            children.push(Child::Leaf(colon));
            children.push(Child::Leaf(self.expect(TokenKind::Identifier)?));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Functions and tasks
    // ------------------------------------------------------------------

    fn parse_function(&mut self) -> PResult<Child> {
        let extern_kw = self.eat(TokenKind::KwExtern);
        let is_prototype = extern_kw.is_some();

        let mut header = vec![Child::Leaf(self.expect(TokenKind::KwFunction)?)];
        if self.function_return_type_present() {
            let ty = self.parse_data_type()?;
            header.push(ty);
        }
        let name = self.parse_declared_id()?;
        header.push(name);
        if self.at(TokenKind::LParen) {
            let ports = self.parse_tf_port_list()?;
            header.push(ports);
        }
        header.push(Child::Leaf(self.expect(TokenKind::Semicolon)?));
        let header = self.node(NodeKind::FunctionHeader, header);

        if is_prototype {
            let extern_kw = extern_kw.expect("extern keyword");
            return Ok(self.node(
                NodeKind::FunctionPrototype,
                vec![Child::Leaf(extern_kw), header],
            ));
        }

        let mut children = vec![header];
        while !self.at(TokenKind::KwEndFunction) {
            if self.peek().is_none() {
                return Err(ParseError::UnexpectedEof {
                    expected: "endfunction".to_string(),
                });
            }
            self.parse_item(&mut children)?;
        }
        children.push(Child::Leaf(self.expect(TokenKind::KwEndFunction)?));
        self.parse_optional_end_label(&mut children)?;
        Ok(self.node(NodeKind::FunctionDeclaration, children))
    }

    /// After `function`, is the next run of tokens a return type (followed
    /// by the declared name) or already the name itself?
    fn function_return_type_present(&self) -> bool {
        match self.peek_kind() {
            Some(k) if k.is_primitive_type() => true,
            Some(TokenKind::Identifier) => {
                // Scan a type-ref shape; if another identifier follows, the
                // scanned run was the return type.
                let mut i = self.pos + 1;
                let kind_at = |i: usize| self.tokens.get(i).map(|t| t.kind);
                while kind_at(i) == Some(TokenKind::ScopeRes)
                    && kind_at(i + 1) == Some(TokenKind::Identifier)
                {
                    i += 2;
                }
                kind_at(i) == Some(TokenKind::Identifier)
            }
            _ => false,
        }
    }

    fn parse_task(&mut self) -> PResult<Child> {
        let extern_kw = self.eat(TokenKind::KwExtern);

        let mut header = vec![Child::Leaf(self.expect(TokenKind::KwTask)?)];
        let name = self.parse_declared_id()?;
        header.push(name);
        if self.at(TokenKind::LParen) {
            let ports = self.parse_tf_port_list()?;
            header.push(ports);
        }
        header.push(Child::Leaf(self.expect(TokenKind::Semicolon)?));
        let header = self.node(NodeKind::TaskHeader, header);

        if let Some(extern_kw) = extern_kw {
            return Ok(self.node(
                NodeKind::TaskPrototype,
                vec![Child::Leaf(extern_kw), header],
            ));
        }

        let mut children = vec![header];
        while !self.at(TokenKind::KwEndTask) {
            if self.peek().is_none() {
                return Err(ParseError::UnexpectedEof {
                    expected: "endtask".to_string(),
                });
            }
            self.parse_item(&mut children)?;
        }
        children.push(Child::Leaf(self.expect(TokenKind::KwEndTask)?));
        self.parse_optional_end_label(&mut children)?;
        Ok(self.node(NodeKind::TaskDeclaration, children))
    }

    /// The declared name of a function or task: either a plain identifier
    /// or a two-part `Class::name` for out-of-line definitions.
    fn parse_declared_id(&mut self) -> PResult<Child> {
        let first = self.expect(TokenKind::Identifier)?;
        let first = self.node(NodeKind::UnqualifiedId, vec![Child::Leaf(first)]);
        if self.at(TokenKind::ScopeRes) {
            let scope_res = self.bump()?;
            let second = self.expect(TokenKind::Identifier)?;
            let second = self.node(NodeKind::UnqualifiedId, vec![Child::Leaf(second)]);
            Ok(self.node(
                NodeKind::QualifiedId,
                vec![first, Child::Leaf(scope_res), second],
            ))
        } else {
            Ok(first)
        }
    }

    // ------------------------------------------------------------------
    // Ports
    // ------------------------------------------------------------------

    fn parse_module_port_list(&mut self) -> PResult<Child> {
        self.parse_port_list_with(NodeKind::PortDeclaration)
    }

    fn parse_tf_port_list(&mut self) -> PResult<Child> {
        self.parse_port_list_with(NodeKind::PortItem)
    }

    fn parse_port_list_with(&mut self, item_kind: NodeKind) -> PResult<Child> {
        let mut children = vec![Child::Leaf(self.expect(TokenKind::LParen)?)];
        while !self.at(TokenKind::RParen) {
            let item = self.parse_port(item_kind)?;
            children.push(item);
            if let Some(comma) = self.eat(TokenKind::Comma) {
                children.push(Child::Leaf(comma));
            } else {
                break;
            }
        }
        children.push(Child::Leaf(self.expect(TokenKind::RParen)?));
        Ok(self.node(NodeKind::PortList, children))
    }

    fn parse_port(&mut self, item_kind: NodeKind) -> PResult<Child> {
        let mut children = Vec::new();
        if matches!(
            self.peek_kind(),
            Some(TokenKind::KwInput) | Some(TokenKind::KwOutput) | Some(TokenKind::KwInout)
        ) {
            children.push(Child::Leaf(self.bump()?));
        }
        // Optional type before the port name.
        let type_present = match self.peek_kind() {
            Some(k) if k.is_primitive_type() => true,
            Some(TokenKind::Identifier) => {
                matches!(self.peek_kind_at(1), Some(TokenKind::Identifier))
                    || self.peek_kind_at(1) == Some(TokenKind::ScopeRes)
            }
            _ => false,
        };
        if type_present {
            let ty = self.parse_data_type()?;
            children.push(ty);
        }
        let name = self.expect(TokenKind::Identifier)?;
        let name = self.node(NodeKind::UnqualifiedId, vec![Child::Leaf(name)]);
        children.push(name);
        while self.at(TokenKind::LBracket) {
            let dim = self.parse_dimension()?;
            children.push(dim);
        }
        Ok(self.node(item_kind, children))
    }

    // ------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------

    /// `#( parameter W = 8, parameter type T = ... )` on a module header.
    fn parse_formal_parameter_list(&mut self, out: &mut Vec<Child>) -> PResult<()> {
        out.push(Child::Leaf(self.expect(TokenKind::Hash)?));
        out.push(Child::Leaf(self.expect(TokenKind::LParen)?));
        while !self.at(TokenKind::RParen) {
            self.eat(TokenKind::KwParameter);
            self.eat(TokenKind::KwLocalParam);
            let item = self.parse_one_parameter()?;
            out.push(item);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        out.push(Child::Leaf(self.expect(TokenKind::RParen)?));
        Ok(())
    }

    /// `parameter [type] name = value, name2 = value2, ... ;`
    fn parse_param_declarations(&mut self, out: &mut Vec<Child>) -> PResult<()> {
        self.bump()?; // parameter | localparam
        loop {
            let item = self.parse_one_parameter()?;
            out.push(item);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    fn parse_one_parameter(&mut self) -> PResult<Child> {
        let mut param_type = Vec::new();
        let type_present = match self.peek_kind() {
            Some(k) if k.is_primitive_type() => true,
            Some(TokenKind::Identifier) => {
                matches!(self.peek_kind_at(1), Some(TokenKind::Identifier))
                    || self.peek_kind_at(1) == Some(TokenKind::ScopeRes)
            }
            _ => false,
        };
        if type_present {
            let ty = self.parse_data_type()?;
            param_type.push(ty);
        }
        param_type.push(Child::Leaf(self.expect(TokenKind::Identifier)?));
        let param_type = self.node(NodeKind::ParamType, param_type);

        let mut children = vec![param_type];
        if let Some(eq) = self.eat(TokenKind::Equals) {
            children.push(Child::Leaf(eq));
            let value = self.parse_expression()?;
            children.push(value);
        }
        Ok(self.node(NodeKind::ParamDeclaration, children))
    }

    // ------------------------------------------------------------------
    // Types and declarations
    // ------------------------------------------------------------------

    fn parse_typedef(&mut self) -> PResult<Child> {
        let mut children = vec![Child::Leaf(self.expect(TokenKind::KwTypedef)?)];
        let ty = self.parse_data_type()?;
        children.push(ty);
        children.push(Child::Leaf(self.expect(TokenKind::Identifier)?));
        children.push(Child::Leaf(self.expect(TokenKind::Semicolon)?));
        Ok(self.node(NodeKind::TypeDeclaration, children))
    }

    fn parse_net_declaration(&mut self) -> PResult<Child> {
        let mut ty = vec![Child::Leaf(self.expect(TokenKind::KwWire)?)];
        while self.at(TokenKind::LBracket) {
            let dim = self.parse_dimension()?;
            ty.push(dim);
        }
        let ty = self.node(NodeKind::DataType, ty);

        let mut children = vec![ty];
        loop {
            let mut var = vec![Child::Leaf(self.expect(TokenKind::Identifier)?)];
            while self.at(TokenKind::LBracket) {
                let dim = self.parse_dimension()?;
                var.push(dim);
            }
            let var = self.node(NodeKind::NetVariable, var);
            children.push(var);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        children.push(Child::Leaf(self.expect(TokenKind::Semicolon)?));
        Ok(self.node(NodeKind::NetDeclaration, children))
    }

    /// Variable declarations and module instantiations share one shape:
    /// a data type followed by declared names, where a parenthesized
    /// connection list marks an instance.
    fn parse_data_declaration(&mut self) -> PResult<Child> {
        let ty = self.parse_data_type()?;
        let mut items = Vec::new();
        loop {
            let name = self.expect(TokenKind::Identifier)?;
            if self.at(TokenKind::LParen) {
                let actuals = self.parse_port_actual_list()?;
                let inst =
                    self.node(NodeKind::GateInstance, vec![Child::Leaf(name), actuals]);
                items.push(inst);
            } else {
                let mut var = vec![Child::Leaf(name)];
                while self.at(TokenKind::LBracket) {
                    let dim = self.parse_dimension()?;
                    var.push(dim);
                }
                if let Some(eq) = self.eat(TokenKind::Equals) {
                    var.push(Child::Leaf(eq));
                    let init = self.parse_expression()?;
                    var.push(init);
                }
                let var = self.node(NodeKind::RegisterVariable, var);
                items.push(var);
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        let list = self.node(NodeKind::GateInstanceRegisterVariableList, items);
        let semi = self.expect(TokenKind::Semicolon)?;
        Ok(self.node(
            NodeKind::DataDeclaration,
            vec![ty, list, Child::Leaf(semi)],
        ))
    }

    /// A data type: primitive keyword, or a possibly-qualified user type
    /// with optional named parameter assignments: `A#(.B(1))::C`.
    fn parse_data_type(&mut self) -> PResult<Child> {
        let mut children = Vec::new();
        match self.peek_kind() {
            Some(k) if k.is_primitive_type() => {
                children.push(Child::Leaf(self.bump()?));
            }
            Some(TokenKind::Identifier) => {
                let part = self.parse_type_id_part()?;
                children.push(part);
                while self.at(TokenKind::ScopeRes) {
                    children.push(Child::Leaf(self.bump()?));
                    let part = self.parse_type_id_part()?;
                    children.push(part);
                }
            }
            _ => return Err(self.error_here("expected a data type")),
        }
        while self.at(TokenKind::LBracket) {
            let dim = self.parse_dimension()?;
            children.push(dim);
        }
        Ok(self.node(NodeKind::DataType, children))
    }

    /// One component of a user type: `name` or `name #(...)`.
    fn parse_type_id_part(&mut self) -> PResult<Child> {
        let mut children = vec![Child::Leaf(self.expect(TokenKind::Identifier)?)];
        if self.at(TokenKind::Hash) {
            let params = self.parse_actual_parameter_list()?;
            children.push(params);
        }
        Ok(self.node(NodeKind::UnqualifiedId, children))
    }

    /// `#( .Name(expr), positional, ... )`
    fn parse_actual_parameter_list(&mut self) -> PResult<Child> {
        let mut children = vec![Child::Leaf(self.expect(TokenKind::Hash)?)];
        children.push(Child::Leaf(self.expect(TokenKind::LParen)?));
        while !self.at(TokenKind::RParen) {
            if self.at(TokenKind::Dot) {
                let dot = self.bump()?;
                let name = self.expect(TokenKind::Identifier)?;
                let value = self.parse_paren_group()?;
                let named = self.node(
                    NodeKind::ParamByName,
                    vec![Child::Leaf(dot), Child::Leaf(name), value],
                );
                children.push(named);
            } else {
                let expr = self.parse_expression()?;
                children.push(expr);
            }
            if let Some(comma) = self.eat(TokenKind::Comma) {
                children.push(Child::Leaf(comma));
            } else {
                break;
            }
        }
        children.push(Child::Leaf(self.expect(TokenKind::RParen)?));
        Ok(self.node(NodeKind::ActualParameterList, children))
    }

    /// `( .port(expr), positional, ... )` on a gate instance.
    fn parse_port_actual_list(&mut self) -> PResult<Child> {
        let mut children = vec![Child::Leaf(self.expect(TokenKind::LParen)?)];
        while !self.at(TokenKind::RParen) {
            if self.at(TokenKind::Dot) {
                let dot = self.bump()?;
                let name = self.expect(TokenKind::Identifier)?;
                let value = self.parse_paren_group()?;
                let named = self.node(
                    NodeKind::ActualNamedPort,
                    vec![Child::Leaf(dot), Child::Leaf(name), value],
                );
                children.push(named);
            } else {
                let expr = self.parse_expression()?;
                children.push(expr);
            }
            if let Some(comma) = self.eat(TokenKind::Comma) {
                children.push(Child::Leaf(comma));
            } else {
                break;
            }
        }
        children.push(Child::Leaf(self.expect(TokenKind::RParen)?));
        Ok(self.node(NodeKind::PortActualList, children))
    }

    fn parse_dimension(&mut self) -> PResult<Child> {
        let mut children = vec![Child::Leaf(self.expect(TokenKind::LBracket)?)];
        while !self.at(TokenKind::RBracket) {
            if let Some(colon) = self.eat(TokenKind::Colon) {
                children.push(Child::Leaf(colon));
            } else {
                let expr = self.parse_expression()?;
                children.push(expr);
            }
        }
        children.push(Child::Leaf(self.expect(TokenKind::RBracket)?));
        Ok(self.node(NodeKind::Dimension, children))
    }

    // ------------------------------------------------------------------
    // Generate constructs
    // ------------------------------------------------------------------

    fn parse_generate_region(&mut self) -> PResult<Child> {
        let mut children = vec![Child::Leaf(self.expect(TokenKind::KwGenerate)?)];
        while !self.at(TokenKind::KwEndGenerate) {
            if self.peek().is_none() {
                return Err(ParseError::UnexpectedEof {
                    expected: "endgenerate".to_string(),
                });
            }
            self.parse_item(&mut children)?;
        }
        children.push(Child::Leaf(self.expect(TokenKind::KwEndGenerate)?));
        Ok(self.node(NodeKind::GenerateRegion, children))
    }

    fn parse_conditional_generate(&mut self) -> PResult<Child> {
        let mut if_clause = vec![Child::Leaf(self.expect(TokenKind::KwIf)?)];
        let cond = self.parse_paren_group()?;
        if_clause.push(cond);
        let body = self.parse_generate_body()?;
        if_clause.push(body);
        let if_clause = self.node(NodeKind::GenerateIfClause, if_clause);

        let mut children = vec![if_clause];
        if let Some(else_kw) = self.eat(TokenKind::KwElse) {
            let mut else_clause = vec![Child::Leaf(else_kw)];
            let body = if self.at(TokenKind::KwIf) {
                // else-if chain: the nested conditional is the else body.
                self.parse_conditional_generate()?
            } else {
                self.parse_generate_body()?
            };
            else_clause.push(body);
            let else_clause = self.node(NodeKind::GenerateElseClause, else_clause);
            children.push(else_clause);
        }
        Ok(self.node(NodeKind::ConditionalGenerateConstruct, children))
    }

    fn parse_generate_body(&mut self) -> PResult<Child> {
        if self.at(TokenKind::KwBegin) {
            self.parse_generate_block()
        } else {
            let mut out = Vec::new();
            self.parse_item(&mut out)?;
            out.pop().ok_or_else(|| self.error_here("expected a generate item"))
        }
    }

    fn parse_generate_block(&mut self) -> PResult<Child> {
        let mut children = vec![Child::Leaf(self.expect(TokenKind::KwBegin)?)];
        if let Some(colon) = self.eat(TokenKind::Colon) {
            children.push(Child::Leaf(colon));
            children.push(Child::Leaf(self.expect(TokenKind::Identifier)?));
        }
        while !self.at(TokenKind::KwEnd) {
            if self.peek().is_none() {
                return Err(ParseError::UnexpectedEof {
                    expected: "end".to_string(),
                });
            }
            self.parse_item(&mut children)?;
        }
        children.push(Child::Leaf(self.expect(TokenKind::KwEnd)?));
        self.parse_optional_end_label(&mut children)?;
        Ok(self.node(NodeKind::GenerateBlock, children))
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_initial(&mut self) -> PResult<Child> {
        let kw = self.expect(TokenKind::KwInitial)?;
        let stmt = self.parse_statement()?;
        Ok(self.node(NodeKind::InitialConstruct, vec![Child::Leaf(kw), stmt]))
    }

    fn parse_always(&mut self) -> PResult<Child> {
        let mut children = vec![Child::Leaf(self.expect(TokenKind::KwAlways)?)];
        if let Some(at) = self.eat(TokenKind::At) {
            children.push(Child::Leaf(at));
            if self.at(TokenKind::LParen) {
                let group = self.parse_event_control_group()?;
                children.push(group);
            } else if self.at(TokenKind::Star) {
                children.push(Child::Leaf(self.bump()?));
            }
        }
        let stmt = self.parse_statement()?;
        children.push(stmt);
        Ok(self.node(NodeKind::AlwaysConstruct, children))
    }

    /// `( posedge clk )` and similar; edge keywords are outside the subset,
    /// so the group accepts plain reference expressions.
    fn parse_event_control_group(&mut self) -> PResult<Child> {
        self.parse_paren_group()
    }

    fn parse_continuous_assign(&mut self) -> PResult<Child> {
        let kw = self.expect(TokenKind::KwAssign)?;
        let lhs = self.parse_reference_call_base()?;
        let eq = self.expect(TokenKind::Equals)?;
        let rhs = self.parse_expression()?;
        let semi = self.expect(TokenKind::Semicolon)?;
        Ok(self.node(
            NodeKind::ContinuousAssign,
            vec![
                Child::Leaf(kw),
                lhs,
                Child::Leaf(eq),
                rhs,
                Child::Leaf(semi),
            ],
        ))
    }

    fn parse_seq_block(&mut self) -> PResult<Child> {
        let mut children = vec![Child::Leaf(self.expect(TokenKind::KwBegin)?)];
        if let Some(colon) = self.eat(TokenKind::Colon) {
            children.push(Child::Leaf(colon));
            children.push(Child::Leaf(self.expect(TokenKind::Identifier)?));
        }
        while !self.at(TokenKind::KwEnd) {
            if self.peek().is_none() {
                return Err(ParseError::UnexpectedEof {
                    expected: "end".to_string(),
                });
            }
            self.parse_item(&mut children)?;
        }
        children.push(Child::Leaf(self.expect(TokenKind::KwEnd)?));
        self.parse_optional_end_label(&mut children)?;
        Ok(self.node(NodeKind::SeqBlock, children))
    }

    fn parse_return(&mut self) -> PResult<Child> {
        let kw = self.expect(TokenKind::KwReturn)?;
        let mut children = vec![Child::Leaf(kw)];
        if !self.at(TokenKind::Semicolon) {
            let expr = self.parse_expression()?;
            children.push(expr);
        }
        children.push(Child::Leaf(self.expect(TokenKind::Semicolon)?));
        Ok(self.node(NodeKind::ReturnStatement, children))
    }

    /// Assignment or call statement starting with a reference.
    fn parse_statement(&mut self) -> PResult<Child> {
        if self.at(TokenKind::SystemIdentifier) {
            let sys = self.bump()?;
            let mut expr = vec![Child::Leaf(sys)];
            if self.at(TokenKind::LParen) {
                let args = self.parse_paren_group()?;
                expr.push(args);
            }
            let expr = self.node(NodeKind::Expression, expr);
            let semi = self.expect(TokenKind::Semicolon)?;
            return Ok(self.node(
                NodeKind::ExpressionStatement,
                vec![expr, Child::Leaf(semi)],
            ));
        }

        let base = self.parse_reference_call_base()?;
        if let Some(eq) = self.eat(TokenKind::Equals) {
            let rhs = self.parse_expression()?;
            let semi = self.expect(TokenKind::Semicolon)?;
            Ok(self.node(
                NodeKind::AssignmentStatement,
                vec![base, Child::Leaf(eq), rhs, Child::Leaf(semi)],
            ))
        } else {
            let semi = self.expect(TokenKind::Semicolon)?;
            Ok(self.node(
                NodeKind::ExpressionStatement,
                vec![base, Child::Leaf(semi)],
            ))
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_paren_group(&mut self) -> PResult<Child> {
        let mut children = vec![Child::Leaf(self.expect(TokenKind::LParen)?)];
        while !self.at(TokenKind::RParen) {
            let expr = self.parse_expression()?;
            children.push(expr);
            if let Some(comma) = self.eat(TokenKind::Comma) {
                children.push(Child::Leaf(comma));
            } else {
                break;
            }
        }
        children.push(Child::Leaf(self.expect(TokenKind::RParen)?));
        Ok(self.node(NodeKind::ParenGroup, children))
    }

    fn parse_expression(&mut self) -> PResult<Child> {
        let mut children = vec![self.parse_primary()?];
        while let Some(kind) = self.peek_kind() {
            if !is_binary_operator(kind) {
                break;
            }
            children.push(Child::Leaf(self.bump()?));
            children.push(self.parse_primary()?);
        }
        Ok(self.node(NodeKind::Expression, children))
    }

    fn parse_primary(&mut self) -> PResult<Child> {
        match self.peek_kind() {
            Some(TokenKind::Number) | Some(TokenKind::StringLiteral) => {
                Ok(Child::Leaf(self.bump()?))
            }
            Some(TokenKind::LParen) => self.parse_paren_group(),
            Some(TokenKind::Bang) | Some(TokenKind::Tilde) | Some(TokenKind::Minus)
            | Some(TokenKind::Amp) | Some(TokenKind::Pipe) => {
                let op = self.bump()?;
                let operand = self.parse_primary()?;
                Ok(self.node(NodeKind::Expression, vec![Child::Leaf(op), operand]))
            }
            Some(TokenKind::SystemIdentifier) => {
                let sys = self.bump()?;
                let mut children = vec![Child::Leaf(sys)];
                if self.at(TokenKind::LParen) {
                    let args = self.parse_paren_group()?;
                    children.push(args);
                }
                Ok(self.node(NodeKind::Expression, children))
            }
            Some(TokenKind::Identifier) => self.parse_reference_call_base(),
            _ => Err(self.error_here("expected an expression")),
        }
    }

    /// A reference, call, or method-call chain:
    /// `x`, `p::x`, `c.f`, `f(a)`, `C::f(a)`, `obj.m(a)`, `a[0]`.
    fn parse_reference_call_base(&mut self) -> PResult<Child> {
        // Local root: unqualified or qualified id.
        let first = self.expect(TokenKind::Identifier)?;
        let first = self.node(NodeKind::UnqualifiedId, vec![Child::Leaf(first)]);
        let root_id = if self.at(TokenKind::ScopeRes) {
            let mut parts = vec![first];
            while self.at(TokenKind::ScopeRes) {
                parts.push(Child::Leaf(self.bump()?));
                let id = self.expect(TokenKind::Identifier)?;
                let id = self.node(NodeKind::UnqualifiedId, vec![Child::Leaf(id)]);
                parts.push(id);
            }
            self.node(NodeKind::QualifiedId, parts)
        } else {
            first
        };
        let local_root = self.node(NodeKind::LocalRoot, vec![root_id]);

        // A parenthesized list right after the root makes this a call.
        let mut children = if self.at(TokenKind::LParen) {
            let args = self.parse_paren_group()?;
            let call = self.node(NodeKind::FunctionCall, vec![local_root, args]);
            vec![call]
        } else {
            vec![local_root]
        };

        // Extensions: `.member`, `.method(...)`, `[index]`.
        loop {
            if self.at(TokenKind::Dot) {
                let dot = self.bump()?;
                let name = self.expect(TokenKind::Identifier)?;
                let name = self.node(NodeKind::UnqualifiedId, vec![Child::Leaf(name)]);
                if self.at(TokenKind::LParen) {
                    let args = self.parse_paren_group()?;
                    let ext = self.node(
                        NodeKind::MethodCallExtension,
                        vec![Child::Leaf(dot), name, args],
                    );
                    children.push(ext);
                } else {
                    let ext = self.node(
                        NodeKind::HierarchyExtension,
                        vec![Child::Leaf(dot), name],
                    );
                    children.push(ext);
                }
            } else if self.at(TokenKind::LBracket) {
                let dim = self.parse_dimension()?;
                children.push(dim);
            } else {
                break;
            }
        }
        Ok(self.node(NodeKind::ReferenceCallBase, children))
    }

    // ------------------------------------------------------------------
    // Preprocessor
    // ------------------------------------------------------------------

    fn parse_directive(&mut self) -> PResult<Child> {
        let directive = self.expect(TokenKind::Directive)?;
        if directive.text != "include" {
            return Err(ParseError::InvalidSyntax {
                message: format!("unsupported directive `{}", directive.text),
                span: directive.span.into(),
            });
        }
        let filename = self.expect(TokenKind::StringLiteral)?;
        Ok(self.node(
            NodeKind::PreprocessorInclude,
            vec![Child::Leaf(directive), Child::Leaf(filename)],
        ))
    }
}

fn is_binary_operator(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::EqEq
            | TokenKind::BangEq
            | TokenKind::Lt
            | TokenKind::Gt
            | TokenKind::LtEq
            | TokenKind::GtEq
            | TokenKind::AmpAmp
            | TokenKind::PipePipe
            | TokenKind::Amp
            | TokenKind::Pipe
            | TokenKind::Caret
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_description(tree: &SyntaxTree) -> NodeId {
        tree.child_nodes(tree.root()).next().expect("empty source file")
    }

    #[test]
    fn test_parse_module_with_wire() {
        let tree = parse("module m; wire w; endmodule").expect("parse failed");
        let module = first_description(&tree);
        assert_eq!(tree.kind(module), NodeKind::ModuleDeclaration);
        assert_eq!(tree.find_leaf(module, TokenKind::Identifier).unwrap().text, "m");
        let net = tree.find_child(module, NodeKind::NetDeclaration).expect("no net decl");
        let var = tree.find_child(net, NodeKind::NetVariable).expect("no net variable");
        assert_eq!(tree.find_leaf(var, TokenKind::Identifier).unwrap().text, "w");
    }

    #[test]
    fn test_parse_package_and_reference() {
        let tree =
            parse("package p; int x; endpackage module m; initial p::x = 1; endmodule")
                .expect("parse failed");
        let mut descriptions = tree.child_nodes(tree.root());
        assert_eq!(tree.kind(descriptions.next().unwrap()), NodeKind::PackageDeclaration);
        let module = descriptions.next().unwrap();
        let initial = tree.find_child(module, NodeKind::InitialConstruct).unwrap();
        let stmt = tree.find_child(initial, NodeKind::AssignmentStatement).unwrap();
        let refbase = tree.find_child(stmt, NodeKind::ReferenceCallBase).unwrap();
        let local_root = tree.find_child(refbase, NodeKind::LocalRoot).unwrap();
        let qualified = tree.find_child(local_root, NodeKind::QualifiedId).unwrap();
        let parts: Vec<_> = tree.child_nodes(qualified).collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(tree.text_of(parts[0]), "p");
        assert_eq!(tree.text_of(parts[1]), "x");
    }

    #[test]
    fn test_parse_dotted_member() {
        let tree = parse("module m; C c; initial c.f = 0; endmodule").expect("parse failed");
        let module = first_description(&tree);
        let data = tree.find_child(module, NodeKind::DataDeclaration).unwrap();
        let list = tree
            .find_child(data, NodeKind::GateInstanceRegisterVariableList)
            .unwrap();
        let var = tree.find_child(list, NodeKind::RegisterVariable).unwrap();
        assert_eq!(tree.find_leaf(var, TokenKind::Identifier).unwrap().text, "c");

        let initial = tree.find_child(module, NodeKind::InitialConstruct).unwrap();
        let stmt = tree.find_child(initial, NodeKind::AssignmentStatement).unwrap();
        let refbase = tree.find_child(stmt, NodeKind::ReferenceCallBase).unwrap();
        let ext = tree.find_child(refbase, NodeKind::HierarchyExtension).unwrap();
        assert_eq!(tree.text_of(ext), ".f");
    }

    #[test]
    fn test_parse_out_of_line_function() {
        let tree = parse("class C; endclass function int C::g(); return 0; endfunction")
            .expect("parse failed");
        let mut descriptions = tree.child_nodes(tree.root());
        assert_eq!(tree.kind(descriptions.next().unwrap()), NodeKind::ClassDeclaration);
        let func = descriptions.next().unwrap();
        assert_eq!(tree.kind(func), NodeKind::FunctionDeclaration);
        let header = tree.find_child(func, NodeKind::FunctionHeader).unwrap();
        let qualified = tree.find_child(header, NodeKind::QualifiedId).unwrap();
        assert_eq!(tree.text_of(qualified), "C::g");
        // Return type precedes the qualified name.
        let ty = tree.find_child(header, NodeKind::DataType).unwrap();
        assert_eq!(tree.text_of(ty), "int");
    }

    #[test]
    fn test_parse_instance_with_named_ports_and_params() {
        let tree = parse("module top; mymod #(.W(8)) u1 (.a(x), .b(y)); endmodule")
            .expect("parse failed");
        let module = first_description(&tree);
        let data = tree.find_child(module, NodeKind::DataDeclaration).unwrap();
        let ty = tree.find_child(data, NodeKind::DataType).unwrap();
        let type_id = tree.find_child(ty, NodeKind::UnqualifiedId).unwrap();
        let params = tree
            .find_child(type_id, NodeKind::ActualParameterList)
            .unwrap();
        let named_param = tree.find_child(params, NodeKind::ParamByName).unwrap();
        assert_eq!(tree.find_leaf(named_param, TokenKind::Identifier).unwrap().text, "W");

        let list = tree
            .find_child(data, NodeKind::GateInstanceRegisterVariableList)
            .unwrap();
        let inst = tree.find_child(list, NodeKind::GateInstance).unwrap();
        assert_eq!(tree.find_leaf(inst, TokenKind::Identifier).unwrap().text, "u1");
        let actuals = tree.find_child(inst, NodeKind::PortActualList).unwrap();
        let named: Vec<_> = tree
            .child_nodes(actuals)
            .filter(|&n| tree.kind(n) == NodeKind::ActualNamedPort)
            .collect();
        assert_eq!(named.len(), 2);
    }

    #[test]
    fn test_parse_generate_if_else() {
        let tree = parse(
            "module m; if (1) begin : g1 wire a; end else begin wire b; end endmodule",
        )
        .expect("parse failed");
        let module = first_description(&tree);
        let cond = tree
            .find_child(module, NodeKind::ConditionalGenerateConstruct)
            .unwrap();
        let if_clause = tree.find_child(cond, NodeKind::GenerateIfClause).unwrap();
        let block = tree.find_child(if_clause, NodeKind::GenerateBlock).unwrap();
        assert_eq!(tree.find_leaf(block, TokenKind::Identifier).unwrap().text, "g1");
        assert!(tree.find_child(cond, NodeKind::GenerateElseClause).is_some());
    }

    #[test]
    fn test_parse_else_if_chain_nests_conditional() {
        let tree = parse(
            "module m; if (1) begin : a wire x; end else if (2) begin : b wire y; end endmodule",
        )
        .expect("parse failed");
        let module = first_description(&tree);
        let cond = tree
            .find_child(module, NodeKind::ConditionalGenerateConstruct)
            .unwrap();
        let else_clause = tree.find_child(cond, NodeKind::GenerateElseClause).unwrap();
        let nested = tree
            .find_child(else_clause, NodeKind::ConditionalGenerateConstruct)
            .unwrap();
        assert!(tree.find_child(nested, NodeKind::GenerateIfClause).is_some());
    }

    #[test]
    fn test_parse_include() {
        let tree = parse("`include \"defs.svh\"\nmodule m; endmodule").expect("parse failed");
        let mut descriptions = tree.child_nodes(tree.root());
        let include = descriptions.next().unwrap();
        assert_eq!(tree.kind(include), NodeKind::PreprocessorInclude);
        assert_eq!(
            tree.find_leaf(include, TokenKind::StringLiteral).unwrap().text,
            "\"defs.svh\""
        );
    }

    #[test]
    fn test_parse_function_call_statement() {
        let tree = parse("module m; initial f(x); endmodule").expect("parse failed");
        let module = first_description(&tree);
        let initial = tree.find_child(module, NodeKind::InitialConstruct).unwrap();
        let stmt = tree.find_child(initial, NodeKind::ExpressionStatement).unwrap();
        let refbase = tree.find_child(stmt, NodeKind::ReferenceCallBase).unwrap();
        let call = tree.find_child(refbase, NodeKind::FunctionCall).unwrap();
        assert!(tree.find_child(call, NodeKind::LocalRoot).is_some());
    }

    #[test]
    fn test_parse_class_with_prototype() {
        let tree = parse("class C; extern function int g(); endclass").expect("parse failed");
        let class = first_description(&tree);
        let proto = tree.find_child(class, NodeKind::FunctionPrototype).unwrap();
        assert!(tree.find_child(proto, NodeKind::FunctionHeader).is_some());
    }

    #[test]
    fn test_parse_module_ports_and_parameters() {
        let tree = parse("module m #(parameter W = 8) (input wire a, output b); endmodule")
            .expect("parse failed");
        let module = first_description(&tree);
        let param = tree.find_child(module, NodeKind::ParamDeclaration).unwrap();
        let ptype = tree.find_child(param, NodeKind::ParamType).unwrap();
        assert_eq!(tree.find_leaf(ptype, TokenKind::Identifier).unwrap().text, "W");
        let ports = tree.find_child(module, NodeKind::PortList).unwrap();
        let decls: Vec<_> = tree
            .child_nodes(ports)
            .filter(|&n| tree.kind(n) == NodeKind::PortDeclaration)
            .collect();
        assert_eq!(decls.len(), 2);
    }

    #[test]
    fn test_parse_typedef() {
        let tree = parse("typedef logic [7:0] byte_t;").expect("parse failed");
        let td = first_description(&tree);
        assert_eq!(tree.kind(td), NodeKind::TypeDeclaration);
        assert_eq!(tree.find_leaf(td, TokenKind::Identifier).unwrap().text, "byte_t");
    }

    #[test]
    fn test_parse_error_on_garbage() {
        assert!(parse("module m; wire w endmodule").is_err());
        assert!(parse("`define FOO 1").is_err());
    }
}
