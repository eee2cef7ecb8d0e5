//! Closed enumerations for syntax tree node tags and token kinds.

use std::fmt;

/// Tags for nonterminal nodes of the concrete syntax tree.
///
/// This is a closed enumeration: consumers dispatch exhaustively on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Root of one translation unit.
    SourceFile,

    // Design elements
    ModuleDeclaration,
    PackageDeclaration,
    ClassDeclaration,
    FunctionDeclaration,
    FunctionPrototype,
    FunctionHeader,
    TaskDeclaration,
    TaskPrototype,
    TaskHeader,

    // Ports
    PortList,
    PortDeclaration,
    PortItem,

    // Declarations
    NetDeclaration,
    DataDeclaration,
    ParamDeclaration,
    ParamType,
    TypeDeclaration,

    // Types and identifiers
    DataType,
    UnqualifiedId,
    QualifiedId,
    Dimension,

    // Parameter / port actuals
    ActualParameterList,
    ParamByName,
    PortActualList,
    ActualNamedPort,

    // Declared items
    GateInstanceRegisterVariableList,
    NetVariable,
    RegisterVariable,
    GateInstance,

    // References and calls
    ReferenceCallBase,
    LocalRoot,
    FunctionCall,
    MethodCallExtension,
    HierarchyExtension,
    ParenGroup,

    // Generate constructs
    ConditionalGenerateConstruct,
    GenerateIfClause,
    GenerateElseClause,
    GenerateBlock,
    GenerateRegion,

    // Statements
    InitialConstruct,
    AlwaysConstruct,
    ContinuousAssign,
    SeqBlock,
    AssignmentStatement,
    ReturnStatement,
    ExpressionStatement,

    // Expressions
    Expression,

    // Preprocessor
    PreprocessorInclude,
}

/// Kinds of leaf tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    /// `$display` and friends. Lexed, but inert to symbol analysis.
    SystemIdentifier,
    /// Integer literal, including based forms like `8'hFF`; text kept raw.
    Number,
    StringLiteral,
    /// A backtick directive; the token text is the directive name
    /// without the backtick (e.g. `include`).
    Directive,

    // Keywords
    KwModule,
    KwEndModule,
    KwPackage,
    KwEndPackage,
    KwClass,
    KwEndClass,
    KwFunction,
    KwEndFunction,
    KwTask,
    KwEndTask,
    KwExtern,
    KwTypedef,
    KwParameter,
    KwLocalParam,
    KwWire,
    KwReg,
    KwLogic,
    KwInt,
    KwInteger,
    KwBit,
    KwByte,
    KwReal,
    KwVoid,
    KwInput,
    KwOutput,
    KwInout,
    KwBegin,
    KwEnd,
    KwIf,
    KwElse,
    KwInitial,
    KwAlways,
    KwGenerate,
    KwEndGenerate,
    KwAssign,
    KwReturn,

    // Punctuation and operators
    ScopeRes, // "::"
    Dot,
    Hash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Semicolon,
    Comma,
    Colon,
    Equals,
    At,
    Star,
    Plus,
    Minus,
    Slash,
    Percent,
    Lt,
    Gt,
    LtEq,
    GtEq,
    EqEq,
    BangEq,
    AmpAmp,
    PipePipe,
    Amp,
    Pipe,
    Caret,
    Bang,
    Question,
    Tilde,
}

impl TokenKind {
    /// Keyword lookup for the lexer.
    #[must_use]
    pub fn from_keyword(text: &str) -> Option<Self> {
        Some(match text {
            "module" => TokenKind::KwModule,
            "endmodule" => TokenKind::KwEndModule,
            "package" => TokenKind::KwPackage,
            "endpackage" => TokenKind::KwEndPackage,
            "class" => TokenKind::KwClass,
            "endclass" => TokenKind::KwEndClass,
            "function" => TokenKind::KwFunction,
            "endfunction" => TokenKind::KwEndFunction,
            "task" => TokenKind::KwTask,
            "endtask" => TokenKind::KwEndTask,
            "extern" => TokenKind::KwExtern,
            "typedef" => TokenKind::KwTypedef,
            "parameter" => TokenKind::KwParameter,
            "localparam" => TokenKind::KwLocalParam,
            "wire" => TokenKind::KwWire,
            "reg" => TokenKind::KwReg,
            "logic" => TokenKind::KwLogic,
            "int" => TokenKind::KwInt,
            "integer" => TokenKind::KwInteger,
            "bit" => TokenKind::KwBit,
            "byte" => TokenKind::KwByte,
            "real" => TokenKind::KwReal,
            "void" => TokenKind::KwVoid,
            "input" => TokenKind::KwInput,
            "output" => TokenKind::KwOutput,
            "inout" => TokenKind::KwInout,
            "begin" => TokenKind::KwBegin,
            "end" => TokenKind::KwEnd,
            "if" => TokenKind::KwIf,
            "else" => TokenKind::KwElse,
            "initial" => TokenKind::KwInitial,
            "always" => TokenKind::KwAlways,
            "generate" => TokenKind::KwGenerate,
            "endgenerate" => TokenKind::KwEndGenerate,
            "assign" => TokenKind::KwAssign,
            "return" => TokenKind::KwReturn,
            _ => return None,
        })
    }

    /// True for the built-in (non-user-defined) type keywords.
    #[must_use]
    pub fn is_primitive_type(self) -> bool {
        matches!(
            self,
            TokenKind::KwWire
                | TokenKind::KwReg
                | TokenKind::KwLogic
                | TokenKind::KwInt
                | TokenKind::KwInteger
                | TokenKind::KwBit
                | TokenKind::KwByte
                | TokenKind::KwReal
                | TokenKind::KwVoid
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(TokenKind::from_keyword("module"), Some(TokenKind::KwModule));
        assert_eq!(TokenKind::from_keyword("wire"), Some(TokenKind::KwWire));
        assert_eq!(TokenKind::from_keyword("frobnicate"), None);
    }

    #[test]
    fn test_primitive_types() {
        assert!(TokenKind::KwLogic.is_primitive_type());
        assert!(!TokenKind::KwModule.is_primitive_type());
    }
}
