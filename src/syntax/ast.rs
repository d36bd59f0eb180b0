//! Typed syntax tree
//!
//! Every node that can be the target of a semantic query carries a
//! [`NodeId`] that is unique within its tree.

use super::Span;

/// Node identity within one tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Identifier token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub text: String,
    pub span: Span,
}

impl Ident {
    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }
}

#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub id: NodeId,
    pub span: Span,
    pub usings: Vec<UsingDirective>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone)]
pub struct UsingDirective {
    pub id: NodeId,
    pub span: Span,
    pub is_static: bool,
    pub alias: Option<Ident>,
    pub name: TypeSyntax,
}

#[derive(Debug, Clone)]
pub enum Member {
    Namespace(NamespaceDecl),
    Type(TypeDecl),
    Delegate(DelegateDecl),
    Method(MethodDecl),
    Constructor(ConstructorDecl),
    Property(PropertyDecl),
    Field(FieldDecl),
}

impl Member {
    pub fn span(&self) -> Span {
        match self {
            Member::Namespace(n) => n.span,
            Member::Type(t) => t.span,
            Member::Delegate(d) => d.span,
            Member::Method(m) => m.span,
            Member::Constructor(c) => c.span,
            Member::Property(p) => p.span,
            Member::Field(f) => f.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NamespaceDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: TypeSyntax,
    pub file_scoped: bool,
    pub usings: Vec<UsingDirective>,
    pub members: Vec<Member>,
}

/// Declaration modifier keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    Public,
    Private,
    Protected,
    Internal,
    Static,
    Abstract,
    Virtual,
    Override,
    Sealed,
    Async,
    Readonly,
    Extern,
    New,
    Partial,
    Const,
    Unsafe,
    Volatile,
    Event,
    Required,
    File,
    Implicit,
    Explicit,
}

impl ModifierKind {
    pub fn from_keyword(text: &str) -> Option<Self> {
        Some(match text {
            "public" => Self::Public,
            "private" => Self::Private,
            "protected" => Self::Protected,
            "internal" => Self::Internal,
            "static" => Self::Static,
            "abstract" => Self::Abstract,
            "virtual" => Self::Virtual,
            "override" => Self::Override,
            "sealed" => Self::Sealed,
            "async" => Self::Async,
            "readonly" => Self::Readonly,
            "extern" => Self::Extern,
            "new" => Self::New,
            "partial" => Self::Partial,
            "const" => Self::Const,
            "unsafe" => Self::Unsafe,
            "volatile" => Self::Volatile,
            "event" => Self::Event,
            "required" => Self::Required,
            "file" => Self::File,
            "implicit" => Self::Implicit,
            "explicit" => Self::Explicit,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modifier {
    pub kind: ModifierKind,
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub list: Vec<Modifier>,
}

impl Modifiers {
    pub fn has(&self, kind: ModifierKind) -> bool {
        self.list.iter().any(|m| m.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// True when any of public/private/protected/internal is written
    pub fn has_accessibility(&self) -> bool {
        self.list.iter().any(|m| {
            matches!(
                m.kind,
                ModifierKind::Public
                    | ModifierKind::Private
                    | ModifierKind::Protected
                    | ModifierKind::Internal
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKeyword {
    Class,
    Struct,
    Interface,
    Record,
    RecordStruct,
    Enum,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub id: NodeId,
    pub span: Span,
    pub modifiers: Modifiers,
    pub keyword: TypeKeyword,
    pub name: Ident,
    pub type_params: Vec<Ident>,
    /// Record primary constructor parameters
    pub primary_params: Option<ParameterList>,
    pub base_list: Option<BaseList>,
    pub members: Vec<Member>,
    pub open_brace: Option<Span>,
    pub close_brace: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct BaseList {
    pub span: Span,
    pub types: Vec<BaseType>,
}

#[derive(Debug, Clone)]
pub struct BaseType {
    pub id: NodeId,
    pub span: Span,
    pub ty: TypeSyntax,
    /// Arguments passed to a record base constructor
    pub args: Option<ArgumentList>,
}

#[derive(Debug, Clone)]
pub struct TypeSyntax {
    pub id: NodeId,
    pub span: Span,
    pub kind: TypeSyntaxKind,
}

#[derive(Debug, Clone)]
pub enum TypeSyntaxKind {
    /// `int`, `string`, `void`, ...
    Predefined(String),
    /// Possibly qualified, possibly generic name
    Named(Vec<NameSegment>),
    Array(Box<TypeSyntax>),
    Nullable(Box<TypeSyntax>),
    Tuple(Vec<TypeSyntax>),
}

impl TypeSyntax {
    /// Single identifier without type arguments
    pub fn simple_name(&self) -> Option<&Ident> {
        match &self.kind {
            TypeSyntaxKind::Named(segments)
                if segments.len() == 1 && segments[0].type_args.is_empty() =>
            {
                Some(&segments[0].ident)
            }
            _ => None,
        }
    }

    /// Named type's segments
    pub fn segments(&self) -> Option<&[NameSegment]> {
        match &self.kind {
            TypeSyntaxKind::Named(segments) => Some(segments),
            _ => None,
        }
    }

    /// Dotted name without type arguments, e.g. `System.Exception`
    pub fn dotted_name(&self) -> Option<String> {
        let segments = self.segments()?;
        if segments.iter().any(|s| !s.type_args.is_empty()) {
            return None;
        }
        Some(
            segments
                .iter()
                .map(|s| s.ident.text.as_str())
                .collect::<Vec<_>>()
                .join("."),
        )
    }

    /// `var` in a local declaration
    pub fn is_var(&self) -> bool {
        self.simple_name().is_some_and(|i| i.is("var"))
    }
}

#[derive(Debug, Clone)]
pub struct NameSegment {
    pub ident: Ident,
    pub type_args: Vec<TypeSyntax>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub id: NodeId,
    pub span: Span,
    pub modifiers: Modifiers,
    pub return_type: TypeSyntax,
    /// `IFoo.` prefix of an explicit interface implementation
    pub explicit_interface: Option<TypeSyntax>,
    pub name: Ident,
    pub type_params: Vec<Ident>,
    pub params: ParameterList,
    pub body: Option<Block>,
    pub expr_body: Option<Expr>,
}

impl MethodDecl {
    pub fn has_body(&self) -> bool {
        self.body.is_some() || self.expr_body.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ConstructorDecl {
    pub id: NodeId,
    pub span: Span,
    pub modifiers: Modifiers,
    pub name: Ident,
    pub params: ParameterList,
    /// `: base(...)` / `: this(...)` arguments
    pub initializer: Option<ArgumentList>,
    pub body: Option<Block>,
    pub expr_body: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct DelegateDecl {
    pub id: NodeId,
    pub span: Span,
    pub modifiers: Modifiers,
    pub return_type: TypeSyntax,
    pub name: Ident,
    pub type_params: Vec<Ident>,
    pub params: ParameterList,
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub id: NodeId,
    pub span: Span,
    pub modifiers: Modifiers,
    pub ty: TypeSyntax,
    pub explicit_interface: Option<TypeSyntax>,
    pub name: Ident,
    /// Indexer parameters
    pub params: Option<ParameterList>,
    pub accessors: Vec<Accessor>,
    pub expr_body: Option<Expr>,
    pub initializer: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct Accessor {
    pub span: Span,
    pub keyword: Ident,
    pub body: Option<Block>,
    pub expr_body: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub id: NodeId,
    pub span: Span,
    pub modifiers: Modifiers,
    pub ty: TypeSyntax,
    pub declarators: Vec<VariableDeclarator>,
}

#[derive(Debug, Clone)]
pub struct VariableDeclarator {
    pub id: NodeId,
    pub span: Span,
    pub name: Ident,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct ParameterList {
    pub span: Span,
    pub params: Vec<Parameter>,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub id: NodeId,
    pub span: Span,
    /// `ref`, `out`, `in`, `params`, `this`, `scoped`
    pub modifiers: Vec<Ident>,
    /// Absent for implicitly typed lambda parameters
    pub ty: Option<TypeSyntax>,
    pub name: Ident,
    pub default: Option<Expr>,
}

impl Parameter {
    pub fn has_modifier(&self, keyword: &str) -> bool {
        self.modifiers.iter().any(|m| m.is(keyword))
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub id: NodeId,
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Block(Block),
    Expr(Expr),
    LocalDecl(LocalDecl),
    LocalFunction(Box<MethodDecl>),
    Return(Option<Expr>),
    Throw(Option<Expr>),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Box<Stmt>,
    },
    Foreach {
        is_await: bool,
        ty: TypeSyntax,
        name: Ident,
        local_id: NodeId,
        collection: Expr,
        body: Box<Stmt>,
    },
    Try(TryStmt),
    Using {
        resource: UsingResource,
        body: Box<Stmt>,
    },
    Lock {
        target: Expr,
        body: Box<Stmt>,
    },
    Switch {
        subject: Expr,
        sections: Vec<SwitchSection>,
    },
    YieldReturn(Expr),
    YieldBreak,
    Break,
    Continue,
    Goto,
    Checked(Block),
    Labeled {
        label: Ident,
        body: Box<Stmt>,
    },
    Empty,
}

#[derive(Debug, Clone)]
pub struct LocalDecl {
    pub is_const: bool,
    /// `using var x = ...;` / `await using var x = ...;`
    pub is_using: bool,
    pub ty: TypeSyntax,
    pub declarators: Vec<VariableDeclarator>,
}

#[derive(Debug, Clone)]
pub enum UsingResource {
    Decl(LocalDecl),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct SwitchSection {
    pub span: Span,
    pub labels: Vec<SwitchLabel>,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum SwitchLabel {
    Case {
        pattern: Pattern,
        guard: Option<Expr>,
    },
    Default,
}

#[derive(Debug, Clone)]
pub struct TryStmt {
    pub block: Block,
    pub catches: Vec<CatchClause>,
    pub finally: Option<Block>,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub id: NodeId,
    pub span: Span,
    /// The `catch` keyword
    pub keyword: Span,
    pub declaration: Option<CatchDeclaration>,
    pub filter: Option<CatchFilter>,
    pub block: Block,
}

#[derive(Debug, Clone)]
pub struct CatchDeclaration {
    /// Declares the catch local
    pub id: NodeId,
    pub span: Span,
    pub ty: TypeSyntax,
    pub name: Option<Ident>,
}

#[derive(Debug, Clone)]
pub struct CatchFilter {
    pub span: Span,
    pub expr: Expr,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Number,
    String,
    Char,
    True,
    False,
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
    PreInc,
    PreDec,
    AddressOf,
    Deref,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    Inc,
    Dec,
    NullForgiving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Coalesce,
    Range,
}

impl BinaryOp {
    /// Operators whose result is `bool`
    pub fn yields_bool(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::Le
                | BinaryOp::Ge
                | BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::And
                | BinaryOp::Or
        )
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(LiteralKind),
    /// `default` or `default(T)`
    Default(Option<TypeSyntax>),
    /// Identifier, optionally with type arguments
    Name(SimpleName),
    /// `int`, `string`, ... used as an expression receiver
    PredefinedType(String),
    This,
    Base,
    MemberAccess {
        target: Box<Expr>,
        name: SimpleName,
        conditional: bool,
    },
    Invocation {
        target: Box<Expr>,
        args: ArgumentList,
    },
    ElementAccess {
        target: Box<Expr>,
        args: ArgumentList,
        conditional: bool,
    },
    ObjectCreation {
        ty: Option<TypeSyntax>,
        args: Option<ArgumentList>,
        initializer: Option<Vec<Expr>>,
    },
    ArrayCreation {
        ty: Option<TypeSyntax>,
        sizes: Vec<Expr>,
        initializer: Option<Vec<Expr>>,
    },
    /// `{ a, b }` nested in an initializer
    InitializerList(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Postfix {
        op: PostfixOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `x is T`
    IsType {
        operand: Box<Expr>,
        ty: TypeSyntax,
    },
    /// `x is <pattern>` for anything but a bare type
    IsPattern {
        operand: Box<Expr>,
        pattern: Box<Pattern>,
    },
    As {
        operand: Box<Expr>,
        ty: TypeSyntax,
    },
    Cast {
        ty: TypeSyntax,
        operand: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        when_true: Box<Expr>,
        when_false: Box<Expr>,
    },
    Assignment {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    CompoundAssignment {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Await(Box<Expr>),
    Throw(Box<Expr>),
    Lambda(Box<Lambda>),
    Parenthesized(Box<Expr>),
    Tuple(Vec<Argument>),
    TypeOf(TypeSyntax),
    SizeOf(TypeSyntax),
    /// `out var x` / `out T x` in an argument
    Declaration {
        ty: TypeSyntax,
        name: Ident,
    },
    /// `expr switch { ... }`
    Switch {
        subject: Box<Expr>,
        arms: Vec<SwitchArm>,
    },
    /// `expr with { ... }`
    With {
        target: Box<Expr>,
        initializer: Vec<Expr>,
    },
    /// Placeholder produced by error recovery
    Missing,
}

#[derive(Debug, Clone)]
pub struct SimpleName {
    pub ident: Ident,
    pub type_args: Vec<TypeSyntax>,
}

#[derive(Debug, Clone)]
pub struct ArgumentList {
    pub span: Span,
    pub args: Vec<Argument>,
}

#[derive(Debug, Clone)]
pub struct Argument {
    pub id: NodeId,
    pub span: Span,
    pub name: Option<Ident>,
    /// `ref`, `out` or `in`
    pub ref_kind: Option<Ident>,
    pub expr: Expr,
}

#[derive(Debug, Clone)]
pub struct Lambda {
    pub is_async: bool,
    pub params: Vec<Parameter>,
    pub body: LambdaBody,
}

#[derive(Debug, Clone)]
pub enum LambdaBody {
    Expr(Expr),
    Block(Block),
}

#[derive(Debug, Clone)]
pub struct SwitchArm {
    pub span: Span,
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub result: Expr,
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub id: NodeId,
    pub span: Span,
    pub kind: PatternKind,
}

#[derive(Debug, Clone)]
pub enum PatternKind {
    /// `not p`
    Not(Box<Pattern>),
    And(Box<Pattern>, Box<Pattern>),
    Or(Box<Pattern>, Box<Pattern>),
    /// A bare type (or a constant written as a dotted name)
    Type(TypeSyntax),
    /// `T name`
    Declaration {
        ty: TypeSyntax,
        name: Ident,
    },
    /// `var name`
    Var(Ident),
    Constant(Expr),
    Relational {
        op: BinaryOp,
        value: Expr,
    },
    /// `{ ... }` or `[ ... ]`; contents are not modelled
    Recursive {
        ty: Option<TypeSyntax>,
        designation: Option<Ident>,
    },
    Discard,
}
