//! Uniform view over the typed tree
//!
//! Rules register for [`SyntaxKind`]s and receive [`SyntaxNode`]s; the
//! engine walks the tree in preorder and tells each detector who the parent
//! is.

use super::ast::*;
use super::Span;

/// Node kind tag used for detector dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    CompilationUnit,
    NamespaceDeclaration,
    ClassDeclaration,
    StructDeclaration,
    InterfaceDeclaration,
    RecordDeclaration,
    EnumDeclaration,
    DelegateDeclaration,
    MethodDeclaration,
    ConstructorDeclaration,
    PropertyDeclaration,
    FieldDeclaration,
    BaseType,
    Parameter,
    VariableDeclarator,
    Block,

    ExpressionStatement,
    LocalDeclarationStatement,
    LocalFunctionStatement,
    ReturnStatement,
    ThrowStatement,
    IfStatement,
    WhileStatement,
    DoStatement,
    ForStatement,
    ForEachStatement,
    TryStatement,
    UsingStatement,
    LockStatement,
    SwitchStatement,
    YieldReturnStatement,
    JumpStatement,
    CheckedStatement,
    LabeledStatement,
    EmptyStatement,
    CatchClause,

    LiteralExpression,
    DefaultExpression,
    IdentifierName,
    PredefinedType,
    ThisExpression,
    BaseExpression,
    MemberAccessExpression,
    InvocationExpression,
    ElementAccessExpression,
    ObjectCreationExpression,
    ArrayCreationExpression,
    InitializerExpression,
    PrefixUnaryExpression,
    PostfixUnaryExpression,
    BinaryExpression,
    IsExpression,
    IsPatternExpression,
    AsExpression,
    CastExpression,
    ConditionalExpression,
    AssignmentExpression,
    AwaitExpression,
    ThrowExpression,
    LambdaExpression,
    ParenthesizedExpression,
    TupleExpression,
    TypeOfExpression,
    SizeOfExpression,
    DeclarationExpression,
    SwitchExpression,
    WithExpression,
    MissingExpression,
    Argument,
    Pattern,
}

impl SyntaxKind {
    pub fn is_type_declaration(self) -> bool {
        matches!(
            self,
            SyntaxKind::ClassDeclaration
                | SyntaxKind::StructDeclaration
                | SyntaxKind::InterfaceDeclaration
                | SyntaxKind::RecordDeclaration
                | SyntaxKind::EnumDeclaration
        )
    }
}

/// Borrowed reference to any node in a tree
#[derive(Debug, Clone, Copy)]
pub enum SyntaxNode<'a> {
    CompilationUnit(&'a CompilationUnit),
    Namespace(&'a NamespaceDecl),
    Type(&'a TypeDecl),
    Delegate(&'a DelegateDecl),
    Method(&'a MethodDecl),
    Constructor(&'a ConstructorDecl),
    Property(&'a PropertyDecl),
    Field(&'a FieldDecl),
    BaseType(&'a BaseType),
    Parameter(&'a Parameter),
    Declarator(&'a VariableDeclarator),
    Block(&'a Block),
    Stmt(&'a Stmt),
    Catch(&'a CatchClause),
    Expr(&'a Expr),
    Argument(&'a Argument),
    Pattern(&'a Pattern),
}

impl<'a> SyntaxNode<'a> {
    pub fn kind(&self) -> SyntaxKind {
        match self {
            SyntaxNode::CompilationUnit(_) => SyntaxKind::CompilationUnit,
            SyntaxNode::Namespace(_) => SyntaxKind::NamespaceDeclaration,
            SyntaxNode::Type(t) => match t.keyword {
                TypeKeyword::Class => SyntaxKind::ClassDeclaration,
                TypeKeyword::Struct => SyntaxKind::StructDeclaration,
                TypeKeyword::Interface => SyntaxKind::InterfaceDeclaration,
                TypeKeyword::Record | TypeKeyword::RecordStruct => SyntaxKind::RecordDeclaration,
                TypeKeyword::Enum => SyntaxKind::EnumDeclaration,
            },
            SyntaxNode::Delegate(_) => SyntaxKind::DelegateDeclaration,
            SyntaxNode::Method(_) => SyntaxKind::MethodDeclaration,
            SyntaxNode::Constructor(_) => SyntaxKind::ConstructorDeclaration,
            SyntaxNode::Property(_) => SyntaxKind::PropertyDeclaration,
            SyntaxNode::Field(_) => SyntaxKind::FieldDeclaration,
            SyntaxNode::BaseType(_) => SyntaxKind::BaseType,
            SyntaxNode::Parameter(_) => SyntaxKind::Parameter,
            SyntaxNode::Declarator(_) => SyntaxKind::VariableDeclarator,
            SyntaxNode::Block(_) => SyntaxKind::Block,
            SyntaxNode::Stmt(s) => stmt_kind(s),
            SyntaxNode::Catch(_) => SyntaxKind::CatchClause,
            SyntaxNode::Expr(e) => expr_kind(e),
            SyntaxNode::Argument(_) => SyntaxKind::Argument,
            SyntaxNode::Pattern(_) => SyntaxKind::Pattern,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            SyntaxNode::CompilationUnit(n) => n.span,
            SyntaxNode::Namespace(n) => n.span,
            SyntaxNode::Type(n) => n.span,
            SyntaxNode::Delegate(n) => n.span,
            SyntaxNode::Method(n) => n.span,
            SyntaxNode::Constructor(n) => n.span,
            SyntaxNode::Property(n) => n.span,
            SyntaxNode::Field(n) => n.span,
            SyntaxNode::BaseType(n) => n.span,
            SyntaxNode::Parameter(n) => n.span,
            SyntaxNode::Declarator(n) => n.span,
            SyntaxNode::Block(n) => n.span,
            SyntaxNode::Stmt(n) => n.span,
            SyntaxNode::Catch(n) => n.span,
            SyntaxNode::Expr(n) => n.span,
            SyntaxNode::Argument(n) => n.span,
            SyntaxNode::Pattern(n) => n.span,
        }
    }

    pub fn id(&self) -> NodeId {
        match self {
            SyntaxNode::CompilationUnit(n) => n.id,
            SyntaxNode::Namespace(n) => n.id,
            SyntaxNode::Type(n) => n.id,
            SyntaxNode::Delegate(n) => n.id,
            SyntaxNode::Method(n) => n.id,
            SyntaxNode::Constructor(n) => n.id,
            SyntaxNode::Property(n) => n.id,
            SyntaxNode::Field(n) => n.id,
            SyntaxNode::BaseType(n) => n.id,
            SyntaxNode::Parameter(n) => n.id,
            SyntaxNode::Declarator(n) => n.id,
            SyntaxNode::Block(n) => n.id,
            SyntaxNode::Stmt(n) => n.id,
            SyntaxNode::Catch(n) => n.id,
            SyntaxNode::Expr(n) => n.id,
            SyntaxNode::Argument(n) => n.id,
            SyntaxNode::Pattern(n) => n.id,
        }
    }

    /// Direct children in source order
    pub fn children(&self) -> Vec<SyntaxNode<'a>> {
        let mut out = Vec::new();
        match *self {
            SyntaxNode::CompilationUnit(n) => push_members(&mut out, &n.members),
            SyntaxNode::Namespace(n) => push_members(&mut out, &n.members),
            SyntaxNode::Type(n) => {
                if let Some(params) = &n.primary_params {
                    push_params(&mut out, params);
                }
                if let Some(bases) = &n.base_list {
                    out.extend(bases.types.iter().map(SyntaxNode::BaseType));
                }
                push_members(&mut out, &n.members);
            }
            SyntaxNode::Delegate(n) => push_params(&mut out, &n.params),
            SyntaxNode::Method(n) => push_method(&mut out, n),
            SyntaxNode::Constructor(n) => {
                push_params(&mut out, &n.params);
                if let Some(init) = &n.initializer {
                    push_args(&mut out, init);
                }
                push_body(&mut out, n.body.as_ref(), n.expr_body.as_ref());
            }
            SyntaxNode::Property(n) => {
                if let Some(params) = &n.params {
                    push_params(&mut out, params);
                }
                for accessor in &n.accessors {
                    push_body(&mut out, accessor.body.as_ref(), accessor.expr_body.as_ref());
                }
                if let Some(e) = &n.expr_body {
                    out.push(SyntaxNode::Expr(e));
                }
                if let Some(e) = &n.initializer {
                    out.push(SyntaxNode::Expr(e));
                }
            }
            SyntaxNode::Field(n) => out.extend(n.declarators.iter().map(SyntaxNode::Declarator)),
            SyntaxNode::BaseType(n) => {
                if let Some(args) = &n.args {
                    push_args(&mut out, args);
                }
            }
            SyntaxNode::Parameter(n) => {
                if let Some(e) = &n.default {
                    out.push(SyntaxNode::Expr(e));
                }
            }
            SyntaxNode::Declarator(n) => {
                if let Some(e) = &n.init {
                    out.push(SyntaxNode::Expr(e));
                }
            }
            SyntaxNode::Block(n) => out.extend(n.stmts.iter().map(SyntaxNode::Stmt)),
            SyntaxNode::Stmt(n) => push_stmt(&mut out, n),
            SyntaxNode::Catch(n) => {
                if let Some(filter) = &n.filter {
                    out.push(SyntaxNode::Expr(&filter.expr));
                }
                out.push(SyntaxNode::Block(&n.block));
            }
            SyntaxNode::Expr(n) => push_expr(&mut out, n),
            SyntaxNode::Argument(n) => out.push(SyntaxNode::Expr(&n.expr)),
            SyntaxNode::Pattern(n) => push_pattern(&mut out, n),
        }
        out
    }

    /// This node and everything below it, preorder
    pub fn descendants(&self) -> impl Iterator<Item = SyntaxNode<'a>> {
        self.walk().map(|(node, _)| node)
    }

    /// Preorder walk yielding each node with its parent
    pub fn walk(&self) -> Walk<'a> {
        Walk {
            stack: vec![(*self, None)],
        }
    }

    pub fn as_expr(&self) -> Option<&'a Expr> {
        match *self {
            SyntaxNode::Expr(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_stmt(&self) -> Option<&'a Stmt> {
        match *self {
            SyntaxNode::Stmt(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&'a TypeDecl> {
        match *self {
            SyntaxNode::Type(t) => Some(t),
            _ => None,
        }
    }
}

/// Iterator returned by [`SyntaxNode::walk`]
pub struct Walk<'a> {
    stack: Vec<(SyntaxNode<'a>, Option<SyntaxNode<'a>>)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (SyntaxNode<'a>, Option<SyntaxNode<'a>>);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, parent) = self.stack.pop()?;
        let children = node.children();
        self.stack
            .extend(children.into_iter().rev().map(|child| (child, Some(node))));
        Some((node, parent))
    }
}

fn stmt_kind(stmt: &Stmt) -> SyntaxKind {
    match &stmt.kind {
        StmtKind::Block(_) => SyntaxKind::Block,
        StmtKind::Expr(_) => SyntaxKind::ExpressionStatement,
        StmtKind::LocalDecl(_) => SyntaxKind::LocalDeclarationStatement,
        StmtKind::LocalFunction(_) => SyntaxKind::LocalFunctionStatement,
        StmtKind::Return(_) => SyntaxKind::ReturnStatement,
        StmtKind::Throw(_) => SyntaxKind::ThrowStatement,
        StmtKind::If { .. } => SyntaxKind::IfStatement,
        StmtKind::While { .. } => SyntaxKind::WhileStatement,
        StmtKind::DoWhile { .. } => SyntaxKind::DoStatement,
        StmtKind::For { .. } => SyntaxKind::ForStatement,
        StmtKind::Foreach { .. } => SyntaxKind::ForEachStatement,
        StmtKind::Try(_) => SyntaxKind::TryStatement,
        StmtKind::Using { .. } => SyntaxKind::UsingStatement,
        StmtKind::Lock { .. } => SyntaxKind::LockStatement,
        StmtKind::Switch { .. } => SyntaxKind::SwitchStatement,
        StmtKind::YieldReturn(_) => SyntaxKind::YieldReturnStatement,
        StmtKind::YieldBreak | StmtKind::Break | StmtKind::Continue | StmtKind::Goto => {
            SyntaxKind::JumpStatement
        }
        StmtKind::Checked(_) => SyntaxKind::CheckedStatement,
        StmtKind::Labeled { .. } => SyntaxKind::LabeledStatement,
        StmtKind::Empty => SyntaxKind::EmptyStatement,
    }
}

fn expr_kind(expr: &Expr) -> SyntaxKind {
    match &expr.kind {
        ExprKind::Literal(_) => SyntaxKind::LiteralExpression,
        ExprKind::Default(_) => SyntaxKind::DefaultExpression,
        ExprKind::Name(_) => SyntaxKind::IdentifierName,
        ExprKind::PredefinedType(_) => SyntaxKind::PredefinedType,
        ExprKind::This => SyntaxKind::ThisExpression,
        ExprKind::Base => SyntaxKind::BaseExpression,
        ExprKind::MemberAccess { .. } => SyntaxKind::MemberAccessExpression,
        ExprKind::Invocation { .. } => SyntaxKind::InvocationExpression,
        ExprKind::ElementAccess { .. } => SyntaxKind::ElementAccessExpression,
        ExprKind::ObjectCreation { .. } => SyntaxKind::ObjectCreationExpression,
        ExprKind::ArrayCreation { .. } => SyntaxKind::ArrayCreationExpression,
        ExprKind::InitializerList(_) => SyntaxKind::InitializerExpression,
        ExprKind::Unary { .. } => SyntaxKind::PrefixUnaryExpression,
        ExprKind::Postfix { .. } => SyntaxKind::PostfixUnaryExpression,
        ExprKind::Binary { .. } => SyntaxKind::BinaryExpression,
        ExprKind::IsType { .. } => SyntaxKind::IsExpression,
        ExprKind::IsPattern { .. } => SyntaxKind::IsPatternExpression,
        ExprKind::As { .. } => SyntaxKind::AsExpression,
        ExprKind::Cast { .. } => SyntaxKind::CastExpression,
        ExprKind::Conditional { .. } => SyntaxKind::ConditionalExpression,
        ExprKind::Assignment { .. } | ExprKind::CompoundAssignment { .. } => {
            SyntaxKind::AssignmentExpression
        }
        ExprKind::Await(_) => SyntaxKind::AwaitExpression,
        ExprKind::Throw(_) => SyntaxKind::ThrowExpression,
        ExprKind::Lambda(_) => SyntaxKind::LambdaExpression,
        ExprKind::Parenthesized(_) => SyntaxKind::ParenthesizedExpression,
        ExprKind::Tuple(_) => SyntaxKind::TupleExpression,
        ExprKind::TypeOf(_) => SyntaxKind::TypeOfExpression,
        ExprKind::SizeOf(_) => SyntaxKind::SizeOfExpression,
        ExprKind::Declaration { .. } => SyntaxKind::DeclarationExpression,
        ExprKind::Switch { .. } => SyntaxKind::SwitchExpression,
        ExprKind::With { .. } => SyntaxKind::WithExpression,
        ExprKind::Missing => SyntaxKind::MissingExpression,
    }
}

fn push_members<'a>(out: &mut Vec<SyntaxNode<'a>>, members: &'a [Member]) {
    out.extend(members.iter().map(|m| match m {
        Member::Namespace(n) => SyntaxNode::Namespace(n),
        Member::Type(n) => SyntaxNode::Type(n),
        Member::Delegate(n) => SyntaxNode::Delegate(n),
        Member::Method(n) => SyntaxNode::Method(n),
        Member::Constructor(n) => SyntaxNode::Constructor(n),
        Member::Property(n) => SyntaxNode::Property(n),
        Member::Field(n) => SyntaxNode::Field(n),
    }));
}

fn push_params<'a>(out: &mut Vec<SyntaxNode<'a>>, params: &'a ParameterList) {
    out.extend(params.params.iter().map(SyntaxNode::Parameter));
}

fn push_args<'a>(out: &mut Vec<SyntaxNode<'a>>, args: &'a ArgumentList) {
    out.extend(args.args.iter().map(SyntaxNode::Argument));
}

fn push_body<'a>(out: &mut Vec<SyntaxNode<'a>>, body: Option<&'a Block>, expr: Option<&'a Expr>) {
    if let Some(b) = body {
        out.push(SyntaxNode::Block(b));
    }
    if let Some(e) = expr {
        out.push(SyntaxNode::Expr(e));
    }
}

fn push_method<'a>(out: &mut Vec<SyntaxNode<'a>>, method: &'a MethodDecl) {
    push_params(out, &method.params);
    push_body(out, method.body.as_ref(), method.expr_body.as_ref());
}

fn push_local_decl<'a>(out: &mut Vec<SyntaxNode<'a>>, decl: &'a LocalDecl) {
    out.extend(decl.declarators.iter().map(SyntaxNode::Declarator));
}

fn push_stmt<'a>(out: &mut Vec<SyntaxNode<'a>>, stmt: &'a Stmt) {
    match &stmt.kind {
        // a block statement is the block itself
        StmtKind::Block(b) => out.extend(b.stmts.iter().map(SyntaxNode::Stmt)),
        StmtKind::Expr(e) => out.push(SyntaxNode::Expr(e)),
        StmtKind::LocalDecl(d) => push_local_decl(out, d),
        StmtKind::LocalFunction(m) => push_method(out, m),
        StmtKind::Return(e) | StmtKind::Throw(e) => out.extend(e.iter().map(SyntaxNode::Expr)),
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => {
            out.push(SyntaxNode::Expr(cond));
            out.push(SyntaxNode::Stmt(then));
            if let Some(s) = otherwise {
                out.push(SyntaxNode::Stmt(s));
            }
        }
        StmtKind::While { cond, body } => {
            out.push(SyntaxNode::Expr(cond));
            out.push(SyntaxNode::Stmt(body));
        }
        StmtKind::DoWhile { body, cond } => {
            out.push(SyntaxNode::Stmt(body));
            out.push(SyntaxNode::Expr(cond));
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => {
            out.extend(init.iter().map(SyntaxNode::Stmt));
            out.extend(cond.iter().map(SyntaxNode::Expr));
            out.extend(step.iter().map(SyntaxNode::Expr));
            out.push(SyntaxNode::Stmt(body));
        }
        StmtKind::Foreach {
            collection, body, ..
        } => {
            out.push(SyntaxNode::Expr(collection));
            out.push(SyntaxNode::Stmt(body));
        }
        StmtKind::Try(t) => {
            out.push(SyntaxNode::Block(&t.block));
            out.extend(t.catches.iter().map(SyntaxNode::Catch));
            if let Some(f) = &t.finally {
                out.push(SyntaxNode::Block(f));
            }
        }
        StmtKind::Using { resource, body } => {
            match resource {
                UsingResource::Decl(d) => push_local_decl(out, d),
                UsingResource::Expr(e) => out.push(SyntaxNode::Expr(e)),
            }
            out.push(SyntaxNode::Stmt(body));
        }
        StmtKind::Lock { target, body } => {
            out.push(SyntaxNode::Expr(target));
            out.push(SyntaxNode::Stmt(body));
        }
        StmtKind::Switch { subject, sections } => {
            out.push(SyntaxNode::Expr(subject));
            for section in sections {
                for label in &section.labels {
                    if let SwitchLabel::Case { pattern, guard } = label {
                        out.push(SyntaxNode::Pattern(pattern));
                        out.extend(guard.iter().map(SyntaxNode::Expr));
                    }
                }
                out.extend(section.stmts.iter().map(SyntaxNode::Stmt));
            }
        }
        StmtKind::YieldReturn(e) => out.push(SyntaxNode::Expr(e)),
        StmtKind::Checked(b) => out.push(SyntaxNode::Block(b)),
        StmtKind::Labeled { body, .. } => out.push(SyntaxNode::Stmt(body)),
        StmtKind::YieldBreak
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Goto
        | StmtKind::Empty => {}
    }
}

fn push_expr<'a>(out: &mut Vec<SyntaxNode<'a>>, expr: &'a Expr) {
    match &expr.kind {
        ExprKind::MemberAccess { target, .. } => out.push(SyntaxNode::Expr(target)),
        ExprKind::Invocation { target, args } | ExprKind::ElementAccess { target, args, .. } => {
            out.push(SyntaxNode::Expr(target));
            push_args(out, args);
        }
        ExprKind::ObjectCreation {
            args, initializer, ..
        } => {
            if let Some(args) = args {
                push_args(out, args);
            }
            if let Some(items) = initializer {
                out.extend(items.iter().map(SyntaxNode::Expr));
            }
        }
        ExprKind::ArrayCreation {
            sizes, initializer, ..
        } => {
            out.extend(sizes.iter().map(SyntaxNode::Expr));
            if let Some(items) = initializer {
                out.extend(items.iter().map(SyntaxNode::Expr));
            }
        }
        ExprKind::InitializerList(items) => out.extend(items.iter().map(SyntaxNode::Expr)),
        ExprKind::Unary { operand, .. }
        | ExprKind::Postfix { operand, .. }
        | ExprKind::IsType { operand, .. }
        | ExprKind::As { operand, .. }
        | ExprKind::Cast { operand, .. }
        | ExprKind::Await(operand)
        | ExprKind::Throw(operand)
        | ExprKind::Parenthesized(operand) => out.push(SyntaxNode::Expr(operand)),
        ExprKind::Binary { left, right, .. } => {
            out.push(SyntaxNode::Expr(left));
            out.push(SyntaxNode::Expr(right));
        }
        ExprKind::IsPattern { operand, pattern } => {
            out.push(SyntaxNode::Expr(operand));
            out.push(SyntaxNode::Pattern(pattern));
        }
        ExprKind::Conditional {
            cond,
            when_true,
            when_false,
        } => {
            out.push(SyntaxNode::Expr(cond));
            out.push(SyntaxNode::Expr(when_true));
            out.push(SyntaxNode::Expr(when_false));
        }
        ExprKind::Assignment { target, value } | ExprKind::CompoundAssignment { target, value } => {
            out.push(SyntaxNode::Expr(target));
            out.push(SyntaxNode::Expr(value));
        }
        ExprKind::Lambda(lambda) => {
            out.extend(lambda.params.iter().map(SyntaxNode::Parameter));
            match &lambda.body {
                LambdaBody::Expr(e) => out.push(SyntaxNode::Expr(e)),
                LambdaBody::Block(b) => out.push(SyntaxNode::Block(b)),
            }
        }
        ExprKind::Tuple(items) => out.extend(items.iter().map(SyntaxNode::Argument)),
        ExprKind::Switch { subject, arms } => {
            out.push(SyntaxNode::Expr(subject));
            for arm in arms {
                out.push(SyntaxNode::Pattern(&arm.pattern));
                out.extend(arm.guard.iter().map(SyntaxNode::Expr));
                out.push(SyntaxNode::Expr(&arm.result));
            }
        }
        ExprKind::With {
            target,
            initializer,
        } => {
            out.push(SyntaxNode::Expr(target));
            out.extend(initializer.iter().map(SyntaxNode::Expr));
        }
        ExprKind::Literal(_)
        | ExprKind::Default(_)
        | ExprKind::Name(_)
        | ExprKind::PredefinedType(_)
        | ExprKind::This
        | ExprKind::Base
        | ExprKind::TypeOf(_)
        | ExprKind::SizeOf(_)
        | ExprKind::Declaration { .. }
        | ExprKind::Missing => {}
    }
}

fn push_pattern<'a>(out: &mut Vec<SyntaxNode<'a>>, pattern: &'a Pattern) {
    match &pattern.kind {
        PatternKind::Not(p) => out.push(SyntaxNode::Pattern(p)),
        PatternKind::And(a, b) | PatternKind::Or(a, b) => {
            out.push(SyntaxNode::Pattern(a));
            out.push(SyntaxNode::Pattern(b));
        }
        PatternKind::Constant(e) | PatternKind::Relational { value: e, .. } => {
            out.push(SyntaxNode::Expr(e))
        }
        PatternKind::Type(_)
        | PatternKind::Declaration { .. }
        | PatternKind::Var(_)
        | PatternKind::Recursive { .. }
        | PatternKind::Discard => {}
    }
}
