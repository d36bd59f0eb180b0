//! Binder and semantic model
//!
//! The binder walks a tree once, eagerly, and records what every name,
//! member access and invocation denotes together with the static type of
//! each expression it could resolve. Queries on the finished
//! [`SemanticModel`] are plain map lookups.

use super::declare::{
    declare, define, join, predefined, type_not_found, DeclaredTypes, NameScope, ResolveError,
    CS0246,
};
use super::symbols::{
    substitute_method, MemberDef, MethodSig, Origin, ParamSig, Substitution, Symbol, TypeId,
    TypeRef, TypeTable,
};
use super::SemanticError;
use crate::cancel::{Cancellation, Cancelled};
use crate::compiler::LanguageFeatures;
use crate::syntax::{
    ArgumentList, BinaryOp, Block, CatchClause, Expr, ExprKind, Ident, LambdaBody, LiteralKind,
    LocalDecl, Member, MethodDecl, NodeId, ParameterList, Pattern, PatternKind, SimpleName, Stmt,
    StmtKind, SwitchLabel, SyntaxTree, TryStmt, TypeSyntax, TypeSyntaxKind, UnaryOp,
    UsingResource,
};
use log::trace;
use std::cmp::Reverse;
use std::collections::HashMap;

pub const CS1501: &str = "CS1501";

/// Resolved view of one syntax tree
#[derive(Debug)]
pub struct SemanticModel {
    table: TypeTable,
    declared_types: DeclaredTypes,
    symbols: HashMap<NodeId, Symbol>,
    types: HashMap<NodeId, TypeRef>,
    declared: HashMap<NodeId, TypeRef>,
}

impl SemanticModel {
    /// Bind `tree` against a reference table
    ///
    /// Returns the model and the semantic errors found while binding.
    pub fn bind(
        tree: &SyntaxTree,
        references: &TypeTable,
        features: &LanguageFeatures,
        cancel: &Cancellation,
    ) -> Result<(Self, Vec<SemanticError>), Cancelled> {
        cancel.check()?;
        let mut table = references.clone();
        let declared_types = declare(&mut table, tree.root(), Origin::Source);
        let mut errors = define(&mut table, tree.root(), tree.text(), &declared_types, features);
        cancel.check()?;

        let mut binder = Binder {
            table: &table,
            src: tree.text(),
            cancel,
            declared_types: &declared_types,
            names: NameScope::root(&table, &tree.root().usings),
            locals: Vec::new(),
            symbols: HashMap::new(),
            types: HashMap::new(),
            declared: HashMap::new(),
            errors: Vec::new(),
        };
        binder.members(&tree.root().members)?;
        trace!(
            "bound {} symbols, {} expression types",
            binder.symbols.len(),
            binder.types.len()
        );

        let Binder {
            symbols,
            types,
            declared,
            errors: bind_errors,
            ..
        } = binder;
        errors.extend(bind_errors);
        errors.sort_by_key(|e| e.span.start);

        Ok((
            Self {
                table,
                declared_types,
                symbols,
                types,
                declared,
            },
            errors,
        ))
    }

    pub fn table(&self) -> &TypeTable {
        &self.table
    }

    /// What a name, member access, invocation or type syntax denotes
    pub fn symbol_info(&self, node: NodeId) -> Option<&Symbol> {
        self.symbols.get(&node)
    }

    /// Static type of an expression
    pub fn type_of(&self, node: NodeId) -> Option<&TypeRef> {
        self.types.get(&node)
    }

    /// Declared type of a parameter, local declarator, catch declaration,
    /// foreach variable or pattern designation
    pub fn declared_type(&self, node: NodeId) -> Option<&TypeRef> {
        self.declared.get(&node)
    }

    /// Type registered for a type or delegate declaration
    pub fn declared_symbol(&self, decl: NodeId) -> Option<TypeId> {
        self.declared_types.get(&decl).copied()
    }

    pub fn full_name(&self, ty: &TypeRef) -> Option<&str> {
        self.table.full_name(ty)
    }
}

type Bound = Result<Option<TypeRef>, Cancelled>;

enum Receiver {
    Namespace(String),
    Type(TypeRef),
    Value(Option<TypeRef>),
}

enum Callable {
    Methods(Vec<MethodSig>),
    /// Return type of the invoked delegate value
    Delegate(Option<TypeRef>),
}

struct Binder<'a> {
    table: &'a TypeTable,
    src: &'a str,
    cancel: &'a Cancellation,
    declared_types: &'a DeclaredTypes,
    names: NameScope,
    locals: Vec<HashMap<String, Symbol>>,
    symbols: HashMap<NodeId, Symbol>,
    types: HashMap<NodeId, TypeRef>,
    declared: HashMap<NodeId, TypeRef>,
    errors: Vec<SemanticError>,
}

impl Binder<'_> {
    fn push(&mut self) {
        self.locals.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.locals.pop();
    }

    fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.locals.iter().rev().find_map(|scope| scope.get(name))
    }

    fn insert_local(&mut self, name: &str, symbol: Symbol) {
        if self.locals.is_empty() {
            self.push();
        }
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name.to_string(), symbol);
        }
    }

    fn declare_local(&mut self, name: &Ident, ty: Option<TypeRef>, decl: NodeId) {
        if let Some(t) = &ty {
            self.declared.insert(decl, t.clone());
        }
        self.insert_local(
            &name.text,
            Symbol::Local {
                name: name.text.clone(),
                ty,
                decl,
            },
        );
    }

    fn with_names<R>(&mut self, names: NameScope, f: impl FnOnce(&mut Self) -> R) -> R {
        let outer = std::mem::replace(&mut self.names, names);
        let result = f(self);
        self.names = outer;
        result
    }

    /// Resolve a type used inside a body; unresolved names are not reported
    fn resolve_quiet(&mut self, ty: &TypeSyntax) -> Option<TypeRef> {
        let resolved = self.names.resolve_type(self.table, ty).ok()?;
        self.symbols.insert(ty.id, Symbol::Type(resolved.clone()));
        Some(resolved)
    }

    /// Resolve a type in declaration position and report `CS0246`
    fn resolve_reporting(&mut self, ty: &TypeSyntax) -> Option<TypeRef> {
        match self.names.resolve_type(self.table, ty) {
            Ok(resolved) => {
                self.symbols.insert(ty.id, Symbol::Type(resolved.clone()));
                Some(resolved)
            }
            Err(ResolveError::NotFound(name)) => {
                self.errors.push(SemanticError {
                    code: CS0246,
                    message: type_not_found(&name),
                    span: ty.span,
                });
                None
            }
            Err(ResolveError::Unsupported) => None,
        }
    }

    fn well_known(&self, name: &str) -> Option<TypeRef> {
        self.table.well_known(name)
    }

    // Declarations

    fn members(&mut self, members: &[Member]) -> Result<(), Cancelled> {
        for member in members {
            self.cancel.check()?;
            match member {
                Member::Namespace(ns) => {
                    let Some(name) = ns.name.dotted_name() else {
                        continue;
                    };
                    let inner = self.names.enter_namespace(self.table, &name, &ns.usings);
                    self.with_names(inner, |b| b.members(&ns.members))?;
                }
                Member::Type(decl) => {
                    let Some(&id) = self.declared_types.get(&decl.id) else {
                        continue;
                    };
                    let inner = self.names.enter_type(id);
                    self.with_names(inner, |b| {
                        if let Some(params) = &decl.primary_params {
                            b.push();
                            b.parameters(params)?;
                            b.pop();
                        }
                        if let Some(list) = &decl.base_list {
                            for base in &list.types {
                                b.resolve_quiet(&base.ty);
                                if let Some(args) = &base.args {
                                    b.arguments(args)?;
                                }
                            }
                        }
                        b.members(&decl.members)
                    })?;
                }
                Member::Delegate(decl) => {
                    let Some(&id) = self.declared_types.get(&decl.id) else {
                        continue;
                    };
                    let inner = self.names.enter_type(id);
                    self.with_names(inner, |b| {
                        b.resolve_quiet(&decl.return_type);
                        b.push();
                        let result = b.parameters(&decl.params);
                        b.pop();
                        result
                    })?;
                }
                Member::Method(m) => self.method(m)?,
                Member::Constructor(c) => {
                    self.push();
                    self.parameters(&c.params)?;
                    if let Some(args) = &c.initializer {
                        self.arguments(args)?;
                    }
                    if let Some(body) = &c.body {
                        self.block(body)?;
                    }
                    if let Some(e) = &c.expr_body {
                        self.expr(e)?;
                    }
                    self.pop();
                }
                Member::Property(p) => {
                    let ty = self.resolve_quiet(&p.ty);
                    self.push();
                    if let Some(params) = &p.params {
                        self.parameters(params)?;
                    }
                    if p.accessors.iter().any(|a| a.keyword.is("set") || a.keyword.is("init")) {
                        self.insert_local(
                            "value",
                            Symbol::Parameter {
                                name: "value".to_string(),
                                ty: ty.clone(),
                                decl: p.id,
                            },
                        );
                    }
                    for accessor in &p.accessors {
                        if let Some(body) = &accessor.body {
                            self.block(body)?;
                        }
                        if let Some(e) = &accessor.expr_body {
                            self.expr(e)?;
                        }
                    }
                    if let Some(e) = &p.expr_body {
                        self.expr(e)?;
                    }
                    if let Some(e) = &p.initializer {
                        self.expr(e)?;
                    }
                    self.pop();
                }
                Member::Field(f) => {
                    let ty = self.resolve_quiet(&f.ty);
                    for d in &f.declarators {
                        if let Some(t) = &ty {
                            self.declared.insert(d.id, t.clone());
                        }
                        if let Some(init) = &d.init {
                            self.expr(init)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn method(&mut self, m: &MethodDecl) -> Result<(), Cancelled> {
        let inner = self
            .names
            .with_method_type_params(m.type_params.iter().map(|p| p.text.as_str()));
        self.with_names(inner, |b| {
            b.resolve_quiet(&m.return_type);
            b.push();
            b.parameters(&m.params)?;
            if let Some(body) = &m.body {
                b.block(body)?;
            }
            if let Some(e) = &m.expr_body {
                b.expr(e)?;
            }
            b.pop();
            Ok(())
        })
    }

    fn parameters(&mut self, params: &ParameterList) -> Result<(), Cancelled> {
        for p in &params.params {
            let ty = p.ty.as_ref().and_then(|t| self.resolve_quiet(t));
            if let Some(t) = &ty {
                self.declared.insert(p.id, t.clone());
            }
            if let Some(default) = &p.default {
                self.expr(default)?;
            }
            self.insert_local(
                &p.name.text,
                Symbol::Parameter {
                    name: p.name.text.clone(),
                    ty,
                    decl: p.id,
                },
            );
        }
        Ok(())
    }

    /// Signature of a local function, used when it is hoisted
    fn local_function_sig(&mut self, m: &MethodDecl) -> MethodSig {
        let names = self
            .names
            .with_method_type_params(m.type_params.iter().map(|p| p.text.as_str()));
        let return_type = names.resolve_type(self.table, &m.return_type).ok();
        let params = m
            .params
            .params
            .iter()
            .map(|p| ParamSig {
                name: p.name.text.clone(),
                ty: p
                    .ty
                    .as_ref()
                    .and_then(|t| names.resolve_type(self.table, t).ok()),
                has_default: p.default.is_some(),
                is_params: p.has_modifier("params"),
            })
            .collect();
        MethodSig {
            name: m.name.text.clone(),
            owner: None,
            type_params: m.type_params.iter().map(|p| p.text.clone()).collect(),
            params,
            return_type,
            is_static: false,
            decl: Some(m.id),
        }
    }

    // Statements

    fn hoist_local_functions(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            if let StmtKind::LocalFunction(m) = &stmt.kind {
                let sig = self.local_function_sig(m);
                self.insert_local(&m.name.text, Symbol::Method(sig));
            }
        }
    }

    fn block(&mut self, block: &Block) -> Result<(), Cancelled> {
        self.push();
        self.hoist_local_functions(&block.stmts);
        for stmt in &block.stmts {
            self.stmt(stmt)?;
        }
        self.pop();
        Ok(())
    }

    fn embedded(&mut self, stmt: &Stmt) -> Result<(), Cancelled> {
        self.push();
        let result = self.stmt(stmt);
        self.pop();
        result
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), Cancelled> {
        self.cancel.check()?;
        match &stmt.kind {
            StmtKind::Block(b) | StmtKind::Checked(b) => self.block(b)?,
            StmtKind::Expr(e) | StmtKind::YieldReturn(e) => {
                self.expr(e)?;
            }
            StmtKind::LocalDecl(d) => self.local_decl(d)?,
            StmtKind::LocalFunction(m) => self.method(m)?,
            StmtKind::Return(e) | StmtKind::Throw(e) => {
                if let Some(e) = e {
                    self.expr(e)?;
                }
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond)?;
                self.embedded(then)?;
                if let Some(otherwise) = otherwise {
                    self.embedded(otherwise)?;
                }
            }
            StmtKind::While { cond, body } => {
                self.expr(cond)?;
                self.embedded(body)?;
            }
            StmtKind::DoWhile { body, cond } => {
                self.embedded(body)?;
                self.expr(cond)?;
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.push();
                for s in init {
                    self.stmt(s)?;
                }
                if let Some(cond) = cond {
                    self.expr(cond)?;
                }
                for e in step {
                    self.expr(e)?;
                }
                self.embedded(body)?;
                self.pop();
            }
            StmtKind::Foreach {
                ty,
                name,
                local_id,
                collection,
                body,
                ..
            } => {
                let collection_type = self.expr(collection)?;
                self.push();
                let element = if ty.is_var() {
                    collection_type.and_then(|c| self.table.element_type(&c))
                } else {
                    self.resolve_reporting(ty)
                };
                self.declare_local(name, element, *local_id);
                self.embedded(body)?;
                self.pop();
            }
            StmtKind::Try(t) => self.try_stmt(t)?,
            StmtKind::Using { resource, body } => {
                self.push();
                match resource {
                    UsingResource::Decl(d) => self.local_decl(d)?,
                    UsingResource::Expr(e) => {
                        self.expr(e)?;
                    }
                }
                self.embedded(body)?;
                self.pop();
            }
            StmtKind::Lock { target, body } => {
                self.expr(target)?;
                self.embedded(body)?;
            }
            StmtKind::Switch { subject, sections } => {
                let subject_type = self.expr(subject)?;
                for section in sections {
                    self.push();
                    for label in &section.labels {
                        if let SwitchLabel::Case { pattern, guard } = label {
                            self.pattern(pattern, subject_type.as_ref())?;
                            if let Some(guard) = guard {
                                self.expr(guard)?;
                            }
                        }
                    }
                    self.hoist_local_functions(&section.stmts);
                    for s in &section.stmts {
                        self.stmt(s)?;
                    }
                    self.pop();
                }
            }
            StmtKind::Labeled { body, .. } => self.stmt(body)?,
            StmtKind::YieldBreak
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Goto
            | StmtKind::Empty => {}
        }
        Ok(())
    }

    fn local_decl(&mut self, decl: &LocalDecl) -> Result<(), Cancelled> {
        let is_var = decl.ty.is_var();
        let written = if is_var {
            None
        } else {
            self.resolve_reporting(&decl.ty)
        };
        for d in &decl.declarators {
            let init = match &d.init {
                Some(e) => self.expr(e)?,
                None => None,
            };
            let ty = if is_var { init } else { written.clone() };
            self.declare_local(&d.name, ty, d.id);
        }
        Ok(())
    }

    fn try_stmt(&mut self, t: &TryStmt) -> Result<(), Cancelled> {
        self.block(&t.block)?;
        for clause in &t.catches {
            self.catch_clause(clause)?;
        }
        if let Some(finally) = &t.finally {
            self.block(finally)?;
        }
        Ok(())
    }

    fn catch_clause(&mut self, clause: &CatchClause) -> Result<(), Cancelled> {
        self.push();
        if let Some(decl) = &clause.declaration {
            let ty = self.resolve_reporting(&decl.ty);
            match &decl.name {
                Some(name) => self.declare_local(name, ty, decl.id),
                None => {
                    if let Some(t) = ty {
                        self.declared.insert(decl.id, t);
                    }
                }
            }
        }
        if let Some(filter) = &clause.filter {
            self.expr(&filter.expr)?;
        }
        self.block(&clause.block)?;
        self.pop();
        Ok(())
    }

    fn pattern(&mut self, pattern: &Pattern, input: Option<&TypeRef>) -> Result<(), Cancelled> {
        match &pattern.kind {
            PatternKind::Not(inner) => self.pattern(inner, input)?,
            PatternKind::And(left, right) | PatternKind::Or(left, right) => {
                self.pattern(left, input)?;
                self.pattern(right, input)?;
            }
            PatternKind::Type(ty) => {
                self.resolve_quiet(ty);
            }
            PatternKind::Declaration { ty, name } => {
                let resolved = self.resolve_quiet(ty);
                self.declare_local(name, resolved, pattern.id);
            }
            PatternKind::Var(name) => {
                self.declare_local(name, input.cloned(), pattern.id);
            }
            PatternKind::Constant(e) | PatternKind::Relational { value: e, .. } => {
                self.expr(e)?;
            }
            PatternKind::Recursive { ty, designation } => {
                let resolved = match ty {
                    Some(ty) => self.resolve_quiet(ty),
                    None => input.cloned(),
                };
                if let Some(name) = designation {
                    self.declare_local(name, resolved, pattern.id);
                }
            }
            PatternKind::Discard => {}
        }
        Ok(())
    }

    // Expressions

    fn expr(&mut self, e: &Expr) -> Bound {
        let ty = self.expr_type(e)?;
        if let Some(t) = &ty {
            self.types.insert(e.id, t.clone());
        }
        Ok(ty)
    }

    fn arguments(&mut self, args: &ArgumentList) -> Result<Vec<Option<TypeRef>>, Cancelled> {
        args.args.iter().map(|a| self.expr(&a.expr)).collect()
    }

    fn expr_type(&mut self, e: &Expr) -> Bound {
        let ty = match &e.kind {
            ExprKind::Literal(kind) => self.literal_type(*kind, e),
            ExprKind::Default(Some(ty)) => self.resolve_quiet(ty),
            ExprKind::Default(None) | ExprKind::Missing => None,
            ExprKind::Name(name) => self.name(e.id, name),
            ExprKind::PredefinedType(keyword) => {
                if let Some(t) = predefined(self.table, keyword) {
                    self.symbols.insert(e.id, Symbol::Type(t));
                }
                None
            }
            ExprKind::This => self.names.self_type(self.table),
            ExprKind::Base => self
                .names
                .self_type(self.table)
                .and_then(|t| self.table.base_of(&t)),
            ExprKind::MemberAccess { target, name, .. } => {
                self.member_access(e.id, target, name)?
            }
            ExprKind::Invocation { target, args } => self.invocation(e.id, target, args)?,
            ExprKind::ElementAccess { target, args, .. } => {
                let target_type = self.expr(target)?;
                self.arguments(args)?;
                match target_type {
                    Some(TypeRef::Array(inner)) => Some(*inner),
                    Some(t) => self.property_type(&t, "this"),
                    None => None,
                }
            }
            ExprKind::ObjectCreation {
                ty,
                args,
                initializer,
            } => {
                let created = match ty {
                    Some(ty) => self.resolve_reporting(ty),
                    None => None,
                };
                if let Some(args) = args {
                    self.arguments(args)?;
                }
                if let Some(items) = initializer {
                    self.member_initializers(created.as_ref(), items)?;
                }
                created
            }
            ExprKind::ArrayCreation {
                ty,
                sizes,
                initializer,
            } => {
                for size in sizes {
                    self.expr(size)?;
                }
                for item in initializer.iter().flatten() {
                    self.expr(item)?;
                }
                match ty {
                    Some(ty) if matches!(ty.kind, TypeSyntaxKind::Array(_)) => self.resolve_quiet(ty),
                    Some(element) => self
                        .resolve_quiet(element)
                        .map(|t| TypeRef::Array(Box::new(t))),
                    None => None,
                }
            }
            ExprKind::InitializerList(items) => {
                for item in items {
                    self.expr(item)?;
                }
                None
            }
            ExprKind::Unary { op, operand } => {
                let t = self.expr(operand)?;
                match op {
                    UnaryOp::Not => self.well_known("System.Boolean"),
                    UnaryOp::Index | UnaryOp::AddressOf | UnaryOp::Deref => None,
                    _ => t,
                }
            }
            ExprKind::Postfix { operand, .. } => self.expr(operand)?,
            ExprKind::Binary { op, left, right } => {
                let l = self.expr(left)?;
                let r = self.expr(right)?;
                self.binary_type(*op, l, r)
            }
            ExprKind::IsType { operand, ty } => {
                self.expr(operand)?;
                self.resolve_quiet(ty);
                self.well_known("System.Boolean")
            }
            ExprKind::IsPattern { operand, pattern } => {
                let t = self.expr(operand)?;
                self.pattern(pattern, t.as_ref())?;
                self.well_known("System.Boolean")
            }
            ExprKind::As { operand, ty } => {
                self.expr(operand)?;
                self.resolve_quiet(ty)
            }
            ExprKind::Cast { ty, operand } => {
                self.expr(operand)?;
                self.resolve_quiet(ty)
            }
            ExprKind::Conditional {
                cond,
                when_true,
                when_false,
            } => {
                self.expr(cond)?;
                let a = self.expr(when_true)?;
                let b = self.expr(when_false)?;
                a.or(b)
            }
            ExprKind::Assignment { target, value }
            | ExprKind::CompoundAssignment { target, value } => {
                let t = self.expr(target)?;
                let v = self.expr(value)?;
                t.or(v)
            }
            ExprKind::Await(inner) => {
                let t = self.expr(inner)?;
                t.and_then(|t| self.await_result(&t))
            }
            ExprKind::Throw(inner) => {
                self.expr(inner)?;
                None
            }
            ExprKind::Lambda(lambda) => {
                self.push();
                for p in &lambda.params {
                    let ty = p.ty.as_ref().and_then(|t| self.resolve_quiet(t));
                    if let Some(t) = &ty {
                        self.declared.insert(p.id, t.clone());
                    }
                    self.insert_local(
                        &p.name.text,
                        Symbol::Parameter {
                            name: p.name.text.clone(),
                            ty,
                            decl: p.id,
                        },
                    );
                }
                match &lambda.body {
                    LambdaBody::Expr(body) => {
                        self.expr(body)?;
                    }
                    LambdaBody::Block(body) => self.block(body)?,
                }
                self.pop();
                None
            }
            ExprKind::Parenthesized(inner) => self.expr(inner)?,
            ExprKind::Tuple(args) => {
                for a in args {
                    self.expr(&a.expr)?;
                }
                None
            }
            ExprKind::TypeOf(ty) => {
                self.resolve_quiet(ty);
                self.well_known("System.Type")
            }
            ExprKind::SizeOf(_) => self.well_known("System.Int32"),
            ExprKind::Declaration { ty, name } => {
                let resolved = if ty.is_var() {
                    None
                } else {
                    self.resolve_reporting(ty)
                };
                self.declare_local(name, resolved.clone(), e.id);
                resolved
            }
            ExprKind::Switch { subject, arms } => {
                let subject_type = self.expr(subject)?;
                let mut result = None;
                for arm in arms {
                    self.push();
                    self.pattern(&arm.pattern, subject_type.as_ref())?;
                    if let Some(guard) = &arm.guard {
                        self.expr(guard)?;
                    }
                    let arm_type = self.expr(&arm.result)?;
                    result = result.or(arm_type);
                    self.pop();
                }
                result
            }
            ExprKind::With {
                target,
                initializer,
            } => {
                let t = self.expr(target)?;
                self.member_initializers(t.as_ref(), initializer)?;
                t
            }
        };
        Ok(ty)
    }

    fn literal_type(&self, kind: LiteralKind, e: &Expr) -> Option<TypeRef> {
        let name = match kind {
            LiteralKind::Number => number_type(e.span.text(self.src)),
            LiteralKind::String => "System.String",
            LiteralKind::Char => "System.Char",
            LiteralKind::True | LiteralKind::False => "System.Boolean",
            LiteralKind::Null => return None,
        };
        self.well_known(name)
    }

    fn binary_type(&self, op: BinaryOp, l: Option<TypeRef>, r: Option<TypeRef>) -> Option<TypeRef> {
        if op.yields_bool() {
            return self.well_known("System.Boolean");
        }
        match op {
            BinaryOp::Coalesce => match l {
                Some(TypeRef::Nullable(inner)) => Some(*inner),
                other => other.or(r),
            },
            BinaryOp::Range => None,
            BinaryOp::Add => {
                let string = self.well_known("System.String");
                if string.is_some() && (l == string || r == string) {
                    string
                } else {
                    l.or(r)
                }
            }
            _ => l.or(r),
        }
    }

    /// Result type of `await` on a value of type `ty`
    fn await_result(&self, ty: &TypeRef) -> Option<TypeRef> {
        let name = self.table.full_name(ty)?;
        let awaitable = matches!(
            name,
            "System.Threading.Tasks.Task"
                | "System.Threading.Tasks.ValueTask"
                | "System.Runtime.CompilerServices.ConfiguredTaskAwaitable"
                | "System.Runtime.CompilerServices.ConfiguredValueTaskAwaitable"
        );
        if awaitable {
            ty.args().first().cloned()
        } else {
            None
        }
    }

    /// `{ Name = value }` assigns members of the created type
    fn member_initializers(
        &mut self,
        target: Option<&TypeRef>,
        items: &[Expr],
    ) -> Result<(), Cancelled> {
        for item in items {
            if let ExprKind::Assignment {
                target: member,
                value,
            } = &item.kind
            {
                if let ExprKind::Name(name) = &member.kind {
                    if let Some(owner) = target {
                        if let Some(ty) = self.value_member(member.id, owner, &name.ident.text) {
                            self.types.insert(member.id, ty);
                        }
                    }
                    self.expr(value)?;
                    continue;
                }
            }
            self.expr(item)?;
        }
        Ok(())
    }

    fn name(&mut self, id: NodeId, name: &SimpleName) -> Option<TypeRef> {
        let text = name.ident.text.as_str();

        if name.type_args.is_empty() {
            if let Some(symbol) = self.lookup_local(text).cloned() {
                let ty = symbol.value_type().cloned();
                self.symbols.insert(id, symbol);
                return ty;
            }
        }

        for owner in self.names.enclosing_types(self.table) {
            let members = self.table.members_named(&owner, text);
            if members.is_empty() {
                continue;
            }
            return self.member_symbol(id, &members);
        }

        let args: Option<Vec<TypeRef>> = name
            .type_args
            .iter()
            .map(|a| self.resolve_quiet(a))
            .collect();
        if let Some(args) = args {
            if let Some(t) = self.names.lookup_simple(self.table, text, args) {
                self.symbols.insert(id, Symbol::Type(t));
                return None;
            }
        }

        if let Some(ns) = self.names.lookup_namespace(self.table, text) {
            self.symbols.insert(id, Symbol::Namespace(ns));
        }
        None
    }

    /// Record the first non-method member; methods wait for an invocation
    fn member_symbol(&mut self, id: NodeId, members: &[MemberDef]) -> Option<TypeRef> {
        let symbol = members.iter().find_map(|m| match m {
            MemberDef::Property { name, ty, .. } => Some(Symbol::Property {
                name: name.clone(),
                ty: ty.clone(),
            }),
            MemberDef::Field { name, ty, .. } => Some(Symbol::Field {
                name: name.clone(),
                ty: ty.clone(),
            }),
            MemberDef::Method(_) | MemberDef::Constructor(_) => None,
        })?;
        let ty = symbol.value_type().cloned();
        self.symbols.insert(id, symbol);
        ty
    }

    fn value_member(&mut self, id: NodeId, owner: &TypeRef, name: &str) -> Option<TypeRef> {
        let owner = match owner {
            TypeRef::Nullable(inner) => inner.as_ref(),
            other => other,
        };
        let members = self.table.members_named(owner, name);
        self.member_symbol(id, &members)
    }

    fn property_type(&self, owner: &TypeRef, name: &str) -> Option<TypeRef> {
        self.table
            .members_named(owner, name)
            .into_iter()
            .find_map(|m| match m {
                MemberDef::Property { ty, .. } => ty,
                _ => None,
            })
    }

    fn receiver(&mut self, target: &Expr) -> Result<Receiver, Cancelled> {
        let ty = self.expr(target)?;
        Ok(match (self.symbols.get(&target.id), ty) {
            (Some(Symbol::Namespace(ns)), _) => Receiver::Namespace(ns.clone()),
            (Some(Symbol::Type(t)), None) => Receiver::Type(t.clone()),
            (_, ty) => Receiver::Value(ty),
        })
    }

    fn member_access(&mut self, id: NodeId, target: &Expr, name: &SimpleName) -> Bound {
        let receiver = self.receiver(target)?;
        let text = name.ident.text.as_str();
        let args: Option<Vec<TypeRef>> = name
            .type_args
            .iter()
            .map(|a| self.resolve_quiet(a))
            .collect();

        Ok(match receiver {
            Receiver::Namespace(ns) => {
                let full = join(&ns, text);
                let found = args
                    .and_then(|args| self.table.lookup(&full, args.len()).map(|def| (def, args)));
                if let Some((def, args)) = found {
                    self.symbols
                        .insert(id, Symbol::Type(TypeRef::Named { def, args }));
                } else if self.table.is_namespace(&full) {
                    self.symbols.insert(id, Symbol::Namespace(full));
                }
                None
            }
            Receiver::Type(owner) => {
                let arity = name.type_args.len();
                match (self.table.nested_type(&owner, text, arity), args) {
                    (Some(def), Some(args)) => {
                        self.symbols
                            .insert(id, Symbol::Type(TypeRef::Named { def, args }));
                        None
                    }
                    _ => self.value_member(id, &owner, text),
                }
            }
            Receiver::Value(Some(owner)) => self.value_member(id, &owner, text),
            Receiver::Value(None) => None,
        })
    }

    fn invoke_delegate(&self, ty: Option<&TypeRef>) -> Option<TypeRef> {
        self.table.delegate_invoke(ty?)?.return_type
    }

    /// Split `members` into a method group, or record the property or
    /// field of delegate type being invoked
    fn callable(&mut self, target: NodeId, members: Vec<MemberDef>) -> Callable {
        let methods: Vec<MethodSig> = members
            .iter()
            .filter_map(|m| match m {
                MemberDef::Method(sig) => Some(sig.clone()),
                _ => None,
            })
            .collect();
        if !methods.is_empty() {
            return Callable::Methods(methods);
        }
        let value = self.member_symbol(target, &members);
        Callable::Delegate(self.invoke_delegate(value.as_ref()))
    }

    fn invocation(&mut self, id: NodeId, target: &Expr, args: &ArgumentList) -> Bound {
        if let ExprKind::Name(name) = &target.kind {
            if name.ident.is("nameof") && self.lookup_local("nameof").is_none() {
                self.arguments(args)?;
                return Ok(self.well_known("System.String"));
            }
        }

        let arg_types = self.arguments(args)?;

        let (candidates, name) = match &target.kind {
            ExprKind::Name(name) => {
                if let Some(symbol) = self.lookup_local(&name.ident.text).cloned() {
                    self.symbols.insert(target.id, symbol.clone());
                    match symbol {
                        Symbol::Method(sig) => (vec![sig], name),
                        other => {
                            let ty = other.value_type().cloned();
                            if let Some(t) = &ty {
                                self.types.insert(target.id, t.clone());
                            }
                            return Ok(self.invoke_delegate(ty.as_ref()));
                        }
                    }
                } else {
                    let mut candidates = Vec::new();
                    for owner in self.names.enclosing_types(self.table) {
                        let members = self.table.members_named(&owner, &name.ident.text);
                        if members.is_empty() {
                            continue;
                        }
                        match self.callable(target.id, members) {
                            Callable::Methods(methods) => candidates = methods,
                            Callable::Delegate(result) => return Ok(result),
                        }
                        break;
                    }
                    (candidates, name)
                }
            }
            ExprKind::MemberAccess {
                target: receiver,
                name,
                ..
            } => {
                let owner = match self.receiver(receiver)? {
                    Receiver::Type(t) | Receiver::Value(Some(t)) => t,
                    Receiver::Namespace(_) | Receiver::Value(None) => return Ok(None),
                };
                let owner = match owner {
                    TypeRef::Nullable(inner) => *inner,
                    other => other,
                };
                let members = self.table.members_named(&owner, &name.ident.text);
                if members.is_empty() {
                    return Ok(None);
                }
                match self.callable(target.id, members) {
                    Callable::Methods(methods) => (methods, name),
                    Callable::Delegate(result) => return Ok(result),
                }
            }
            _ => {
                let t = self.expr(target)?;
                return Ok(self.invoke_delegate(t.as_ref()));
            }
        };

        if candidates.is_empty() {
            return Ok(None);
        }

        let explicit: Vec<TypeRef> = name
            .type_args
            .iter()
            .filter_map(|a| self.resolve_quiet(a))
            .collect();
        if explicit.len() != name.type_args.len() {
            return Ok(None);
        }

        match self.select_overload(&candidates, &arg_types, &explicit) {
            Some(sig) => {
                let return_type = sig.return_type.clone();
                self.symbols.insert(target.id, Symbol::Method(sig.clone()));
                self.symbols.insert(id, Symbol::Method(sig));
                Ok(return_type)
            }
            None => {
                self.errors.push(SemanticError {
                    code: CS1501,
                    message: format!(
                        "No overload for method '{}' takes {} arguments",
                        name.ident.text,
                        arg_types.len()
                    ),
                    span: name.ident.span,
                });
                Ok(None)
            }
        }
    }

    fn assignable(&self, from: &TypeRef, to: &TypeRef) -> bool {
        from == to || self.table.base_chain(from).iter().any(|t| t == to)
    }

    /// Pick the best candidate by argument count, then by how many known
    /// argument types match, then by declaration order
    fn select_overload(
        &self,
        candidates: &[MethodSig],
        arg_types: &[Option<TypeRef>],
        explicit: &[TypeRef],
    ) -> Option<MethodSig> {
        let count = arg_types.len();
        let (_, best) = candidates
            .iter()
            .enumerate()
            .filter(|(_, sig)| {
                sig.accepts(count) && (explicit.is_empty() || sig.type_params.len() == explicit.len())
            })
            .max_by_key(|(index, sig)| {
                let score = sig
                    .params
                    .iter()
                    .zip(arg_types)
                    .filter(|(p, a)| match (&p.ty, a) {
                        (Some(p), Some(a)) => self.assignable(a, p),
                        _ => false,
                    })
                    .count();
                (score, Reverse(*index))
            })?;

        if best.type_params.is_empty() {
            return Some(best.clone());
        }
        let mut subst = Substitution::new();
        if explicit.is_empty() {
            for (param, arg) in best.params.iter().zip(arg_types) {
                if let (Some(p), Some(a)) = (&param.ty, arg) {
                    infer(p, a, &best.type_params, &mut subst);
                }
            }
        } else {
            subst.extend(best.type_params.iter().cloned().zip(explicit.iter().cloned()));
        }
        Some(substitute_method(best, &subst))
    }
}

/// Match a parameter type against an argument type to infer type arguments
fn infer(param: &TypeRef, arg: &TypeRef, type_params: &[String], subst: &mut Substitution) {
    match (param, arg) {
        (TypeRef::Param(name), _) if type_params.contains(name) => {
            subst.entry(name.clone()).or_insert_with(|| arg.clone());
        }
        (
            TypeRef::Named {
                def: left,
                args: left_args,
            },
            TypeRef::Named {
                def: right,
                args: right_args,
            },
        ) if left == right => {
            for (p, a) in left_args.iter().zip(right_args) {
                infer(p, a, type_params, subst);
            }
        }
        (TypeRef::Array(p), TypeRef::Array(a)) | (TypeRef::Nullable(p), TypeRef::Nullable(a)) => {
            infer(p, a, type_params, subst)
        }
        _ => {}
    }
}

/// `System` type of a numeric literal, from its suffix and shape
fn number_type(text: &str) -> &'static str {
    let lower = text.to_ascii_lowercase().replace('_', "");
    let hex_or_binary = lower.starts_with("0x") || lower.starts_with("0b");
    let unsigned_long = lower.ends_with("ul") || lower.ends_with("lu");
    if !hex_or_binary {
        if lower.ends_with('f') {
            return "System.Single";
        }
        if lower.ends_with('m') {
            return "System.Decimal";
        }
        if lower.ends_with('d') || lower.contains('.') || lower.contains('e') {
            return "System.Double";
        }
    }
    if unsigned_long {
        "System.UInt64"
    } else if lower.ends_with('l') {
        "System.Int64"
    } else if lower.ends_with('u') {
        "System.UInt32"
    } else {
        "System.Int32"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::library::core_table;
    use crate::syntax::SyntaxNode;

    fn bind(src: &str) -> (SyntaxTree, SemanticModel, Vec<SemanticError>) {
        let tree = SyntaxTree::parse(src);
        assert!(tree.errors().is_empty(), "{:?}", tree.errors());
        let (model, errors) = SemanticModel::bind(
            &tree,
            core_table(),
            &LanguageFeatures::latest(),
            &Cancellation::new(),
        )
        .unwrap();
        (tree, model, errors)
    }

    /// First expression whose text is exactly `text`
    fn find_expr<'t>(tree: &'t SyntaxTree, text: &str) -> &'t Expr {
        tree.root_node()
            .descendants()
            .filter_map(|n| n.as_expr())
            .find(|e| tree.slice(e.span) == text)
            .unwrap_or_else(|| panic!("no expression `{}`", text))
    }

    fn type_name(model: &SemanticModel, tree: &SyntaxTree, text: &str) -> Option<String> {
        let e = find_expr(tree, text);
        model.type_of(e.id).map(|t| model.table().display(t))
    }

    const PRELUDE: &str = "using System;\nusing System.Threading;\nusing System.Threading.Tasks;\n";

    #[test]
    fn test_method_invocation_types() {
        let src = format!(
            "{}class C {{ Task<int> Get() => Task.FromResult(1); async Task M() {{ var x = await Get(); Task.Delay(10); x.ToString(); }} }}",
            PRELUDE
        );
        let (tree, model, errors) = bind(&src);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(
            type_name(&model, &tree, "Get()").as_deref(),
            Some("System.Threading.Tasks.Task<System.Int32>")
        );
        assert_eq!(
            type_name(&model, &tree, "Task.FromResult(1)").as_deref(),
            Some("System.Threading.Tasks.Task<System.Int32>")
        );
        assert_eq!(
            type_name(&model, &tree, "await Get()").as_deref(),
            Some("System.Int32")
        );
        assert_eq!(
            type_name(&model, &tree, "Task.Delay(10)").as_deref(),
            Some("System.Threading.Tasks.Task")
        );
        let delay = find_expr(&tree, "Task.Delay(10)");
        let ExprKind::Invocation { target, .. } = &delay.kind else {
            panic!("expected invocation");
        };
        assert!(matches!(
            model.symbol_info(target.id),
            Some(Symbol::Method(m)) if m.name == "Delay"
        ));
    }

    #[test]
    fn test_parameter_declared_types() {
        let src = format!(
            "{}class C {{ void M(CancellationToken token, int count = 0) {{ }} }}",
            PRELUDE
        );
        let (tree, model, _) = bind(&src);
        let params: Vec<_> = tree
            .root_node()
            .descendants()
            .filter_map(|n| match n {
                SyntaxNode::Parameter(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(params.len(), 2);
        let token = model.declared_type(params[0].id).unwrap();
        assert_eq!(
            model.full_name(token),
            Some("System.Threading.CancellationToken")
        );
        assert_eq!(
            model.full_name(model.declared_type(params[1].id).unwrap()),
            Some("System.Int32")
        );
    }

    #[test]
    fn test_locals_and_catch_variables() {
        let src = format!(
            "{}class C {{ void M(CancellationToken token) {{ try {{ token.ThrowIfCancellationRequested(); }} catch (Exception ex) when (!(ex is OperationCanceledException)) {{ }} }} }}",
            PRELUDE
        );
        let (tree, model, errors) = bind(&src);
        assert!(errors.is_empty(), "{:?}", errors);
        let ex = find_expr(&tree, "ex");
        assert!(matches!(
            model.symbol_info(ex.id),
            Some(Symbol::Local { name, .. }) if name == "ex"
        ));
        assert_eq!(
            type_name(&model, &tree, "token").as_deref(),
            Some("System.Threading.CancellationToken")
        );
        let is_check = find_expr(&tree, "ex is OperationCanceledException");
        let ExprKind::IsType { ty, .. } = &is_check.kind else {
            panic!("expected is-type");
        };
        assert!(matches!(
            model.symbol_info(ty.id),
            Some(Symbol::Type(t)) if model.full_name(t) == Some("System.OperationCanceledException")
        ));
    }

    #[test]
    fn test_delegate_local_invocation() {
        let src = format!(
            "{}class C {{ void M() {{ Func<Task> run = () => Task.CompletedTask; run(); }} }}",
            PRELUDE
        );
        let (tree, model, _) = bind(&src);
        assert_eq!(
            type_name(&model, &tree, "run()").as_deref(),
            Some("System.Threading.Tasks.Task")
        );
        let call = find_expr(&tree, "run()");
        let ExprKind::Invocation { target, .. } = &call.kind else {
            panic!("expected invocation");
        };
        assert!(matches!(model.symbol_info(target.id), Some(Symbol::Local { .. })));
    }

    #[test]
    fn test_local_function_is_hoisted() {
        let src = format!(
            "{}class C {{ void M() {{ Run(); Task Run() => Task.CompletedTask; }} }}",
            PRELUDE
        );
        let (tree, model, _) = bind(&src);
        assert_eq!(
            type_name(&model, &tree, "Run()").as_deref(),
            Some("System.Threading.Tasks.Task")
        );
    }

    #[test]
    fn test_context_member_through_interface_chain() {
        let src = format!(
            "{}using NServiceBus;\nclass H {{ Task M(IMessageHandlerContext context) => context.Send(new object()); CancellationToken T(IMessageHandlerContext context) => context.CancellationToken; }}",
            PRELUDE
        );
        let (tree, model, errors) = bind(&src);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(
            type_name(&model, &tree, "context.Send(new object())").as_deref(),
            Some("System.Threading.Tasks.Task")
        );
        assert_eq!(
            type_name(&model, &tree, "context.CancellationToken").as_deref(),
            Some("System.Threading.CancellationToken")
        );
    }

    #[test]
    fn test_qualified_and_aliased_names() {
        let src = "using T = System.Threading.Tasks.Task;\nclass C { T M() => System.Threading.Tasks.Task.CompletedTask; }";
        let (tree, model, errors) = bind(src);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(
            type_name(&model, &tree, "System.Threading.Tasks.Task.CompletedTask").as_deref(),
            Some("System.Threading.Tasks.Task")
        );
    }

    #[test]
    fn test_source_types_and_inheritance() {
        let src = format!(
            "{}namespace App {{ class Base {{ public Task Work() => Task.CompletedTask; }} class Derived : Base {{ void M() {{ Work(); this.Work(); }} }} }}",
            PRELUDE
        );
        let (tree, model, errors) = bind(&src);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(
            type_name(&model, &tree, "this.Work()").as_deref(),
            Some("System.Threading.Tasks.Task")
        );
        assert_eq!(
            type_name(&model, &tree, "Work()").as_deref(),
            Some("System.Threading.Tasks.Task")
        );
    }

    #[test]
    fn test_unknown_type_reported() {
        let (_, _, errors) = bind("class C { Missing M() { Other x = null; return null; } }");
        let codes: Vec<&str> = errors.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![CS0246, CS0246]);
        assert!(errors[0].message.contains("'Missing'"));
    }

    #[test]
    fn test_wrong_argument_count_reported() {
        let src = "class C { void Run(int a) { } void M() { Run(); Run(1); } }";
        let (_, _, errors) = bind(src);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, CS1501);
        assert_eq!(
            errors[0].message,
            "No overload for method 'Run' takes 0 arguments"
        );
    }

    #[test]
    fn test_optional_order_and_duplicates_reported() {
        let src = "using System.Threading;\nclass C { void A(CancellationToken t = default, int x) { } void B(int x) { } void B(int y) { } }";
        let (_, _, errors) = bind(src);
        let codes: Vec<&str> = errors.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec!["CS1737", "CS0111"]);
    }

    #[test]
    fn test_cancelled_binding() {
        let tree = SyntaxTree::parse("class C { void M() { } }");
        let cancel = Cancellation::new();
        cancel.cancel();
        let result = SemanticModel::bind(
            &tree,
            core_table(),
            &LanguageFeatures::latest(),
            &cancel,
        );
        assert!(matches!(result, Err(Cancelled)));
    }

    #[test]
    fn test_number_literal_types() {
        assert_eq!(number_type("42"), "System.Int32");
        assert_eq!(number_type("42L"), "System.Int64");
        assert_eq!(number_type("1.5"), "System.Double");
        assert_eq!(number_type("1.5m"), "System.Decimal");
        assert_eq!(number_type("2f"), "System.Single");
        assert_eq!(number_type("0xFF"), "System.Int32");
        assert_eq!(number_type("10UL"), "System.UInt64");
    }
}
