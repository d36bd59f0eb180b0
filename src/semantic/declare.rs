//! Declaration passes and type-name resolution
//!
//! Types are registered in two passes so that signatures may refer to types
//! declared later in the same file or in another reference tree:
//! [`declare`] creates a [`TypeDef`] per type declaration, then [`define`]
//! resolves base lists and member signatures.

use super::symbols::{
    MemberDef, MethodSig, Origin, ParamSig, TypeDef, TypeId, TypeKind, TypeRef, TypeTable,
};
use super::SemanticError;
use crate::compiler::LanguageFeatures;
use crate::syntax::{
    CompilationUnit, ConstructorDecl, DelegateDecl, Member, MethodDecl, ModifierKind, NameSegment,
    NodeId, Parameter, ParameterList, Span, TypeDecl, TypeKeyword, TypeSyntax, TypeSyntaxKind,
    UsingDirective,
};
use std::collections::{HashMap, HashSet};

pub const CS0246: &str = "CS0246";
pub const CS0111: &str = "CS0111";
pub const CS1737: &str = "CS1737";
pub const CS0106: &str = "CS0106";
pub const CS8701: &str = "CS8701";

pub fn type_not_found(name: &str) -> String {
    format!(
        "The type or namespace name '{}' could not be found (are you missing a using directive or an assembly reference?)",
        name
    )
}

/// Why a written type did not resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No type or namespace with this name is visible
    NotFound(String),
    /// Written form the model does not represent, e.g. tuples
    Unsupported,
}

/// Map a predefined type keyword to its `System` type
pub fn predefined(table: &TypeTable, keyword: &str) -> Option<TypeRef> {
    let name = match keyword {
        "void" => return Some(TypeRef::Void),
        "bool" => "System.Boolean",
        "byte" => "System.Byte",
        "sbyte" => "System.SByte",
        "char" => "System.Char",
        "decimal" => "System.Decimal",
        "double" => "System.Double",
        "float" => "System.Single",
        "int" => "System.Int32",
        "uint" => "System.UInt32",
        "long" => "System.Int64",
        "ulong" => "System.UInt64",
        "short" => "System.Int16",
        "ushort" => "System.UInt16",
        "object" => "System.Object",
        "string" => "System.String",
        "nint" => "System.IntPtr",
        "nuint" => "System.UIntPtr",
        _ => return None,
    };
    table.well_known(name)
}

pub(crate) fn join(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

#[derive(Debug, Clone)]
enum AliasTarget {
    Namespace(String),
    Type(TypeRef),
}

/// Resolution result for the qualifier of a dotted name
enum Container {
    Namespace(String),
    Type(TypeRef),
}

/// Names visible at one point in a file
#[derive(Debug, Clone)]
pub struct NameScope {
    /// Innermost namespace first, ending with the global namespace
    namespaces: Vec<String>,
    imports: Vec<String>,
    aliases: HashMap<String, AliasTarget>,
    current_type: Option<TypeId>,
    method_type_params: Vec<String>,
}

impl NameScope {
    /// Scope at the top of a compilation unit
    pub fn root(table: &TypeTable, usings: &[UsingDirective]) -> Self {
        let mut scope = Self {
            namespaces: vec![String::new()],
            imports: Vec::new(),
            aliases: HashMap::new(),
            current_type: None,
            method_type_params: Vec::new(),
        };
        scope.add_usings(table, usings);
        scope
    }

    pub fn current_namespace(&self) -> &str {
        self.namespaces.first().map(String::as_str).unwrap_or("")
    }

    pub fn enter_namespace(&self, table: &TypeTable, name: &str, usings: &[UsingDirective]) -> Self {
        let full = join(self.current_namespace(), name);
        let mut scope = self.clone();
        scope.namespaces = Vec::new();
        let mut prefix = full.as_str();
        loop {
            scope.namespaces.push(prefix.to_string());
            match prefix.rfind('.') {
                Some(dot) => prefix = &prefix[..dot],
                None => break,
            }
        }
        scope.namespaces.push(String::new());
        scope.add_usings(table, usings);
        scope
    }

    pub fn enter_type(&self, id: TypeId) -> Self {
        let mut scope = self.clone();
        scope.current_type = Some(id);
        scope
    }

    /// Add method (or local function) type parameters
    pub fn with_method_type_params<'a>(&self, params: impl IntoIterator<Item = &'a str>) -> Self {
        let mut scope = self.clone();
        scope
            .method_type_params
            .extend(params.into_iter().map(str::to_string));
        scope
    }

    fn add_usings(&mut self, table: &TypeTable, usings: &[UsingDirective]) {
        for using in usings {
            if using.is_static {
                continue;
            }
            let Some(dotted) = using.name.dotted_name() else {
                if let Some(alias) = &using.alias {
                    if let Ok(ty) = self.resolve_type(table, &using.name) {
                        self.aliases
                            .insert(alias.text.clone(), AliasTarget::Type(ty));
                    }
                }
                continue;
            };
            match &using.alias {
                Some(alias) => {
                    let target = if table.is_namespace(&dotted) {
                        Some(AliasTarget::Namespace(dotted))
                    } else {
                        self.resolve_type(table, &using.name)
                            .ok()
                            .map(AliasTarget::Type)
                    };
                    if let Some(target) = target {
                        self.aliases.insert(alias.text.clone(), target);
                    }
                }
                None => self.imports.push(dotted),
            }
        }
    }

    /// Enclosing type followed by its containing types
    fn type_chain(&self, table: &TypeTable) -> Vec<TypeId> {
        let mut chain = Vec::new();
        let mut current = self.current_type;
        while let Some(id) = current {
            chain.push(id);
            current = table.get(id).containing;
        }
        chain
    }

    /// The enclosing type as seen from inside its own declaration
    pub fn self_type(&self, table: &TypeTable) -> Option<TypeRef> {
        self.current_type.map(|id| self_reference(table, id))
    }

    pub fn enclosing_types(&self, table: &TypeTable) -> Vec<TypeRef> {
        self.type_chain(table)
            .into_iter()
            .map(|id| self_reference(table, id))
            .collect()
    }

    pub fn resolve_type(&self, table: &TypeTable, ty: &TypeSyntax) -> Result<TypeRef, ResolveError> {
        match &ty.kind {
            TypeSyntaxKind::Predefined(keyword) => {
                predefined(table, keyword).ok_or_else(|| ResolveError::NotFound(keyword.clone()))
            }
            TypeSyntaxKind::Array(inner) => {
                Ok(TypeRef::Array(Box::new(self.resolve_type(table, inner)?)))
            }
            TypeSyntaxKind::Nullable(inner) => {
                Ok(TypeRef::Nullable(Box::new(self.resolve_type(table, inner)?)))
            }
            TypeSyntaxKind::Tuple(elements) => {
                for element in elements {
                    self.resolve_type(table, element)?;
                }
                Err(ResolveError::Unsupported)
            }
            TypeSyntaxKind::Named(segments) => self.resolve_named(table, segments),
        }
    }

    fn resolve_args(
        &self,
        table: &TypeTable,
        segment: &NameSegment,
    ) -> Result<Vec<TypeRef>, ResolveError> {
        segment
            .type_args
            .iter()
            .map(|a| self.resolve_type(table, a))
            .collect()
    }

    fn resolve_named(
        &self,
        table: &TypeTable,
        segments: &[NameSegment],
    ) -> Result<TypeRef, ResolveError> {
        let Some((last, qualifier)) = segments.split_last() else {
            return Err(ResolveError::Unsupported);
        };
        let args = self.resolve_args(table, last)?;
        let name = last.ident.text.as_str();

        if qualifier.is_empty() {
            return self
                .lookup_simple(table, name, args)
                .ok_or_else(|| ResolveError::NotFound(name.to_string()));
        }

        let not_found = || {
            ResolveError::NotFound(
                segments
                    .iter()
                    .map(|s| s.ident.text.as_str())
                    .collect::<Vec<_>>()
                    .join("."),
            )
        };
        match self.resolve_container(table, qualifier)? {
            Container::Namespace(ns) => table
                .lookup(&join(&ns, name), args.len())
                .map(|def| TypeRef::Named { def, args })
                .ok_or_else(not_found),
            Container::Type(owner) => table
                .nested_type(&owner, name, args.len())
                .map(|def| TypeRef::Named { def, args })
                .ok_or_else(not_found),
        }
    }

    fn resolve_container(
        &self,
        table: &TypeTable,
        qualifier: &[NameSegment],
    ) -> Result<Container, ResolveError> {
        let Some((first, rest)) = qualifier.split_first() else {
            return Err(ResolveError::Unsupported);
        };
        let first_name = first.ident.text.as_str();

        let mut container = if let (true, Some(alias)) =
            (first.type_args.is_empty(), self.aliases.get(first_name))
        {
            match alias {
                AliasTarget::Namespace(ns) => Container::Namespace(ns.clone()),
                AliasTarget::Type(t) => Container::Type(t.clone()),
            }
        } else if let Some(ty) = self.lookup_simple(table, first_name, self.resolve_args(table, first)?)
        {
            Container::Type(ty)
        } else {
            let ns = self
                .namespaces
                .iter()
                .map(|outer| join(outer, first_name))
                .find(|candidate| table.is_namespace(candidate))
                .ok_or_else(|| ResolveError::NotFound(first_name.to_string()))?;
            Container::Namespace(ns)
        };

        for segment in rest {
            let args = self.resolve_args(table, segment)?;
            let name = segment.ident.text.as_str();
            container = match container {
                Container::Namespace(ns) => {
                    let full = join(&ns, name);
                    if let Some(def) = table.lookup(&full, args.len()) {
                        Container::Type(TypeRef::Named { def, args })
                    } else if table.is_namespace(&full) {
                        Container::Namespace(full)
                    } else {
                        return Err(ResolveError::NotFound(full));
                    }
                }
                Container::Type(owner) => match table.nested_type(&owner, name, args.len()) {
                    Some(def) => Container::Type(TypeRef::Named { def, args }),
                    None => return Err(ResolveError::NotFound(name.to_string())),
                },
            };
        }
        Ok(container)
    }

    /// Resolve a single identifier with already-resolved type arguments
    pub fn lookup_simple(&self, table: &TypeTable, name: &str, args: Vec<TypeRef>) -> Option<TypeRef> {
        let arity = args.len();
        let chain = self.type_chain(table);

        if arity == 0 {
            if self.method_type_params.iter().rev().any(|p| p == name) {
                return Some(TypeRef::Param(name.to_string()));
            }
            for id in &chain {
                if table.get(*id).type_params.iter().any(|p| p == name) {
                    return Some(TypeRef::Param(name.to_string()));
                }
            }
        }

        for id in &chain {
            let def = table.get(*id);
            if def.name == name && def.arity() == arity {
                return Some(TypeRef::Named { def: *id, args });
            }
            if let Some(nested) = table.nested_type(&self_reference(table, *id), name, arity) {
                return Some(TypeRef::Named { def: nested, args });
            }
        }

        for ns in &self.namespaces {
            if let Some(def) = table.lookup(&join(ns, name), arity) {
                return Some(TypeRef::Named { def, args });
            }
        }

        if arity == 0 {
            if let Some(AliasTarget::Type(t)) = self.aliases.get(name) {
                return Some(t.clone());
            }
        }

        self.imports
            .iter()
            .find_map(|import| table.lookup(&join(import, name), arity))
            .map(|def| TypeRef::Named { def, args })
    }

    /// Namespace visible under `name` from this scope
    pub fn lookup_namespace(&self, table: &TypeTable, name: &str) -> Option<String> {
        if let Some(AliasTarget::Namespace(ns)) = self.aliases.get(name) {
            return Some(ns.clone());
        }
        self.namespaces
            .iter()
            .map(|outer| join(outer, name))
            .find(|candidate| table.is_namespace(candidate))
    }
}

/// `C<T>` seen from inside `C`
pub fn self_reference(table: &TypeTable, id: TypeId) -> TypeRef {
    TypeRef::Named {
        def: id,
        args: table
            .get(id)
            .type_params
            .iter()
            .cloned()
            .map(TypeRef::Param)
            .collect(),
    }
}

/// Type declaration node to registered type
pub type DeclaredTypes = HashMap<NodeId, TypeId>;

/// Register every type declared in `unit`
pub fn declare(table: &mut TypeTable, unit: &CompilationUnit, origin: Origin) -> DeclaredTypes {
    let mut declared = DeclaredTypes::new();
    declare_members(table, &unit.members, "", None, origin, &mut declared);
    declared
}

fn declare_members(
    table: &mut TypeTable,
    members: &[Member],
    namespace: &str,
    containing: Option<TypeId>,
    origin: Origin,
    declared: &mut DeclaredTypes,
) {
    for member in members {
        match member {
            Member::Namespace(ns) => {
                let Some(name) = ns.name.dotted_name() else {
                    continue;
                };
                let full = join(namespace, &name);
                table.add_namespace(&full);
                declare_members(table, &ns.members, &full, None, origin, declared);
            }
            Member::Type(decl) => {
                let kind = match decl.keyword {
                    TypeKeyword::Class | TypeKeyword::Record => TypeKind::Class,
                    TypeKeyword::Struct | TypeKeyword::RecordStruct => TypeKind::Struct,
                    TypeKeyword::Interface => TypeKind::Interface,
                    TypeKeyword::Enum => TypeKind::Enum,
                };
                let type_params = decl.type_params.iter().map(|p| p.text.clone()).collect();
                let id = add_type(
                    table,
                    &decl.name.text,
                    kind,
                    type_params,
                    namespace,
                    containing,
                    origin,
                    decl.id,
                );
                declared.insert(decl.id, id);
                declare_members(table, &decl.members, namespace, Some(id), origin, declared);
            }
            Member::Delegate(decl) => {
                let type_params = decl.type_params.iter().map(|p| p.text.clone()).collect();
                let id = add_type(
                    table,
                    &decl.name.text,
                    TypeKind::Delegate,
                    type_params,
                    namespace,
                    containing,
                    origin,
                    decl.id,
                );
                declared.insert(decl.id, id);
            }
            _ => {}
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn add_type(
    table: &mut TypeTable,
    name: &str,
    kind: TypeKind,
    type_params: Vec<String>,
    namespace: &str,
    containing: Option<TypeId>,
    origin: Origin,
    decl: NodeId,
) -> TypeId {
    let full_name = match containing {
        Some(outer) => format!("{}.{}", table.get(outer).full_name, name),
        None => join(namespace, name),
    };
    table.add(TypeDef {
        name: name.to_string(),
        full_name,
        containing,
        kind,
        type_params,
        base: None,
        interfaces: Vec::new(),
        members: Vec::new(),
        nested: Vec::new(),
        origin,
        decl: Some(decl),
    })
}

/// Resolve base lists and member signatures of the types in `unit`
pub fn define(
    table: &mut TypeTable,
    unit: &CompilationUnit,
    src: &str,
    declared: &DeclaredTypes,
    features: &LanguageFeatures,
) -> Vec<SemanticError> {
    let mut definer = Definer {
        table,
        src,
        declared,
        features,
        errors: Vec::new(),
    };
    let scope = NameScope::root(definer.table, &unit.usings);
    definer.members(&unit.members, &scope);
    definer.errors
}

struct Definer<'a> {
    table: &'a mut TypeTable,
    src: &'a str,
    declared: &'a DeclaredTypes,
    features: &'a LanguageFeatures,
    errors: Vec<SemanticError>,
}

impl Definer<'_> {
    fn report(&mut self, code: &'static str, message: String, span: Span) {
        self.errors.push(SemanticError {
            code,
            message,
            span,
        });
    }

    fn resolve(&mut self, scope: &NameScope, ty: &TypeSyntax) -> Option<TypeRef> {
        match scope.resolve_type(self.table, ty) {
            Ok(t) => Some(t),
            Err(ResolveError::NotFound(name)) => {
                self.report(CS0246, type_not_found(&name), ty.span);
                None
            }
            Err(ResolveError::Unsupported) => None,
        }
    }

    fn members(&mut self, members: &[Member], scope: &NameScope) {
        for member in members {
            match member {
                Member::Namespace(ns) => {
                    let Some(name) = ns.name.dotted_name() else {
                        continue;
                    };
                    let inner = scope.enter_namespace(self.table, &name, &ns.usings);
                    self.members(&ns.members, &inner);
                }
                Member::Type(decl) => self.type_decl(decl, scope),
                Member::Delegate(decl) => self.delegate(decl, scope),
                _ => {}
            }
        }
    }

    fn default_base(&self, kind: TypeKind, id: TypeId) -> Option<TypeRef> {
        let name = match kind {
            TypeKind::Class => "System.Object",
            TypeKind::Struct => "System.ValueType",
            TypeKind::Enum => "System.Enum",
            TypeKind::Delegate => "System.Delegate",
            TypeKind::Interface => return None,
        };
        let base = self.table.well_known(name)?;
        (base.def() != Some(id)).then_some(base)
    }

    fn type_decl(&mut self, decl: &TypeDecl, scope: &NameScope) {
        let Some(&id) = self.declared.get(&decl.id) else {
            return;
        };
        let scope = scope.enter_type(id);
        let kind = self.table.get(id).kind;

        let mut base = None;
        let mut interfaces = Vec::new();
        if let Some(list) = &decl.base_list {
            for (index, base_type) in list.types.iter().enumerate() {
                let Some(resolved) = self.resolve(&scope, &base_type.ty) else {
                    continue;
                };
                let is_class = resolved
                    .def()
                    .is_some_and(|d| self.table.get(d).kind == TypeKind::Class);
                if index == 0 && kind == TypeKind::Class && is_class {
                    base = Some(resolved);
                } else if kind != TypeKind::Enum {
                    interfaces.push(resolved);
                }
            }
        }
        let base = base.or_else(|| self.default_base(kind, id));
        {
            let def = self.table.get_mut(id);
            def.base = base;
            def.interfaces = interfaces;
        }

        let is_interface = kind == TypeKind::Interface;
        let mut members = Vec::new();
        let mut overloads = Vec::new();

        if let Some(params) = &decl.primary_params {
            let sig = self.signature(
                &scope,
                id,
                decl.name.text.clone(),
                &[],
                None,
                params,
                false,
                decl.id,
            );
            for p in &sig.params {
                members.push(MemberDef::Property {
                    name: p.name.clone(),
                    ty: p.ty.clone(),
                    is_static: false,
                });
            }
            members.push(MemberDef::Constructor(sig));
        }

        for member in &decl.members {
            match member {
                Member::Method(m) => {
                    if is_interface {
                        self.interface_gates(m);
                    }
                    let sig = self.method(&scope, id, m);
                    if m.explicit_interface.is_none() {
                        overloads.push((self.overload_key(&m.name.text, &sig, &m.params), m.name.span));
                        members.push(MemberDef::Method(sig));
                    }
                }
                Member::Constructor(c) => {
                    let sig = self.constructor(&scope, id, c);
                    if !c.name.text.starts_with('~') {
                        overloads.push((self.overload_key(&c.name.text, &sig, &c.params), c.name.span));
                        members.push(MemberDef::Constructor(sig));
                    }
                }
                Member::Property(p) => {
                    if let Some(params) = &p.params {
                        self.check_optional_order(params);
                    }
                    let ty = self.resolve(&scope, &p.ty);
                    if p.explicit_interface.is_none() {
                        members.push(MemberDef::Property {
                            name: p.name.text.clone(),
                            ty,
                            is_static: p.modifiers.has(ModifierKind::Static),
                        });
                    }
                }
                Member::Field(f) => {
                    let ty = self.resolve(&scope, &f.ty);
                    let is_static =
                        f.modifiers.has(ModifierKind::Static) || f.modifiers.has(ModifierKind::Const);
                    for d in &f.declarators {
                        members.push(MemberDef::Field {
                            name: d.name.text.clone(),
                            ty: ty.clone(),
                            is_static,
                        });
                    }
                }
                Member::Type(nested) => self.type_decl(nested, &scope),
                Member::Delegate(nested) => self.delegate(nested, &scope),
                Member::Namespace(_) => {}
            }
        }

        self.check_duplicates(id, overloads);
        self.table.get_mut(id).members = members;
    }

    fn interface_gates(&mut self, m: &MethodDecl) {
        if !self.features.private_interface_members {
            if let Some(modifier) = m
                .modifiers
                .list
                .iter()
                .find(|x| x.kind == ModifierKind::Private)
            {
                self.report(
                    CS0106,
                    "The modifier 'private' is not valid for this item".to_string(),
                    modifier.span,
                );
            }
        }
        if !self.features.default_interface_methods && m.has_body() {
            self.report(
                CS8701,
                "Target runtime doesn't support default interface implementation.".to_string(),
                m.name.span,
            );
        }
    }

    fn method(&mut self, scope: &NameScope, owner: TypeId, m: &MethodDecl) -> MethodSig {
        let type_params: Vec<String> = m.type_params.iter().map(|p| p.text.clone()).collect();
        let scope = scope.with_method_type_params(type_params.iter().map(String::as_str));
        let return_type = self.resolve(&scope, &m.return_type);
        let mut sig = self.signature(
            &scope,
            owner,
            m.name.text.clone(),
            &type_params,
            return_type,
            &m.params,
            m.modifiers.has(ModifierKind::Static),
            m.id,
        );
        sig.type_params = type_params;
        sig
    }

    fn constructor(&mut self, scope: &NameScope, owner: TypeId, c: &ConstructorDecl) -> MethodSig {
        self.signature(
            scope,
            owner,
            c.name.text.clone(),
            &[],
            Some(TypeRef::Void),
            &c.params,
            c.modifiers.has(ModifierKind::Static),
            c.id,
        )
    }

    fn delegate(&mut self, decl: &DelegateDecl, scope: &NameScope) {
        let Some(&id) = self.declared.get(&decl.id) else {
            return;
        };
        let scope = scope.enter_type(id);
        let return_type = self.resolve(&scope, &decl.return_type);
        let invoke = self.signature(
            &scope,
            id,
            "Invoke".to_string(),
            &[],
            return_type,
            &decl.params,
            false,
            decl.id,
        );
        let base = self.default_base(TypeKind::Delegate, id);
        let def = self.table.get_mut(id);
        def.base = base;
        def.members = vec![MemberDef::Method(invoke)];
    }

    #[allow(clippy::too_many_arguments)]
    fn signature(
        &mut self,
        scope: &NameScope,
        owner: TypeId,
        name: String,
        type_params: &[String],
        return_type: Option<TypeRef>,
        params: &ParameterList,
        is_static: bool,
        decl: NodeId,
    ) -> MethodSig {
        self.check_optional_order(params);
        let params = params
            .params
            .iter()
            .map(|p| self.parameter(scope, p))
            .collect();
        MethodSig {
            name,
            owner: Some(owner),
            type_params: type_params.to_vec(),
            params,
            return_type,
            is_static,
            decl: Some(decl),
        }
    }

    fn parameter(&mut self, scope: &NameScope, p: &Parameter) -> ParamSig {
        ParamSig {
            name: p.name.text.clone(),
            ty: p.ty.as_ref().and_then(|t| self.resolve(scope, t)),
            has_default: p.default.is_some(),
            is_params: p.has_modifier("params"),
        }
    }

    fn check_optional_order(&mut self, params: &ParameterList) {
        let errors = optional_order_errors(params);
        self.errors.extend(errors);
    }

    /// Duplicate key of a method: its name and parameter types
    fn overload_key(&self, name: &str, sig: &MethodSig, params: &ParameterList) -> (String, Vec<String>) {
        let types = sig
            .params
            .iter()
            .zip(&params.params)
            .map(|(p, syntax)| match (&p.ty, &syntax.ty) {
                (Some(t), _) => self.table.display(t),
                (None, Some(written)) => written.span.text(self.src).to_string(),
                (None, None) => String::new(),
            })
            .collect();
        (name.to_string(), types)
    }

    fn check_duplicates(&mut self, owner: TypeId, overloads: Vec<((String, Vec<String>), Span)>) {
        let type_name = self.table.get(owner).name.clone();
        let mut seen = HashSet::new();
        for ((name, types), span) in overloads {
            if name == "operator" {
                continue;
            }
            if !seen.insert((name.clone(), types)) {
                self.report(
                    CS0111,
                    format!(
                        "Type '{}' already defines a member called '{}' with the same parameter types",
                        type_name, name
                    ),
                    span,
                );
            }
        }
    }
}

/// `CS1737` for each required parameter following an optional one
pub fn optional_order_errors(params: &ParameterList) -> Vec<SemanticError> {
    let mut errors = Vec::new();
    let mut seen_optional = false;
    for p in &params.params {
        if p.default.is_some() {
            seen_optional = true;
        } else if seen_optional && !p.has_modifier("params") {
            errors.push(SemanticError {
                code: CS1737,
                message: "Optional parameters must appear after all required parameters"
                    .to_string(),
                span: p.span,
            });
        }
    }
    errors
}
