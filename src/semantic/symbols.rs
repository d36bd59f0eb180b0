//! Type table and symbol definitions

use crate::syntax::NodeId;
use std::collections::{HashMap, HashSet};

/// Index of a type definition in a [`TypeTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

/// A constructed type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Named { def: TypeId, args: Vec<TypeRef> },
    /// Generic type parameter, by name
    Param(String),
    Array(Box<TypeRef>),
    Nullable(Box<TypeRef>),
    Void,
}

impl TypeRef {
    pub fn named(def: TypeId) -> Self {
        TypeRef::Named {
            def,
            args: Vec::new(),
        }
    }

    pub fn def(&self) -> Option<TypeId> {
        match self {
            TypeRef::Named { def, .. } => Some(*def),
            _ => None,
        }
    }

    pub fn args(&self) -> &[TypeRef] {
        match self {
            TypeRef::Named { args, .. } => args,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
}

/// Where a definition came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Library,
    Source,
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    /// Dotted name including namespace and containing types
    pub full_name: String,
    pub containing: Option<TypeId>,
    pub kind: TypeKind,
    pub type_params: Vec<String>,
    pub base: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub members: Vec<MemberDef>,
    pub nested: Vec<TypeId>,
    pub origin: Origin,
    pub decl: Option<NodeId>,
}

impl TypeDef {
    pub fn arity(&self) -> usize {
        self.type_params.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSig {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub has_default: bool,
    /// `params T[]`
    pub is_params: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub name: String,
    pub owner: Option<TypeId>,
    pub type_params: Vec<String>,
    pub params: Vec<ParamSig>,
    /// `None` when the written return type did not resolve
    pub return_type: Option<TypeRef>,
    pub is_static: bool,
    pub decl: Option<NodeId>,
}

impl MethodSig {
    /// Whether a call with `count` arguments can bind to this signature
    pub fn accepts(&self, count: usize) -> bool {
        let required = self
            .params
            .iter()
            .filter(|p| !p.has_default && !p.is_params)
            .count();
        let has_params = self.params.last().is_some_and(|p| p.is_params);
        count >= required && (has_params || count <= self.params.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberDef {
    Method(MethodSig),
    Constructor(MethodSig),
    Property {
        name: String,
        ty: Option<TypeRef>,
        is_static: bool,
    },
    Field {
        name: String,
        ty: Option<TypeRef>,
        is_static: bool,
    },
}

impl MemberDef {
    pub fn name(&self) -> &str {
        match self {
            MemberDef::Method(m) | MemberDef::Constructor(m) => &m.name,
            MemberDef::Property { name, .. } | MemberDef::Field { name, .. } => name,
        }
    }
}

/// What a syntax node denotes
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Namespace(String),
    Type(TypeRef),
    Method(MethodSig),
    Property {
        name: String,
        ty: Option<TypeRef>,
    },
    Field {
        name: String,
        ty: Option<TypeRef>,
    },
    /// Local variable, including catch, foreach and pattern variables
    Local {
        name: String,
        ty: Option<TypeRef>,
        decl: NodeId,
    },
    Parameter {
        name: String,
        ty: Option<TypeRef>,
        decl: NodeId,
    },
}

impl Symbol {
    /// Value type of the symbol, if it has one
    pub fn value_type(&self) -> Option<&TypeRef> {
        match self {
            Symbol::Property { ty, .. }
            | Symbol::Field { ty, .. }
            | Symbol::Local { ty, .. }
            | Symbol::Parameter { ty, .. } => ty.as_ref(),
            Symbol::Method(_) | Symbol::Namespace(_) | Symbol::Type(_) => None,
        }
    }
}

/// Substitution of type parameters by name
pub type Substitution = HashMap<String, TypeRef>;

pub fn substitute(ty: &TypeRef, subst: &Substitution) -> TypeRef {
    if subst.is_empty() {
        return ty.clone();
    }
    match ty {
        TypeRef::Param(name) => subst.get(name).cloned().unwrap_or_else(|| ty.clone()),
        TypeRef::Named { def, args } => TypeRef::Named {
            def: *def,
            args: args.iter().map(|a| substitute(a, subst)).collect(),
        },
        TypeRef::Array(inner) => TypeRef::Array(Box::new(substitute(inner, subst))),
        TypeRef::Nullable(inner) => TypeRef::Nullable(Box::new(substitute(inner, subst))),
        TypeRef::Void => TypeRef::Void,
    }
}

pub fn substitute_method(sig: &MethodSig, subst: &Substitution) -> MethodSig {
    let mut out = sig.clone();
    if subst.is_empty() {
        return out;
    }
    for p in &mut out.params {
        p.ty = p.ty.as_ref().map(|t| substitute(t, subst));
    }
    out.return_type = out.return_type.as_ref().map(|t| substitute(t, subst));
    out
}

fn substitute_member(member: &MemberDef, subst: &Substitution) -> MemberDef {
    match member {
        MemberDef::Method(m) => MemberDef::Method(substitute_method(m, subst)),
        MemberDef::Constructor(m) => MemberDef::Constructor(substitute_method(m, subst)),
        MemberDef::Property {
            name,
            ty,
            is_static,
        } => MemberDef::Property {
            name: name.clone(),
            ty: ty.as_ref().map(|t| substitute(t, subst)),
            is_static: *is_static,
        },
        MemberDef::Field {
            name,
            ty,
            is_static,
        } => MemberDef::Field {
            name: name.clone(),
            ty: ty.as_ref().map(|t| substitute(t, subst)),
            is_static: *is_static,
        },
    }
}

/// Every type known to one compilation
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    types: Vec<TypeDef>,
    by_name: HashMap<(String, usize), TypeId>,
    namespaces: HashSet<String>,
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self::default();
        table.namespaces.insert(String::new());
        table
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Register a type; top-level and nested types are both indexed by full name
    pub fn add(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.by_name
            .entry((def.full_name.clone(), def.arity()))
            .or_insert(id);
        if let Some(outer) = def.containing {
            self.types[outer.0 as usize].nested.push(id);
        }
        self.types.push(def);
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeDef {
        &self.types[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeDef {
        &mut self.types[id.0 as usize]
    }

    /// Find a type by dotted full name and arity
    pub fn lookup(&self, full_name: &str, arity: usize) -> Option<TypeId> {
        self.by_name.get(&(full_name.to_string(), arity)).copied()
    }

    /// Record a namespace and all of its prefixes
    pub fn add_namespace(&mut self, name: &str) {
        let mut prefix = String::new();
        for part in name.split('.') {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(part);
            self.namespaces.insert(prefix.clone());
        }
    }

    pub fn is_namespace(&self, name: &str) -> bool {
        self.namespaces.contains(name)
    }

    /// Non-generic well-known type by full name
    pub fn well_known(&self, full_name: &str) -> Option<TypeRef> {
        self.lookup(full_name, 0).map(TypeRef::named)
    }

    pub fn full_name(&self, ty: &TypeRef) -> Option<&str> {
        ty.def().map(|id| self.get(id).full_name.as_str())
    }

    /// Direct base type with the derived type's arguments substituted
    pub fn base_of(&self, ty: &TypeRef) -> Option<TypeRef> {
        let TypeRef::Named { def, args } = ty else {
            return match ty {
                TypeRef::Array(_) => self.well_known("System.Array"),
                _ => None,
            };
        };
        let def = self.get(*def);
        let base = def.base.as_ref()?;
        Some(substitute(base, &self.substitution(def, args)))
    }

    /// Interfaces listed on the type, substituted
    pub fn interfaces_of(&self, ty: &TypeRef) -> Vec<TypeRef> {
        let TypeRef::Named { def, args } = ty else {
            return Vec::new();
        };
        let def = self.get(*def);
        let subst = self.substitution(def, args);
        def.interfaces.iter().map(|i| substitute(i, &subst)).collect()
    }

    pub fn substitution(&self, def: &TypeDef, args: &[TypeRef]) -> Substitution {
        def.type_params
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect()
    }

    /// The type followed by its base classes; cycles are cut
    pub fn base_chain(&self, ty: &TypeRef) -> Vec<TypeRef> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(ty.clone());
        while let Some(t) = current {
            if let Some(def) = t.def() {
                if !seen.insert(def) {
                    break;
                }
            }
            current = self.base_of(&t);
            chain.push(t);
        }
        chain
    }

    /// Class chain plus every interface reachable from it, breadth first
    fn lookup_order(&self, ty: &TypeRef) -> Vec<TypeRef> {
        let mut order = self.base_chain(ty);
        let mut seen: HashSet<TypeRef> = order.iter().cloned().collect();
        let mut i = 0;
        while i < order.len() {
            for iface in self.interfaces_of(&order[i]) {
                if seen.insert(iface.clone()) {
                    order.push(iface);
                }
            }
            i += 1;
        }
        // interfaces still expose object members
        if let Some(object) = self.well_known("System.Object") {
            if seen.insert(object.clone()) {
                order.push(object);
            }
        }
        order
    }

    /// Members called `name` visible on `ty`, most derived first
    pub fn members_named(&self, ty: &TypeRef, name: &str) -> Vec<MemberDef> {
        let mut found = Vec::new();
        for t in self.lookup_order(ty) {
            let TypeRef::Named { def, args } = &t else {
                continue;
            };
            let def = self.get(*def);
            let subst = self.substitution(def, args);
            found.extend(
                def.members
                    .iter()
                    .filter(|m| m.name() == name && !matches!(m, MemberDef::Constructor(_)))
                    .map(|m| substitute_member(m, &subst)),
            );
        }
        found
    }

    pub fn constructors(&self, ty: &TypeRef) -> Vec<MethodSig> {
        let TypeRef::Named { def, args } = ty else {
            return Vec::new();
        };
        let def = self.get(*def);
        let subst = self.substitution(def, args);
        def.members
            .iter()
            .filter_map(|m| match m {
                MemberDef::Constructor(c) => Some(substitute_method(c, &subst)),
                _ => None,
            })
            .collect()
    }

    /// Nested type declared on `owner` or inherited from its bases
    pub fn nested_type(&self, owner: &TypeRef, name: &str, arity: usize) -> Option<TypeId> {
        for t in self.base_chain(owner) {
            let Some(def) = t.def() else { continue };
            let found = self.get(def).nested.iter().copied().find(|n| {
                let nested = self.get(*n);
                nested.name == name && nested.arity() == arity
            });
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// `Invoke` signature of a delegate type
    pub fn delegate_invoke(&self, ty: &TypeRef) -> Option<MethodSig> {
        let def = self.get(ty.def()?);
        if def.kind != TypeKind::Delegate {
            return None;
        }
        self.members_named(ty, "Invoke")
            .into_iter()
            .find_map(|m| match m {
                MemberDef::Method(sig) => Some(sig),
                _ => None,
            })
    }

    /// Element type produced by `foreach`
    pub fn element_type(&self, ty: &TypeRef) -> Option<TypeRef> {
        if let TypeRef::Array(inner) = ty {
            return Some((**inner).clone());
        }
        self.lookup_order(ty).into_iter().find_map(|t| {
            let name = self.full_name(&t)?;
            let enumerable = name == "System.Collections.Generic.IEnumerable"
                || name == "System.Collections.Generic.IAsyncEnumerable";
            if enumerable && t.args().len() == 1 {
                t.args().first().cloned()
            } else {
                None
            }
        })
    }

    /// C#-like rendering, e.g. `System.Threading.Tasks.Task<int>`
    pub fn display(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Named { def, args } => {
                let name = &self.get(*def).full_name;
                if args.is_empty() {
                    name.clone()
                } else {
                    let args: Vec<String> = args.iter().map(|a| self.display(a)).collect();
                    format!("{}<{}>", name, args.join(", "))
                }
            }
            TypeRef::Param(name) => name.clone(),
            TypeRef::Array(inner) => format!("{}[]", self.display(inner)),
            TypeRef::Nullable(inner) => format!("{}?", self.display(inner)),
            TypeRef::Void => "void".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, params: &[&str], base: Option<TypeRef>) -> TypeDef {
        TypeDef {
            name: name.rsplit('.').next().unwrap_or(name).to_string(),
            full_name: name.to_string(),
            containing: None,
            kind: TypeKind::Class,
            type_params: params.iter().map(|p| p.to_string()).collect(),
            base,
            interfaces: Vec::new(),
            members: Vec::new(),
            nested: Vec::new(),
            origin: Origin::Library,
            decl: None,
        }
    }

    fn method(name: &str, params: usize, defaults: usize, ret: Option<TypeRef>) -> MethodSig {
        MethodSig {
            name: name.to_string(),
            owner: None,
            type_params: Vec::new(),
            params: (0..params)
                .map(|i| ParamSig {
                    name: format!("p{}", i),
                    ty: None,
                    has_default: i >= params - defaults,
                    is_params: false,
                })
                .collect(),
            return_type: ret,
            is_static: false,
            decl: None,
        }
    }

    #[test]
    fn test_lookup_and_namespaces() {
        let mut table = TypeTable::new();
        table.add_namespace("System.Threading.Tasks");
        let task = table.add(class("System.Threading.Tasks.Task", &[], None));
        assert_eq!(table.lookup("System.Threading.Tasks.Task", 0), Some(task));
        assert_eq!(table.lookup("System.Threading.Tasks.Task", 1), None);
        assert!(table.is_namespace("System"));
        assert!(table.is_namespace("System.Threading"));
        assert!(!table.is_namespace("System.Task"));
    }

    #[test]
    fn test_generic_base_substitution() {
        let mut table = TypeTable::new();
        let object = table.add(class("System.Object", &[], None));
        let base = table.add(class(
            "Base",
            &["T"],
            Some(TypeRef::named(object)),
        ));
        table.get_mut(base).members.push(MemberDef::Method(method(
            "Get",
            0,
            0,
            Some(TypeRef::Param("T".to_string())),
        )));
        let int = table.add(class("System.Int32", &[], None));
        let derived = table.add(class(
            "Derived",
            &[],
            Some(TypeRef::Named {
                def: base,
                args: vec![TypeRef::named(int)],
            }),
        ));

        let members = table.members_named(&TypeRef::named(derived), "Get");
        assert_eq!(members.len(), 1);
        match &members[0] {
            MemberDef::Method(m) => assert_eq!(m.return_type, Some(TypeRef::named(int))),
            other => panic!("unexpected member {:?}", other),
        }
        assert_eq!(table.base_chain(&TypeRef::named(derived)).len(), 3);
        assert_eq!(
            table.display(&TypeRef::Named {
                def: base,
                args: vec![TypeRef::named(int)]
            }),
            "Base<System.Int32>"
        );
    }

    #[test]
    fn test_base_chain_cuts_cycles() {
        let mut table = TypeTable::new();
        let a = table.add(class("A", &[], None));
        let b = table.add(class("B", &[], Some(TypeRef::named(a))));
        table.get_mut(a).base = Some(TypeRef::named(b));
        assert_eq!(table.base_chain(&TypeRef::named(a)).len(), 2);
    }

    #[test]
    fn test_accepts_argument_counts() {
        let sig = method("M", 3, 1, None);
        assert!(!sig.accepts(1));
        assert!(sig.accepts(2));
        assert!(sig.accepts(3));
        assert!(!sig.accepts(4));

        let mut variadic = method("M", 1, 0, None);
        variadic.params[0].is_params = true;
        assert!(variadic.accepts(0));
        assert!(variadic.accepts(5));
    }
}
