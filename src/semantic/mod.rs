//! Symbol resolution
//!
//! [`SemanticModel`] answers which symbol a node denotes and what type an
//! expression has. Resolution never fails hard: anything the binder cannot
//! resolve is simply absent from the model.

mod declare;
pub mod library;
mod model;
pub mod predicates;
pub mod symbols;

pub use declare::{CS0106, CS0111, CS0246, CS1737, CS8701};
pub use model::{SemanticModel, CS1501};
pub use symbols::{MemberDef, MethodSig, ParamSig, Symbol, TypeId, TypeKind, TypeRef, TypeTable};

use crate::syntax::Span;

/// An error found while binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticError {
    pub code: &'static str,
    pub message: String,
    pub span: Span,
}
