//! Message handlers must declare their `Handle` method
//!
//! Matching is by written text on purpose: `IHandleMessages<T>` in the base
//! list is paired with a `Handle(T, IMessageHandlerContext)` member by
//! comparing identifiers, so aliased or fully qualified spellings do not
//! match.

use super::RuleContext;
use crate::cancel::Cancelled;
use crate::rule::DiagnosticId;
use crate::syntax::{BaseType, Member, MethodDecl, SyntaxNode, TypeSyntax};

pub const HANDLER_INTERFACES: [&str; 2] = ["IHandleMessages", "IAmStartedByMessages"];
pub const CONTEXT_TYPE: &str = "IMessageHandlerContext";
pub const TOKEN_TYPE: &str = "CancellationToken";
pub const HANDLE: &str = "Handle";
pub const MESSAGE_TYPE: &str = "MessageType";

pub fn check<'a>(node: SyntaxNode<'a>, ctx: &mut RuleContext<'a>) -> Result<(), Cancelled> {
    let Some(decl) = node.as_type() else {
        return Ok(());
    };
    let Some(bases) = &decl.base_list else {
        return Ok(());
    };

    for base in &bases.types {
        let Some(message) = handled_message(base) else {
            continue;
        };
        let implemented = decl.members.iter().any(|member| match member {
            Member::Method(m) => is_handle_for(m, message, ctx),
            _ => false,
        });
        if !implemented {
            ctx.report(
                DiagnosticId::MustImplementIHandleMessages,
                base.span,
                &[(MESSAGE_TYPE, message)],
            );
        }
    }
    Ok(())
}

/// `T` from a base written exactly as `IHandleMessages<T>` or
/// `IAmStartedByMessages<T>`
pub fn handled_message(base: &BaseType) -> Option<&str> {
    let [segment] = base.ty.segments()? else {
        return None;
    };
    if !HANDLER_INTERFACES.contains(&segment.ident.text.as_str()) {
        return None;
    }
    let [arg] = segment.type_args.as_slice() else {
        return None;
    };
    arg.simple_name().map(|ident| ident.text.as_str())
}

fn is_handle_for(method: &MethodDecl, message: &str, ctx: &RuleContext<'_>) -> bool {
    if method.name.text != HANDLE {
        return false;
    }
    let params = &method.params.params;
    if !(2..=3).contains(&params.len()) {
        return false;
    }
    let written = |ty: &Option<TypeSyntax>, expected: &str| {
        ty.as_ref()
            .is_some_and(|t| ctx.text(t.span).trim() == expected)
    };
    written(&params[0].ty, message)
        && written(&params[1].ty, CONTEXT_TYPE)
        && params.get(2).map_or(true, |p| written(&p.ty, TOKEN_TYPE))
}
