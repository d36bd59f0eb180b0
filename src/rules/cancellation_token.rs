//! Cancellation token parameters: required on non-private members, optional
//! on private ones

use super::RuleContext;
use crate::cancel::Cancelled;
use crate::compiler::LanguageFeatures;
use crate::rule::DiagnosticId;
use crate::semantic::predicates::is_cancellation_token;
use crate::syntax::{ModifierKind, Modifiers, ParameterList, SyntaxNode, TypeKeyword};

/// Accessibility as far as token defaults are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bucket {
    Private,
    NonPrivate,
}

/// Classify a member's written modifiers
///
/// `container` is the keyword of the declaring type, `None` for top-level
/// declarations.
pub(crate) fn bucket(
    modifiers: &Modifiers,
    container: Option<TypeKeyword>,
    features: &LanguageFeatures,
) -> Bucket {
    if modifiers.has(ModifierKind::Override) {
        return Bucket::NonPrivate;
    }
    let private = modifiers.has(ModifierKind::Private) && !modifiers.has(ModifierKind::Protected);
    let is_private = match container {
        None => false,
        Some(TypeKeyword::Interface) => private && features.private_interface_members,
        Some(_) => private || !modifiers.has_accessibility(),
    };
    if is_private {
        Bucket::Private
    } else {
        Bucket::NonPrivate
    }
}

pub fn check<'a>(node: SyntaxNode<'a>, ctx: &mut RuleContext<'a>) -> Result<(), Cancelled> {
    let container = match ctx.parent() {
        Some(SyntaxNode::Type(t)) => Some(t.keyword),
        Some(SyntaxNode::Namespace(_)) | Some(SyntaxNode::CompilationUnit(_)) => None,
        _ => return Ok(()),
    };

    let (modifiers, params) = match node {
        SyntaxNode::Method(m) if m.explicit_interface.is_none() => (&m.modifiers, &m.params),
        SyntaxNode::Constructor(c) => (&c.modifiers, &c.params),
        SyntaxNode::Delegate(d) => (&d.modifiers, &d.params),
        _ => return Ok(()),
    };

    let bucket = bucket(modifiers, container, ctx.features());
    check_params(params, bucket, ctx)
}

fn check_params(
    params: &ParameterList,
    bucket: Bucket,
    ctx: &mut RuleContext<'_>,
) -> Result<(), Cancelled> {
    for param in &params.params {
        let Some(ty) = ctx.declared_type(param.id)? else {
            continue;
        };
        if !is_cancellation_token(ctx.table(), ty) {
            continue;
        }
        match (bucket, param.default.is_some()) {
            (Bucket::NonPrivate, true) => ctx.report(
                DiagnosticId::CancellationTokenNonPrivateRequired,
                param.name.span,
                &[],
            ),
            (Bucket::Private, false) => ctx.report(
                DiagnosticId::CancellationTokenPrivateOptional,
                param.name.span,
                &[],
            ),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{run, run_latest};
    use super::*;
    use pretty_assertions::assert_eq;

    const PRELUDE: &str = "using System.Threading;\nusing System.Threading.Tasks;\n";

    fn found(body: &str) -> Vec<(DiagnosticId, String)> {
        run_latest(&format!("{}{}", PRELUDE, body))
    }

    fn required(name: &str) -> (DiagnosticId, String) {
        (DiagnosticId::CancellationTokenNonPrivateRequired, name.to_string())
    }

    fn optional(name: &str) -> (DiagnosticId, String) {
        (DiagnosticId::CancellationTokenPrivateOptional, name.to_string())
    }

    #[test]
    fn test_public_default_is_reported() {
        assert_eq!(
            found("public class C { public Task Run(CancellationToken token = default) => Task.CompletedTask; }"),
            vec![required("token")]
        );
    }

    #[test]
    fn test_public_required_is_clean() {
        assert!(found("public class C { public Task Run(CancellationToken token) => Task.CompletedTask; }").is_empty());
    }

    #[test]
    fn test_private_and_implicit_private_required_are_reported() {
        assert_eq!(
            found(
                "class C {
                    private Task A(CancellationToken a) => Task.CompletedTask;
                    Task B(CancellationToken b) => Task.CompletedTask;
                    Task D(CancellationToken d = default) => Task.CompletedTask;
                }"
            ),
            vec![optional("a"), optional("b")]
        );
    }

    #[test]
    fn test_each_token_parameter_is_reported() {
        assert_eq!(
            found(
                "class C {
                    internal void M(CancellationToken first = default, int count = 0, CancellationToken second = default) { }
                }"
            ),
            vec![required("first"), required("second")]
        );
    }

    #[test]
    fn test_protected_variants_are_non_private() {
        assert_eq!(
            found(
                "class C {
                    protected void A(CancellationToken a = default) { }
                    private protected void B(CancellationToken b = default) { }
                    protected internal void D(CancellationToken d) { }
                }"
            ),
            vec![required("a"), required("b")]
        );
    }

    #[test]
    fn test_override_is_non_private_regardless_of_modifier() {
        assert_eq!(
            found(
                "class Base { protected virtual void M(CancellationToken token) { } }
                 class Derived : Base { protected override void M(CancellationToken token = default) { } }"
            ),
            vec![required("token")]
        );
    }

    #[test]
    fn test_explicit_interface_implementation_is_skipped() {
        assert!(found(
            "interface IWorker { Task Run(CancellationToken token); }
             class Worker : IWorker { Task IWorker.Run(CancellationToken token = default) => Task.CompletedTask; }"
        )
        .is_empty());
    }

    #[test]
    fn test_interface_members() {
        assert_eq!(
            found(
                "interface IWorker {
                    Task Run(CancellationToken run = default);
                    private Task Helper(CancellationToken helper) => Task.CompletedTask;
                    Task Default(CancellationToken fallback) => Task.CompletedTask;
                }"
            ),
            vec![required("run"), optional("helper")]
        );
    }

    #[test]
    fn test_private_interface_member_without_platform_support() {
        let src = format!(
            "{}interface IWorker {{ private Task Helper(CancellationToken helper) => Task.CompletedTask; }}",
            PRELUDE
        );
        assert!(run(&src, LanguageFeatures::legacy()).is_empty());
    }

    #[test]
    fn test_constructors_and_delegates() {
        assert_eq!(
            found(
                "delegate Task TopLevel(CancellationToken top = default);
                 class C {
                    public C(CancellationToken ctor = default) { }
                    delegate Task Nested(CancellationToken nested);
                 }"
            ),
            vec![required("top"), required("ctor"), optional("nested")]
        );
    }

    #[test]
    fn test_local_functions_are_not_candidates() {
        assert!(found(
            "public class C { public void M(CancellationToken token) { Task Local(CancellationToken inner) => Task.CompletedTask; } }"
        )
        .is_empty());
    }

    #[test]
    fn test_unresolved_and_other_types_are_ignored() {
        assert!(found(
            "public class C { public void M(Token token = default, CancellationTokenSource source = null) { } }"
        )
        .is_empty());
    }

    #[test]
    fn test_bucket_rules() {
        let features = LanguageFeatures::latest();
        assert_eq!(
            bucket(&Modifiers::default(), Some(TypeKeyword::Struct), &features),
            Bucket::Private
        );
        assert_eq!(
            bucket(&Modifiers::default(), Some(TypeKeyword::Interface), &features),
            Bucket::NonPrivate
        );
        assert_eq!(
            bucket(&Modifiers::default(), None, &features),
            Bucket::NonPrivate
        );
    }
}
