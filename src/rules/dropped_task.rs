//! Task-returning invocations used as statements

use super::RuleContext;
use crate::cancel::Cancelled;
use crate::rule::DiagnosticId;
use crate::semantic::predicates::is_task_like;
use crate::semantic::{Symbol, TypeRef};
use crate::syntax::{ExprKind, SyntaxKind, SyntaxNode};

pub fn check<'a>(node: SyntaxNode<'a>, ctx: &mut RuleContext<'a>) -> Result<(), Cancelled> {
    if ctx.parent().map(|p| p.kind()) != Some(SyntaxKind::ExpressionStatement) {
        return Ok(());
    }
    let Some(expr) = node.as_expr() else {
        return Ok(());
    };
    let ExprKind::Invocation { target, .. } = &expr.kind else {
        return Ok(());
    };

    let returned: Option<TypeRef> = match ctx.symbol_info(expr.id)? {
        Some(Symbol::Method(sig)) => sig.return_type.clone(),
        _ => match ctx.symbol_info(target.id)? {
            Some(Symbol::Local { ty: Some(ty), .. }) => ctx
                .table()
                .delegate_invoke(ty)
                .and_then(|invoke| invoke.return_type),
            _ => None,
        },
    };

    if returned.is_some_and(|t| is_task_like(ctx.table(), &t)) {
        ctx.report(DiagnosticId::DroppedTask, expr.span, &[]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::run_latest;
    use super::*;
    use pretty_assertions::assert_eq;

    fn found(body: &str) -> Vec<String> {
        let src = format!(
            "using System;\nusing System.Threading;\nusing System.Threading.Tasks;\n\
             class C {{\n    Task DoWorkAsync() => Task.CompletedTask;\n    Task<int> CountAsync() => Task.FromResult(1);\n    void Sync() {{ }}\n{}\n}}",
            body
        );
        run_latest(&src)
            .into_iter()
            .filter(|(id, _)| *id == DiagnosticId::DroppedTask)
            .map(|(_, span)| span)
            .collect()
    }

    #[test]
    fn test_discarded_task_is_reported() {
        assert_eq!(
            found("async Task M() { DoWorkAsync(); CountAsync(); }"),
            vec!["DoWorkAsync()", "CountAsync()"]
        );
    }

    #[test]
    fn test_consumed_tasks_are_clean() {
        assert!(found(
            "async Task<int> M() {
                await DoWorkAsync();
                var t = DoWorkAsync();
                _ = DoWorkAsync();
                Sync();
                return await CountAsync();
            }"
        )
        .is_empty());
    }

    #[test]
    fn test_member_access_and_static_calls() {
        assert_eq!(
            found("void M(C other) { other.DoWorkAsync(); Task.Delay(10); this.Sync(); }"),
            vec!["other.DoWorkAsync()", "Task.Delay(10)"]
        );
    }

    #[test]
    fn test_configured_awaitable_is_task_like() {
        assert_eq!(
            found("void M() { DoWorkAsync().ConfigureAwait(false); }"),
            vec!["DoWorkAsync().ConfigureAwait(false)"]
        );
    }

    #[test]
    fn test_delegate_local() {
        assert_eq!(
            found(
                "void M() {
                    Func<Task> work = DoWorkAsync;
                    Action done = Sync;
                    work();
                    done();
                }"
            ),
            vec!["work()"]
        );
    }

    #[test]
    fn test_local_function_returning_task() {
        assert_eq!(
            found("void M() { Run(); Task Run() => Task.CompletedTask; }"),
            vec!["Run()"]
        );
    }

    #[test]
    fn test_unresolved_invocation_is_clean() {
        assert!(found("void M() { Missing(); }").is_empty());
    }
}
