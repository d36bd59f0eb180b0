//! Catch-all clauses around code that observes cancellation

use super::RuleContext;
use crate::cancel::Cancelled;
use crate::rule::DiagnosticId;
use crate::semantic::predicates::{
    is_cancellable_context, is_cancellation_token, is_operation_canceled_exception,
};
use crate::semantic::Symbol;
use crate::syntax::{
    Block, CatchClause, Expr, ExprKind, PatternKind, StmtKind, SyntaxNode, TypeSyntax, UnaryOp,
};

const THROW_IF_CANCELLATION_REQUESTED: &str = "ThrowIfCancellationRequested";

pub fn check<'a>(node: SyntaxNode<'a>, ctx: &mut RuleContext<'a>) -> Result<(), Cancelled> {
    let Some(StmtKind::Try(stmt)) = node.as_stmt().map(|s| &s.kind) else {
        return Ok(());
    };

    for clause in &stmt.catches {
        if let Some(decl) = &clause.declaration {
            if names_operation_canceled(&decl.ty) {
                return Ok(());
            }
            if !names_exception(&decl.ty) {
                continue;
            }
        }
        if let Some(filter) = &clause.filter {
            if excludes_operation_canceled(&filter.expr, clause, ctx)? {
                return Ok(());
            }
        }
        if observes_cancellation(&stmt.block, ctx)? {
            ctx.report(
                DiagnosticId::CatchAllShouldOmitOperationCanceled,
                clause.keyword,
                &[],
            );
        }
        return Ok(());
    }
    Ok(())
}

fn names_operation_canceled(ty: &TypeSyntax) -> bool {
    matches!(
        ty.dotted_name().as_deref(),
        Some("OperationCanceledException") | Some("System.OperationCanceledException")
    )
}

fn names_exception(ty: &TypeSyntax) -> bool {
    matches!(
        ty.dotted_name().as_deref(),
        Some("Exception") | Some("System.Exception")
    )
}

/// `!(ex is OperationCanceledException)` or `ex is not OperationCanceledException`
/// on the caught variable
fn excludes_operation_canceled(
    filter: &Expr,
    clause: &CatchClause,
    ctx: &RuleContext<'_>,
) -> Result<bool, Cancelled> {
    let (operand, ty) = match &filter.kind {
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => match &operand.kind {
            ExprKind::Parenthesized(inner) => match &inner.kind {
                ExprKind::IsType { operand, ty } => (operand, ty),
                _ => return Ok(false),
            },
            _ => return Ok(false),
        },
        ExprKind::IsPattern { operand, pattern } => match &pattern.kind {
            PatternKind::Not(inner) => match &inner.kind {
                PatternKind::Type(ty) => (operand, ty),
                _ => return Ok(false),
            },
            _ => return Ok(false),
        },
        _ => return Ok(false),
    };
    if !matches!(operand.kind, ExprKind::Name(_)) {
        return Ok(false);
    }
    let Some(caught) = clause.declaration.as_ref() else {
        return Ok(false);
    };

    let is_caught = matches!(
        ctx.symbol_info(operand.id)?,
        Some(Symbol::Local { decl, .. }) if *decl == caught.id
    );
    let is_canceled = matches!(
        ctx.symbol_info(ty.id)?,
        Some(Symbol::Type(t)) if is_operation_canceled_exception(ctx.table(), t)
    );
    Ok(is_caught && is_canceled)
}

/// Any invocation in the block checks a token or hands one on
fn observes_cancellation(block: &Block, ctx: &RuleContext<'_>) -> Result<bool, Cancelled> {
    for node in SyntaxNode::Block(block).descendants() {
        let Some(ExprKind::Invocation { target, args }) = node.as_expr().map(|e| &e.kind) else {
            continue;
        };

        if let ExprKind::MemberAccess {
            target: receiver,
            name,
            ..
        } = &target.kind
        {
            if name.ident.is(THROW_IF_CANCELLATION_REQUESTED) {
                if let Some(ty) = ctx.type_of(receiver.id)? {
                    if is_cancellation_token(ctx.table(), ty) {
                        return Ok(true);
                    }
                }
            }
        }

        for arg in &args.args {
            if is_inert_argument(&arg.expr, ctx)? {
                continue;
            }
            if let Some(ty) = ctx.type_of(arg.expr.id)? {
                let table = ctx.table();
                if is_cancellation_token(table, ty) || is_cancellable_context(table, ty) {
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

/// Literals, `default` and `CancellationToken.None`
fn is_inert_argument(expr: &Expr, ctx: &RuleContext<'_>) -> Result<bool, Cancelled> {
    Ok(match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Default(_) => true,
        ExprKind::MemberAccess { target, name, .. } if name.ident.is("None") => matches!(
            ctx.symbol_info(target.id)?,
            Some(Symbol::Type(t)) if is_cancellation_token(ctx.table(), t)
        ),
        _ => false,
    })
}
