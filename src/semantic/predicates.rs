//! Type predicates used by the rules
//!
//! All predicates are total: an unresolved or non-named type is simply not a
//! match.

use super::symbols::{TypeRef, TypeTable};

pub const TASK: &str = "System.Threading.Tasks.Task";
pub const CONFIGURED_TASK_AWAITABLE: &str = "System.Runtime.CompilerServices.ConfiguredTaskAwaitable";
pub const CANCELLATION_TOKEN: &str = "System.Threading.CancellationToken";
pub const CANCELLABLE_CONTEXT: &str = "NServiceBus.ICancellableContext";
pub const OPERATION_CANCELED_EXCEPTION: &str = "System.OperationCanceledException";

/// `Task`, anything derived from it, or `ConfiguredTaskAwaitable` in either arity
pub fn is_task_like(table: &TypeTable, ty: &TypeRef) -> bool {
    table
        .base_chain(ty)
        .iter()
        .any(|t| matches!(table.full_name(t), Some(TASK) | Some(CONFIGURED_TASK_AWAITABLE)))
}

pub fn is_cancellation_token(table: &TypeTable, ty: &TypeRef) -> bool {
    is_exactly(table, ty, CANCELLATION_TOKEN)
}

pub fn is_cancellable_context(table: &TypeTable, ty: &TypeRef) -> bool {
    is_exactly(table, ty, CANCELLABLE_CONTEXT)
}

pub fn is_operation_canceled_exception(table: &TypeTable, ty: &TypeRef) -> bool {
    is_exactly(table, ty, OPERATION_CANCELED_EXCEPTION)
}

/// Non-generic type with the given full name
fn is_exactly(table: &TypeTable, ty: &TypeRef, full_name: &str) -> bool {
    ty.args().is_empty() && table.full_name(ty) == Some(full_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::library::core_table;
    use crate::semantic::symbols::{Origin, TypeDef, TypeKind};

    fn named(table: &TypeTable, name: &str, arity: usize) -> TypeRef {
        let def = table.lookup(name, arity).unwrap();
        TypeRef::Named {
            def,
            args: (0..arity)
                .map(|_| table.well_known("System.Int32").unwrap())
                .collect(),
        }
    }

    #[test]
    fn test_task_like() {
        let table = core_table();
        assert!(is_task_like(table, &named(table, TASK, 0)));
        assert!(is_task_like(table, &named(table, TASK, 1)));
        assert!(is_task_like(table, &named(table, CONFIGURED_TASK_AWAITABLE, 0)));
        assert!(is_task_like(table, &named(table, CONFIGURED_TASK_AWAITABLE, 1)));
        assert!(!is_task_like(table, &named(table, "System.Threading.Tasks.ValueTask", 0)));
        assert!(!is_task_like(table, &named(table, "System.String", 0)));
        assert!(!is_task_like(table, &TypeRef::Void));
        assert!(!is_task_like(table, &TypeRef::Param("T".to_string())));
    }

    #[test]
    fn test_task_like_through_user_subclass() {
        let mut table = core_table().clone();
        let task = table.well_known(TASK).unwrap();
        let id = table.add(TypeDef {
            name: "MyTask".to_string(),
            full_name: "App.MyTask".to_string(),
            containing: None,
            kind: TypeKind::Class,
            type_params: Vec::new(),
            base: Some(task),
            interfaces: Vec::new(),
            members: Vec::new(),
            nested: Vec::new(),
            origin: Origin::Source,
            decl: None,
        });
        assert!(is_task_like(&table, &TypeRef::named(id)));
    }

    #[test]
    fn test_exact_matches() {
        let table = core_table();
        let token = named(table, CANCELLATION_TOKEN, 0);
        assert!(is_cancellation_token(table, &token));
        assert!(!is_cancellable_context(table, &token));
        assert!(!is_cancellation_token(
            table,
            &TypeRef::Nullable(Box::new(token.clone()))
        ));

        let handler_context = named(table, "NServiceBus.IMessageHandlerContext", 0);
        assert!(is_cancellable_context(table, &named(table, CANCELLABLE_CONTEXT, 0)));
        assert!(!is_cancellable_context(table, &handler_context));

        let canceled = named(table, OPERATION_CANCELED_EXCEPTION, 0);
        assert!(is_operation_canceled_exception(table, &canceled));
        assert!(!is_operation_canceled_exception(
            table,
            &named(table, "System.Threading.Tasks.TaskCanceledException", 0)
        ));
    }
}
