//! Add the missing `Handle` method to a message handler

use super::{indentation_at, CodeFixAction};
use crate::diagnostic::{Diagnostic, FixSafety};
use crate::rules::handler::{handled_message, CONTEXT_TYPE, HANDLE, MESSAGE_TYPE};
use crate::syntax::{Member, Span, SyntaxNode, SyntaxTree, TextEdit, TypeDecl, UsingDirective};

const TASKS_NAMESPACE: &str = "System.Threading.Tasks";
const INDENT: &str = "    ";

pub fn provide(diagnostic: &Diagnostic, tree: &SyntaxTree) -> Vec<CodeFixAction> {
    let Some(message) = diagnostic.property(MESSAGE_TYPE) else {
        return Vec::new();
    };
    let Some(decl) = enclosing_handler(tree, diagnostic.span, message) else {
        return Vec::new();
    };

    let task = if imports(tree, TASKS_NAMESPACE) {
        "Task".to_string()
    } else {
        format!("{}.Task", TASKS_NAMESPACE)
    };
    let signature = format!(
        "public async {} {}({} message, {} context)",
        task, HANDLE, message, CONTEXT_TYPE
    );

    let edit = match decl.members.last() {
        Some(last) => {
            let indent = indentation_at(tree, last.span().start);
            TextEdit::insert(
                last.span().end,
                format!("\n\n{i}{}\n{i}{{\n{i}}}", signature, i = indent),
            )
        }
        None => {
            let (Some(open), Some(close)) = (decl.open_brace, decl.close_brace) else {
                return Vec::new();
            };
            let outer = indentation_at(tree, decl.span.start);
            let inner = format!("{}{}", outer, INDENT);
            TextEdit::replace(
                Span::new(open.end, close.start),
                format!("\n{i}{}\n{i}{{\n{i}}}\n{}", signature, outer, i = inner),
            )
        }
    };

    vec![CodeFixAction::new(
        format!("Implement Handle({} message, {} context)", message, CONTEXT_TYPE),
        "AddHandleMethod",
        FixSafety::Safe,
        tree,
        diagnostic.span,
        vec![edit],
    )]
}

/// Type declaring the handler base at `span`
fn enclosing_handler<'a>(tree: &'a SyntaxTree, span: Span, message: &str) -> Option<&'a TypeDecl> {
    tree.root_node().walk().find_map(|(node, parent)| match (node, parent) {
        (SyntaxNode::BaseType(base), Some(SyntaxNode::Type(decl)))
            if base.span == span && handled_message(base) == Some(message) =>
        {
            Some(decl)
        }
        _ => None,
    })
}

fn imports(tree: &SyntaxTree, namespace: &str) -> bool {
    fn any(usings: &[UsingDirective], members: &[Member], namespace: &str) -> bool {
        usings.iter().any(|u| {
            !u.is_static && u.alias.is_none() && u.name.dotted_name().as_deref() == Some(namespace)
        }) || members.iter().any(|m| match m {
            Member::Namespace(ns) => any(&ns.usings, &ns.members, namespace),
            _ => false,
        })
    }
    let root = tree.root();
    any(&root.usings, &root.members, namespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::Cancellation;
    use crate::compiler::{CompilerHost, SourceHost};
    use crate::rule::DiagnosticId;
    use crate::rules::analyze;
    use pretty_assertions::assert_eq;

    /// Apply the first handler fix and return the new text
    fn fix(src: &str) -> String {
        let host = SourceHost::default();
        let cancel = Cancellation::new();
        let compilation = host.compile(src, &cancel).unwrap();
        let diagnostic = analyze(&compilation, host.features(), &cancel)
            .unwrap()
            .into_iter()
            .find(|d| d.rule_id == DiagnosticId::MustImplementIHandleMessages)
            .unwrap();
        let actions = provide(&diagnostic, compilation.tree());
        assert_eq!(actions.len(), 1);
        actions[0].apply(compilation.tree()).unwrap().text().to_string()
    }

    #[test]
    fn test_empty_handler_gets_stub() {
        let src = "using System.Threading.Tasks;
using NServiceBus;

namespace Shop
{
    class OrderPlaced { }

    class Handler : IHandleMessages<OrderPlaced>
    {
    }
}
";
        let expected = "using System.Threading.Tasks;
using NServiceBus;

namespace Shop
{
    class OrderPlaced { }

    class Handler : IHandleMessages<OrderPlaced>
    {
        public async Task Handle(OrderPlaced message, IMessageHandlerContext context)
        {
        }
    }
}
";
        assert_eq!(fix(src), expected);
    }

    #[test]
    fn test_stub_follows_existing_members() {
        let src = "using System.Threading.Tasks;
using NServiceBus;
class OrderPlaced { }
class Handler : IHandleMessages<OrderPlaced>
{
\tint count;
}
";
        let expected = "using System.Threading.Tasks;
using NServiceBus;
class OrderPlaced { }
class Handler : IHandleMessages<OrderPlaced>
{
\tint count;

\tpublic async Task Handle(OrderPlaced message, IMessageHandlerContext context)
\t{
\t}
}
";
        assert_eq!(fix(src), expected);
    }

    #[test]
    fn test_task_is_qualified_without_import() {
        let src = "using NServiceBus;\nclass OrderPlaced { }\nclass Handler : IHandleMessages<OrderPlaced> { }\n";
        let fixed = fix(src);
        assert!(fixed.contains(
            "public async System.Threading.Tasks.Task Handle(OrderPlaced message, IMessageHandlerContext context)"
        ));

        let host = SourceHost::default();
        let compilation = host.compile(&fixed, &Cancellation::new()).unwrap();
        assert!(!compilation.has_errors(), "{:?}", compilation.diagnostics());
    }

    #[test]
    fn test_stale_diagnostic_is_declined() {
        let tree = SyntaxTree::parse("class Handler : IHandleMessages<OrderPlaced> { }");
        let diagnostic = Diagnostic::new(
            DiagnosticId::MustImplementIHandleMessages,
            crate::diagnostic::Severity::Error,
            "",
            Span::new(0, 5),
        )
        .with_property(MESSAGE_TYPE, "OrderPlaced");
        assert!(provide(&diagnostic, &tree).is_empty());
    }
}
