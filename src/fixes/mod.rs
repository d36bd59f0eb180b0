//! Fix providers
//!
//! A provider looks at one diagnostic and the tree it was reported on and
//! offers zero or more [`CodeFixAction`]s. An action is a set of text edits
//! bound to the tree it was computed for: before editing, it checks that its
//! anchor text is still where it expects it, and fails with
//! [`FixError::TargetNotFound`] otherwise. Providers never carry spans from
//! one tree generation into the next.

mod handler_stub;
mod token_default;

use crate::diagnostic::{Diagnostic, FixSafety};
use crate::rule::DiagnosticId;
use crate::syntax::{EditError, Parameter, Span, SyntaxNode, SyntaxTree, TextEdit};
use std::fmt;
use thiserror::Error;

/// Fix application error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FixError {
    #[error("fix target '{expected}' not found at {span}")]
    TargetNotFound { span: Span, expected: String },

    #[error(transparent)]
    Edit(#[from] EditError),
}

/// One way of resolving a diagnostic
pub struct CodeFixAction {
    pub title: String,
    /// Actions with the same key resolve the same kind of problem
    pub equivalence_key: &'static str,
    pub safety: FixSafety,
    anchor: Span,
    anchor_text: String,
    edits: Vec<TextEdit>,
}

impl fmt::Debug for CodeFixAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeFixAction")
            .field("title", &self.title)
            .field("equivalence_key", &self.equivalence_key)
            .field("safety", &self.safety)
            .field("edits", &self.edits.len())
            .finish()
    }
}

impl CodeFixAction {
    /// Action that applies `edits` to the tree whose text at `anchor` is
    /// `anchor_text`
    pub fn new(
        title: impl Into<String>,
        equivalence_key: &'static str,
        safety: FixSafety,
        tree: &SyntaxTree,
        anchor: Span,
        edits: Vec<TextEdit>,
    ) -> Self {
        Self {
            title: title.into(),
            equivalence_key,
            safety,
            anchor,
            anchor_text: tree.slice(anchor).to_string(),
            edits,
        }
    }

    pub fn edits(&self) -> &[TextEdit] {
        &self.edits
    }

    /// Produce the rewritten tree
    pub fn apply(&self, tree: &SyntaxTree) -> Result<SyntaxTree, FixError> {
        if self.anchor.end > tree.text().len() || tree.slice(self.anchor) != self.anchor_text {
            return Err(FixError::TargetNotFound {
                span: self.anchor,
                expected: self.anchor_text.clone(),
            });
        }
        Ok(tree.with_edits(&self.edits)?)
    }
}

type Provide = fn(&Diagnostic, &SyntaxTree) -> Vec<CodeFixAction>;

/// A registered fix provider
pub struct FixProvider {
    pub id: DiagnosticId,
    pub safety: FixSafety,
    provide: Provide,
}

pub static PROVIDERS: [FixProvider; 3] = [
    FixProvider {
        id: DiagnosticId::MustImplementIHandleMessages,
        safety: FixSafety::Safe,
        provide: handler_stub::provide,
    },
    FixProvider {
        id: DiagnosticId::CancellationTokenPrivateOptional,
        safety: FixSafety::Safe,
        provide: token_default::make_optional,
    },
    FixProvider {
        id: DiagnosticId::CancellationTokenNonPrivateRequired,
        safety: FixSafety::Unsafe,
        provide: token_default::make_required,
    },
];

pub fn provider_for(id: DiagnosticId) -> Option<&'static FixProvider> {
    PROVIDERS.iter().find(|p| p.id == id)
}

/// Safety of the fix registered for `id`, if there is one
pub fn fix_safety(id: DiagnosticId) -> Option<FixSafety> {
    provider_for(id).map(|p| p.safety)
}

/// Candidate actions for one diagnostic on the tree that produced it
pub fn fix_actions(diagnostic: &Diagnostic, tree: &SyntaxTree) -> Vec<CodeFixAction> {
    match provider_for(diagnostic.rule_id) {
        Some(provider) => (provider.provide)(diagnostic, tree),
        None => Vec::new(),
    }
}

/// Leading whitespace of the line containing `offset`
pub(crate) fn indentation_at(tree: &SyntaxTree, offset: usize) -> String {
    let (line, _) = tree.line_index().line_col(tree.text(), offset);
    tree.line_index()
        .line_text(tree.text(), line)
        .map(|text| {
            text.chars()
                .take_while(|c| *c == ' ' || *c == '\t')
                .collect()
        })
        .unwrap_or_default()
}

/// The parameter whose name sits at `span` and the list it belongs to
pub(crate) fn find_parameter(tree: &SyntaxTree, span: Span) -> Option<(usize, &[Parameter])> {
    tree.root_node().walk().find_map(|(node, parent)| {
        let SyntaxNode::Parameter(param) = node else {
            return None;
        };
        if param.name.span != span {
            return None;
        }
        let list = match parent? {
            SyntaxNode::Method(m) => &m.params.params,
            SyntaxNode::Constructor(c) => &c.params.params,
            SyntaxNode::Delegate(d) => &d.params.params,
            _ => return None,
        };
        let index = list.iter().position(|p| p.id == param.id)?;
        Some((index, list.as_slice()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;

    #[test]
    fn test_every_provider_targets_a_distinct_id() {
        for (i, a) in PROVIDERS.iter().enumerate() {
            for b in &PROVIDERS[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
        assert_eq!(fix_safety(DiagnosticId::DroppedTask), None);
        assert_eq!(
            fix_safety(DiagnosticId::CancellationTokenNonPrivateRequired),
            Some(FixSafety::Unsafe)
        );
    }

    #[test]
    fn test_unfixable_diagnostic_has_no_actions() {
        let tree = SyntaxTree::parse("class C { void M() { } }");
        let diagnostic = Diagnostic::new(
            DiagnosticId::DroppedTask,
            Severity::Error,
            "x",
            Span::new(10, 14),
        );
        assert!(fix_actions(&diagnostic, &tree).is_empty());
    }

    #[test]
    fn test_action_refuses_a_different_tree() {
        let tree = SyntaxTree::parse("class C { }");
        let action = CodeFixAction::new(
            "rename",
            "Rename",
            FixSafety::Safe,
            &tree,
            Span::new(6, 7),
            vec![TextEdit::replace(Span::new(6, 7), "D")],
        );
        assert_eq!(action.apply(&tree).unwrap().text(), "class D { }");

        let other = SyntaxTree::parse("class X { }");
        assert!(matches!(
            action.apply(&other),
            Err(FixError::TargetNotFound { .. })
        ));
        let short = SyntaxTree::parse("c");
        assert!(action.apply(&short).is_err());
    }

    #[test]
    fn test_indentation_at() {
        let tree = SyntaxTree::parse("class C\n{\n    int x;\n\tint y;\n}");
        let x = tree.text().find("int x").unwrap();
        let y = tree.text().find("int y").unwrap();
        assert_eq!(indentation_at(&tree, x), "    ");
        assert_eq!(indentation_at(&tree, y), "\t");
        assert_eq!(indentation_at(&tree, 0), "");
    }
}
