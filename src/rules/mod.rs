//! Detector rules
//!
//! Every rule is a plain function registered in [`DETECTORS`] for the node
//! kinds it inspects. The analyzer walks the tree once in preorder and hands
//! each node to the detectors registered for its kind, so diagnostics come
//! out in source order of the nodes that produced them.

mod cancellation_token;
mod catch_all;
mod dropped_task;
pub(crate) mod handler;

use crate::cancel::{Cancellation, Cancelled};
use crate::compiler::{Compilation, LanguageFeatures};
use crate::diagnostic::Diagnostic;
use crate::rule::DiagnosticId;
use crate::semantic::{SemanticModel, Symbol, TypeRef, TypeTable};
use crate::syntax::{NodeId, Span, SyntaxKind, SyntaxNode, SyntaxTree};
use log::trace;
use std::collections::BTreeSet;

/// Signature shared by all detectors
pub type Check =
    for<'a, 'b> fn(SyntaxNode<'a>, &'b mut RuleContext<'a>) -> Result<(), Cancelled>;

/// A detector and the node kinds it is dispatched on
pub struct Detector {
    pub name: &'static str,
    /// Diagnostics this detector may report
    pub ids: &'static [DiagnosticId],
    pub kinds: &'static [SyntaxKind],
    pub check: Check,
}

pub static DETECTORS: [Detector; 4] = [
    Detector {
        name: "cancellation-token",
        ids: &[
            DiagnosticId::CancellationTokenNonPrivateRequired,
            DiagnosticId::CancellationTokenPrivateOptional,
        ],
        kinds: &[
            SyntaxKind::MethodDeclaration,
            SyntaxKind::ConstructorDeclaration,
            SyntaxKind::DelegateDeclaration,
        ],
        check: cancellation_token::check,
    },
    Detector {
        name: "dropped-task",
        ids: &[DiagnosticId::DroppedTask],
        kinds: &[SyntaxKind::InvocationExpression],
        check: dropped_task::check,
    },
    Detector {
        name: "catch-all",
        ids: &[DiagnosticId::CatchAllShouldOmitOperationCanceled],
        kinds: &[SyntaxKind::TryStatement],
        check: catch_all::check,
    },
    Detector {
        name: "handler",
        ids: &[DiagnosticId::MustImplementIHandleMessages],
        kinds: &[
            SyntaxKind::ClassDeclaration,
            SyntaxKind::StructDeclaration,
            SyntaxKind::RecordDeclaration,
        ],
        check: handler::check,
    },
];

/// What a detector can see while inspecting one node
///
/// Semantic queries observe the cancellation flag, so a long walk stops at
/// the next query after cancellation is requested.
pub struct RuleContext<'a> {
    tree: &'a SyntaxTree,
    model: &'a SemanticModel,
    features: &'a LanguageFeatures,
    cancel: &'a Cancellation,
    parent: Option<SyntaxNode<'a>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        tree: &'a SyntaxTree,
        model: &'a SemanticModel,
        features: &'a LanguageFeatures,
        cancel: &'a Cancellation,
    ) -> Self {
        Self {
            tree,
            model,
            features,
            cancel,
            parent: None,
            diagnostics: Vec::new(),
        }
    }

    /// Syntactic parent of the node being inspected
    pub fn parent(&self) -> Option<SyntaxNode<'a>> {
        self.parent
    }

    pub fn features(&self) -> &LanguageFeatures {
        self.features
    }

    pub fn table(&self) -> &'a TypeTable {
        self.model.table()
    }

    pub fn text(&self, span: Span) -> &'a str {
        span.text(self.tree.text())
    }

    pub fn symbol_info(&self, node: NodeId) -> Result<Option<&'a Symbol>, Cancelled> {
        self.cancel.check()?;
        Ok(self.model.symbol_info(node))
    }

    pub fn type_of(&self, node: NodeId) -> Result<Option<&'a TypeRef>, Cancelled> {
        self.cancel.check()?;
        Ok(self.model.type_of(node))
    }

    pub fn declared_type(&self, node: NodeId) -> Result<Option<&'a TypeRef>, Cancelled> {
        self.cancel.check()?;
        Ok(self.model.declared_type(node))
    }

    /// Report `id` at `span` with its default severity
    pub fn report(&mut self, id: DiagnosticId, span: Span, properties: &[(&str, &str)]) {
        let descriptor = id.descriptor();
        let mut diagnostic = Diagnostic::new(id, descriptor.severity, "", span);
        for (key, value) in properties {
            diagnostic = diagnostic.with_property(key, value);
        }
        diagnostic.message = descriptor.format_message(&diagnostic.properties);
        self.diagnostics.push(diagnostic);
    }
}

/// Runs the enabled detectors over a compilation
#[derive(Debug, Clone)]
pub struct Analyzer {
    enabled: BTreeSet<DiagnosticId>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    /// Analyzer with every rule enabled
    pub fn new() -> Self {
        Self {
            enabled: DiagnosticId::ALL.into_iter().collect(),
        }
    }

    pub fn with_rules(ids: impl IntoIterator<Item = DiagnosticId>) -> Self {
        Self {
            enabled: ids.into_iter().collect(),
        }
    }

    pub fn is_enabled(&self, id: DiagnosticId) -> bool {
        self.enabled.contains(&id)
    }

    /// Diagnostics for one compilation, in emission order
    pub fn analyze(
        &self,
        compilation: &Compilation,
        features: &LanguageFeatures,
        cancel: &Cancellation,
    ) -> Result<Vec<Diagnostic>, Cancelled> {
        let detectors: Vec<&Detector> = DETECTORS
            .iter()
            .filter(|d| d.ids.iter().any(|id| self.is_enabled(*id)))
            .collect();

        let tree = compilation.tree();
        let mut ctx = RuleContext::new(tree, compilation.model(), features, cancel);
        for (node, parent) in tree.root_node().walk() {
            cancel.check()?;
            let kind = node.kind();
            for detector in detectors.iter().filter(|d| d.kinds.contains(&kind)) {
                ctx.parent = parent;
                (detector.check)(node, &mut ctx)?;
            }
        }

        let mut diagnostics = ctx.diagnostics;
        diagnostics.retain(|d| self.is_enabled(d.rule_id));
        trace!("{} rule diagnostic(s)", diagnostics.len());
        Ok(diagnostics)
    }
}

/// Diagnostics from every rule
pub fn analyze(
    compilation: &Compilation,
    features: &LanguageFeatures,
    cancel: &Cancellation,
) -> Result<Vec<Diagnostic>, Cancelled> {
    Analyzer::new().analyze(compilation, features, cancel)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::compiler::{CompilerHost, SourceHost};

    /// Ids and spans reported for `src`
    pub fn run(src: &str, features: LanguageFeatures) -> Vec<(DiagnosticId, String)> {
        let host = SourceHost::new(features);
        let cancel = Cancellation::new();
        let compilation = host.compile(src, &cancel).unwrap();
        analyze(&compilation, &features, &cancel)
            .unwrap()
            .into_iter()
            .map(|d| (d.rule_id, d.span.text(src).to_string()))
            .collect()
    }

    pub fn run_latest(src: &str) -> Vec<(DiagnosticId, String)> {
        run(src, LanguageFeatures::latest())
    }
}
