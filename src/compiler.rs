//! Compiler host
//!
//! A [`CompilerHost`] turns source text into a [`Compilation`]: the parsed
//! tree, a semantic model bound to that tree, and the compiler diagnostics
//! the two passes produced. Rules and fixes only ever see compilations.

use crate::cancel::{Cancellation, Cancelled};
use crate::semantic::library::{core_table, reference_table};
use crate::semantic::{SemanticModel, TypeTable};
use crate::syntax::{Span, SyntaxTree};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Target platform capabilities
///
/// Decides which accessibility a modifier-less member gets and which
/// interface member forms compile at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageFeatures {
    /// `private` members on interfaces (C# 8 and later runtimes)
    pub private_interface_members: bool,
    /// Interface methods with bodies
    pub default_interface_methods: bool,
}

impl LanguageFeatures {
    pub fn latest() -> Self {
        Self {
            private_interface_members: true,
            default_interface_methods: true,
        }
    }

    /// Runtimes without default interface members
    pub fn legacy() -> Self {
        Self {
            private_interface_members: false,
            default_interface_methods: false,
        }
    }
}

impl Default for LanguageFeatures {
    fn default() -> Self {
        Self::latest()
    }
}

/// An error or warning reported by the compiler itself
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CompilerDiagnostic {
    pub code: String,
    pub message: String,
    pub span: Span,
}

impl CompilerDiagnostic {
    /// Identity used to compare diagnostics across tree generations
    pub fn key(&self) -> (String, String) {
        (self.code.clone(), self.message.clone())
    }
}

impl std::fmt::Display for CompilerDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Tree, model and compiler diagnostics for one document
#[derive(Debug)]
pub struct Compilation {
    tree: SyntaxTree,
    model: SemanticModel,
    diagnostics: Vec<CompilerDiagnostic>,
}

impl Compilation {
    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    pub fn model(&self) -> &SemanticModel {
        &self.model
    }

    pub fn diagnostics(&self) -> &[CompilerDiagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Supplies compilations to the engine and the fix driver
pub trait CompilerHost: Send + Sync {
    fn features(&self) -> &LanguageFeatures;

    /// Bind an already parsed tree
    fn compile_tree(&self, tree: SyntaxTree, cancel: &Cancellation)
        -> Result<Compilation, Cancelled>;

    fn compile(&self, text: &str, cancel: &Cancellation) -> Result<Compilation, Cancelled> {
        cancel.check()?;
        self.compile_tree(SyntaxTree::parse(text), cancel)
    }
}

/// Host backed by the bundled parser and binder
#[derive(Debug, Clone)]
pub struct SourceHost {
    references: Arc<TypeTable>,
    features: LanguageFeatures,
}

impl SourceHost {
    /// Host with the built-in reference stubs only
    pub fn new(features: LanguageFeatures) -> Self {
        Self {
            references: Arc::new(core_table().clone()),
            features,
        }
    }

    /// Host with extra reference stub sources, given as (name, text)
    pub fn with_references(features: LanguageFeatures, sources: &[(String, String)]) -> Self {
        if sources.is_empty() {
            return Self::new(features);
        }
        let trees: Vec<SyntaxTree> = sources
            .iter()
            .map(|(name, text)| {
                let tree = SyntaxTree::parse(text);
                if !tree.errors().is_empty() {
                    warn!(
                        "reference {} has {} syntax error(s)",
                        name,
                        tree.errors().len()
                    );
                }
                tree
            })
            .collect();
        Self {
            references: Arc::new(reference_table(&trees)),
            features,
        }
    }

    pub fn references(&self) -> &TypeTable {
        &self.references
    }
}

impl Default for SourceHost {
    fn default() -> Self {
        Self::new(LanguageFeatures::default())
    }
}

impl CompilerHost for SourceHost {
    fn features(&self) -> &LanguageFeatures {
        &self.features
    }

    fn compile_tree(
        &self,
        tree: SyntaxTree,
        cancel: &Cancellation,
    ) -> Result<Compilation, Cancelled> {
        let (model, semantic_errors) =
            SemanticModel::bind(&tree, &self.references, &self.features, cancel)?;

        let mut diagnostics: Vec<CompilerDiagnostic> = tree
            .errors()
            .iter()
            .map(|e| CompilerDiagnostic {
                code: e.code.to_string(),
                message: e.message.clone(),
                span: e.span,
            })
            .chain(semantic_errors.into_iter().map(|e| CompilerDiagnostic {
                code: e.code.to_string(),
                message: e.message,
                span: e.span,
            }))
            .collect();
        diagnostics.sort_by_key(|d| d.span.start);
        debug!("compiled {} bytes: {} compiler diagnostic(s)", tree.text().len(), diagnostics.len());

        Ok(Compilation {
            tree,
            model,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_collects_syntax_and_semantic_errors() {
        let host = SourceHost::default();
        let compilation = host
            .compile("class C { Missing M() { return null } }", &Cancellation::new())
            .unwrap();
        let codes: Vec<&str> = compilation
            .diagnostics()
            .iter()
            .map(|d| d.code.as_str())
            .collect();
        assert_eq!(codes, vec!["CS0246", "CS1002"]);
    }

    #[test]
    fn test_compile_clean_source() {
        let host = SourceHost::default();
        let compilation = host
            .compile(
                "using System.Threading.Tasks;\nclass C { Task M() => Task.CompletedTask; }",
                &Cancellation::new(),
            )
            .unwrap();
        assert!(!compilation.has_errors(), "{:?}", compilation.diagnostics());
    }

    #[test]
    fn test_feature_gates() {
        let src = "interface I { private void A() { } void B() { } }";
        let latest = SourceHost::new(LanguageFeatures::latest())
            .compile(src, &Cancellation::new())
            .unwrap();
        assert!(!latest.has_errors());

        let legacy = SourceHost::new(LanguageFeatures::legacy())
            .compile(src, &Cancellation::new())
            .unwrap();
        let codes: Vec<&str> = legacy.diagnostics().iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["CS0106", "CS8701", "CS8701"]);
    }

    #[test]
    fn test_extra_references() {
        let host = SourceHost::with_references(
            LanguageFeatures::default(),
            &[(
                "Acme.cs".to_string(),
                "namespace Acme { public class Client { public System.Threading.Tasks.Task Ping(); } }"
                    .to_string(),
            )],
        );
        let compilation = host
            .compile(
                "using Acme;\nclass C { void M(Client c) { c.Ping(); } }",
                &Cancellation::new(),
            )
            .unwrap();
        assert!(!compilation.has_errors(), "{:?}", compilation.diagnostics());
    }

    #[test]
    fn test_cancelled_compile() {
        let cancel = Cancellation::new();
        cancel.cancel();
        assert!(SourceHost::default().compile("class C { }", &cancel).is_err());
    }

    #[test]
    fn test_deep_expressions_compile_with_too_complex_error() {
        let sum = vec!["x"; 2000].join(" + ");
        let parens = format!("{}x{}", "(".repeat(300), ")".repeat(300));
        let src = format!(
            "class C {{ int M(int x) {{ var a = {}; var b = {}; return a; }} }}",
            sum, parens
        );
        let host = SourceHost::default();
        let cancel = Cancellation::new();
        let compilation = host.compile(&src, &cancel).unwrap();
        assert!(compilation.diagnostics().iter().any(|d| d.code == "CS8078"));
        assert!(crate::rules::analyze(&compilation, host.features(), &cancel).is_ok());
    }

    #[test]
    fn test_diagnostic_key_ignores_span() {
        let a = CompilerDiagnostic {
            code: "CS0246".to_string(),
            message: "m".to_string(),
            span: Span::new(0, 1),
        };
        let b = CompilerDiagnostic {
            span: Span::new(10, 11),
            ..a.clone()
        };
        assert_eq!(a.key(), b.key());
    }
}
