//! Fix convergence driver
//!
//! Repeatedly analyzes a document, applies the fix for the first fixable
//! diagnostic, recompiles and checks that the compiler reports nothing new.
//! The loop is an explicit state machine:
//!
//! ```text
//! Analyzing -> Fixing -> Recompiling -> Verifying -> Analyzing
//!                 |
//!                 +-> Done
//! ```
//!
//! Each pass builds a fresh [`AnalysisSnapshot`]; nothing computed against
//! one tree is used against the next.

use crate::cancel::{Cancellation, Cancelled};
use crate::compiler::{Compilation, CompilerDiagnostic, CompilerHost};
use crate::config::DEFAULT_MAX_FIX_ITERATIONS;
use crate::diagnostic::{Diagnostic, FixSafety};
use crate::fixes::{fix_actions, provider_for, CodeFixAction, FixError};
use crate::rule::DiagnosticId;
use crate::rules::Analyzer;
use crate::suppression::Suppressions;
use crate::syntax::SyntaxTree;
use log::debug;
use std::collections::HashMap;
use thiserror::Error;

/// Fix loop failure
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("fix '{fix}' introduced {} new compiler diagnostic(s)", .introduced.len())]
    Regression {
        fix: String,
        introduced: Vec<CompilerDiagnostic>,
    },

    #[error("fixes did not converge after {iterations} iteration(s)")]
    NotConverged { iterations: usize },

    #[error(transparent)]
    Fix(#[from] FixError),
}

/// Driver settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    pub max_iterations: usize,
    pub unsafe_fixes: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_FIX_ITERATIONS,
            unsafe_fixes: false,
        }
    }
}

/// A compilation and the rule diagnostics reported on it
#[derive(Debug)]
pub struct AnalysisSnapshot {
    compilation: Compilation,
    diagnostics: Vec<Diagnostic>,
}

impl AnalysisSnapshot {
    pub fn tree(&self) -> &SyntaxTree {
        self.compilation.tree()
    }

    pub fn compilation(&self) -> &Compilation {
        &self.compilation
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// Record of one applied fix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedFix {
    pub rule_id: DiagnosticId,
    pub title: String,
    pub equivalence_key: &'static str,
    pub safety: FixSafety,
}

/// Result of a converged run
#[derive(Debug)]
pub struct FixOutcome {
    pub text: String,
    pub iterations: usize,
    pub applied: Vec<AppliedFix>,
    /// Diagnostics left on the final text
    pub remaining: Vec<Diagnostic>,
}

impl FixOutcome {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

enum State {
    Analyzing(Compilation),
    Fixing(AnalysisSnapshot),
    Recompiling { tree: SyntaxTree, fix: AppliedFix },
    Verifying { compilation: Compilation, fix: AppliedFix },
    Done(AnalysisSnapshot),
}

/// Applies fixes to one document until none remain
pub struct Driver<'h> {
    host: &'h dyn CompilerHost,
    analyzer: Analyzer,
    options: DriverOptions,
}

impl<'h> Driver<'h> {
    pub fn new(host: &'h dyn CompilerHost) -> Self {
        Self {
            host,
            analyzer: Analyzer::new(),
            options: DriverOptions::default(),
        }
    }

    pub fn with_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_options(mut self, options: DriverOptions) -> Self {
        self.options = options;
        self
    }

    /// Analyze one compilation, dropping suppressed diagnostics
    pub fn snapshot(
        &self,
        compilation: Compilation,
        cancel: &Cancellation,
    ) -> Result<AnalysisSnapshot, Cancelled> {
        let mut diagnostics = self
            .analyzer
            .analyze(&compilation, self.host.features(), cancel)?;
        Suppressions::from_tree(compilation.tree()).retain(compilation.tree(), &mut diagnostics);
        Ok(AnalysisSnapshot {
            compilation,
            diagnostics,
        })
    }

    fn allowed(&self, id: DiagnosticId) -> bool {
        provider_for(id).is_some_and(|p| self.options.unsafe_fixes || p.safety == FixSafety::Safe)
    }

    /// Actions for the first diagnostic, in emission order, with an allowed
    /// fix; `None` when there is no such diagnostic or its provider declines
    fn select(&self, snapshot: &AnalysisSnapshot) -> Option<(DiagnosticId, Vec<CodeFixAction>)> {
        let diagnostic = snapshot
            .diagnostics
            .iter()
            .find(|d| self.allowed(d.rule_id))?;
        let actions = fix_actions(diagnostic, snapshot.tree());
        if actions.is_empty() {
            debug!("fix for {} declined at {}", diagnostic.rule_id, diagnostic.span);
            return None;
        }
        Some((diagnostic.rule_id, actions))
    }

    /// Fix `text` to convergence
    pub fn run(&self, text: &str, cancel: &Cancellation) -> Result<FixOutcome, DriverError> {
        let initial = self.host.compile(text, cancel)?;
        let baseline = key_counts(initial.diagnostics());
        let mut applied: Vec<AppliedFix> = Vec::new();
        let mut state = State::Analyzing(initial);

        loop {
            cancel.check()?;
            state = match state {
                State::Analyzing(compilation) => State::Fixing(self.snapshot(compilation, cancel)?),

                State::Fixing(snapshot) => match self.select(&snapshot) {
                    None => {
                        debug!(
                            "converged after {} fix(es), {} diagnostic(s) left",
                            applied.len(),
                            snapshot.diagnostics.len()
                        );
                        State::Done(snapshot)
                    }
                    Some(_) if applied.len() >= self.options.max_iterations => {
                        return Err(DriverError::NotConverged {
                            iterations: applied.len(),
                        });
                    }
                    Some((rule_id, actions)) => apply_actions(snapshot, rule_id, &actions)?,
                },

                State::Recompiling { tree, fix } => State::Verifying {
                    compilation: self.host.compile_tree(tree, cancel)?,
                    fix,
                },

                State::Verifying { compilation, fix } => {
                    let mut seen: HashMap<(String, String), usize> = HashMap::new();
                    let introduced: Vec<CompilerDiagnostic> = compilation
                        .diagnostics()
                        .iter()
                        .filter(|d| {
                            let key = d.key();
                            let allowed = baseline.get(&key).copied().unwrap_or(0);
                            let count = seen.entry(key).or_insert(0);
                            *count += 1;
                            *count > allowed
                        })
                        .cloned()
                        .collect();
                    if !introduced.is_empty() {
                        debug!("'{}' introduced {:?}", fix.title, introduced);
                        return Err(DriverError::Regression {
                            fix: fix.title,
                            introduced,
                        });
                    }
                    applied.push(fix);
                    State::Analyzing(compilation)
                }

                State::Done(snapshot) => {
                    return Ok(FixOutcome {
                        text: snapshot.tree().text().to_string(),
                        iterations: applied.len(),
                        applied,
                        remaining: snapshot.diagnostics,
                    });
                }
            };
        }
    }
}

/// Occurrences of each compiler diagnostic, by code and message
fn key_counts(diagnostics: &[CompilerDiagnostic]) -> HashMap<(String, String), usize> {
    let mut counts = HashMap::new();
    for diagnostic in diagnostics {
        *counts.entry(diagnostic.key()).or_insert(0) += 1;
    }
    counts
}

/// Apply `actions` in order, each to the tree the previous one produced
fn apply_actions(
    snapshot: AnalysisSnapshot,
    rule_id: DiagnosticId,
    actions: &[CodeFixAction],
) -> Result<State, FixError> {
    let Some(first) = actions.first() else {
        return Ok(State::Done(snapshot));
    };
    let mut tree: Option<SyntaxTree> = None;
    for action in actions {
        debug!("applying '{}' for {}", action.title, rule_id);
        let next = action.apply(tree.as_ref().unwrap_or(snapshot.tree()))?;
        tree = Some(next);
    }
    let fix = AppliedFix {
        rule_id,
        title: first.title.clone(),
        equivalence_key: first.equivalence_key,
        safety: first.safety,
    };
    Ok(match tree {
        Some(tree) => State::Recompiling { tree, fix },
        None => State::Done(snapshot),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::SourceHost;
    use pretty_assertions::assert_eq;

    fn run(src: &str, options: DriverOptions) -> Result<FixOutcome, DriverError> {
        let host = SourceHost::default();
        Driver::new(&host)
            .with_options(options)
            .run(src, &Cancellation::new())
    }

    const HANDLERS: &str = "using System.Threading.Tasks;
using NServiceBus;
class A { }
class B { }
class HandlerA : IHandleMessages<A>
{
}
class HandlerB : IHandleMessages<B>
{
}
";

    #[test]
    fn test_clean_text_is_unchanged() {
        let src = "class C { void M() { } }";
        let outcome = run(src, DriverOptions::default()).unwrap();
        assert_eq!(outcome.text, src);
        assert_eq!(outcome.iterations, 0);
        assert!(!outcome.changed());
        assert!(outcome.remaining.is_empty());
    }

    #[test]
    fn test_fixes_every_handler() {
        let outcome = run(HANDLERS, DriverOptions::default()).unwrap();
        assert_eq!(outcome.iterations, 2);
        assert!(outcome.remaining.is_empty());
        assert!(outcome
            .text
            .contains("public async Task Handle(A message, IMessageHandlerContext context)"));
        assert!(outcome
            .text
            .contains("public async Task Handle(B message, IMessageHandlerContext context)"));
        assert!(outcome
            .applied
            .iter()
            .all(|f| f.equivalence_key == "AddHandleMethod"));
    }

    #[test]
    fn test_fixing_is_idempotent() {
        let first = run(HANDLERS, DriverOptions::default()).unwrap();
        let second = run(&first.text, DriverOptions::default()).unwrap();
        assert_eq!(second.text, first.text);
        assert_eq!(second.iterations, 0);
    }

    #[test]
    fn test_unfixable_diagnostics_remain() {
        let src = "using System.Threading.Tasks;
class C
{
    Task Work() => Task.CompletedTask;
    void M() { Work(); }
}";
        let outcome = run(src, DriverOptions::default()).unwrap();
        assert_eq!(outcome.text, src);
        assert_eq!(outcome.remaining.len(), 1);
        assert_eq!(outcome.remaining[0].rule_id, DiagnosticId::DroppedTask);
    }

    #[test]
    fn test_unsafe_fix_needs_opt_in() {
        let src = "using System.Threading;
public class C { public void M(CancellationToken token = default) { } }";
        let outcome = run(src, DriverOptions::default()).unwrap();
        assert_eq!(outcome.text, src);
        assert_eq!(outcome.remaining.len(), 1);

        let options = DriverOptions {
            unsafe_fixes: true,
            ..DriverOptions::default()
        };
        let outcome = run(src, options).unwrap();
        assert!(outcome.text.contains("M(CancellationToken token)"));
        assert_eq!(outcome.applied[0].safety, FixSafety::Unsafe);
    }

    #[test]
    fn test_regression_is_reported() {
        let src = "using System.Threading;
public class C
{
    public void M(CancellationToken token = default) { }
    void Caller() { M(); }
}";
        let options = DriverOptions {
            unsafe_fixes: true,
            ..DriverOptions::default()
        };
        match run(src, options) {
            Err(DriverError::Regression { introduced, .. }) => {
                assert_eq!(introduced.len(), 1);
                assert_eq!(introduced[0].code, "CS1501");
            }
            other => panic!("expected regression, got {:?}", other.map(|o| o.text)),
        }
    }

    #[test]
    fn test_existing_compiler_errors_are_not_regressions() {
        let src = "using System.Threading.Tasks;
using NServiceBus;
class A { }
class Handler : IHandleMessages<A>
{
    Missing field;
}
";
        let outcome = run(src, DriverOptions::default()).unwrap();
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn test_declined_fix_ends_the_run() {
        let src = "using System.Threading;
using System.Threading.Tasks;
using NServiceBus;
class A { }
class C { void M(CancellationToken token, int x) { } }
class H : IHandleMessages<A> { }
";
        let outcome = run(src, DriverOptions::default()).unwrap();
        assert_eq!(outcome.text, src);
        assert_eq!(outcome.iterations, 0);
        assert!(!outcome.changed());
        let ids: Vec<DiagnosticId> = outcome.remaining.iter().map(|d| d.rule_id).collect();
        assert_eq!(
            ids,
            vec![
                DiagnosticId::CancellationTokenPrivateOptional,
                DiagnosticId::MustImplementIHandleMessages
            ]
        );
    }

    #[test]
    fn test_repeated_existing_error_is_a_regression() {
        let src = "using System.Threading.Tasks;
using NServiceBus;
class Handler : IHandleMessages<Missing>
{
}
";
        let host = SourceHost::default();
        let before = host.compile(src, &Cancellation::new()).unwrap();
        assert_eq!(
            before
                .diagnostics()
                .iter()
                .filter(|d| d.message.contains("'Missing'"))
                .count(),
            1
        );

        match run(src, DriverOptions::default()) {
            Err(DriverError::Regression { introduced, .. }) => {
                assert!(!introduced.is_empty());
                assert!(introduced.iter().all(|d| d.code == "CS0246"));
            }
            other => panic!("expected regression, got {:?}", other.map(|o| o.text)),
        }
    }

    #[test]
    fn test_key_counts() {
        let missing = CompilerDiagnostic {
            code: "CS0246".to_string(),
            message: "m".to_string(),
            span: crate::syntax::Span::new(0, 1),
        };
        let counts = key_counts(&[missing.clone(), missing.clone()]);
        assert_eq!(counts.get(&missing.key()), Some(&2));
    }

    #[test]
    fn test_iteration_cap() {
        let options = DriverOptions {
            max_iterations: 1,
            ..DriverOptions::default()
        };
        assert!(matches!(
            run(HANDLERS, options),
            Err(DriverError::NotConverged { iterations: 1 })
        ));
    }

    #[test]
    fn test_cancelled_run() {
        let host = SourceHost::default();
        let cancel = Cancellation::new();
        cancel.cancel();
        assert!(matches!(
            Driver::new(&host).run(HANDLERS, &cancel),
            Err(DriverError::Cancelled(Cancelled))
        ));
    }

    #[test]
    fn test_suppressed_diagnostics_are_not_fixed() {
        let src = "using System.Threading.Tasks;
using NServiceBus;
class A { }
#pragma warning disable MustImplementIHandleMessages
class Handler : IHandleMessages<A>
{
}
";
        let outcome = run(src, DriverOptions::default()).unwrap();
        assert_eq!(outcome.text, src);
        assert!(outcome.remaining.is_empty());
    }

    #[test]
    fn test_disabled_rule_is_not_fixed() {
        let host = SourceHost::default();
        let outcome = Driver::new(&host)
            .with_analyzer(Analyzer::with_rules([DiagnosticId::DroppedTask]))
            .run(HANDLERS, &Cancellation::new())
            .unwrap();
        assert_eq!(outcome.text, HANDLERS);
    }
}
