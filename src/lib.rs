//! Tasklint - async and cancellation linter for C#
//!
//! Finds asynchronous and cancellation-handling mistakes in C# sources and
//! rewrites the ones that have a mechanical fix.
//!
//! # Architecture
//!
//! ```text
//! CLI -> Engine -> CompilerHost -> Compilation (tree + semantic model)
//!                      |
//!                      +-> Analyzer (detectors by node kind) -> Diagnostics
//!                      +-> Driver (fix providers, recompile, verify)
//! ```
//!
//! Each file is compiled on its own against a table of well-known library
//! types, plus optional reference stubs from the configuration. Detectors
//! are plain functions registered per syntax kind; they see an immutable
//! tree and a semantic model bound to that tree.
//!
//! # Rules
//!
//! | Id | Default |
//! |----|---------|
//! | `CancellationTokenNonPrivateRequired` | warning |
//! | `CancellationTokenPrivateOptional` | warning |
//! | `DroppedTask` | error |
//! | `CatchAllShouldOmitOperationCanceled` | warning |
//! | `MustImplementIHandleMessages` | error |

pub mod cancel;
pub mod compiler;
pub mod config;
pub mod diagnostic;
pub mod driver;
pub mod engine;
pub mod fixes;
pub mod output;
pub mod rule;
pub mod rules;
pub mod semantic;
pub mod suppression;
pub mod syntax;

// Re-export main types
pub use cancel::{Cancellation, Cancelled};
pub use compiler::{Compilation, CompilerDiagnostic, CompilerHost, LanguageFeatures, SourceHost};
pub use config::{Config, ConfigError};
pub use diagnostic::{Diagnostic, FixSafety, Location, Severity};
pub use driver::{AnalysisSnapshot, Driver, DriverError, DriverOptions, FixOutcome};
pub use engine::{Engine, FixReport, LintError, LintResult};
pub use fixes::{fix_actions, CodeFixAction, FixError};
pub use rule::{DiagnosticDescriptor, DiagnosticId, RuleCategory, DESCRIPTORS};
pub use rules::{analyze, Analyzer};
pub use syntax::{Span, SyntaxTree};
