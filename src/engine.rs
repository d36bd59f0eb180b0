//! Core linter engine

use crate::cancel::{Cancellation, Cancelled};
use crate::compiler::{CompilerHost, SourceHost};
use crate::config::{Config, ConfigError};
use crate::diagnostic::{Diagnostic, Location, Severity};
use crate::driver::{Driver, DriverError, DriverOptions, FixOutcome};
use crate::fixes::fix_safety;
use crate::rules::Analyzer;
use crate::suppression::Suppressions;
use crate::syntax::LineIndex;
use log::debug;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Per-file failure
#[derive(Debug, Error)]
pub enum LintError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Fix {
        path: PathBuf,
        #[source]
        source: DriverError,
    },

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Result of linting operation
#[derive(Debug, Default)]
pub struct LintResult {
    /// All diagnostics
    pub diagnostics: Vec<Diagnostic>,

    /// Files that could not be processed
    pub errors: Vec<LintError>,

    /// Files processed
    pub files_processed: usize,

    /// Files with errors
    pub files_with_errors: usize,

    /// Files with warnings
    pub files_with_warnings: usize,

    /// Total errors
    pub error_count: usize,

    /// Total warnings
    pub warning_count: usize,

    /// Total info messages
    pub info_count: usize,

    /// Processing duration
    pub duration: Duration,
}

impl LintResult {
    /// Result for one file's diagnostics
    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        let mut result = LintResult {
            files_processed: 1,
            ..LintResult::default()
        };
        for diag in &diagnostics {
            match diag.severity {
                Severity::Error => result.error_count += 1,
                Severity::Warning => result.warning_count += 1,
                Severity::Info => result.info_count += 1,
            }
        }
        if result.error_count > 0 {
            result.files_with_errors = 1;
        }
        if result.warning_count > 0 {
            result.files_with_warnings = 1;
        }
        result.diagnostics = diagnostics;
        result
    }

    /// Result for a file that failed
    pub fn from_error(error: LintError) -> Self {
        LintResult {
            files_processed: 1,
            files_with_errors: 1,
            errors: vec![error],
            ..LintResult::default()
        }
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.error_count > 0 || !self.errors.is_empty()
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        self.warning_count > 0
    }

    /// Check if result is clean (no errors or warnings)
    pub fn is_clean(&self) -> bool {
        !self.has_errors() && self.warning_count == 0
    }

    /// Get exit code (0 = success, 1 = warnings, 2 = errors)
    pub fn exit_code(&self) -> i32 {
        if self.has_errors() {
            2
        } else if self.warning_count > 0 {
            1
        } else {
            0
        }
    }

    /// Merge another result into this one
    pub fn merge(&mut self, other: LintResult) {
        self.diagnostics.extend(other.diagnostics);
        self.errors.extend(other.errors);
        self.files_processed += other.files_processed;
        self.files_with_errors += other.files_with_errors;
        self.files_with_warnings += other.files_with_warnings;
        self.error_count += other.error_count;
        self.warning_count += other.warning_count;
        self.info_count += other.info_count;
    }
}

/// A file run through the fix driver
#[derive(Debug)]
pub struct FixReport {
    pub path: PathBuf,
    pub original: String,
    pub outcome: FixOutcome,
}

impl FixReport {
    pub fn changed(&self) -> bool {
        self.outcome.text != self.original
    }
}

/// The main linter engine
pub struct Engine {
    /// Configuration
    config: Config,

    /// Compiler used for every file
    host: SourceHost,

    cancel: Cancellation,
}

impl Engine {
    /// Create a new engine with configuration
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let references = config.load_references()?;
        let host = SourceHost::with_references(config.language, &references);
        Ok(Self::with_host(config, host))
    }

    /// Engine using an already built host
    pub fn with_host(config: Config, host: SourceHost) -> Self {
        Self {
            config,
            host,
            cancel: Cancellation::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token that stops in-flight work when cancelled
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    fn run_parallel<T, F>(&self, files: &[PathBuf], f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&Path) -> T + Sync + Send,
    {
        if !self.config.engine.parallel {
            return files.iter().map(|p| f(p)).collect();
        }
        let jobs = if self.config.engine.jobs > 0 {
            self.config.engine.jobs
        } else {
            num_cpus::get()
        };
        match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => pool.install(|| files.par_iter().map(|p| f(p)).collect()),
            Err(e) => {
                debug!("thread pool unavailable ({}), linting sequentially", e);
                files.iter().map(|p| f(p)).collect()
            }
        }
    }

    /// Lint multiple files
    pub fn lint(&self, files: &[PathBuf]) -> LintResult {
        let start = Instant::now();

        let mut combined = LintResult::default();
        for result in self.run_parallel(files, |f| self.lint_file(f)) {
            combined.merge(result);
        }

        combined.duration = start.elapsed();
        combined
    }

    /// Lint a single file
    pub fn lint_file(&self, path: &Path) -> LintResult {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(source) => {
                return LintResult::from_error(LintError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        match self.lint_source(path, &content) {
            Ok(diagnostics) => LintResult::from_diagnostics(diagnostics),
            Err(e) => LintResult::from_error(e.into()),
        }
    }

    /// Lint in-memory source reported as `path`
    pub fn lint_source(&self, path: &Path, content: &str) -> Result<Vec<Diagnostic>, Cancelled> {
        let compilation = self.host.compile(content, &self.cancel)?;
        if !compilation.diagnostics().is_empty() {
            debug!(
                "{}: {} compiler diagnostic(s)",
                path.display(),
                compilation.diagnostics().len()
            );
        }

        let mut diagnostics =
            self.analyzer_for(path)
                .analyze(&compilation, self.host.features(), &self.cancel)?;
        Suppressions::from_tree(compilation.tree()).retain(compilation.tree(), &mut diagnostics);
        Ok(self.decorate(path, content, diagnostics))
    }

    /// Analyzer limited to the rules that apply to `path`
    pub fn analyzer_for(&self, path: &Path) -> Analyzer {
        Analyzer::with_rules(self.config.rules_for_file(path))
    }

    /// Add location, source line, help, fix availability and severity
    /// overrides
    fn decorate(&self, path: &Path, content: &str, diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
        let index = LineIndex::new(content);
        diagnostics
            .into_iter()
            .map(|mut diag| {
                if let Some(severity) = self.config.severity_override(diag.rule_id) {
                    diag.severity = severity;
                }
                let (line, column) = index.line_col(content, diag.span.start);
                let location =
                    Location::new(path.to_path_buf(), line, column).with_length(diag.span.len());
                let help = diag.rule_id.descriptor().title;
                let mut diag = diag.with_location(location).with_help(help);
                if let Some(text) = index.line_text(content, line) {
                    diag = diag.with_source_line(text);
                }
                if let Some(safety) = fix_safety(diag.rule_id) {
                    diag = diag.with_fix(safety);
                }
                diag
            })
            .collect()
    }

    fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            max_iterations: self.config.engine.max_fix_iterations,
            unsafe_fixes: self.config.fix.unsafe_fixes,
        }
    }

    /// Run the fix driver on multiple files
    pub fn fix(&self, files: &[PathBuf]) -> Vec<Result<FixReport, LintError>> {
        self.run_parallel(files, |f| self.fix_file(f))
    }

    /// Run the fix driver on one file without writing it
    pub fn fix_file(&self, path: &Path) -> Result<FixReport, LintError> {
        let original = std::fs::read_to_string(path).map_err(|source| LintError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let outcome = Driver::new(&self.host)
            .with_analyzer(self.analyzer_for(path))
            .with_options(self.driver_options())
            .run(&original, &self.cancel)
            .map_err(|source| match source {
                DriverError::Cancelled(c) => LintError::Cancelled(c),
                source => LintError::Fix {
                    path: path.to_path_buf(),
                    source,
                },
            })?;
        debug!(
            "{}: {} fix(es) in {} iteration(s)",
            path.display(),
            outcome.applied.len(),
            outcome.iterations
        );

        Ok(FixReport {
            path: path.to_path_buf(),
            original,
            outcome,
        })
    }

    /// Diagnostics left after fixing, located in the fixed text
    pub fn remaining(&self, report: &FixReport) -> LintResult {
        let diagnostics = self.decorate(
            &report.path,
            &report.outcome.text,
            report.outcome.remaining.clone(),
        );
        LintResult::from_diagnostics(diagnostics)
    }
}
