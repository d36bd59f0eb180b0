//! Output formatters for lint results

mod diff;
mod json;
mod text;

pub use diff::unified_diff;
pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::config::OutputFormat;
use crate::diagnostic::Diagnostic;
use crate::engine::LintResult;

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format the entire lint result
    fn format(&self, result: &LintResult) -> String;

    /// Format a single diagnostic
    fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String;
}

/// Formatter for a configured output format
pub fn formatter(format: OutputFormat, colored: bool, verbose: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => {
            let mut text = TextFormatter::new();
            text.colored = colored;
            text.show_description = verbose;
            Box::new(text)
        }
        OutputFormat::Json => Box::new(JsonFormatter::new().pretty()),
    }
}
