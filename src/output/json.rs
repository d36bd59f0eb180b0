//! JSON output formatter

use super::OutputFormatter;
use crate::diagnostic::{Diagnostic, FixSafety, Severity};
use crate::engine::LintResult;
use serde::Serialize;
use std::collections::BTreeMap;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_default()
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    diagnostics: Vec<JsonDiagnostic<'a>>,
    errors: Vec<String>,
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    rule_id: &'a str,
    severity: Severity,
    message: &'a str,
    file: String,
    line: usize,
    column: usize,
    length: usize,
    start: usize,
    end: usize,
    #[serde(skip_serializing_if = "no_properties")]
    properties: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_line: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    help: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fix: Option<FixSafety>,
}

fn no_properties(properties: &&BTreeMap<String, String>) -> bool {
    properties.is_empty()
}

impl<'a> From<&'a Diagnostic> for JsonDiagnostic<'a> {
    fn from(d: &'a Diagnostic) -> Self {
        JsonDiagnostic {
            rule_id: d.rule_id.as_str(),
            severity: d.severity,
            message: &d.message,
            file: d.location.file.display().to_string(),
            line: d.location.line,
            column: d.location.column,
            length: d.location.length,
            start: d.span.start,
            end: d.span.end,
            properties: &d.properties,
            source_line: d.source_line.as_deref(),
            help: d.help.as_deref(),
            fix: d.fix,
        }
    }
}

#[derive(Serialize)]
struct JsonSummary {
    files_processed: usize,
    files_with_errors: usize,
    files_with_warnings: usize,
    error_count: usize,
    warning_count: usize,
    info_count: usize,
    duration_ms: u128,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, result: &LintResult) -> String {
        let output = JsonOutput {
            diagnostics: result.diagnostics.iter().map(JsonDiagnostic::from).collect(),
            errors: result.errors.iter().map(|e| e.to_string()).collect(),
            summary: JsonSummary {
                files_processed: result.files_processed,
                files_with_errors: result.files_with_errors,
                files_with_warnings: result.files_with_warnings,
                error_count: result.error_count,
                warning_count: result.warning_count,
                info_count: result.info_count,
                duration_ms: result.duration.as_millis(),
            },
        };
        self.render(&output)
    }

    fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        self.render(&JsonDiagnostic::from(diagnostic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Location;
    use crate::rule::DiagnosticId;
    use crate::syntax::Span;
    use std::path::PathBuf;

    fn handler_diagnostic() -> Diagnostic {
        Diagnostic::new(
            DiagnosticId::MustImplementIHandleMessages,
            Severity::Error,
            "Implement 'Handle(OrderPlaced message, IMessageHandlerContext context)'",
            Span::new(40, 68),
        )
        .with_property("MessageType", "OrderPlaced")
        .with_location(Location::new(PathBuf::from("Handler.cs"), 3, 17).with_length(28))
        .with_fix(FixSafety::Safe)
    }

    #[test]
    fn test_json_format_diagnostic() {
        let formatter = JsonFormatter::new();
        let output = formatter.format_diagnostic(&handler_diagnostic());
        assert!(output.contains("\"rule_id\":\"MustImplementIHandleMessages\""));
        assert!(output.contains("\"severity\":\"error\""));
        assert!(output.contains("\"line\":3"));
        assert!(output.contains("\"start\":40"));
        assert!(output.contains("\"MessageType\":\"OrderPlaced\""));
        assert!(output.contains("\"fix\":\"safe\""));
        assert!(!output.contains("source_line"));
    }

    #[test]
    fn test_json_format_result() {
        let formatter = JsonFormatter::new();
        let result = LintResult {
            diagnostics: vec![handler_diagnostic()],
            files_processed: 5,
            error_count: 2,
            warning_count: 3,
            ..Default::default()
        };

        let output = formatter.format(&result);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["summary"]["files_processed"], 5);
        assert_eq!(value["summary"]["error_count"], 2);
        assert_eq!(value["summary"]["warning_count"], 3);
        assert_eq!(value["diagnostics"].as_array().unwrap().len(), 1);
        assert!(value["errors"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_json_pretty() {
        let formatter = JsonFormatter::new().pretty();
        let output = formatter.format_diagnostic(&handler_diagnostic());
        assert!(output.contains('\n'));
    }
}
