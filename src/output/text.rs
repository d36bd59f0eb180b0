//! Human-readable text output formatter

use super::OutputFormatter;
use crate::diagnostic::{Diagnostic, FixSafety, Severity};
use crate::engine::LintResult;
use colored::*;
use std::collections::BTreeMap;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Show source line with underline
    pub show_source: bool,

    /// Show help text
    pub show_help: bool,

    /// Show the rule description under each diagnostic
    pub show_description: bool,

    /// Show statistics
    pub show_stats: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_source: true,
            show_help: true,
            show_description: false,
            show_stats: true,
        }
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    format!("{} {}", count, if count == 1 { one } else { many })
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.colored {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn severity_str(&self, severity: Severity) -> ColoredString {
        let s = format!("{}", severity);
        if !self.colored {
            return s.normal();
        }
        match severity {
            Severity::Error => s.red().bold(),
            Severity::Warning => s.yellow().bold(),
            Severity::Info => s.blue(),
        }
    }

    fn format_location(&self, diag: &Diagnostic) -> String {
        format!(
            "{}:{}:{}",
            diag.location.file.display(),
            diag.location.line,
            diag.location.column
        )
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, result: &LintResult) -> String {
        let mut output = String::new();

        let mut by_file: BTreeMap<_, Vec<_>> = BTreeMap::new();
        for diag in &result.diagnostics {
            by_file.entry(&diag.location.file).or_default().push(diag);
        }

        for (file, diagnostics) in &by_file {
            output.push_str(&self.paint(&file.display().to_string(), |s| s.underline()));
            output.push('\n');
            for diag in diagnostics {
                output.push_str(&self.format_diagnostic(diag));
                output.push('\n');
            }
            output.push('\n');
        }

        for error in &result.errors {
            output.push_str(&format!("{}: {}\n", self.paint("error", |s| s.red().bold()), error));
        }

        if self.show_stats {
            output.push_str(&format!(
                "\n{} processed",
                plural(result.files_processed, "file", "files")
            ));

            let mut counts = Vec::new();
            if result.error_count > 0 {
                counts.push(self.paint(&plural(result.error_count, "error", "errors"), |s| s.red()));
            }
            if result.warning_count > 0 {
                counts.push(self.paint(
                    &plural(result.warning_count, "warning", "warnings"),
                    |s| s.yellow(),
                ));
            }
            if result.info_count > 0 {
                counts.push(self.paint(&plural(result.info_count, "info", "infos"), |s| s.blue()));
            }
            if !counts.is_empty() {
                output.push_str(&format!(": {}", counts.join(", ")));
            }
            output.push('\n');

            let fixable = result.diagnostics.iter().filter(|d| d.has_fix()).count();
            if fixable > 0 {
                output.push_str(&format!(
                    "{} fixable with --fix\n",
                    plural(fixable, "diagnostic", "diagnostics")
                ));
            }

            output.push_str(&format!(
                "Finished in {:.2}s\n",
                result.duration.as_secs_f64()
            ));
        }

        output
    }

    fn format_diagnostic(&self, diag: &Diagnostic) -> String {
        let mut output = String::new();
        let bar = self.paint("|", |s| s.blue());

        output.push_str(&format!(
            "{}: {}[{}]: {}\n",
            self.format_location(diag),
            self.severity_str(diag.severity),
            self.paint(diag.rule_id.as_str(), |s| s.cyan()),
            diag.message
        ));

        if self.show_source {
            if let Some(source) = &diag.source_line {
                output.push_str(&format!("   {}\n", bar));
                let line_num = format!("{:>4}", diag.location.line);
                output.push_str(&format!(
                    "{} {} {}\n",
                    self.paint(&line_num, |s| s.blue()),
                    bar,
                    source
                ));

                if diag.location.column > 0 {
                    let padding: String = source
                        .chars()
                        .take(diag.location.column - 1)
                        .map(|c| if c == '\t' { '\t' } else { ' ' })
                        .collect();
                    let underline = "^".repeat(diag.location.length.max(1));
                    output.push_str(&format!(
                        "   {} {}{}\n",
                        bar,
                        padding,
                        self.paint(&underline, |s| s.red())
                    ));
                }
            }
        }

        if self.show_help {
            if let Some(help) = &diag.help {
                output.push_str(&format!("   {} help: {}\n", self.paint("=", |s| s.blue()), help));
            }
        }

        if let Some(safety) = diag.fix {
            let note = match safety {
                FixSafety::Safe => "fix available".to_string(),
                FixSafety::Unsafe => "fix available with --unsafe-fixes".to_string(),
            };
            output.push_str(&format!("   {} {}\n", self.paint("=", |s| s.green()), note));
        }

        if self.show_description {
            output.push_str(&format!(
                "   {} note: {}\n",
                self.paint("=", |s| s.blue()),
                diag.rule_id.descriptor().description
            ));
        }

        output
    }
}
