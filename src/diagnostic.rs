//! Diagnostic types for analysis results

use crate::rule::DiagnosticId;
use crate::syntax::Span;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Severity level for diagnostics
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,
    /// Warning - potential issue
    #[default]
    Warning,
    /// Error - definite problem
    Error,
}

/// Fix safety classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixSafety {
    /// Preserves meaning; applied by `--fix`
    #[default]
    Safe,
    /// May break callers; applied only with `--unsafe-fixes`
    Unsafe,
}

impl std::fmt::Display for FixSafety {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixSafety::Safe => write!(f, "safe"),
            FixSafety::Unsafe => write!(f, "unsafe"),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" | "hint" | "note" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" | "err" => Ok(Severity::Error),
            _ => Err(()),
        }
    }
}

/// Source code location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File path
    pub file: PathBuf,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
    /// Length of the highlighted region
    pub length: usize,
}

impl Location {
    pub fn new(file: PathBuf, line: usize, column: usize) -> Self {
        Self {
            file,
            line,
            column,
            length: 0,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }
}

/// A rule violation
///
/// Rules fill in id, severity, message, span and properties. The engine
/// adds the location and source line afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Rule that triggered this diagnostic
    pub rule_id: DiagnosticId,
    pub severity: Severity,
    /// Rendered message
    pub message: String,
    /// Byte range in the tree that produced it
    pub span: Span,
    /// Structured data for fix providers, e.g. `MessageType`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub location: Location,
    /// The source line (for display)
    #[serde(default)]
    pub source_line: Option<String>,
    /// Help text (usually rule description)
    #[serde(default)]
    pub help: Option<String>,
    /// Safety of the fix registered for this id, if any
    #[serde(default)]
    pub fix: Option<FixSafety>,
}

impl Diagnostic {
    pub fn new(rule_id: DiagnosticId, severity: Severity, message: &str, span: Span) -> Self {
        Self {
            rule_id,
            severity,
            message: message.to_string(),
            span,
            properties: BTreeMap::new(),
            location: Location::default(),
            source_line: None,
            help: None,
            fix: None,
        }
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Add source line for display
    pub fn with_source_line(mut self, line: &str) -> Self {
        self.source_line = Some(line.to_string());
        self
    }

    /// Add help text
    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    pub fn with_fix(mut self, safety: FixSafety) -> Self {
        self.fix = Some(safety);
        self
    }

    pub fn has_fix(&self) -> bool {
        self.fix.is_some()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!("error".parse::<Severity>(), Ok(Severity::Error));
        assert_eq!("warn".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("hint".parse::<Severity>(), Ok(Severity::Info));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_diagnostic_builder() {
        let diag = Diagnostic::new(
            DiagnosticId::MustImplementIHandleMessages,
            Severity::Error,
            "missing handler",
            Span::new(10, 20),
        )
        .with_property("MessageType", "OrderPlaced")
        .with_location(Location::new(PathBuf::from("H.cs"), 3, 7).with_length(10))
        .with_fix(FixSafety::Safe);

        assert!(diag.is_error());
        assert!(diag.has_fix());
        assert_eq!(diag.property("MessageType"), Some("OrderPlaced"));
        assert_eq!(diag.property("Other"), None);
        assert_eq!(diag.location.length, 10);
    }

    #[test]
    fn test_diagnostic_serializes_id_as_string() {
        let diag = Diagnostic::new(
            DiagnosticId::DroppedTask,
            Severity::Error,
            "dropped",
            Span::new(0, 4),
        );
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["rule_id"], "DroppedTask");
        assert_eq!(json["severity"], "error");
        assert!(json.get("properties").is_none());
    }
}
