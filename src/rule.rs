//! Diagnostic descriptors
//!
//! The registry is a closed, compile-time table. Ids, categories, default
//! severities and message templates are part of the public contract and do
//! not change between releases.

use crate::diagnostic::Severity;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Rule category for grouping related rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// Code that is definitely wrong
    Correctness,
    /// Code that is likely wrong
    Suspicious,
    /// Conventions for public API shape
    #[default]
    Style,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCategory::Correctness => write!(f, "correctness"),
            RuleCategory::Suspicious => write!(f, "suspicious"),
            RuleCategory::Style => write!(f, "style"),
        }
    }
}

impl std::str::FromStr for RuleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "correctness" => Ok(RuleCategory::Correctness),
            "suspicious" => Ok(RuleCategory::Suspicious),
            "style" => Ok(RuleCategory::Style),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// Stable diagnostic identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticId {
    CancellationTokenNonPrivateRequired,
    CancellationTokenPrivateOptional,
    DroppedTask,
    CatchAllShouldOmitOperationCanceled,
    MustImplementIHandleMessages,
}

impl DiagnosticId {
    pub const ALL: [DiagnosticId; 5] = [
        DiagnosticId::CancellationTokenNonPrivateRequired,
        DiagnosticId::CancellationTokenPrivateOptional,
        DiagnosticId::DroppedTask,
        DiagnosticId::CatchAllShouldOmitOperationCanceled,
        DiagnosticId::MustImplementIHandleMessages,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticId::CancellationTokenNonPrivateRequired => {
                "CancellationTokenNonPrivateRequired"
            }
            DiagnosticId::CancellationTokenPrivateOptional => "CancellationTokenPrivateOptional",
            DiagnosticId::DroppedTask => "DroppedTask",
            DiagnosticId::CatchAllShouldOmitOperationCanceled => {
                "CatchAllShouldOmitOperationCanceled"
            }
            DiagnosticId::MustImplementIHandleMessages => "MustImplementIHandleMessages",
        }
    }

    pub fn descriptor(self) -> &'static DiagnosticDescriptor {
        match self {
            DiagnosticId::CancellationTokenNonPrivateRequired => &DESCRIPTORS[0],
            DiagnosticId::CancellationTokenPrivateOptional => &DESCRIPTORS[1],
            DiagnosticId::DroppedTask => &DESCRIPTORS[2],
            DiagnosticId::CatchAllShouldOmitOperationCanceled => &DESCRIPTORS[3],
            DiagnosticId::MustImplementIHandleMessages => &DESCRIPTORS[4],
        }
    }
}

impl fmt::Display for DiagnosticId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiagnosticId {
    type Err = String;

    /// Case-insensitive match on the id
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiagnosticId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown rule: {}", s))
    }
}

/// Static registry entry for one diagnostic id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticDescriptor {
    pub id: DiagnosticId,
    pub title: &'static str,
    pub category: RuleCategory,
    pub severity: Severity,
    /// Message with `{Property}` placeholders
    pub message: &'static str,
    pub description: &'static str,
    pub example_bad: &'static str,
    pub example_good: &'static str,
}

impl DiagnosticDescriptor {
    /// Render the message template with diagnostic properties
    pub fn format_message(&self, properties: &BTreeMap<String, String>) -> String {
        format_message(self.message, properties)
    }
}

pub static DESCRIPTORS: [DiagnosticDescriptor; 5] = [
    DiagnosticDescriptor {
        id: DiagnosticId::CancellationTokenNonPrivateRequired,
        title: "Cancellation token parameter of a non-private member must be required",
        category: RuleCategory::Style,
        severity: Severity::Warning,
        message: "Make the CancellationToken parameter required by removing its default value",
        description: "Callers of non-private members should decide explicitly whether to pass a \
                      cancellation token. An optional token makes it easy to forget.",
        example_bad: "public Task Run(CancellationToken cancellationToken = default)",
        example_good: "public Task Run(CancellationToken cancellationToken)",
    },
    DiagnosticDescriptor {
        id: DiagnosticId::CancellationTokenPrivateOptional,
        title: "Cancellation token parameter of a private member should be optional",
        category: RuleCategory::Style,
        severity: Severity::Warning,
        message: "Make the CancellationToken parameter optional by adding '= default'",
        description: "Private members are only called from code that already has a token in \
                      hand. Defaulting the parameter keeps call sites short.",
        example_bad: "Task Run(CancellationToken cancellationToken)",
        example_good: "Task Run(CancellationToken cancellationToken = default)",
    },
    DiagnosticDescriptor {
        id: DiagnosticId::DroppedTask,
        title: "Task is neither awaited nor captured",
        category: RuleCategory::Correctness,
        severity: Severity::Error,
        message: "Await or capture the returned task",
        description: "A task returned from an invocation used as a statement is dropped. \
                      Exceptions it raises are lost and the caller continues before it completes.",
        example_bad: "DoWorkAsync();",
        example_good: "await DoWorkAsync();",
    },
    DiagnosticDescriptor {
        id: DiagnosticId::CatchAllShouldOmitOperationCanceled,
        title: "Catch-all clause should not handle OperationCanceledException",
        category: RuleCategory::Suspicious,
        severity: Severity::Warning,
        message: "Catch OperationCanceledException first or filter it out with \
                  'when (!(ex is OperationCanceledException))'",
        description: "The try block observes a cancellation token. A catch-all clause swallows \
                      cancellation as if it were an ordinary failure.",
        example_bad: "try { await Work(token); } catch (Exception) { }",
        example_good: "try { await Work(token); } catch (Exception ex) when (!(ex is OperationCanceledException)) { }",
    },
    DiagnosticDescriptor {
        id: DiagnosticId::MustImplementIHandleMessages,
        title: "Message handler must implement Handle",
        category: RuleCategory::Correctness,
        severity: Severity::Error,
        message: "Implement 'Handle({MessageType} message, IMessageHandlerContext context)'",
        description: "A type listing IHandleMessages<T> or IAmStartedByMessages<T> must declare \
                      the matching Handle method.",
        example_bad: "class H : IHandleMessages<OrderPlaced> { }",
        example_good: "class H : IHandleMessages<OrderPlaced>\n{\n    public async Task Handle(OrderPlaced message, IMessageHandlerContext context)\n    {\n    }\n}",
    },
];

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern"));

/// Replace `{Name}` placeholders; unknown names are left as written
pub fn format_message(template: &str, properties: &BTreeMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            properties
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_table_matches_ids() {
        for id in DiagnosticId::ALL {
            assert_eq!(id.descriptor().id, id);
        }
    }

    #[test]
    fn test_default_severities() {
        assert_eq!(DiagnosticId::DroppedTask.descriptor().severity, Severity::Error);
        assert_eq!(
            DiagnosticId::MustImplementIHandleMessages.descriptor().severity,
            Severity::Error
        );
        assert_eq!(
            DiagnosticId::CancellationTokenPrivateOptional.descriptor().severity,
            Severity::Warning
        );
    }

    #[test]
    fn test_id_from_str() {
        assert_eq!("droppedtask".parse::<DiagnosticId>(), Ok(DiagnosticId::DroppedTask));
        assert!("NoSuchRule".parse::<DiagnosticId>().is_err());
    }

    #[test]
    fn test_format_message() {
        let mut props = BTreeMap::new();
        props.insert("MessageType".to_string(), "OrderPlaced".to_string());
        let message = DiagnosticId::MustImplementIHandleMessages
            .descriptor()
            .format_message(&props);
        assert_eq!(
            message,
            "Implement 'Handle(OrderPlaced message, IMessageHandlerContext context)'"
        );
        assert_eq!(format_message("{Missing} x", &props), "{Missing} x");
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Style".parse::<RuleCategory>(), Ok(RuleCategory::Style));
        assert!("perf".parse::<RuleCategory>().is_err());
    }
}
