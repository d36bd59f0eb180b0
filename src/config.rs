//! Configuration
//!
//! Reads configuration from:
//! - `.tasklint.yaml` / `.tasklint.yml` / `.tasklint.json` (project-level)
//! - the same names in the home directory (user-level)
//!
//! Command-line flags are merged on top with [`Config::merge_cli`].

use crate::compiler::LanguageFeatures;
use crate::diagnostic::Severity;
use crate::rule::{DiagnosticId, RuleCategory};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_NAMES: [&str; 3] = [".tasklint.yaml", ".tasklint.yml", ".tasklint.json"];

/// Default cap on fix iterations per file
pub const DEFAULT_MAX_FIX_ITERATIONS: usize = 64;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lint files in parallel
    pub parallel: bool,

    /// Number of parallel jobs (0 = one per CPU)
    pub jobs: usize,

    /// Fix iterations per file before giving up
    pub max_fix_iterations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            jobs: 0,
            max_fix_iterations: DEFAULT_MAX_FIX_ITERATIONS,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub color: ColorMode,
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// File selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*.cs".to_string()],
            exclude: vec![
                "**/obj/**".to_string(),
                "**/bin/**".to_string(),
                "**/*.g.cs".to_string(),
                "**/*.Designer.cs".to_string(),
            ],
        }
    }
}

/// Rule selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Disabled rules
    pub disabled: Vec<String>,

    /// Enabled rules (empty = all)
    pub enabled: Vec<String>,

    /// Categories to run (empty = all)
    pub categories: Vec<String>,

    /// Severity overrides (rule id -> severity)
    pub severity: HashMap<String, Severity>,

    /// Per-file rule ignores (glob pattern -> rule ids, or `all`)
    pub per_file: HashMap<String, Vec<String>>,
}

/// Fix settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixConfig {
    /// Also apply fixes that may break callers
    pub unsafe_fixes: bool,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Other configuration files to layer underneath this one
    pub extends: Vec<String>,

    pub engine: EngineConfig,
    pub output: OutputConfig,
    pub files: FilesConfig,
    pub rules: RulesConfig,
    pub language: LanguageFeatures,
    pub fix: FixConfig,

    /// Extra reference stub files (C# declarations) bound into every file
    pub references: Vec<PathBuf>,
}

fn same_rule(written: &str, id: DiagnosticId) -> bool {
    written.eq_ignore_ascii_case(id.as_str())
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_depth(path, 0)
    }

    fn load_with_depth(path: &Path, depth: usize) -> Result<Self, ConfigError> {
        const MAX_DEPTH: usize = 10;
        if depth >= MAX_DEPTH {
            return Err(ConfigError::Invalid(
                "Maximum config inheritance depth exceeded".to_string(),
            ));
        }

        let content = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let mut config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };

        let base_dir = path.parent().unwrap_or(Path::new("."));
        config.references = config
            .references
            .iter()
            .map(|r| if r.is_absolute() { r.clone() } else { base_dir.join(r) })
            .collect();

        if !config.extends.is_empty() {
            let mut base = Self::default();
            for extend in &config.extends {
                let extend_path = if Path::new(extend).is_absolute() {
                    PathBuf::from(extend)
                } else {
                    base_dir.join(extend)
                };
                base.merge(Self::load_with_depth(&extend_path, depth + 1)?);
            }
            base.merge(config);
            config = base;
        }

        config.validate()?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        if other.engine.jobs != 0 {
            self.engine.jobs = other.engine.jobs;
        }
        self.engine.parallel = other.engine.parallel;
        if other.engine.max_fix_iterations != DEFAULT_MAX_FIX_ITERATIONS {
            self.engine.max_fix_iterations = other.engine.max_fix_iterations;
        }

        if other.output.format != OutputFormat::Text {
            self.output.format = other.output.format;
        }
        if other.output.verbose {
            self.output.verbose = true;
        }
        if other.output.color != ColorMode::Auto {
            self.output.color = other.output.color;
        }

        if other.files != FilesConfig::default() {
            self.files = other.files;
        }

        self.rules.disabled.extend(other.rules.disabled);
        if !other.rules.enabled.is_empty() {
            self.rules.enabled = other.rules.enabled;
        }
        if !other.rules.categories.is_empty() {
            self.rules.categories = other.rules.categories;
        }
        self.rules.severity.extend(other.rules.severity);
        for (pattern, rules) in other.rules.per_file {
            self.rules.per_file.entry(pattern).or_default().extend(rules);
        }

        if other.language != LanguageFeatures::default() {
            self.language = other.language;
        }
        if other.fix.unsafe_fixes {
            self.fix.unsafe_fixes = true;
        }
        self.references.extend(other.references);
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        for name in &CONFIG_NAMES {
            let path = PathBuf::from(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            for name in &CONFIG_NAMES {
                let path = home.join(name);
                if path.exists() {
                    return Self::load(&path);
                }
            }
        }

        Ok(Self::default())
    }

    /// Merge CLI arguments into configuration
    pub fn merge_cli(
        &mut self,
        format: Option<OutputFormat>,
        verbose: Option<bool>,
        jobs: Option<usize>,
        disabled_rules: Option<Vec<String>>,
        enabled_rules: Option<Vec<String>>,
    ) {
        if let Some(f) = format {
            self.output.format = f;
        }
        if let Some(v) = verbose {
            self.output.verbose = v;
        }
        if let Some(j) = jobs {
            self.engine.jobs = j;
        }
        if let Some(disabled) = disabled_rules {
            self.rules.disabled.extend(disabled);
        }
        if let Some(enabled) = enabled_rules {
            self.rules.enabled = enabled;
        }
    }

    /// Reject unknown rule ids and categories
    pub fn validate(&self) -> Result<(), ConfigError> {
        let per_file = self.rules.per_file.values().flatten().filter(|r| *r != "all");
        let severity = self.rules.severity.keys();
        for written in self
            .rules
            .disabled
            .iter()
            .chain(&self.rules.enabled)
            .chain(per_file)
            .chain(severity)
        {
            written.parse::<DiagnosticId>().map_err(ConfigError::Invalid)?;
        }
        for category in &self.rules.categories {
            category.parse::<RuleCategory>().map_err(ConfigError::Invalid)?;
        }
        if self.engine.max_fix_iterations == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_fix_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Check if a rule is enabled
    pub fn is_rule_enabled(&self, id: DiagnosticId) -> bool {
        if self.rules.disabled.iter().any(|r| same_rule(r, id)) {
            return false;
        }
        if !self.rules.enabled.is_empty() && !self.rules.enabled.iter().any(|r| same_rule(r, id)) {
            return false;
        }
        if !self.rules.categories.is_empty() {
            let category = id.descriptor().category;
            return self
                .rules
                .categories
                .iter()
                .any(|c| c.parse::<RuleCategory>() == Ok(category));
        }
        true
    }

    /// Get severity override for a rule
    pub fn severity_override(&self, id: DiagnosticId) -> Option<Severity> {
        self.rules
            .severity
            .iter()
            .find(|(r, _)| same_rule(r, id))
            .map(|(_, s)| *s)
    }

    /// Check if a rule should be ignored for a file
    pub fn should_ignore_rule_for_file(&self, id: DiagnosticId, file_path: &Path) -> bool {
        let file_str = file_path.to_string_lossy();

        for (pattern, rules) in &self.rules.per_file {
            if let Ok(glob) = Glob::new(pattern) {
                let matcher = glob.compile_matcher();
                if matcher.is_match(file_str.as_ref())
                    && rules.iter().any(|r| r == "all" || same_rule(r, id))
                {
                    return true;
                }
            }
        }

        false
    }

    /// Rules that run on `file_path`
    pub fn rules_for_file(&self, file_path: &Path) -> Vec<DiagnosticId> {
        DiagnosticId::ALL
            .into_iter()
            .filter(|id| self.is_rule_enabled(*id))
            .filter(|id| !self.should_ignore_rule_for_file(*id, file_path))
            .collect()
    }

    /// Compiled include/exclude patterns
    pub fn file_filter(&self) -> Result<FileFilter, ConfigError> {
        Ok(FileFilter {
            include: build_globset(&self.files.include)?,
            exclude: build_globset(&self.files.exclude)?,
        })
    }

    /// Read the configured reference stubs as (name, text) pairs
    pub fn load_references(&self) -> Result<Vec<(String, String)>, ConfigError> {
        self.references
            .iter()
            .map(|path| {
                let text = std::fs::read_to_string(path)?;
                Ok((path.display().to_string(), text))
            })
            .collect()
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| ConfigError::Invalid(format!("bad pattern '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ConfigError::Invalid(e.to_string()))
}

/// Include/exclude matcher for discovered files
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl FileFilter {
    pub fn matches(&self, path: &Path) -> bool {
        (self.include.is_empty() || self.include.is_match(path)) && !self.exclude.is_match(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::new();
        assert!(config.engine.parallel);
        assert_eq!(config.engine.jobs, 0);
        assert_eq!(config.engine.max_fix_iterations, 64);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert_eq!(config.language, LanguageFeatures::latest());
        assert!(!config.fix.unsafe_fixes);
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_config_merge_cli() {
        let mut config = Config::new();
        config.merge_cli(
            Some(OutputFormat::Json),
            Some(true),
            Some(4),
            Some(vec!["DroppedTask".to_string()]),
            None,
        );

        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.verbose);
        assert_eq!(config.engine.jobs, 4);
        assert!(!config.is_rule_enabled(DiagnosticId::DroppedTask));
    }

    #[test]
    fn test_rule_enabled() {
        let mut config = Config::new();
        assert!(config.is_rule_enabled(DiagnosticId::DroppedTask));

        config.rules.disabled.push("droppedtask".to_string());
        assert!(!config.is_rule_enabled(DiagnosticId::DroppedTask));
        assert!(config.is_rule_enabled(DiagnosticId::MustImplementIHandleMessages));

        config.rules.enabled = vec!["CancellationTokenPrivateOptional".to_string()];
        assert!(!config.is_rule_enabled(DiagnosticId::MustImplementIHandleMessages));
        assert!(config.is_rule_enabled(DiagnosticId::CancellationTokenPrivateOptional));
    }

    #[test]
    fn test_categories() {
        let mut config = Config::new();
        config.rules.categories = vec!["correctness".to_string()];
        assert!(config.is_rule_enabled(DiagnosticId::DroppedTask));
        assert!(config.is_rule_enabled(DiagnosticId::MustImplementIHandleMessages));
        assert!(!config.is_rule_enabled(DiagnosticId::CancellationTokenPrivateOptional));
        assert!(!config.is_rule_enabled(DiagnosticId::CatchAllShouldOmitOperationCanceled));
    }

    #[test]
    fn test_severity_override() {
        let mut config = Config::new();
        config
            .rules
            .severity
            .insert("DroppedTask".to_string(), Severity::Warning);

        assert_eq!(
            config.severity_override(DiagnosticId::DroppedTask),
            Some(Severity::Warning)
        );
        assert_eq!(config.severity_override(DiagnosticId::MustImplementIHandleMessages), None);
    }

    #[test]
    fn test_per_file_ignores() {
        let mut config = Config::new();
        config
            .rules
            .per_file
            .insert("**/Tests/**".to_string(), vec!["DroppedTask".to_string()]);
        config
            .rules
            .per_file
            .insert("**/Generated.cs".to_string(), vec!["all".to_string()]);

        let test_file = Path::new("src/Tests/OrderTests.cs");
        assert!(config.should_ignore_rule_for_file(DiagnosticId::DroppedTask, test_file));
        assert!(!config.should_ignore_rule_for_file(
            DiagnosticId::MustImplementIHandleMessages,
            test_file
        ));
        assert_eq!(config.rules_for_file(test_file).len(), 4);
        assert!(config.rules_for_file(Path::new("src/Generated.cs")).is_empty());
    }

    #[test]
    fn test_yaml_deserialize() {
        let yaml = r#"
engine:
  parallel: false
  jobs: 4
  max_fix_iterations: 8
output:
  format: json
  verbose: true
rules:
  disabled:
    - DroppedTask
  severity:
    CatchAllShouldOmitOperationCanceled: error
language:
  private_interface_members: false
fix:
  unsafe_fixes: true
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.engine.parallel);
        assert_eq!(config.engine.jobs, 4);
        assert_eq!(config.engine.max_fix_iterations, 8);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.verbose);
        assert_eq!(config.rules.disabled, vec!["DroppedTask"]);
        assert!(!config.language.private_interface_members);
        assert!(config.language.default_interface_methods);
        assert!(config.fix.unsafe_fixes);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_rule() {
        let mut config = Config::new();
        config.rules.disabled.push("NoSuchRule".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_json_with_extends_and_references() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("base.json");
        std::fs::write(&base, r#"{ "rules": { "disabled": ["DroppedTask"] } }"#).unwrap();
        let stubs = dir.path().join("Stubs.cs");
        std::fs::write(&stubs, "namespace Acme { public class Client { } }").unwrap();

        let main = dir.path().join(".tasklint.json");
        let mut file = std::fs::File::create(&main).unwrap();
        write!(
            file,
            r#"{{ "extends": ["base.json"], "references": ["Stubs.cs"], "output": {{ "format": "json" }} }}"#
        )
        .unwrap();

        let config = Config::load(&main).unwrap();
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(!config.is_rule_enabled(DiagnosticId::DroppedTask));
        let references = config.load_references().unwrap();
        assert_eq!(references.len(), 1);
        assert!(references[0].1.contains("class Client"));
    }

    #[test]
    fn test_unknown_extension_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasklint.toml");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_file_filter() {
        let filter = Config::new().file_filter().unwrap();
        assert!(filter.matches(Path::new("src/Orders/Handler.cs")));
        assert!(!filter.matches(Path::new("src/obj/Debug/Gen.cs")));
        assert!(!filter.matches(Path::new("src/View.Designer.cs")));
        assert!(!filter.matches(Path::new("README.md")));
    }
}
