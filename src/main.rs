//! Tasklint CLI
//!
//! Lints C# files for async and cancellation mistakes and applies fixes.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use glob::glob;
use std::path::{Path, PathBuf};
use tasklint::config::{ColorMode, Config, FileFilter, OutputFormat};
use tasklint::engine::{Engine, LintResult};
use tasklint::fixes::fix_safety;
use tasklint::output::{formatter, unified_diff};
use tasklint::rule::{DiagnosticId, DESCRIPTORS};

#[derive(Parser)]
#[command(
    name = "tasklint",
    version,
    about = "Async and cancellation linter for C#",
    long_about = "Finds dropped tasks, misplaced cancellation tokens, catch-all clauses that \
                  swallow cancellation and incomplete message handlers, and fixes what it can."
)]
struct Cli {
    /// Files, directories or glob patterns to lint
    files: Vec<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Disable specific rules (comma-separated)
    #[arg(long, value_delimiter = ',')]
    disable: Option<Vec<String>>,

    /// Only enable specific rules (comma-separated)
    #[arg(long, value_delimiter = ',')]
    select: Option<Vec<String>>,

    /// Apply fixes and print a diff of the changes
    #[arg(long)]
    fix: bool,

    /// With --fix, write fixed files instead of printing a diff
    #[arg(long, requires = "fix")]
    write: bool,

    /// Also apply fixes that may break callers
    #[arg(long)]
    unsafe_fixes: bool,

    /// Maximum fix iterations per file
    #[arg(long)]
    max_iterations: Option<usize>,

    /// List available rules and exit
    #[arg(long)]
    list_rules: bool,

    /// Explain a rule and exit
    #[arg(long, value_name = "RULE")]
    explain: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }
    }
}

fn list_rules() {
    println!("{:<40} {:<12} {:<8} {}", "Rule", "Category", "Fix", "Title");
    println!("{}", "-".repeat(100));
    for d in &DESCRIPTORS {
        let fix = fix_safety(d.id).map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
        println!("{:<40} {:<12} {:<8} {}", d.id.as_str(), d.category, fix, d.title);
    }
}

fn explain(rule: &str) -> Result<()> {
    let id: DiagnosticId = rule.parse().map_err(anyhow::Error::msg)?;
    let d = id.descriptor();
    println!("{} {}", d.id.as_str().cyan().bold(), d.title);
    println!();
    println!("Category: {}", d.category);
    println!("Severity: {}", d.severity);
    if let Some(safety) = fix_safety(id) {
        println!("Fix:      {}", safety);
    }
    println!();
    println!("{}", d.description);
    println!();
    println!("{}", "Bad:".red().bold());
    for line in d.example_bad.lines() {
        println!("    {}", line);
    }
    println!("{}", "Good:".green().bold());
    for line in d.example_good.lines() {
        println!("    {}", line);
    }
    Ok(())
}

/// Expand patterns into files; directories are searched recursively
fn collect_files(patterns: &[String], filter: &FileFilter) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_dir() {
            let nested = path.join("**").join("*.cs");
            let nested = nested.to_string_lossy();
            for entry in glob(&nested)
                .with_context(|| format!("Invalid pattern '{}'", nested))?
                .flatten()
            {
                if entry.is_file() && filter.matches(&entry) {
                    files.push(entry);
                }
            }
            continue;
        }
        for entry in glob(pattern)
            .with_context(|| format!("Invalid pattern '{}'", pattern))?
            .flatten()
        {
            if entry.is_file() {
                files.push(entry);
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Fix every file; returns the diagnostics left afterwards
fn fix(engine: &Engine, files: &[PathBuf], write: bool) -> Result<LintResult> {
    let mut remaining = LintResult::default();
    for report in engine.fix(files) {
        let report = match report {
            Ok(report) => report,
            Err(e) => {
                remaining.merge(LintResult::from_error(e));
                continue;
            }
        };
        if report.changed() {
            if write {
                std::fs::write(&report.path, &report.outcome.text)
                    .with_context(|| format!("Failed to write {}", report.path.display()))?;
                eprintln!(
                    "{} {} ({} fix(es))",
                    "Fixed".green().bold(),
                    report.path.display(),
                    report.outcome.applied.len()
                );
            } else {
                print!(
                    "{}",
                    unified_diff(&report.path, &report.original, &report.outcome.text)
                );
            }
        }
        remaining.merge(engine.remaining(&report));
    }
    Ok(remaining)
}

fn run(cli: Cli) -> Result<i32> {
    if cli.list_rules {
        list_rules();
        return Ok(0);
    }
    if let Some(rule) = &cli.explain {
        explain(rule)?;
        return Ok(0);
    }

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load_default().context("Failed to load config")?,
    };
    config.merge_cli(
        cli.format.map(Into::into),
        cli.verbose.then_some(true),
        cli.jobs,
        cli.disable.clone(),
        cli.select.clone(),
    );
    if cli.unsafe_fixes {
        config.fix.unsafe_fixes = true;
    }
    if let Some(max) = cli.max_iterations {
        config.engine.max_fix_iterations = max;
    }
    config.validate()?;

    let colored = !cli.no_color && config.output.color != ColorMode::Never;
    colored::control::set_override(colored);

    if cli.files.is_empty() {
        bail!("No files given");
    }
    let files = collect_files(&cli.files, &config.file_filter()?)?;
    if files.is_empty() {
        bail!("No files found to lint");
    }
    if config.output.verbose {
        eprintln!("Linting {} files...", files.len());
    }

    let output = formatter(config.output.format, colored, config.output.verbose);
    let engine = Engine::new(config)?;

    let result = if cli.fix {
        fix(&engine, &files, cli.write)?
    } else {
        engine.lint(&files)
    };
    print!("{}", output.format(&result));
    Ok(result.exit_code())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            std::process::exit(2);
        }
    }
}
