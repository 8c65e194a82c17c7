//! The `tia` CLI: one verb per primary engine operation.
//!
//! Exit codes: `0` success, `1` user error, `2` partial success with
//! errors, `3` cancellation/timeout, `64` unexpected internal error.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use tia::cancel::CancelToken;
use tia::changes::{parse_unified_diff, ChangeSet};
use tia::config::{Config, OutputFormat};
use tia::engine::{DiffInput, Engine, InitMode};
use tia::error::{EngineError, Result};
use tia::plan::{ConfidenceLevel, PlanOverrides};
use tia::scoring::HistoryMap;

/// Wire-model version stamped onto every JSON payload that doesn't carry
/// its own.
const WIRE_VERSION: u32 = 1;

#[derive(Parser)]
#[command(name = "tia", version, about = "Test impact analysis for .NET repositories")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Solution root to analyze.
    #[arg(long, global = true, default_value = ".")]
    solution: PathBuf,

    /// Write output to a file instead of stdout.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Output format: json or text.
    #[arg(long, global = true)]
    format: Option<String>,

    #[arg(long, global = true)]
    verbose: bool,

    /// JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Discover the tests in the workspace.
    Discover {
        /// Case-insensitive substring filter over test ids.
        #[arg(long)]
        filter: Option<String>,
    },
    /// Discovered tests grouped by category.
    Categorize,
    /// Full pipeline: parse a diff, score, and emit an execution plan.
    Analyze {
        /// Unified diff file; `-` reads stdin.
        #[arg(long)]
        diff: PathBuf,
        #[arg(long, default_value = "medium")]
        confidence: String,
        /// Execution-history JSON file.
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Score tests against a diff without building a plan.
    Impact {
        #[arg(long)]
        diff: PathBuf,
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Parse a diff and print the recovered change-set.
    Diff {
        #[arg(long)]
        diff: PathBuf,
    },
    /// Build a plan from a structured change-set file.
    Plan {
        /// JSON change-set file.
        #[arg(long)]
        changes: PathBuf,
        #[arg(long, default_value = "medium")]
        confidence: String,
        #[arg(long)]
        history: Option<PathBuf>,
        #[arg(long)]
        max_tests: Option<usize>,
        #[arg(long)]
        max_seconds: Option<u64>,
        #[arg(long)]
        max_parallelism: Option<usize>,
        /// Categories to exclude, comma-separated.
        #[arg(long)]
        exclude: Option<String>,
    },
    /// Tests exercising one method.
    FindTests {
        #[arg(long)]
        method: String,
    },
    /// The full production-method → tests map.
    CoverageMap,
    /// Coverage statistics.
    Stats,
    /// Shared and exclusive coverage of two tests.
    CompareTests {
        #[arg(long)]
        test1: String,
        #[arg(long)]
        test2: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;
    if cli.verbose {
        config.analysis.verbose = true;
    }
    if let Some(format) = &cli.format {
        config.output.format = format
            .parse()
            .map_err(|_| EngineError::InvalidInput(format!("unknown format '{format}'")))?;
    }

    let engine = Engine::initialize(&cli.solution, config.clone(), InitMode::Bulk)?;
    let cancel = CancelToken::new();
    let format = config.output.format;
    let out_path = cli
        .output
        .clone()
        .or_else(|| {
            config
                .output
                .output_directory
                .as_ref()
                .map(|dir| dir.join("tia-output.json"))
        });

    let rendered = execute(&engine, &cli.command, &cancel, format)?;
    match &out_path {
        Some(path) => std::fs::write(path, rendered)?,
        None => println!("{rendered}"),
    }

    if engine.parse_failures().is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        // Results were produced, but some files were excluded.
        Ok(ExitCode::from(2))
    }
}

fn execute(
    engine: &Engine,
    command: &Command,
    cancel: &CancelToken,
    format: OutputFormat,
) -> Result<String> {
    match command {
        Command::Discover { filter } => {
            let result = engine.discover_tests(filter.as_deref())?;
            match format {
                OutputFormat::Json => versioned(&result),
                OutputFormat::Text => {
                    let mut text = String::new();
                    for test in &result.tests {
                        text.push_str(&format!(
                            "{}  [{} {} {:.2}]\n",
                            test.id, test.framework, test.category, test.confidence
                        ));
                    }
                    text.push_str(&format!("{} tests\n", result.summary.total));
                    Ok(text)
                }
            }
        }
        Command::Categorize => {
            let result = engine.discover_tests(None)?;
            match format {
                OutputFormat::Json => versioned(&result.summary),
                OutputFormat::Text => {
                    let mut text = String::new();
                    for (category, count) in &result.summary.by_category {
                        text.push_str(&format!("{category}: {count}\n"));
                    }
                    Ok(text)
                }
            }
        }
        Command::Analyze {
            diff,
            confidence,
            history,
        } => {
            let diff_text = read_input(diff)?;
            let plan = engine.analyze_diff_at(
                DiffInput::Unified(&diff_text),
                parse_confidence(confidence)?,
                &PlanOverrides::default(),
                &load_history(history.as_deref())?,
                chrono::Utc::now(),
                cancel,
            )?;
            match format {
                OutputFormat::Json => to_json(&plan),
                OutputFormat::Text => Ok(render_plan(&plan)),
            }
        }
        Command::Impact { diff, history } => {
            let diff_text = read_input(diff)?;
            // Score at the Full level so nothing is cut from the listing.
            let plan = engine.analyze_diff_at(
                DiffInput::Unified(&diff_text),
                ConfidenceLevel::Full,
                &PlanOverrides::default(),
                &load_history(history.as_deref())?,
                chrono::Utc::now(),
                cancel,
            )?;
            match format {
                OutputFormat::Json => versioned(&plan.tests),
                OutputFormat::Text => {
                    let mut text = String::new();
                    for test in &plan.tests {
                        text.push_str(&format!("{:.3}  {}\n", test.score, test.id));
                    }
                    Ok(text)
                }
            }
        }
        Command::Diff { diff } => {
            let diff_text = read_input(diff)?;
            let parsed = parse_unified_diff(&diff_text);
            match format {
                OutputFormat::Json => versioned(&json!({
                    "changeSet": parsed.change_set,
                    "warnings": parsed.warnings,
                })),
                OutputFormat::Text => {
                    let mut text = String::new();
                    for change in &parsed.change_set.changes {
                        text.push_str(&format!(
                            "{} {} ({} methods, {} types)\n",
                            change.kind,
                            change.file.display(),
                            change.changed_methods.len(),
                            change.changed_types.len()
                        ));
                    }
                    for warning in &parsed.warnings {
                        text.push_str(&format!("warning: {warning}\n"));
                    }
                    Ok(text)
                }
            }
        }
        Command::Plan {
            changes,
            confidence,
            history,
            max_tests,
            max_seconds,
            max_parallelism,
            exclude,
        } => {
            let text = read_input(changes)?;
            let change_set: ChangeSet = serde_json::from_str(&text)
                .map_err(|e| EngineError::InvalidInput(format!("change-set file: {e}")))?;
            let mut overrides = PlanOverrides {
                max_tests: *max_tests,
                max_duration_ms: max_seconds.map(|s| s * 1_000),
                max_parallelism: *max_parallelism,
                ..Default::default()
            };
            if let Some(exclude) = exclude {
                overrides.exclude_categories = parse_categories(exclude)?;
            }
            let plan = engine.analyze_diff_at(
                DiffInput::Structured(change_set),
                parse_confidence(confidence)?,
                &overrides,
                &load_history(history.as_deref())?,
                chrono::Utc::now(),
                cancel,
            )?;
            match format {
                OutputFormat::Json => to_json(&plan),
                OutputFormat::Text => Ok(render_plan(&plan)),
            }
        }
        Command::FindTests { method } => {
            let entries = engine.tests_exercising_method(method, cancel)?;
            match format {
                OutputFormat::Json => versioned(&entries),
                OutputFormat::Text => {
                    let mut text = String::new();
                    for entry in &entries {
                        text.push_str(&format!(
                            "{:.2}  {}{}\n",
                            entry.confidence,
                            entry.test,
                            if entry.mocked { "  (mocked)" } else { "" }
                        ));
                    }
                    if entries.is_empty() {
                        text.push_str("no covering tests\n");
                    }
                    Ok(text)
                }
            }
        }
        Command::CoverageMap => {
            let coverage = engine.build_coverage_map(cancel)?;
            let map: std::collections::BTreeMap<String, Vec<&tia::coverage::CoverageEntry>> =
                coverage
                    .covered_methods()
                    .map(|m| (m.to_string(), coverage.tests_covering(m).iter().collect()))
                    .collect();
            match format {
                OutputFormat::Json => versioned(&map),
                OutputFormat::Text => {
                    let mut text = String::new();
                    for (method, entries) in &map {
                        text.push_str(&format!("{method}\n"));
                        for entry in entries {
                            text.push_str(&format!("  {:.2}  {}\n", entry.confidence, entry.test));
                        }
                    }
                    Ok(text)
                }
            }
        }
        Command::Stats => {
            let stats = engine.coverage_statistics(cancel)?;
            match format {
                OutputFormat::Json => versioned(&stats),
                OutputFormat::Text => Ok(format!(
                    "methods: {}\ncovered: {}\ntests: {}\nrelationships: {}\n",
                    stats.total_methods,
                    stats.covered_methods,
                    stats.total_tests,
                    stats.total_relationships
                )),
            }
        }
        Command::CompareTests { test1, test2 } => {
            let comparison = engine.compare_tests(test1, test2, cancel)?;
            match format {
                OutputFormat::Json => versioned(&comparison),
                OutputFormat::Text => Ok(format!(
                    "shared: {}\nonly {}: {}\nonly {}: {}\nparallel-safe: {}\n",
                    comparison.shared.len(),
                    comparison.test_a,
                    comparison.only_a.len(),
                    comparison.test_b,
                    comparison.only_b.len(),
                    comparison.can_parallelize
                )),
            }
        }
    }
}

fn versioned<T: Serialize>(value: &T) -> Result<String> {
    let payload = json!({
        "version": WIRE_VERSION,
        "data": value,
    });
    Ok(serde_json::to_string_pretty(&payload)?)
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn render_plan(plan: &tia::plan::ExecutionPlan) -> String {
    let mut text = String::new();
    text.push_str(&format!(
        "plan: {} tests, {} batches, ~{}s, confidence {}\n",
        plan.tests.len(),
        plan.batches.len(),
        plan.estimated_ms / 1_000,
        plan.confidence
    ));
    for (i, batch) in plan.batches.iter().enumerate() {
        text.push_str(&format!(
            "batch {}: {} tests, ~{}s{}\n",
            i + 1,
            batch.tests.len(),
            batch.estimated_ms / 1_000,
            if batch.can_parallelize { ", parallel" } else { "" }
        ));
        for test in &batch.tests {
            text.push_str(&format!("  {:.3}  {}\n", test.score, test.id));
        }
    }
    if plan.metadata.demoted_paths > 0 {
        text.push_str(&format!(
            "note: {} mock-demoted coverage paths excluded\n",
            plan.metadata.demoted_paths
        ));
    }
    text
}

fn load_history(path: Option<&Path>) -> Result<HistoryMap> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str(&text)
                .map_err(|e| EngineError::InvalidInput(format!("history file: {e}")))
        }
        None => Ok(HistoryMap::new()),
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

fn parse_confidence(raw: &str) -> Result<ConfidenceLevel> {
    raw.parse()
        .map_err(|_| EngineError::InvalidInput(format!("unknown confidence level '{raw}'")))
}

fn parse_categories(raw: &str) -> Result<BTreeSet<tia::classify::TestCategory>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| EngineError::InvalidInput(format!("unknown category '{s}'")))
        })
        .collect()
}
