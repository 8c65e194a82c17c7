//! Engine configuration.
//!
//! Sources are merged lowest to highest: built-in defaults, the JSON config
//! file (`--config`), environment variables prefixed `TI_`, explicit CLI
//! flags. The file shape mirrors the wire casing:
//!
//! ```json
//! {
//!     "projects": {
//!         "include": ["*"],
//!         "exclude": ["*.Legacy"],
//!         "testProjectsOnly": true
//!     },
//!     "analysis": {
//!         "maxParallelism": 8,
//!         "timeoutSeconds": 300,
//!         "maxDepth": 20,
//!         "edgeBudget": 50000,
//!         "batchSeconds": 300,
//!         "nameHeuristics": true,
//!         "verbose": false
//!     },
//!     "output": { "format": "json", "outputDirectory": "out" }
//! }
//! ```
//!
//! Unknown keys are ignored so older binaries accept newer files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display, strum_macros::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectsConfig {
    /// Glob patterns matched against project names. Default admits all.
    pub include: Vec<String>,

    /// Glob patterns removing projects after `include`; exclusion wins.
    pub exclude: Vec<String>,

    /// When true, the test classifier's name-convention rule only applies
    /// inside projects recognized as test projects.
    pub test_projects_only: bool,
}

impl Default for ProjectsConfig {
    fn default() -> Self {
        Self {
            include: vec!["*".to_string()],
            exclude: vec![],
            test_projects_only: true,
        }
    }
}

impl ProjectsConfig {
    /// Whether a project with this name participates in analysis.
    /// Exclusion patterns take precedence over inclusion.
    pub fn admits(&self, project: &str) -> bool {
        let matches = |patterns: &[String]| {
            patterns.iter().any(|p| {
                glob::Pattern::new(p)
                    .map(|p| p.matches(project))
                    .unwrap_or(false)
            })
        };
        matches(&self.include) && !matches(&self.exclude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisConfig {
    /// Worker-pool ceiling; the effective pool is `min(CPUs, this)`.
    pub max_parallelism: usize,

    /// Per-project parse budget, seconds.
    pub timeout_seconds: u64,

    /// Per-test coverage traversal budget, seconds.
    pub coverage_timeout_seconds: u64,

    /// Per-plan-query budget, seconds.
    pub plan_timeout_seconds: u64,

    /// Depth bound for coverage traversal.
    pub max_depth: usize,

    /// Per-test edge budget for coverage traversal.
    pub edge_budget: usize,

    /// Per-batch estimated-duration cap, seconds.
    pub batch_seconds: u64,

    /// Enables the secondary name-convention test classifier rule.
    pub name_heuristics: bool,

    pub verbose: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_parallelism: num_cpus::get(),
            timeout_seconds: 300,
            coverage_timeout_seconds: 30,
            plan_timeout_seconds: 60,
            max_depth: 20,
            edge_budget: 50_000,
            batch_seconds: 300,
            name_heuristics: true,
            verbose: false,
        }
    }
}

impl AnalysisConfig {
    pub fn effective_parallelism(&self) -> usize {
        num_cpus::get().min(self.max_parallelism).max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub output_directory: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Json,
            output_directory: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub projects: ProjectsConfig,
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load the file layer. A missing file is an error; an unreadable value
    /// inside it is reported with its key.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))
    }

    /// Apply the `TI_*` environment layer on top of `self`.
    ///
    /// Recognized variables: `TI_PROJECTS_INCLUDE`, `TI_PROJECTS_EXCLUDE`
    /// (comma-separated), `TI_TEST_PROJECTS_ONLY`, `TI_MAX_PARALLELISM`,
    /// `TI_TIMEOUT_SECONDS`, `TI_MAX_DEPTH`, `TI_EDGE_BUDGET`,
    /// `TI_BATCH_SECONDS`, `TI_NAME_HEURISTICS`, `TI_VERBOSE`,
    /// `TI_OUTPUT_FORMAT`, `TI_OUTPUT_DIRECTORY`.
    pub fn apply_env(&mut self, vars: impl Iterator<Item = (String, String)>) -> Result<()> {
        for (key, value) in vars {
            match key.as_str() {
                "TI_PROJECTS_INCLUDE" => {
                    self.projects.include = split_list(&value);
                }
                "TI_PROJECTS_EXCLUDE" => {
                    self.projects.exclude = split_list(&value);
                }
                "TI_TEST_PROJECTS_ONLY" => {
                    self.projects.test_projects_only = parse_bool(&key, &value)?;
                }
                "TI_MAX_PARALLELISM" => {
                    self.analysis.max_parallelism = parse_num(&key, &value)?;
                }
                "TI_TIMEOUT_SECONDS" => {
                    self.analysis.timeout_seconds = parse_num(&key, &value)?;
                }
                "TI_MAX_DEPTH" => {
                    self.analysis.max_depth = parse_num(&key, &value)?;
                }
                "TI_EDGE_BUDGET" => {
                    self.analysis.edge_budget = parse_num(&key, &value)?;
                }
                "TI_BATCH_SECONDS" => {
                    self.analysis.batch_seconds = parse_num(&key, &value)?;
                }
                "TI_NAME_HEURISTICS" => {
                    self.analysis.name_heuristics = parse_bool(&key, &value)?;
                }
                "TI_VERBOSE" => {
                    self.analysis.verbose = parse_bool(&key, &value)?;
                }
                "TI_OUTPUT_FORMAT" => {
                    self.output.format = value
                        .parse()
                        .map_err(|_| EngineError::Config(format!("{key}: unknown format '{value}'")))?;
                }
                "TI_OUTPUT_DIRECTORY" => {
                    self.output.output_directory = Some(PathBuf::from(value));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Full precedence chain for the CLI: defaults, then the optional file,
    /// then the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut config = match file {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env(std::env::vars())?;
        Ok(config)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EngineError::Config(format!("{key}: expected a boolean, got '{value}'"))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| EngineError::Config(format!("{key}: expected a number, got '{value}'")))
}
