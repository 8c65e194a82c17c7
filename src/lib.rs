//! Static test impact analysis for multi-project .NET repositories.
//!
//! Given a source tree, the engine discovers the tests that exist, builds a
//! method-level call graph across every project, inverts that graph into a
//! coverage map from production methods to the tests that transitively
//! exercise them, and scores tests against a change-set to produce a batched
//! execution plan under a selected confidence level.
//!
//! The entry point is [`engine::Engine`]; everything else is reachable from
//! there. A typical session:
//!
//! ```no_run
//! use tia::cancel::CancelToken;
//! use tia::config::Config;
//! use tia::engine::{Engine, InitMode};
//! use tia::plan::ConfidenceLevel;
//!
//! # fn main() -> tia::error::Result<()> {
//! let engine = Engine::initialize("path/to/solution", Config::default(), InitMode::Bulk)?;
//! let discovery = engine.discover_tests(None)?;
//! println!("{} tests", discovery.tests.len());
//!
//! let diff = std::fs::read_to_string("change.diff")?;
//! let plan = engine.analyze_diff_text(&diff, ConfidenceLevel::Medium, &CancelToken::new())?;
//! println!("{}", serde_json::to_string_pretty(&plan)?);
//! engine.dispose();
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod changes;
pub mod classify;
pub mod config;
pub mod coverage;
pub mod datadeps;
pub mod engine;
pub mod error;
pub mod graph;
pub mod plan;
pub mod progress;
pub mod scoring;
pub mod symbols;
pub mod syntax;
pub mod workspace;

#[cfg(test)]
mod test_utils;

pub use engine::{Engine, InitMode};
pub use error::{EngineError, Result};
