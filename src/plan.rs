//! The plan builder.
//!
//! Takes the scorer's ranked list, applies a confidence level (score
//! floor, max tests, max wall time) plus caller overrides, and partitions
//! the selection into parallel-compatible batches using the conflict
//! graph — greedy colouring in score order, with per-batch caps on size
//! and estimated duration. Plans are immutable once emitted and their
//! JSON form round-trips losslessly.
//!
//! Each plan query walks `Init → Scored → Selected → Batched → Emitted`;
//! the transitions are logged for observability.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::classify::TestCategory;
use crate::datadeps::DependencyReport;
use crate::error::{Phase, Result};
use crate::scoring::TestInfo;

pub const PLAN_VERSION: u32 = 1;

/// User-selected bundle of thresholds and resource budgets.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Fast,
    Medium,
    High,
    Full,
}

impl ConfidenceLevel {
    /// The confidence the plan aims to deliver.
    pub fn target_confidence(self) -> f64 {
        match self {
            ConfidenceLevel::Fast => 0.70,
            ConfidenceLevel::Medium => 0.85,
            ConfidenceLevel::High => 0.95,
            ConfidenceLevel::Full => 0.99,
        }
    }

    pub fn max_wall_time(self) -> Duration {
        match self {
            ConfidenceLevel::Fast => Duration::from_secs(30),
            ConfidenceLevel::Medium => Duration::from_secs(5 * 60),
            ConfidenceLevel::High => Duration::from_secs(15 * 60),
            ConfidenceLevel::Full => Duration::from_secs(60 * 60),
        }
    }

    pub fn max_tests(self) -> Option<usize> {
        match self {
            ConfidenceLevel::Fast => Some(50),
            ConfidenceLevel::Medium => Some(200),
            ConfidenceLevel::High => Some(1000),
            ConfidenceLevel::Full => None,
        }
    }

    /// Selection stops at the first test scoring below this floor.
    pub fn score_floor(self) -> f64 {
        match self {
            ConfidenceLevel::Fast => 0.60,
            ConfidenceLevel::Medium => 0.45,
            ConfidenceLevel::High => 0.25,
            ConfidenceLevel::Full => 0.0,
        }
    }
}

/// Caller overrides on top of the confidence level's defaults.
#[derive(Debug, Clone, Default)]
pub struct PlanOverrides {
    pub max_tests: Option<usize>,
    pub max_duration_ms: Option<u64>,
    pub include_categories: Option<BTreeSet<TestCategory>>,
    pub exclude_categories: BTreeSet<TestCategory>,
    pub max_parallelism: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub tests: Vec<TestInfo>,
    pub estimated_ms: u64,
    pub can_parallelize: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanMetadata {
    /// Coverage paths demoted by mock-aware filtering (§ mock filtering).
    pub demoted_paths: usize,
    pub score_floor: f64,
    pub max_tests: Option<usize>,
    pub max_duration_ms: u64,
    pub max_parallelism: usize,
    /// Tests dropped by category include/exclude filters.
    pub filtered_out: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub confidence: ConfidenceLevel,
    pub tests: Vec<TestInfo>,
    pub batches: Vec<Batch>,
    pub estimated_ms: u64,
    pub metadata: PlanMetadata,
}

pub struct PlanBuilder<'a> {
    pub conflicts: &'a DependencyReport,
    /// Per-batch estimated-duration cap.
    pub batch_ms_cap: u64,
    pub default_parallelism: usize,
    pub demoted_paths: usize,
}

impl<'a> PlanBuilder<'a> {
    /// Build a plan from scored tests (already sorted by score
    /// descending). The clock is injected for determinism.
    pub fn build(
        &self,
        scored: Vec<TestInfo>,
        confidence: ConfidenceLevel,
        overrides: &PlanOverrides,
        created_at: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<ExecutionPlan> {
        debug!(tests = scored.len(), %confidence, "plan: scored");

        let max_tests = overrides.max_tests.or(confidence.max_tests());
        let max_duration_ms = overrides
            .max_duration_ms
            .unwrap_or(confidence.max_wall_time().as_millis() as u64);
        let max_parallelism = overrides
            .max_parallelism
            .unwrap_or(self.default_parallelism)
            .max(1);
        let floor = confidence.score_floor();

        // Selection: category filters, then walk down the ranking.
        let mut filtered_out = 0usize;
        let mut selected: Vec<TestInfo> = Vec::new();
        let mut budget_ms: u64 = 0;
        for info in scored {
            cancel.checkpoint(Phase::Selection)?;
            if overrides.exclude_categories.contains(&info.category) {
                filtered_out += 1;
                continue;
            }
            if let Some(include) = &overrides.include_categories {
                if !include.contains(&info.category) {
                    filtered_out += 1;
                    continue;
                }
            }
            if info.score < floor {
                break;
            }
            if max_tests.is_some_and(|max| selected.len() >= max) {
                break;
            }
            if budget_ms + info.average_ms > max_duration_ms && !selected.is_empty() {
                break;
            }
            budget_ms += info.average_ms;
            selected.push(info);
        }
        debug!(selected = selected.len(), "plan: selected");

        let batches = self.batch(&selected, max_parallelism);
        debug!(batches = batches.len(), "plan: batched");

        let estimated_ms = batches.iter().map(|b| b.estimated_ms).sum();
        let plan = ExecutionPlan {
            version: PLAN_VERSION,
            created_at,
            confidence,
            tests: selected,
            batches,
            estimated_ms,
            metadata: PlanMetadata {
                demoted_paths: self.demoted_paths,
                score_floor: floor,
                max_tests,
                max_duration_ms,
                max_parallelism,
                filtered_out,
            },
        };
        debug!(estimated_ms = plan.estimated_ms, "plan: emitted");
        Ok(plan)
    }

    /// Greedy colouring over the conflict graph, in score order. A test
    /// joins the first batch where it conflicts with nobody and neither
    /// the size nor the duration cap is exceeded.
    fn batch(&self, selected: &[TestInfo], max_parallelism: usize) -> Vec<Batch> {
        struct Building {
            tests: Vec<TestInfo>,
            total_ms: u64,
        }
        let mut building: Vec<Building> = Vec::new();
        for info in selected {
            let slot = building.iter_mut().find(|batch| {
                batch.tests.len() < max_parallelism
                    && batch.total_ms + info.average_ms <= self.batch_ms_cap
                    && batch
                        .tests
                        .iter()
                        .all(|other| self.conflicts.can_parallelize(&other.id, &info.id))
            });
            match slot {
                Some(batch) => {
                    batch.total_ms += info.average_ms;
                    batch.tests.push(info.clone());
                }
                None => building.push(Building {
                    total_ms: info.average_ms,
                    tests: vec![info.clone()],
                }),
            }
        }
        building
            .into_iter()
            .map(|b| {
                let can_parallelize = b.tests.len() > 1;
                let estimated_ms = if can_parallelize {
                    b.tests.iter().map(|t| t.average_ms).max().unwrap_or(0)
                } else {
                    b.total_ms
                };
                Batch {
                    tests: b.tests,
                    estimated_ms,
                    can_parallelize,
                }
            })
            .collect()
    }
}
