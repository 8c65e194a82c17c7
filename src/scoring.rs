//! The impact scorer.
//!
//! Combines four signals into a score in `[0, 1]` per known test:
//!
//! | signal     | weight | source                                        |
//! |------------|--------|-----------------------------------------------|
//! | impact     | 0.40   | best coverage-path confidence to a changed method, `+0.1` for a direct unit-test path |
//! | historical | 0.25   | recent failures boost; flaky tests are damped  |
//! | cost       | 0.20   | prefers fast tests at equal impact             |
//! | category   | 0.15   | category-conditional prior for the change      |
//!
//! The weights are fixed so that a direct-path unit test on a touched
//! method always outranks a category-prior boost alone. Scoring is pure:
//! the clock is an input, so the same change-set scored twice yields the
//! same numbers, and a test with no history never affects any other
//! test's score.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::changes::ChangeSet;
use crate::classify::{TestCategory, TestEntry};
use crate::coverage::CoverageMap;
use crate::error::{Phase, Result};
use crate::symbols::{MethodId, SymbolIndex};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub at: DateTime<Utc>,
    pub passed: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestHistory {
    pub average_ms: Option<u64>,
    #[serde(default)]
    pub runs: Vec<ExecutionRecord>,
}

pub type HistoryMap = BTreeMap<MethodId, TestHistory>;

/// A scored test: the classifier's entry plus runtime metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestInfo {
    pub id: MethodId,
    pub framework: crate::classify::TestFramework,
    pub category: TestCategory,
    pub classification_confidence: f64,
    pub average_ms: u64,
    /// Production methods this test exercises.
    pub dependencies: BTreeSet<MethodId>,
    pub tags: BTreeSet<String>,
    pub priority: i32,
    pub score: f64,
}

/// Expected duration when no history exists, per category.
pub fn default_duration_ms(category: TestCategory) -> u64 {
    match category {
        TestCategory::Unit => 1_000,
        TestCategory::Security => 5_000,
        TestCategory::Api => 10_000,
        TestCategory::Database => 15_000,
        TestCategory::Integration => 30_000,
        TestCategory::Ui => 60_000,
        TestCategory::EndToEnd => 120_000,
        TestCategory::Performance => 120_000,
    }
}

/// Duration budget the cost signal normalizes against, per category.
fn duration_budget_ms(category: TestCategory) -> u64 {
    match category {
        TestCategory::Unit => 5_000,
        TestCategory::Security => 30_000,
        TestCategory::Api => 60_000,
        TestCategory::Database => 60_000,
        TestCategory::Integration => 120_000,
        TestCategory::Ui => 300_000,
        TestCategory::EndToEnd => 600_000,
        TestCategory::Performance => 600_000,
    }
}

/// `(test category, trigger substrings in changed file/type names, bonus)`.
const CATEGORY_PRIORS: &[(TestCategory, &[&str], f64)] = &[
    (
        TestCategory::Database,
        &["repository", "dbcontext", "migration", "entity"],
        0.70,
    ),
    (TestCategory::Api, &["controller", "endpoint", "route"], 0.80),
    (
        TestCategory::Security,
        &["auth", "security", "credential", "token", "permission"],
        0.90,
    ),
];

pub struct ImpactScorer<'a> {
    pub coverage: &'a CoverageMap,
    pub index: &'a SymbolIndex,
    pub history: &'a HistoryMap,
    /// The clock is injected for deterministic scoring.
    pub now: DateTime<Utc>,
}

/// The change-set resolved against the symbol index.
#[derive(Debug, Default)]
pub struct ResolvedChanges {
    pub methods: BTreeSet<MethodId>,
    pub type_names: BTreeSet<String>,
    pub file_names: Vec<String>,
    pub has_configuration: bool,
}

impl<'a> ImpactScorer<'a> {
    /// Map diff-recovered names onto known MethodIds. Full ids pass
    /// through; bare names match methods of that name defined in the
    /// changed file.
    pub fn resolve_changes(&self, change_set: &ChangeSet) -> ResolvedChanges {
        let mut resolved = ResolvedChanges {
            file_names: change_set.changed_files(),
            has_configuration: change_set.has_configuration_change(),
            ..Default::default()
        };
        for change in &change_set.changes {
            for ty in &change.changed_types {
                resolved.type_names.insert(ty.clone());
            }
            for name in &change.changed_methods {
                if name.contains('(') {
                    resolved.methods.insert(MethodId::new(name.clone()));
                    continue;
                }
                for node in self.index.methods() {
                    if node.id.method_name() == name && paths_match(&node.defined_in, &change.file)
                    {
                        resolved.methods.insert(node.id.clone());
                    }
                }
            }
            // A changed type implicates all of its methods.
            for ty in &change.changed_types {
                for entry in self.index.types() {
                    let simple = entry.fq.rsplit('.').next().unwrap_or(&entry.fq);
                    if simple == ty || entry.fq == *ty {
                        resolved.methods.extend(entry.methods.iter().cloned());
                    }
                }
            }
        }
        resolved
    }

    /// Score every test against the change-set; result is sorted by score
    /// descending, then id.
    pub fn score(
        &self,
        tests: &[TestEntry],
        change_set: &ChangeSet,
        cancel: &CancelToken,
    ) -> Result<Vec<TestInfo>> {
        let resolved = self.resolve_changes(change_set);
        let mut scored = Vec::with_capacity(tests.len());
        for test in tests {
            cancel.checkpoint(Phase::Scoring)?;
            scored.push(self.score_one(test, &resolved));
        }
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(scored)
    }

    fn score_one(&self, test: &TestEntry, changes: &ResolvedChanges) -> TestInfo {
        let history = self.history.get(&test.id);

        // Impact: the best path this test has to any changed method.
        let mut impact: f64 = 0.0;
        let mut best_path_len = usize::MAX;
        for method in &changes.methods {
            for entry in self.coverage.tests_covering(method) {
                if entry.test != test.id {
                    continue;
                }
                if entry.confidence > impact {
                    impact = entry.confidence;
                    best_path_len = entry.path.len().saturating_sub(1);
                } else if entry.confidence == impact {
                    best_path_len = best_path_len.min(entry.path.len().saturating_sub(1));
                }
            }
        }
        if test.category == TestCategory::Unit && best_path_len == 1 {
            impact += 0.1;
        }
        let impact_component = impact.min(1.0) * 0.40;

        // Historical: recent failures push a test up the list.
        let mut historical: f64 = 0.0;
        let mut flaky = false;
        if let Some(history) = history {
            if let Some(last_failure) = history
                .runs
                .iter()
                .filter(|r| !r.passed)
                .map(|r| r.at)
                .max()
            {
                let age = self.now.signed_duration_since(last_failure);
                if age <= Duration::days(7) {
                    historical += 0.30;
                } else if age <= Duration::days(30) {
                    historical += 0.10;
                }
            }
            if history.runs.len() >= 5 {
                let failures = history.runs.iter().filter(|r| !r.passed).count();
                let rate = failures as f64 / history.runs.len() as f64;
                flaky = rate > 0.10 && rate < 0.90;
            }
        }
        let historical_component = historical.min(1.0) * 0.25;

        // Cost: cheap tests win ties.
        let average_ms = expected_duration_ms(test, history);
        let budget = duration_budget_ms(test.category) as f64;
        let cost_component = (1.0 - (average_ms as f64 / budget).min(1.0)) * 0.20;

        // Category prior for the change shape.
        let mut prior: f64 = 0.0;
        for (category, triggers, bonus) in CATEGORY_PRIORS {
            if test.category != *category {
                continue;
            }
            let hit = triggers.iter().any(|t| {
                changes
                    .file_names
                    .iter()
                    .any(|f| f.to_ascii_lowercase().contains(t))
                    || changes
                        .type_names
                        .iter()
                        .any(|ty| ty.to_ascii_lowercase().contains(t))
            });
            if hit {
                prior = prior.max(*bonus);
            }
        }
        if test.category == TestCategory::Integration && changes.has_configuration {
            prior = prior.max(0.40);
        }
        let prior_component = prior * 0.15;

        let mut score = impact_component + historical_component + cost_component + prior_component;
        if flaky {
            score *= 0.70;
        }
        let score = score.clamp(0.0, 1.0);

        TestInfo {
            id: test.id.clone(),
            framework: test.framework,
            category: test.category,
            classification_confidence: test.confidence,
            average_ms,
            dependencies: self
                .coverage
                .coverage_for(&test.id)
                .into_iter()
                .cloned()
                .collect(),
            tags: [test.category.to_string()].into_iter().collect(),
            priority: (score * 100.0).round() as i32,
            score,
        }
    }
}

fn expected_duration_ms(test: &TestEntry, history: Option<&TestHistory>) -> u64 {
    if let Some(history) = history {
        if let Some(avg) = history.average_ms {
            return avg;
        }
        if !history.runs.is_empty() {
            let total: u64 = history.runs.iter().map(|r| r.duration_ms).sum();
            return total / history.runs.len() as u64;
        }
    }
    default_duration_ms(test.category)
}

/// Diff paths and workspace paths rarely share a root; treat them as the
/// same file when either is a suffix of the other.
fn paths_match(workspace: &Path, diff: &Path) -> bool {
    workspace.ends_with(diff) || diff.ends_with(workspace) || workspace == diff
}
