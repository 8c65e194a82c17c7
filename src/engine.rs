//! The engine handle: the primary library surface.
//!
//! `initialize` returns an explicit handle that owns all state — the
//! workspace, the symbol index, the call graph, the classifier output,
//! and the lazily built coverage and dependency indices. There are no
//! process-wide singletons; drop the handle (or call [`Engine::dispose`])
//! and everything goes with it. Queries after disposal fail with
//! [`EngineError::Disposed`].
//!
//! Construction phases write the shared indices exactly once behind
//! locks; queries are read-only and re-entrant. Long operations take a
//! [`CancelToken`] and observe the configured timeouts; a cancelled or
//! timed-out operation discards partial state rather than exposing it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cancel::{CancelToken, Deadline};
use crate::changes::{parse_unified_diff, ChangeSet};
use crate::classify::{Classifier, TestCategory, TestEntry, TestFramework};
use crate::config::Config;
use crate::coverage::{CoverageBounds, CoverageEntry, CoverageMap, CoverageStatistics};
use crate::datadeps::{Conflict, DataDependencyAnalyzer, DependencyReport};
use crate::error::{EngineError, Phase, Result};
use crate::graph::{CallGraph, GraphBuilder};
use crate::plan::{ConfidenceLevel, ExecutionPlan, PlanBuilder, PlanOverrides};
use crate::progress::{NullSink, ProgressSink};
use crate::scoring::{HistoryMap, ImpactScorer};
use crate::symbols::{MethodId, SymbolIndex};
use crate::workspace::{FsProvider, ProjectKind, SourceProvider, Workspace};

pub use crate::workspace::InitMode;

/// Everything derived from one full parse of the workspace.
struct Analysis {
    index: SymbolIndex,
    graph: CallGraph,
    tests: Vec<TestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySummary {
    pub total: usize,
    pub by_category: BTreeMap<TestCategory, usize>,
    pub by_framework: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResult {
    pub tests: Vec<TestEntry>,
    pub summary: DiscoverySummary,
    /// Per-file parse failures; non-empty means partial success.
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSummary {
    pub methods: usize,
    pub edges: usize,
    pub tests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestComparison {
    pub test_a: MethodId,
    pub test_b: MethodId,
    pub shared: Vec<MethodId>,
    pub only_a: Vec<MethodId>,
    pub only_b: Vec<MethodId>,
    pub can_parallelize: bool,
    pub conflicts: Vec<Conflict>,
}

/// Diff input for impact queries: either raw unified-diff text or an
/// already structured change-set.
pub enum DiffInput<'a> {
    Unified(&'a str),
    Structured(ChangeSet),
}

pub struct Engine {
    config: Config,
    workspace: Workspace,
    analysis: RwLock<Option<Arc<Analysis>>>,
    coverage: RwLock<Option<Arc<CoverageMap>>>,
    deps: RwLock<Option<Arc<DependencyReport>>>,
    disposed: AtomicBool,
}

impl Engine {
    /// Initialize over the filesystem. Bulk mode parses everything up
    /// front; lazy mode defers per-file work to first use and returns in
    /// time proportional to the number of projects.
    pub fn initialize(
        solution_root: impl Into<PathBuf>,
        config: Config,
        mode: InitMode,
    ) -> Result<Self> {
        let root = solution_root.into();
        let provider = Arc::new(FsProvider::new(&root));
        Self::initialize_with(root, provider, config, mode, &CancelToken::new(), &NullSink)
    }

    /// Initialize over any [`SourceProvider`]; the variant every other
    /// constructor funnels into.
    pub fn initialize_with(
        solution_root: impl Into<PathBuf>,
        provider: Arc<dyn SourceProvider>,
        config: Config,
        mode: InitMode,
        cancel: &CancelToken,
        progress: &dyn ProgressSink,
    ) -> Result<Self> {
        let root = solution_root.into();
        let workspace =
            Workspace::initialize(&root, provider, config.clone(), mode, cancel, progress)?;
        let engine = Self {
            config,
            workspace,
            analysis: RwLock::new(None),
            coverage: RwLock::new(None),
            deps: RwLock::new(None),
            disposed: AtomicBool::new(false),
        };
        if mode == InitMode::Bulk {
            engine.ensure_analysis(cancel)?;
        }
        Ok(engine)
    }

    /// Release everything. Outstanding operations observe this at their
    /// next checkpoint; new operations fail with `Disposed`.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.analysis.write().take();
        self.coverage.write().take();
        self.deps.write().take();
        info!("engine disposed");
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(EngineError::Disposed)
        } else {
            Ok(())
        }
    }

    fn ensure_analysis(&self, cancel: &CancelToken) -> Result<Arc<Analysis>> {
        self.ensure_live()?;
        if let Some(analysis) = self.analysis.read().as_ref() {
            return Ok(Arc::clone(analysis));
        }
        let models = self.workspace.models(cancel)?;
        let mut index = SymbolIndex::build(&models);
        let classifier = Classifier::new(self.config.analysis.name_heuristics);
        // With `testProjectsOnly` (the default) the name-convention rule
        // only fires inside test projects; attribute-carrying tests are
        // tests wherever they live. Turning the flag off widens the
        // convention rule to every project.
        let tests = classifier.classify(&models, |file| {
            !self.config.projects.test_projects_only
                || self
                    .workspace
                    .project_owning(file)
                    .is_some_and(|p| p.kind == ProjectKind::Test)
        });
        index.mark_tests(tests.iter().map(|t| t.id.clone()));
        let graph = GraphBuilder::build(&mut index, &models, cancel)?;
        let analysis = Arc::new(Analysis {
            index,
            graph,
            tests,
        });
        let mut slot = self.analysis.write();
        if slot.is_none() {
            *slot = Some(Arc::clone(&analysis));
        }
        Ok(slot.as_ref().map(Arc::clone).unwrap_or(analysis))
    }

    fn ensure_coverage(&self, cancel: &CancelToken) -> Result<Arc<CoverageMap>> {
        self.ensure_live()?;
        if let Some(coverage) = self.coverage.read().as_ref() {
            return Ok(Arc::clone(coverage));
        }
        let analysis = self.ensure_analysis(cancel)?;
        let bounds = CoverageBounds {
            max_depth: self.config.analysis.max_depth,
            edge_budget: self.config.analysis.edge_budget,
            per_test_timeout_seconds: self.config.analysis.coverage_timeout_seconds,
        };
        let coverage = Arc::new(CoverageMap::build(
            &analysis.index,
            &analysis.graph,
            &analysis.tests,
            bounds,
            self.config.analysis.effective_parallelism(),
            cancel,
        )?);
        let mut slot = self.coverage.write();
        if slot.is_none() {
            *slot = Some(Arc::clone(&coverage));
        }
        Ok(slot.as_ref().map(Arc::clone).unwrap_or(coverage))
    }

    fn ensure_deps(&self, cancel: &CancelToken) -> Result<Arc<DependencyReport>> {
        self.ensure_live()?;
        if let Some(deps) = self.deps.read().as_ref() {
            return Ok(Arc::clone(deps));
        }
        let analysis = self.ensure_analysis(cancel)?;
        let models = self.workspace.models(cancel)?;
        let report = Arc::new(DataDependencyAnalyzer::default().analyze(
            &models,
            &analysis.index,
            &analysis.tests,
            cancel,
        )?);
        let mut slot = self.deps.write();
        if slot.is_none() {
            *slot = Some(Arc::clone(&report));
        }
        Ok(slot.as_ref().map(Arc::clone).unwrap_or(report))
    }

    // ---- primary operations --------------------------------------------

    /// Discover tests, optionally filtered by a case-insensitive
    /// substring over the MethodId.
    pub fn discover_tests(&self, filter: Option<&str>) -> Result<DiscoveryResult> {
        self.discover_tests_with(filter, &CancelToken::new(), &NullSink)
    }

    pub fn discover_tests_with(
        &self,
        filter: Option<&str>,
        cancel: &CancelToken,
        progress: &dyn ProgressSink,
    ) -> Result<DiscoveryResult> {
        let analysis = self.ensure_analysis(cancel)?;
        let needle = filter.map(str::to_ascii_lowercase);
        let tests: Vec<TestEntry> = analysis
            .tests
            .iter()
            .filter(|t| {
                needle
                    .as_ref()
                    .is_none_or(|n| t.id.as_str().to_ascii_lowercase().contains(n))
            })
            .cloned()
            .collect();
        for test in &tests {
            progress.report(crate::progress::ProgressEvent {
                phase: "discover",
                item: test.id.as_str(),
                outcome: crate::progress::ProgressOutcome::Ok,
            });
        }
        let mut by_category: BTreeMap<TestCategory, usize> = BTreeMap::new();
        let mut by_framework: BTreeMap<String, usize> = BTreeMap::new();
        for test in &tests {
            *by_category.entry(test.category).or_default() += 1;
            *by_framework.entry(test.framework.to_string()).or_default() += 1;
        }
        Ok(DiscoveryResult {
            summary: DiscoverySummary {
                total: tests.len(),
                by_category,
                by_framework,
            },
            tests,
            errors: self
                .workspace
                .parse_failures()
                .into_iter()
                .map(|(file, detail)| format!("{}: {detail}", file.display()))
                .collect(),
        })
    }

    pub fn graph_summary(&self, cancel: &CancelToken) -> Result<GraphSummary> {
        let analysis = self.ensure_analysis(cancel)?;
        Ok(GraphSummary {
            methods: analysis.graph.node_count(),
            edges: analysis.graph.edge_count(),
            tests: analysis.tests.len(),
        })
    }

    /// Run `f` against the call graph; the handle stays inside the
    /// engine's lifetime.
    pub fn with_call_graph<R>(
        &self,
        cancel: &CancelToken,
        f: impl FnOnce(&CallGraph) -> R,
    ) -> Result<R> {
        let analysis = self.ensure_analysis(cancel)?;
        Ok(f(&analysis.graph))
    }

    pub fn build_coverage_map(&self, cancel: &CancelToken) -> Result<Arc<CoverageMap>> {
        self.ensure_coverage(cancel)
    }

    pub fn tests_exercising_method(
        &self,
        method: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<CoverageEntry>> {
        let analysis = self.ensure_analysis(cancel)?;
        let id = MethodId::from(method);
        if !analysis.index.contains(&id) {
            return Err(EngineError::InvalidInput(format!(
                "unknown method '{method}'"
            )));
        }
        let coverage = self.ensure_coverage(cancel)?;
        Ok(coverage.tests_covering(&id).to_vec())
    }

    pub fn tests_exercising_methods(
        &self,
        methods: &[String],
        cancel: &CancelToken,
    ) -> Result<BTreeMap<MethodId, Vec<CoverageEntry>>> {
        let mut out = BTreeMap::new();
        for method in methods {
            let entries = self.tests_exercising_method(method, cancel)?;
            out.insert(MethodId::from(method.as_str()), entries);
        }
        Ok(out)
    }

    pub fn coverage_statistics(&self, cancel: &CancelToken) -> Result<CoverageStatistics> {
        Ok(self.ensure_coverage(cancel)?.statistics())
    }

    /// Parse (if needed), score, select, and batch: the full impact
    /// pipeline. The clock is injected so identical inputs produce
    /// identical plans.
    pub fn analyze_diff_at(
        &self,
        input: DiffInput<'_>,
        confidence: ConfidenceLevel,
        overrides: &PlanOverrides,
        history: &HistoryMap,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<ExecutionPlan> {
        let deadline = Deadline::start(Phase::Selection, self.config.analysis.plan_timeout_seconds);
        let change_set = match input {
            DiffInput::Unified(text) => {
                let parsed = parse_unified_diff(text);
                for warning in &parsed.warnings {
                    tracing::warn!(%warning, "diff damage recovered");
                }
                parsed.change_set
            }
            DiffInput::Structured(set) => set,
        };

        let analysis = self.ensure_analysis(cancel)?;
        let coverage = self.ensure_coverage(cancel)?;
        let deps = self.ensure_deps(cancel)?;
        deadline.check("scoring")?;

        let scorer = ImpactScorer {
            coverage: &coverage,
            index: &analysis.index,
            history,
            now,
        };
        let scored = scorer.score(&analysis.tests, &change_set, cancel)?;
        deadline.check("selection")?;

        let builder = PlanBuilder {
            conflicts: &deps,
            batch_ms_cap: self.config.analysis.batch_seconds * 1_000,
            default_parallelism: self.config.analysis.effective_parallelism(),
            demoted_paths: coverage.demoted_paths(),
        };
        builder.build(scored, confidence, overrides, now, cancel)
    }

    /// Convenience wrapper over [`Engine::analyze_diff_at`] with the
    /// current clock, no overrides, and no history.
    pub fn analyze_diff_text(
        &self,
        diff: &str,
        confidence: ConfidenceLevel,
        cancel: &CancelToken,
    ) -> Result<ExecutionPlan> {
        self.analyze_diff_at(
            DiffInput::Unified(diff),
            confidence,
            &PlanOverrides::default(),
            &HistoryMap::new(),
            Utc::now(),
            cancel,
        )
    }

    /// Shared and exclusive coverage of two tests, plus the C6 verdict on
    /// whether they may share a batch.
    pub fn compare_tests(
        &self,
        test_a: &str,
        test_b: &str,
        cancel: &CancelToken,
    ) -> Result<TestComparison> {
        let analysis = self.ensure_analysis(cancel)?;
        let a = MethodId::from(test_a);
        let b = MethodId::from(test_b);
        for (label, id) in [(test_a, &a), (test_b, &b)] {
            if !analysis.tests.iter().any(|t| t.id == *id) {
                return Err(EngineError::InvalidInput(format!("unknown test '{label}'")));
            }
        }
        let coverage = self.ensure_coverage(cancel)?;
        let deps = self.ensure_deps(cancel)?;
        let cov_a: std::collections::BTreeSet<MethodId> =
            coverage.coverage_for(&a).into_iter().cloned().collect();
        let cov_b: std::collections::BTreeSet<MethodId> =
            coverage.coverage_for(&b).into_iter().cloned().collect();
        Ok(TestComparison {
            shared: cov_a.intersection(&cov_b).cloned().collect(),
            only_a: cov_a.difference(&cov_b).cloned().collect(),
            only_b: cov_b.difference(&cov_a).cloned().collect(),
            can_parallelize: deps.can_parallelize(&a, &b),
            conflicts: deps.conflicts_between(&a, &b).into_iter().cloned().collect(),
            test_a: a,
            test_b: b,
        })
    }

    pub fn root(&self) -> &Path {
        self.workspace.root()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parse failures collected so far; non-empty means partial results.
    pub fn parse_failures(&self) -> Vec<String> {
        self.workspace
            .parse_failures()
            .into_iter()
            .map(|(file, detail)| format!("{}: {detail}", file.display()))
            .collect()
    }

    /// All test frameworks seen, for the categorize verb.
    pub fn frameworks(&self, cancel: &CancelToken) -> Result<Vec<TestFramework>> {
        let analysis = self.ensure_analysis(cancel)?;
        let mut seen: Vec<TestFramework> = Vec::new();
        for test in &analysis.tests {
            if !seen.contains(&test.framework) {
                seen.push(test.framework);
            }
        }
        Ok(seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::shop_workspace;

    #[test]
    fn test_lazy_initialize_defers_analysis() {
        let engine = shop_workspace(InitMode::Lazy);
        assert!(engine.analysis.read().is_none());
        let discovery = engine.discover_tests(None).unwrap();
        assert!(discovery.summary.total > 0);
        assert!(engine.analysis.read().is_some());
    }

    #[test]
    fn test_dispose_blocks_queries() {
        let engine = shop_workspace(InitMode::Bulk);
        engine.dispose();
        assert!(matches!(
            engine.discover_tests(None),
            Err(EngineError::Disposed)
        ));
        assert!(matches!(
            engine.coverage_statistics(&CancelToken::new()),
            Err(EngineError::Disposed)
        ));
    }

    #[test]
    fn test_unknown_method_is_invalid_input() {
        let engine = shop_workspace(InitMode::Bulk);
        let result = engine.tests_exercising_method("No.Such.Method()", &CancelToken::new());
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_filtered_discovery() {
        let engine = shop_workspace(InitMode::Bulk);
        let all = engine.discover_tests(None).unwrap();
        let filtered = engine.discover_tests(Some("addstwo")).unwrap();
        assert!(filtered.summary.total < all.summary.total);
        assert!(filtered
            .tests
            .iter()
            .all(|t| t.id.as_str().to_ascii_lowercase().contains("addstwo")));
    }

    #[test]
    fn test_unknown_test_in_compare_is_invalid_input() {
        let engine = shop_workspace(InitMode::Bulk);
        let result = engine.compare_tests("No.Such.Test()", "Also.Not.Here()", &CancelToken::new());
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }
}
