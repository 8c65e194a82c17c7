//! The coverage index: the call graph inverted from the tests' point of
//! view.
//!
//! For every production method reached from a test within the configured
//! bounds, the index stores the *best* path — highest confidence first,
//! then shortest, then lexicographically smallest id sequence — together
//! with its confidence, the product of per-edge confidences along the
//! walk.
//!
//! Mock-aware filtering: a path that crosses a mocking-framework node (by
//! namespace marker) or a dispatch edge whose receiver was traced to a
//! proxy is *demoted* — its confidence is capped at 0.2 and it is only
//! stored when no clean path to the same method exists. The number of
//! demoted entries is surfaced for plan metadata.
//!
//! Construction runs one bounded best-path search per test (depth and
//! per-test edge budgets), fanned out over the worker pool; results merge
//! in test order so the map is byte-identical across runs and worker
//! counts.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancel::{CancelToken, Deadline};
use crate::classify::{TestCategory, TestEntry};
use crate::error::{EngineError, Phase, Result};
use crate::graph::CallGraph;
use crate::symbols::{MethodId, SymbolIndex};

/// Namespace prefixes that mark a node as belonging to a mocking
/// framework.
pub const MOCK_NAMESPACE_MARKERS: &[&str] =
    &["NSubstitute", "Moq", "FakeItEasy", "Rhino.Mocks", "NMock"];

/// Confidence cap applied to mock-tainted paths.
pub const MOCK_CONFIDENCE_CAP: f64 = 0.2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageEntry {
    pub test: MethodId,
    /// The full walk from the test to the covered method, inclusive.
    pub path: Vec<MethodId>,
    pub confidence: f64,
    /// True when the stored path is mock-demoted (no clean path existed).
    pub mocked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageStatistics {
    pub total_methods: usize,
    pub covered_methods: usize,
    pub total_tests: usize,
    pub total_relationships: usize,
    pub coverage_by_test_type: BTreeMap<TestCategory, usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct CoverageBounds {
    pub max_depth: usize,
    pub edge_budget: usize,
    pub per_test_timeout_seconds: u64,
}

impl Default for CoverageBounds {
    fn default() -> Self {
        Self {
            max_depth: 20,
            edge_budget: 50_000,
            per_test_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Default)]
pub struct CoverageMap {
    by_method: BTreeMap<MethodId, Vec<CoverageEntry>>,
    by_test: BTreeMap<MethodId, BTreeSet<MethodId>>,
    categories: BTreeMap<MethodId, TestCategory>,
    total_methods: usize,
    demoted_paths: usize,
}

impl CoverageMap {
    /// Build the index from the classifier's tests and the call graph.
    pub fn build(
        index: &SymbolIndex,
        graph: &CallGraph,
        tests: &[TestEntry],
        bounds: CoverageBounds,
        parallelism: usize,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let mut sorted: Vec<&TestEntry> = tests.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism.max(1))
            .build()
            .map_err(|e| EngineError::Internal {
                invariant: "worker-pool",
                detail: e.to_string(),
            })?;
        let per_test: Vec<Result<Vec<(MethodId, CoverageEntry)>>> = pool.install(|| {
            sorted
                .par_iter()
                .map(|test| {
                    cancel.checkpoint(Phase::Coverage)?;
                    best_paths_from(index, graph, &test.id, bounds)
                })
                .collect()
        });

        let mut map = CoverageMap {
            total_methods: index
                .methods()
                .filter(|m| !m.is_test && !m.external)
                .count(),
            ..Default::default()
        };
        for (test, result) in sorted.iter().zip(per_test) {
            let reached = result?;
            map.categories.insert(test.id.clone(), test.category);
            for (target, entry) in reached {
                if entry.mocked {
                    map.demoted_paths += 1;
                }
                map.by_test
                    .entry(test.id.clone())
                    .or_default()
                    .insert(target.clone());
                map.by_method.entry(target).or_default().push(entry);
            }
        }
        for entries in map.by_method.values_mut() {
            entries.sort_by(|a, b| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.test.cmp(&b.test))
            });
        }
        Ok(map)
    }

    /// Tests that transitively exercise `method`, best paths first. Empty
    /// when the method is unknown or uncovered.
    pub fn tests_covering(&self, method: &MethodId) -> &[CoverageEntry] {
        self.by_method
            .get(method)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Production methods reached by `test`, sorted.
    pub fn coverage_for(&self, test: &MethodId) -> Vec<&MethodId> {
        self.by_test
            .get(test)
            .map(|methods| methods.iter().collect())
            .unwrap_or_default()
    }

    pub fn covered_methods(&self) -> impl Iterator<Item = &MethodId> {
        self.by_method.keys()
    }

    pub fn demoted_paths(&self) -> usize {
        self.demoted_paths
    }

    pub fn statistics(&self) -> CoverageStatistics {
        let mut by_type: BTreeMap<TestCategory, usize> = BTreeMap::new();
        for entries in self.by_method.values() {
            for entry in entries {
                if let Some(category) = self.categories.get(&entry.test) {
                    *by_type.entry(*category).or_default() += 1;
                }
            }
        }
        CoverageStatistics {
            total_methods: self.total_methods,
            covered_methods: self.by_method.len(),
            total_tests: self.categories.len(),
            total_relationships: self.by_method.values().map(Vec::len).sum(),
            coverage_by_test_type: by_type,
        }
    }
}

/// Label for one discovered walk.
#[derive(Clone, Debug)]
struct Label {
    confidence: f64,
    path: Vec<MethodId>,
}

impl Label {
    /// Best-path ordering: higher confidence, then shorter, then
    /// lexicographically smaller sequence.
    fn beats(&self, other: &Label) -> bool {
        match self.confidence.partial_cmp(&other.confidence) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Less) => false,
            _ => match self.path.len().cmp(&other.path.len()) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => self.path < other.path,
            },
        }
    }
}

/// Heap candidate; `Ord` is arranged so the max-heap pops the best label
/// first.
struct Candidate {
    label: Label,
    mocked: bool,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.label
            .confidence
            .partial_cmp(&other.label.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.label.path.len().cmp(&self.label.path.len()))
            .then_with(|| other.label.path.cmp(&self.label.path))
    }
}

fn in_mock_namespace(id: &MethodId) -> bool {
    let ty = id.containing_type();
    MOCK_NAMESPACE_MARKERS.iter().any(|marker| {
        ty.starts_with(marker)
            && (ty.len() == marker.len() || ty.as_bytes()[marker.len()] == b'.')
    })
}

/// Bounded best-path search from one test. Returns `(target, entry)`
/// pairs sorted by target id.
fn best_paths_from(
    index: &SymbolIndex,
    graph: &CallGraph,
    test: &MethodId,
    bounds: CoverageBounds,
) -> Result<Vec<(MethodId, CoverageEntry)>> {
    let deadline = Deadline::start(Phase::Coverage, bounds.per_test_timeout_seconds);
    // Best label per (node, mock-tainted) state.
    let mut best: HashMap<(MethodId, bool), Label> = HashMap::new();
    let mut heap: BinaryHeap<Candidate> = BinaryHeap::new();
    heap.push(Candidate {
        label: Label {
            confidence: 1.0,
            path: vec![test.clone()],
        },
        mocked: false,
    });
    let mut budget = bounds.edge_budget;

    while let Some(Candidate { label, mocked }) = heap.pop() {
        deadline.check(test.as_str())?;
        let Some(node) = label.path.last().cloned() else {
            continue;
        };
        match best.get(&(node.clone(), mocked)) {
            Some(existing) if !label.beats(existing) && existing.path != label.path => continue,
            _ => {}
        }
        if label.path.len() > bounds.max_depth {
            continue;
        }
        for (next, edge) in graph.successors(&node) {
            if budget == 0 {
                debug!(test = %test, "per-test edge budget exhausted");
                break;
            }
            budget -= 1;
            if next.is_synthetic() {
                continue;
            }
            if label.path.iter().any(|m| m == next) {
                continue; // acyclic walks only
            }
            let next_mocked = mocked || edge.via_mock || in_mock_namespace(next);
            let candidate = Label {
                confidence: label.confidence * edge.confidence,
                path: {
                    let mut path = label.path.clone();
                    path.push(next.clone());
                    path
                },
            };
            let key = (next.clone(), next_mocked);
            let improves = match best.get(&key) {
                Some(existing) => candidate.beats(existing),
                None => true,
            };
            if improves {
                best.insert(key, candidate.clone());
                heap.push(Candidate {
                    label: candidate,
                    mocked: next_mocked,
                });
            }
        }
        if budget == 0 {
            break;
        }
    }

    // Fold the two per-node states into one entry: clean wins; a demoted
    // path is kept only when it is all there is.
    let mut out: BTreeMap<MethodId, CoverageEntry> = BTreeMap::new();
    let mut reached: BTreeSet<MethodId> = best.keys().map(|(id, _)| id.clone()).collect();
    reached.remove(test);
    for target in reached {
        let is_production = index
            .method(&target)
            .is_some_and(|node| !node.is_test && !node.external);
        if !is_production {
            continue;
        }
        let clean = best.get(&(target.clone(), false));
        let mocked = best.get(&(target.clone(), true));
        let entry = match (clean, mocked) {
            (Some(label), _) => CoverageEntry {
                test: test.clone(),
                path: label.path.clone(),
                confidence: label.confidence,
                mocked: false,
            },
            (None, Some(label)) => CoverageEntry {
                test: test.clone(),
                path: label.path.clone(),
                confidence: label.confidence.min(MOCK_CONFIDENCE_CAP),
                mocked: true,
            },
            (None, None) => continue,
        };
        out.insert(target, entry);
    }
    Ok(out.into_iter().collect())
}
