//! The workspace manager: owns parsed sources and hands out per-file
//! syntactic models on demand.
//!
//! Two initialization modes:
//! - **bulk** parses every source under the solution before returning,
//!   fanning out over a worker pool;
//! - **lazy** discovers the project structure only and defers each file's
//!   parse to its first request, so `initialize` costs time proportional
//!   to the number of projects.
//!
//! Per-file parse failures are collected and excluded, never fatal. The
//! parse cache is the only shared mutable state; it is written through a
//! lock and effectively frozen once analysis phases begin reading.

pub mod project;
pub mod provider;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::cancel::{CancelToken, Deadline};
use crate::config::Config;
use crate::error::{EngineError, Phase, Result};
use crate::progress::{ProgressEvent, ProgressOutcome, ProgressSink};
use crate::syntax::{parse_source, SourceModel};

pub use project::{Project, ProjectKind};
pub use provider::{FsProvider, MemoryProvider, SourceProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitMode {
    Bulk,
    Lazy,
}

pub struct Workspace {
    root: PathBuf,
    provider: Arc<dyn SourceProvider>,
    projects: Vec<Project>,
    config: Config,
    cache: RwLock<BTreeMap<PathBuf, Arc<SourceModel>>>,
    failures: Mutex<Vec<(PathBuf, String)>>,
}

impl Workspace {
    pub fn initialize(
        root: impl Into<PathBuf>,
        provider: Arc<dyn SourceProvider>,
        config: Config,
        mode: InitMode,
        cancel: &CancelToken,
        progress: &dyn ProgressSink,
    ) -> Result<Self> {
        let root = root.into();
        cancel.checkpoint(Phase::ProjectDiscovery)?;
        let projects = project::discover(&root, provider.as_ref(), &config.projects)?;
        info!(projects = projects.len(), root = %root.display(), "workspace discovered");

        let workspace = Self {
            root,
            provider,
            projects,
            config,
            cache: RwLock::new(BTreeMap::new()),
            failures: Mutex::new(Vec::new()),
        };
        if mode == InitMode::Bulk {
            workspace.parse_all(cancel, progress)?;
        }
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn project_owning(&self, file: &Path) -> Option<&Project> {
        // Most-specific directory wins when projects nest.
        self.projects
            .iter()
            .filter(|p| p.owns(file))
            .max_by_key(|p| p.dir.components().count())
    }

    /// All source files admitted by the project filters, sorted.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let files = self.provider.files()?;
        Ok(files
            .into_iter()
            .filter(|f| self.projects.iter().any(|p| p.owns(f)))
            .collect())
    }

    /// The syntactic model for one file, parsing on first access.
    pub fn model_for(&self, file: &Path) -> Result<Arc<SourceModel>> {
        if let Some(model) = self.cache.read().get(file) {
            return Ok(Arc::clone(model));
        }
        let text = self.provider.read(file)?;
        let model = Arc::new(parse_source(file, &text)?);
        self.cache
            .write()
            .entry(file.to_path_buf())
            .or_insert_with(|| Arc::clone(&model));
        Ok(model)
    }

    /// Parse everything not yet parsed and return every model, sorted by
    /// path. Files that fail to parse are excluded and recorded.
    pub fn models(&self, cancel: &CancelToken) -> Result<Vec<Arc<SourceModel>>> {
        self.parse_all(cancel, &crate::progress::NullSink)?;
        let cache = self.cache.read();
        Ok(cache.values().cloned().collect())
    }

    /// Parse failures collected so far, `(file, detail)` pairs.
    pub fn parse_failures(&self) -> Vec<(PathBuf, String)> {
        self.failures.lock().clone()
    }

    fn parse_all(&self, cancel: &CancelToken, progress: &dyn ProgressSink) -> Result<()> {
        for project in &self.projects {
            cancel.checkpoint(Phase::Parse)?;
            let deadline = Deadline::start(Phase::Parse, self.config.analysis.timeout_seconds);
            let files: Vec<PathBuf> = self
                .provider
                .files()?
                .into_iter()
                .filter(|f| project.owns(f))
                .filter(|f| !self.cache.read().contains_key(f))
                .collect();
            if files.is_empty() {
                continue;
            }
            debug!(project = %project.name, files = files.len(), "parsing");

            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.analysis.effective_parallelism())
                .build()
                .map_err(|e| EngineError::Internal {
                    invariant: "worker-pool",
                    detail: e.to_string(),
                })?;
            let parsed: Vec<(PathBuf, Result<SourceModel>)> = pool.install(|| {
                files
                    .par_iter()
                    .map(|file| {
                        if cancel.is_cancelled() {
                            return (file.clone(), Err(EngineError::Cancelled(Phase::Parse)));
                        }
                        if let Err(e) = deadline.check(&project.name) {
                            return (file.clone(), Err(e));
                        }
                        let result = self
                            .provider
                            .read(file)
                            .and_then(|text| parse_source(file, &text));
                        (file.clone(), result)
                    })
                    .collect()
            });

            // A terminal outcome discards the whole batch: nothing from a
            // cancelled or timed-out project becomes observable.
            if parsed.iter().any(|(_, r)| {
                matches!(
                    r,
                    Err(EngineError::Cancelled(_) | EngineError::TimedOut { .. })
                )
            }) {
                for (_, result) in parsed {
                    if let Err(e @ (EngineError::Cancelled(_) | EngineError::TimedOut { .. })) =
                        result
                    {
                        return Err(e);
                    }
                }
                unreachable!("terminal parse outcome vanished");
            }

            let mut cache = self.cache.write();
            let mut failures = self.failures.lock();
            for (file, result) in parsed {
                let item = file.to_string_lossy().into_owned();
                match result {
                    Ok(model) => {
                        cache.insert(file, Arc::new(model));
                        progress.report(ProgressEvent {
                            phase: "parse",
                            item: &item,
                            outcome: ProgressOutcome::Ok,
                        });
                    }
                    Err(e) => {
                        debug!(file = %item, error = %e, "parse failure, file excluded");
                        failures.push((file, e.to_string()));
                        progress.report(ProgressEvent {
                            phase: "parse",
                            item: &item,
                            outcome: ProgressOutcome::Failed,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
