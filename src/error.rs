use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// The long-running phase an outcome is attributed to. Timeout and
/// cancellation errors carry one of these so callers know where an
/// operation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Phase {
    ProjectDiscovery,
    Parse,
    CallGraph,
    Coverage,
    DependencyAnalysis,
    Scoring,
    Selection,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Per-file parse failure. Never fatal on its own: the file is excluded
    /// and the failure is collected into the operation's `errors` list.
    #[error("failed to parse '{file}': {detail}")]
    ParseFailure { file: PathBuf, detail: String },

    #[error("unresolved symbol: '{0}'")]
    Unresolved(String),

    #[error("workspace has been disposed")]
    Disposed,

    #[error("cancelled during {0}")]
    Cancelled(Phase),

    #[error("{phase} timed out while processing '{what}'")]
    TimedOut { phase: Phase, what: String },

    /// A broken internal invariant. The tag identifies the violated
    /// invariant for triage; these are bugs and are never swallowed.
    #[error("internal invariant '{invariant}' violated: {detail}")]
    Internal {
        invariant: &'static str,
        detail: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: '{0}'")]
    Io(#[from] std::io::Error),

    #[error("json error: '{0}'")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Process exit code for the CLI surface.
    ///
    /// `0` success, `1` user error, `2` partial success with errors,
    /// `3` cancellation or timeout, `64` unexpected internal error.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::InvalidInput(_) | EngineError::Config(_) => 1,
            EngineError::ParseFailure { .. } | EngineError::Unresolved(_) => 2,
            EngineError::Cancelled(_) | EngineError::TimedOut { .. } => 3,
            EngineError::Disposed
            | EngineError::Internal { .. }
            | EngineError::Io(_)
            | EngineError::Json(_) => 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(EngineError::InvalidInput("x".into()).exit_code(), 1);
        assert_eq!(
            EngineError::ParseFailure {
                file: "a.cs".into(),
                detail: "bad".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(EngineError::Cancelled(Phase::Coverage).exit_code(), 3);
        assert_eq!(
            EngineError::TimedOut {
                phase: Phase::Parse,
                what: "proj".into()
            }
            .exit_code(),
            3
        );
        assert_eq!(EngineError::Disposed.exit_code(), 64);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::CallGraph.to_string(), "call-graph");
        assert_eq!(Phase::Coverage.to_string(), "coverage");
    }
}
