//! Cooperative cancellation and phase deadlines.
//!
//! Long-running operations take a [`CancelToken`] and check it at file,
//! method, test, and scored-test boundaries. A tripped token makes the
//! operation fail fast with [`EngineError::Cancelled`]; partial state is
//! discarded by the caller, never exposed. Deadlines produce a structured
//! [`EngineError::TimedOut`] instead of a silent partial result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{EngineError, Phase, Result};

/// Cloneable cancellation handle. All clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token. Every outstanding operation holding a clone will
    /// observe this at its next checkpoint.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Fail with `Cancelled(phase)` if the token has been tripped.
    pub fn checkpoint(&self, phase: Phase) -> Result<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled(phase))
        } else {
            Ok(())
        }
    }
}

/// A wall-clock budget for one phase of one operation.
#[derive(Debug)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
    phase: Phase,
}

impl Deadline {
    pub fn new(phase: Phase, budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
            phase,
        }
    }

    pub fn start(phase: Phase, seconds: u64) -> Self {
        Self::new(phase, Duration::from_secs(seconds))
    }

    /// Fail with `TimedOut` if the budget is exhausted. `what` names the
    /// item being processed for the error message.
    pub fn check(&self, what: &str) -> Result<()> {
        if self.started.elapsed() > self.budget {
            Err(EngineError::TimedOut {
                phase: self.phase,
                what: what.to_string(),
            })
        } else {
            Ok(())
        }
    }
}
