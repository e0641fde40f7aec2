//! Ingestion lifecycle state and the readiness handoff.
//!
//! [`IngestionTracker`] is written by exactly one ingestion worker and read
//! by any number of join handlers. Readers block in [`IngestionTracker::wait`]
//! until the state is terminal; the ingested output is then shared through an
//! `Arc` and never mutated again.

use packsync_ingest::catalog::Ingested;
use packsync_ingest::error::IngestionError;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use thiserror::Error;

/// Where the single ingestion attempt of a resource currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionState {
    /// The worker has not started yet.
    Pending,
    /// The pipeline is running.
    InFlight,
    /// The catalog and registry are available.
    Completed,
    /// The attempt failed; the reason is final.
    Failed(IngestionError),
}

impl IngestionState {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in-flight",
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for IngestionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Raised when a transition would move the state backwards or out of a
/// terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid ingestion transition from {from} to {to}")]
pub struct TransitionError {
    /// The state at the time of the attempt.
    pub from: &'static str,
    /// The requested state.
    pub to: &'static str,
}

#[derive(Debug)]
struct Inner {
    state: IngestionState,
    output: Option<Arc<Ingested>>,
    resolved_at: Option<Instant>,
}

/// Forward-only state cell with a blocking readiness wait.
///
/// # Examples
///
/// ```
/// use packsync::state::{IngestionState, IngestionTracker};
/// use packsync_ingest::catalog::Ingested;
///
/// let tracker = IngestionTracker::new();
/// tracker.begin().expect("pending -> in-flight");
/// tracker.complete(Ingested::default()).expect("in-flight -> completed");
/// assert_eq!(tracker.state(), IngestionState::Completed);
/// assert!(tracker.wait().is_ok());
/// ```
#[derive(Debug)]
pub struct IngestionTracker {
    inner: Mutex<Inner>,
    resolved: Condvar,
}

impl Default for IngestionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionTracker {
    /// A tracker in the [`IngestionState::Pending`] state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: IngestionState::Pending,
                output: None,
                resolved_at: None,
            }),
            resolved: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> IngestionState {
        self.lock().state.clone()
    }

    /// When the state became terminal, if it has.
    #[must_use]
    pub fn resolved_at(&self) -> Option<Instant> {
        self.lock().resolved_at
    }

    /// Move from `Pending` to `InFlight`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] from any other state.
    pub fn begin(&self) -> Result<(), TransitionError> {
        let mut inner = self.lock();
        if inner.state != IngestionState::Pending {
            return Err(TransitionError {
                from: inner.state.name(),
                to: "in-flight",
            });
        }
        inner.state = IngestionState::InFlight;
        Ok(())
    }

    /// Move from `InFlight` to `Completed`, publishing `output`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] from any other state; `output` is dropped.
    pub fn complete(&self, output: Ingested) -> Result<Arc<Ingested>, TransitionError> {
        let mut inner = self.lock();
        if inner.state != IngestionState::InFlight {
            return Err(TransitionError {
                from: inner.state.name(),
                to: "completed",
            });
        }
        let output = Arc::new(output);
        inner.output = Some(Arc::clone(&output));
        inner.state = IngestionState::Completed;
        inner.resolved_at = Some(Instant::now());
        drop(inner);
        self.resolved.notify_all();
        Ok(output)
    }

    /// Move from `Pending` or `InFlight` to `Failed(reason)`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the state is already terminal.
    pub fn fail(&self, reason: IngestionError) -> Result<(), TransitionError> {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return Err(TransitionError {
                from: inner.state.name(),
                to: "failed",
            });
        }
        inner.state = IngestionState::Failed(reason);
        inner.resolved_at = Some(Instant::now());
        drop(inner);
        self.resolved.notify_all();
        Ok(())
    }

    /// Block until ingestion resolves and return its outcome.
    ///
    /// # Errors
    ///
    /// Returns the failure reason if ingestion failed.
    pub fn wait(&self) -> Result<Arc<Ingested>, IngestionError> {
        let mut inner = self.lock();
        loop {
            if let Some(outcome) = outcome_of(&inner) {
                return outcome;
            }
            inner = self
                .resolved
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// The outcome if ingestion has resolved, without blocking.
    #[must_use]
    pub fn try_outcome(&self) -> Option<Result<Arc<Ingested>, IngestionError>> {
        outcome_of(&self.lock())
    }
}

fn outcome_of(inner: &Inner) -> Option<Result<Arc<Ingested>, IngestionError>> {
    match (&inner.state, &inner.output) {
        (IngestionState::Completed, Some(output)) => Some(Ok(Arc::clone(output))),
        (IngestionState::Failed(reason), _) => Some(Err(reason.clone())),
        _ => None,
    }
}
