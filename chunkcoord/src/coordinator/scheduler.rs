//! Batch scheduler handle.
//!
//! [`BatchScheduler`] is the caller-facing side of one run. It owns the run
//! loop until [`start`](BatchScheduler::start) hands it to the Tokio
//! runtime; afterwards it only observes shared counters and signals
//! cancellation.

use super::builder::BatchSchedulerBuilder;
use super::report::BatchReport;
use super::run::{BatchRun, RunShared};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Errors returned by scheduler operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// `start()` was called on a scheduler that already started.
    #[error("Batch scheduler already started")]
    AlreadyStarted,

    /// `start()` was called outside a Tokio runtime.
    #[error("No Tokio runtime available to run the batch")]
    NoRuntime,

    /// `wait()` was called before `start()`.
    #[error("Batch scheduler has not been started")]
    NotStarted,

    /// The run loop ended without producing a report.
    #[error("Batch run aborted before producing a report")]
    RunAborted,

    /// The builder was finished without a processor.
    #[error("No region processor configured")]
    MissingProcessor,
}

/// Lifecycle of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    /// Built but not started.
    #[default]
    Idle,
    /// Loads are being issued and processed.
    Running,
    /// Cancelled; in-flight regions are draining.
    Cancelling,
    /// Every region reached a final state.
    Completed,
    /// Cancelled and fully drained.
    Cancelled,
}

impl RunStatus {
    /// Returns true if the run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Coordinates loading and processing of a fixed set of regions.
///
/// Build one with [`BatchScheduler::builder`]. A scheduler runs exactly
/// once; build a new one for the next batch.
pub struct BatchScheduler {
    total: usize,
    remaining: Arc<AtomicUsize>,
    cancellation: CancellationToken,
    status_rx: watch::Receiver<RunStatus>,
    report: Arc<tokio::sync::Mutex<Option<BatchReport>>>,
    /// The run loop, until it is handed to the runtime.
    pending_run: Mutex<Option<BatchRun>>,
}

impl BatchScheduler {
    /// Returns a builder for a new scheduler.
    pub fn builder() -> BatchSchedulerBuilder {
        BatchSchedulerBuilder::new()
    }

    pub(crate) fn from_parts(parts: super::run::RunParts) -> Self {
        let total = parts.regions.len();
        let remaining = Arc::new(AtomicUsize::new(total));
        let cancellation = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(RunStatus::Idle);
        let report = Arc::new(tokio::sync::Mutex::new(None));

        let shared = RunShared {
            remaining: Arc::clone(&remaining),
            cancellation: cancellation.clone(),
            status_tx,
            report: Arc::clone(&report),
        };

        Self {
            total,
            remaining,
            cancellation,
            status_rx,
            report,
            pending_run: Mutex::new(Some(BatchRun::new(parts, shared))),
        }
    }

    /// Begins the run.
    ///
    /// Spawns the run loop on the current Tokio runtime and returns
    /// immediately. Loading happens asynchronously.
    ///
    /// # Errors
    ///
    /// - [`CoordinatorError::AlreadyStarted`] on a second call.
    /// - [`CoordinatorError::NoRuntime`] when called outside a runtime; the
    ///   scheduler stays startable.
    pub fn start(&self) -> Result<(), CoordinatorError> {
        let mut slot = self
            .pending_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(run) = slot.take() else {
            return Err(CoordinatorError::AlreadyStarted);
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(total = self.total, "Spawning batch run");
                runtime.spawn(run.run());
                Ok(())
            }
            Err(_) => {
                *slot = Some(run);
                Err(CoordinatorError::NoRuntime)
            }
        }
    }

    /// Cancels the run.
    ///
    /// Idempotent and callable from any thread. No new loads are issued once
    /// the run loop observes the cancellation; processors already running
    /// finish and release their pins.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Returns true once `cancel()` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns a snapshot of regions not yet released or failed.
    pub fn remaining_chunks(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Returns the number of unique regions in the batch.
    pub fn total_chunks(&self) -> usize {
        self.total
    }

    /// Returns the current run status.
    pub fn status(&self) -> RunStatus {
        *self.status_rx.borrow()
    }

    /// Returns a receiver that observes status changes.
    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.status_rx.clone()
    }

    /// Waits for the run to end and returns its report.
    ///
    /// The report is returned to every caller of `wait()`.
    ///
    /// # Errors
    ///
    /// - [`CoordinatorError::NotStarted`] if the run was never started.
    /// - [`CoordinatorError::RunAborted`] if the run loop died without a
    ///   report.
    pub async fn wait(&self) -> Result<BatchReport, CoordinatorError> {
        if self.status() == RunStatus::Idle && self.has_pending_run() {
            return Err(CoordinatorError::NotStarted);
        }

        let mut status_rx = self.status_rx.clone();
        while !status_rx.borrow_and_update().is_terminal() {
            if status_rx.changed().await.is_err() {
                break;
            }
        }

        self.report
            .lock()
            .await
            .clone()
            .ok_or(CoordinatorError::RunAborted)
    }

    fn has_pending_run(&self) -> bool {
        self.pending_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for BatchScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchScheduler")
            .field("total", &self.total)
            .field("remaining", &self.remaining_chunks())
            .field("status", &self.status())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_terminal() {
        assert!(!RunStatus::Idle.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::Cancelling.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_run_status_display() {
        assert_eq!(RunStatus::Cancelling.to_string(), "cancelling");
        assert_eq!(RunStatus::default(), RunStatus::Idle);
    }

    #[test]
    fn test_coordinator_error_display() {
        assert_eq!(
            CoordinatorError::AlreadyStarted.to_string(),
            "Batch scheduler already started"
        );
        assert!(CoordinatorError::NoRuntime.to_string().contains("Tokio"));
    }
}
