//! Region loader contract.
//!
//! The host environment owns region data; the coordinator only asks for a
//! region to be made available and waits for the answer. A [`RegionLoader`]
//! receives one [`LoadCompletion`] per request and must resolve it with
//! either [`LoadCompletion::available`] or [`LoadCompletion::failed`].
//!
//! Both methods consume the completion, so each request is answered at most
//! once. A completion that is dropped unanswered reports an "abandoned"
//! failure, which keeps the scheduler from waiting forever on a loader that
//! lost track of a request.
//!
//! Host-side throttling (loads per tick, concurrent host loads) belongs to
//! the loader. The scheduler's own `max_concurrent_loads` limit is applied
//! before the loader is asked, so the effective concurrency is the smaller
//! of the two.

use super::run::RunEvent;
use crate::coord::RegionId;
use std::fmt;
use tokio::sync::mpsc;

// =============================================================================
// Loader Trait
// =============================================================================

/// Asynchronous source of region availability.
///
/// `request_load` must not block: implementations hand the completion to
/// their own task, thread or host callback and return.
pub trait RegionLoader: Send + Sync + 'static {
    /// Requests that `region` be made available.
    fn request_load(&self, region: RegionId, completion: LoadCompletion);

    /// Hint that the coordinator no longer needs `region` loaded.
    ///
    /// Only called when the run is configured with `unload_after`.
    fn unload(&self, _region: RegionId) {}

    /// Returns the loader name for logging.
    fn name(&self) -> &str {
        "loader"
    }
}

// =============================================================================
// Load Completion
// =============================================================================

type CompletionFn = Box<dyn FnOnce(RegionId, Result<(), LoadError>) + Send + 'static>;

enum CompletionTarget {
    Run(mpsc::UnboundedSender<RunEvent>),
    Callback(CompletionFn),
}

/// The success and failure callbacks for one load request.
pub struct LoadCompletion {
    region: RegionId,
    target: Option<CompletionTarget>,
}

impl LoadCompletion {
    /// Creates a completion that reports to a scheduler run.
    pub(crate) fn for_run(region: RegionId, events: mpsc::UnboundedSender<RunEvent>) -> Self {
        Self {
            region,
            target: Some(CompletionTarget::Run(events)),
        }
    }

    /// Creates a completion that calls `callback` with the outcome.
    ///
    /// Useful for driving a loader outside of a scheduler, for example in
    /// loader tests.
    pub fn from_fn<F>(region: RegionId, callback: F) -> Self
    where
        F: FnOnce(RegionId, Result<(), LoadError>) + Send + 'static,
    {
        Self {
            region,
            target: Some(CompletionTarget::Callback(Box::new(callback))),
        }
    }

    /// Returns the region this completion answers for.
    pub fn region(&self) -> RegionId {
        self.region
    }

    /// Reports that the region is loaded and may be pinned.
    pub fn available(mut self) {
        self.resolve(Ok(()));
    }

    /// Reports that the region could not be loaded.
    pub fn failed(mut self, error: LoadError) {
        self.resolve(Err(error));
    }

    fn resolve(&mut self, outcome: Result<(), LoadError>) {
        let region = self.region;
        match self.target.take() {
            Some(CompletionTarget::Run(events)) => {
                let event = match outcome {
                    Ok(()) => RunEvent::Loaded { region },
                    Err(error) => RunEvent::LoadFailed { region, error },
                };
                // A closed channel means the run is gone; nothing to report to.
                let _ = events.send(event);
            }
            Some(CompletionTarget::Callback(callback)) => callback(region, outcome),
            None => {}
        }
    }
}

impl Drop for LoadCompletion {
    fn drop(&mut self) {
        if self.target.is_some() {
            self.resolve(Err(LoadError::abandoned()));
        }
    }
}

impl fmt::Debug for LoadCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadCompletion")
            .field("region", &self.region)
            .field("resolved", &self.target.is_none())
            .finish()
    }
}

// =============================================================================
// Load Error
// =============================================================================

/// Category of load failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    /// The host could not make the region available.
    Unavailable,
    /// The loader dropped the request without answering.
    Abandoned,
}

/// Error reported by a loader for one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    /// Human-readable error message.
    pub message: String,
    /// Failure category.
    pub kind: LoadErrorKind,
}

impl LoadError {
    /// Creates an error for a region the host could not load.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: LoadErrorKind::Unavailable,
        }
    }

    /// Creates the error reported for an unanswered completion.
    pub fn abandoned() -> Self {
        Self {
            message: "load request dropped without a result".to_string(),
            kind: LoadErrorKind::Abandoned,
        }
    }

    /// Returns true if the loader never answered.
    pub fn is_abandoned(&self) -> bool {
        self.kind == LoadErrorKind::Abandoned
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LoadError {}
