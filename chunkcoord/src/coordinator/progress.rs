//! Progress reporting for batch runs.
//!
//! The run loop emits [`ProgressEvent`]s to a [`ProgressSink`]. The
//! scheduler doesn't know how events are consumed; sinks decide whether to
//! log them, forward them to callbacks, or aggregate them for a UI.
//!
//! # Example
//!
//! ```ignore
//! use chunkcoord::coordinator::{ProgressEvent, ProgressSink};
//!
//! struct PrintSink;
//!
//! impl ProgressSink for PrintSink {
//!     fn emit(&self, event: ProgressEvent) {
//!         println!("{}", event.event_type());
//!     }
//! }
//! ```

use super::report::RegionError;
use crate::coord::RegionId;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Progress Snapshot
// =============================================================================

/// Counters describing how far a run has progressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    /// Unique regions in the batch.
    pub total: usize,
    /// Regions not yet released or failed.
    pub remaining: usize,
    /// Regions processed successfully.
    pub processed: usize,
    /// Regions that failed to load or process.
    pub failed: usize,
}

impl Progress {
    /// Returns the number of regions that reached a final state.
    pub fn finished(&self) -> usize {
        self.total - self.remaining
    }

    /// Returns progress as a fraction in `0.0..=1.0`.
    ///
    /// An empty batch counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.finished() as f64 / self.total as f64
    }

    /// Returns progress as a whole percentage (0-100).
    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).floor() as u8
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({}%), {} failed",
            self.finished(),
            self.total,
            self.percent(),
            self.failed
        )
    }
}

// =============================================================================
// Progress Events
// =============================================================================

/// Events emitted during a run.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// The run started.
    Started {
        total: usize,
        max_concurrent_loads: usize,
    },

    /// A load was requested from the loader.
    RegionRequested { region: RegionId, in_flight: usize },

    /// A region was processed and its pin released.
    RegionProcessed { region: RegionId, progress: Progress },

    /// A region loaded after cancellation and was released unprocessed.
    RegionReleased { region: RegionId, progress: Progress },

    /// A region failed to load or process.
    RegionFailed {
        region: RegionId,
        error: RegionError,
        progress: Progress,
    },

    /// Every region reached a final state. Emitted at most once per run.
    Completed {
        progress: Progress,
        duration: Duration,
    },

    /// The run was cancelled and all in-flight regions drained.
    Cancelled {
        progress: Progress,
        duration: Duration,
    },
}

impl ProgressEvent {
    /// Returns the region associated with this event, if any.
    pub fn region(&self) -> Option<RegionId> {
        match self {
            Self::RegionRequested { region, .. }
            | Self::RegionProcessed { region, .. }
            | Self::RegionReleased { region, .. }
            | Self::RegionFailed { region, .. } => Some(*region),
            Self::Started { .. } | Self::Completed { .. } | Self::Cancelled { .. } => None,
        }
    }

    /// Returns the progress snapshot carried by this event, if any.
    pub fn progress(&self) -> Option<Progress> {
        match self {
            Self::RegionProcessed { progress, .. }
            | Self::RegionReleased { progress, .. }
            | Self::RegionFailed { progress, .. }
            | Self::Completed { progress, .. }
            | Self::Cancelled { progress, .. } => Some(*progress),
            Self::Started { .. } | Self::RegionRequested { .. } => None,
        }
    }

    /// Returns a short name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::RegionRequested { .. } => "region_requested",
            Self::RegionProcessed { .. } => "region_processed",
            Self::RegionReleased { .. } => "region_released",
            Self::RegionFailed { .. } => "region_failed",
            Self::Completed { .. } => "completed",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// Returns true if this event ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Cancelled { .. })
    }
}

// =============================================================================
// Progress Sink Trait
// =============================================================================

/// Receiver of progress events.
///
/// Events are emitted from the run loop task, so implementations must be
/// fast and must not block.
pub trait ProgressSink: Send + Sync {
    /// Called for every progress event.
    fn emit(&self, event: ProgressEvent);
}

/// Sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Sink that logs events using the `tracing` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn emit(&self, event: ProgressEvent) {
        match &event {
            ProgressEvent::Started {
                total,
                max_concurrent_loads,
            } => {
                tracing::debug!(total, max_concurrent_loads, "Batch started");
            }
            ProgressEvent::RegionRequested { region, in_flight } => {
                tracing::trace!(region = %region, in_flight, "Region requested");
            }
            ProgressEvent::RegionProcessed { region, progress } => {
                tracing::debug!(
                    region = %region,
                    remaining = progress.remaining,
                    total = progress.total,
                    "Region processed"
                );
            }
            ProgressEvent::RegionReleased { region, progress } => {
                tracing::debug!(
                    region = %region,
                    remaining = progress.remaining,
                    "Region released unprocessed"
                );
            }
            ProgressEvent::RegionFailed {
                region,
                error,
                progress,
            } => {
                tracing::warn!(
                    region = %region,
                    error = %error,
                    remaining = progress.remaining,
                    "Region failed"
                );
            }
            ProgressEvent::Completed { progress, duration } => {
                tracing::info!(
                    total = progress.total,
                    processed = progress.processed,
                    failed = progress.failed,
                    duration_ms = duration.as_millis(),
                    "Batch completed"
                );
            }
            ProgressEvent::Cancelled { progress, duration } => {
                tracing::info!(
                    total = progress.total,
                    remaining = progress.remaining,
                    duration_ms = duration.as_millis(),
                    "Batch cancelled"
                );
            }
        }
    }
}

/// Sink that forwards every event to several sinks in order.
#[derive(Default, Clone)]
pub struct MultiplexProgressSink {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl MultiplexProgressSink {
    /// Creates an empty multiplexer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink.
    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Adds a sink in place.
    pub fn push(&mut self, sink: Arc<dyn ProgressSink>) {
        self.sinks.push(sink);
    }

    /// Returns the number of attached sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true if no sinks are attached.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ProgressSink for MultiplexProgressSink {
    fn emit(&self, event: ProgressEvent) {
        let Some((last, rest)) = self.sinks.split_last() else {
            return;
        };
        for sink in rest {
            sink.emit(event.clone());
        }
        last.emit(event);
    }
}

impl fmt::Debug for MultiplexProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiplexProgressSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

type CompleteFn = Box<dyn Fn() + Send + Sync>;
type RegionFailedFn = Box<dyn Fn(RegionId, &RegionError) + Send + Sync>;
type CancelledFn = Box<dyn Fn(Progress) + Send + Sync>;

/// Sink that maps events onto plain callbacks.
///
/// This is the closure-style contract: a completion callback and a
/// per-region failure callback, plus an optional cancellation callback.
#[derive(Default)]
pub struct CallbackProgressSink {
    on_complete: Option<CompleteFn>,
    on_region_failed: Option<RegionFailedFn>,
    on_cancelled: Option<CancelledFn>,
}

impl CallbackProgressSink {
    /// Creates a sink with no callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the callback fired once every region reached a final state.
    pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Sets the callback fired for each failed region.
    pub fn on_region_failed(
        mut self,
        f: impl Fn(RegionId, &RegionError) + Send + Sync + 'static,
    ) -> Self {
        self.on_region_failed = Some(Box::new(f));
        self
    }

    /// Sets the callback fired when a cancelled run has drained.
    pub fn on_cancelled(mut self, f: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.on_cancelled = Some(Box::new(f));
        self
    }
}

impl ProgressSink for CallbackProgressSink {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Completed { .. } => {
                if let Some(f) = &self.on_complete {
                    f();
                }
            }
            ProgressEvent::RegionFailed { region, error, .. } => {
                if let Some(f) = &self.on_region_failed {
                    f(region, &error);
                }
            }
            ProgressEvent::Cancelled { progress, .. } => {
                if let Some(f) = &self.on_cancelled {
                    f(progress);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Debug for CallbackProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackProgressSink")
            .field("on_complete", &self.on_complete.is_some())
            .field("on_region_failed", &self.on_region_failed.is_some())
            .field("on_cancelled", &self.on_cancelled.is_some())
            .finish()
    }
}
