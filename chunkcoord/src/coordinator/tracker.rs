//! Progress tracking for UI display.
//!
//! [`ProgressTracker`] is a [`ProgressSink`] that keeps the latest counters
//! and a bounded list of recent failures so a UI thread can poll a
//! consistent snapshot without subscribing to individual events.
//!
//! ```text
//! Run loop                 ProgressTracker                 UI
//!    │ emit(RegionProcessed)     │                          │
//!    ├──────────────────────────►│ update counters          │
//!    │                           │          snapshot()      │
//!    │                           │◄─────────────────────────┤
//!    │                           ├─────────────────────────►│
//! ```

use super::progress::{Progress, ProgressEvent, ProgressSink};
use super::report::RegionFailure;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

/// Maximum number of recent failures kept for display.
pub const MAX_RECENT_FAILURES: usize = 8;

/// Point-in-time view of a run for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    /// Latest counters.
    pub progress: Progress,
    /// Regions currently loading or processing.
    pub in_flight: usize,
    /// Most recent failures, newest first.
    pub recent_failures: Vec<RegionFailure>,
    /// Whether the run has finished (completed or cancelled).
    pub finished: bool,
    /// Whether the run ended by cancellation.
    pub cancelled: bool,
}

#[derive(Debug, Default)]
struct TrackerState {
    progress: Progress,
    in_flight: usize,
    recent_failures: VecDeque<RegionFailure>,
    finished: bool,
    cancelled: bool,
}

/// Thread-safe aggregator of progress events.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    state: RwLock<TrackerState>,
}

/// Shared progress tracker.
pub type SharedProgressTracker = Arc<ProgressTracker>;

impl ProgressTracker {
    /// Creates a new, shareable tracker.
    pub fn new() -> SharedProgressTracker {
        Arc::new(Self::default())
    }

    /// Returns a snapshot of the current state.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        ProgressSnapshot {
            progress: state.progress,
            in_flight: state.in_flight,
            recent_failures: state.recent_failures.iter().cloned().collect(),
            finished: state.finished,
            cancelled: state.cancelled,
        }
    }
}

impl ProgressSink for ProgressTracker {
    fn emit(&self, event: ProgressEvent) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        match event {
            ProgressEvent::Started { total, .. } => {
                *state = TrackerState {
                    progress: Progress {
                        total,
                        remaining: total,
                        ..Progress::default()
                    },
                    ..TrackerState::default()
                };
            }
            ProgressEvent::RegionRequested { in_flight, .. } => {
                state.in_flight = in_flight;
            }
            ProgressEvent::RegionProcessed { progress, .. }
            | ProgressEvent::RegionReleased { progress, .. } => {
                state.progress = progress;
                state.in_flight = state.in_flight.saturating_sub(1);
            }
            ProgressEvent::RegionFailed {
                region,
                error,
                progress,
            } => {
                state.progress = progress;
                state.in_flight = state.in_flight.saturating_sub(1);
                state
                    .recent_failures
                    .push_front(RegionFailure { region, error });
                state.recent_failures.truncate(MAX_RECENT_FAILURES);
            }
            ProgressEvent::Completed { progress, .. } => {
                state.progress = progress;
                state.in_flight = 0;
                state.finished = true;
            }
            ProgressEvent::Cancelled { progress, .. } => {
                state.progress = progress;
                state.in_flight = 0;
                state.finished = true;
                state.cancelled = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::RegionId;
    use crate::coordinator::loader::LoadError;
    use crate::coordinator::report::RegionError;
    use std::time::Duration;

    fn progress(total: usize, remaining: usize, failed: usize) -> Progress {
        Progress {
            total,
            remaining,
            processed: total - remaining - failed,
            failed,
        }
    }

    #[test]
    fn test_started_resets_state() {
        let tracker = ProgressTracker::new();
        tracker.emit(ProgressEvent::Started {
            total: 5,
            max_concurrent_loads: 2,
        });

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.progress.total, 5);
        assert_eq!(snapshot.progress.remaining, 5);
        assert!(!snapshot.finished);
    }

    #[test]
    fn test_tracks_in_flight_and_progress() {
        let tracker = ProgressTracker::new();
        let region = RegionId::new(0, 0);
        tracker.emit(ProgressEvent::Started {
            total: 2,
            max_concurrent_loads: 2,
        });
        tracker.emit(ProgressEvent::RegionRequested {
            region,
            in_flight: 1,
        });
        tracker.emit(ProgressEvent::RegionRequested {
            region: RegionId::new(1, 0),
            in_flight: 2,
        });
        assert_eq!(tracker.snapshot().in_flight, 2);

        tracker.emit(ProgressEvent::RegionProcessed {
            region,
            progress: progress(2, 1, 0),
        });
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.in_flight, 1);
        assert_eq!(snapshot.progress.processed, 1);
    }

    #[test]
    fn test_release_after_cancel_updates_progress() {
        let tracker = ProgressTracker::new();
        let region = RegionId::new(0, 1);
        tracker.emit(ProgressEvent::Started {
            total: 4,
            max_concurrent_loads: 2,
        });
        tracker.emit(ProgressEvent::RegionRequested {
            region,
            in_flight: 1,
        });

        tracker.emit(ProgressEvent::RegionReleased {
            region,
            progress: progress(4, 3, 0),
        });

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.in_flight, 0);
        assert_eq!(snapshot.progress.remaining, 3);
        assert_eq!(snapshot.progress.processed, 1);
        assert!(!snapshot.finished);
    }

    #[test]
    fn test_recent_failures_bounded_newest_first() {
        let tracker = ProgressTracker::new();
        for i in 0..(MAX_RECENT_FAILURES as i32 + 3) {
            tracker.emit(ProgressEvent::RegionFailed {
                region: RegionId::new(i, 0),
                error: RegionError::Load(LoadError::new("x")),
                progress: Progress::default(),
            });
        }

        let failures = tracker.snapshot().recent_failures;
        assert_eq!(failures.len(), MAX_RECENT_FAILURES);
        assert_eq!(
            failures[0].region,
            RegionId::new(MAX_RECENT_FAILURES as i32 + 2, 0)
        );
    }

    #[test]
    fn test_terminal_events_mark_finished() {
        let tracker = ProgressTracker::new();
        tracker.emit(ProgressEvent::Cancelled {
            progress: progress(4, 3, 0),
            duration: Duration::ZERO,
        });
        let snapshot = tracker.snapshot();
        assert!(snapshot.finished);
        assert!(snapshot.cancelled);

        tracker.emit(ProgressEvent::Completed {
            progress: progress(4, 0, 0),
            duration: Duration::ZERO,
        });
        assert!(tracker.snapshot().finished);
    }
}
