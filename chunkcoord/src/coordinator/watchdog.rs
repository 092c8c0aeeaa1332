//! Stall detection watchdog.
//!
//! Monitors a run by tracking when a region last finished and warning when
//! regions are in flight but none has finished for longer than the
//! threshold. A stalled run usually means the loader stopped answering or a
//! processor is stuck.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Number of health checks per threshold period.
const CHECKS_PER_THRESHOLD: u32 = 3;

/// Shortest interval between health checks.
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Returns the current time in milliseconds since the UNIX epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Result of one health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Health {
    /// Regions in flight and nothing finished within the threshold.
    Stalled,
    /// Nothing in flight.
    Idle,
    /// Recent progress.
    Healthy,
}

/// Stall detection watchdog for a batch run.
pub(crate) struct StallWatchdog {
    /// Shared timestamp of the last region that finished.
    last_progress_ms: Arc<AtomicU64>,

    /// Shared count of regions in flight.
    in_flight: Arc<AtomicUsize>,

    /// Stall threshold.
    threshold: Duration,

    /// Check interval.
    interval: Duration,
}

impl StallWatchdog {
    /// Creates a watchdog that warns after `threshold` without progress.
    pub(crate) fn new(
        last_progress_ms: Arc<AtomicU64>,
        in_flight: Arc<AtomicUsize>,
        threshold: Duration,
    ) -> Self {
        Self {
            last_progress_ms,
            in_flight,
            threshold,
            interval: (threshold / CHECKS_PER_THRESHOLD).max(MIN_CHECK_INTERVAL),
        }
    }

    /// Runs the watchdog until `done` is cancelled.
    pub(crate) async fn run(self, done: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = done.cancelled() => break,
                _ = interval.tick() => {
                    self.check_health();
                }
            }
        }
    }

    /// Checks run health and logs appropriate message.
    pub(crate) fn check_health(&self) -> Health {
        let elapsed_ms = now_ms().saturating_sub(self.last_progress_ms.load(Ordering::Relaxed));
        let in_flight = self.in_flight.load(Ordering::Relaxed);
        let threshold_ms = self.threshold.as_millis() as u64;

        match (elapsed_ms > threshold_ms, in_flight > 0) {
            (true, true) => {
                warn!(
                    elapsed_ms,
                    in_flight,
                    threshold_ms,
                    "STALL DETECTED: {} regions in flight but none finished for {}s",
                    in_flight,
                    elapsed_ms / 1000
                );
                Health::Stalled
            }
            (_, false) => {
                debug!(elapsed_ms, "Stall watchdog: no regions in flight");
                Health::Idle
            }
            (false, true) => {
                debug!(elapsed_ms, in_flight, "Stall watchdog: run healthy");
                Health::Healthy
            }
        }
    }
}
