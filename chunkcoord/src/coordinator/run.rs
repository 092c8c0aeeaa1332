//! Batch run loop.
//!
//! A [`BatchRun`] is the single consumer of every event in a run. Loader
//! outcomes and processor completions arrive as [`RunEvent`]s on one
//! unbounded channel; cancellation arrives through the scheduler's
//! `CancellationToken`. All run state (handle status, in-flight count,
//! `remaining`, the cancelled flag) is mutated only here, so no field needs
//! its own lock.
//!
//! ```text
//!   start() ──► top_up ──► loader.request_load ──► LoadCompletion
//!                 ▲                                     │
//!                 │                    Loaded / LoadFailed
//!                 │                                     ▼
//!                 │          ┌──────────── run loop (select!) ◄── cancel()
//!                 │          │ acquire pin, spawn processor
//!                 │          ▼
//!                 │    processor task ── Processed { token } ──┐
//!                 │                                            ▼
//!                 └──────────── release pin, remaining -= 1 ◄──┘
//! ```

use super::config::CoordinatorConfig;
use super::handle::{RegionHandle, RegionStatus};
use super::loader::{LoadCompletion, LoadError, RegionLoader};
use super::pin::{PinOwner, PinRegistry, PinToken};
use super::processor::{panic_message, ProcessContext, ProcessorError, RegionProcessor};
use super::progress::{Progress, ProgressEvent, ProgressSink};
use super::report::{BatchReport, RegionError, RegionFailure};
use super::scheduler::RunStatus;
use super::watchdog::{now_ms, StallWatchdog};
use crate::coord::RegionId;
use futures::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Events delivered to the run loop.
#[derive(Debug)]
pub(crate) enum RunEvent {
    /// The loader made a region available.
    Loaded { region: RegionId },

    /// The loader could not make a region available.
    LoadFailed { region: RegionId, error: LoadError },

    /// A processor finished; the pin comes back with the outcome.
    Processed {
        token: PinToken,
        outcome: Result<(), ProcessorError>,
    },
}

/// State shared between the run loop and the [`BatchScheduler`] handle.
///
/// [`BatchScheduler`]: super::scheduler::BatchScheduler
#[derive(Clone)]
pub(crate) struct RunShared {
    pub(crate) remaining: Arc<AtomicUsize>,
    pub(crate) cancellation: CancellationToken,
    pub(crate) status_tx: watch::Sender<RunStatus>,
    pub(crate) report: Arc<Mutex<Option<BatchReport>>>,
}

/// Collaborators and settings for one run.
pub(crate) struct RunParts {
    pub(crate) regions: Vec<RegionId>,
    pub(crate) config: CoordinatorConfig,
    pub(crate) loader: Arc<dyn RegionLoader>,
    pub(crate) processor: Arc<dyn RegionProcessor>,
    pub(crate) sink: Arc<dyn ProgressSink>,
    pub(crate) pins: PinRegistry,
}

/// Reports a broken coordinator state machine.
///
/// These conditions are programming errors, not runtime failures, so the
/// run loop stops loudly instead of carrying on with corrupt state.
#[track_caller]
fn invariant_violation(err: impl fmt::Display) -> ! {
    error!(error = %err, "Coordinator invariant violated");
    panic!("coordinator invariant violated: {}", err);
}

/// The run loop and its private state.
pub(crate) struct BatchRun {
    /// Regions in request order.
    requested: Vec<RegionId>,
    /// Index of the next region to request.
    next_pending: usize,
    handles: HashMap<RegionId, RegionHandle>,

    in_flight: usize,
    peak_in_flight: usize,
    processed: usize,
    failures: Vec<RegionFailure>,
    cancelled: bool,

    config: CoordinatorConfig,
    loader: Arc<dyn RegionLoader>,
    processor: Arc<dyn RegionProcessor>,
    sink: Arc<dyn ProgressSink>,
    pins: PinRegistry,
    owner: PinOwner,

    events_tx: mpsc::UnboundedSender<RunEvent>,
    events_rx: mpsc::UnboundedReceiver<RunEvent>,
    shared: RunShared,

    /// Gauges read by the stall watchdog.
    in_flight_gauge: Arc<AtomicUsize>,
    last_progress_ms: Arc<AtomicU64>,
}

impl BatchRun {
    pub(crate) fn new(parts: RunParts, shared: RunShared) -> Self {
        let RunParts {
            regions,
            config,
            loader,
            processor,
            sink,
            pins,
        } = parts;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handles = regions
            .iter()
            .map(|&region| (region, RegionHandle::new(region)))
            .collect();
        let owner = pins.owner();

        Self {
            requested: regions,
            next_pending: 0,
            handles,
            in_flight: 0,
            peak_in_flight: 0,
            processed: 0,
            failures: Vec::new(),
            cancelled: false,
            config,
            loader,
            processor,
            sink,
            pins,
            owner,
            events_tx,
            events_rx,
            shared,
            in_flight_gauge: Arc::new(AtomicUsize::new(0)),
            last_progress_ms: Arc::new(AtomicU64::new(now_ms())),
        }
    }

    /// Runs the batch until it has drained.
    pub(crate) async fn run(mut self) {
        let started_at = Instant::now();
        let done = CancellationToken::new();
        let _done_guard = done.clone().drop_guard();

        if let Some(threshold) = self.config.stall_threshold {
            let watchdog = StallWatchdog::new(
                Arc::clone(&self.last_progress_ms),
                Arc::clone(&self.in_flight_gauge),
                threshold,
            );
            tokio::spawn(watchdog.run(done.clone()));
        }

        self.shared.status_tx.send_replace(RunStatus::Running);
        info!(
            total = self.requested.len(),
            max_concurrent_loads = self.config.max_concurrent_loads,
            loader = self.loader.name(),
            owner = %self.owner,
            "Batch run started"
        );
        self.sink.emit(ProgressEvent::Started {
            total: self.requested.len(),
            max_concurrent_loads: self.config.max_concurrent_loads,
        });

        self.top_up();

        while !self.is_drained() {
            tokio::select! {
                biased;

                _ = self.shared.cancellation.cancelled(), if !self.cancelled => {
                    self.handle_cancel();
                }

                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    // The run holds a sender, so the channel cannot close.
                    None => break,
                },
            }
        }

        self.finish(started_at).await;
    }

    /// Returns true when no region is in flight and no more will be requested.
    fn is_drained(&self) -> bool {
        self.in_flight == 0 && (self.cancelled || self.next_pending == self.requested.len())
    }

    fn remaining(&self) -> usize {
        self.shared.remaining.load(Ordering::Acquire)
    }

    fn progress(&self) -> Progress {
        Progress {
            total: self.requested.len(),
            remaining: self.remaining(),
            processed: self.processed,
            failed: self.failures.len(),
        }
    }

    /// Picks up a cancellation that raced the current event.
    fn observe_cancellation(&mut self) {
        if !self.cancelled && self.shared.cancellation.is_cancelled() {
            self.handle_cancel();
        }
    }

    fn transition(&mut self, region: RegionId, next: RegionStatus) {
        let Some(handle) = self.handles.get_mut(&region) else {
            invariant_violation(format!("event for region {} outside this batch", region));
        };
        if let Err(e) = handle.advance(next) {
            invariant_violation(e);
        }
    }

    /// Requests loads until the in-flight limit is reached or nothing is
    /// left to request.
    fn top_up(&mut self) {
        self.observe_cancellation();

        while !self.cancelled
            && self.in_flight < self.config.max_concurrent_loads
            && self.next_pending < self.requested.len()
        {
            let region = self.requested[self.next_pending];
            self.next_pending += 1;

            self.transition(region, RegionStatus::Requested);
            self.in_flight += 1;
            self.peak_in_flight = self.peak_in_flight.max(self.in_flight);
            self.in_flight_gauge.store(self.in_flight, Ordering::Relaxed);
            debug_assert!(self.in_flight <= self.config.max_concurrent_loads);

            debug!(region = %region, in_flight = self.in_flight, "Requesting region load");
            self.sink.emit(ProgressEvent::RegionRequested {
                region,
                in_flight: self.in_flight,
            });

            let completion = LoadCompletion::for_run(region, self.events_tx.clone());
            self.loader.request_load(region, completion);
        }
    }

    fn handle_cancel(&mut self) {
        self.cancelled = true;
        self.shared.status_tx.send_replace(RunStatus::Cancelling);
        info!(
            in_flight = self.in_flight,
            never_requested = self.requested.len() - self.next_pending,
            remaining = self.remaining(),
            "Batch cancelled, draining in-flight regions"
        );
    }

    fn handle_event(&mut self, event: RunEvent) {
        self.observe_cancellation();

        match event {
            RunEvent::Loaded { region } => self.handle_loaded(region),
            RunEvent::LoadFailed { region, error } => self.handle_load_failed(region, error),
            RunEvent::Processed { token, outcome } => self.handle_processed(token, outcome),
        }
    }

    fn handle_loaded(&mut self, region: RegionId) {
        self.transition(region, RegionStatus::Loaded);
        let token = self
            .pins
            .acquire(self.owner, region)
            .unwrap_or_else(|e| invariant_violation(e));

        if self.cancelled {
            debug!(region = %region, "Region loaded after cancellation, releasing without processing");
            self.release(token);
            self.transition(region, RegionStatus::Released);
            self.region_finished();
            self.sink.emit(ProgressEvent::RegionReleased {
                region,
                progress: self.progress(),
            });
            return;
        }

        self.transition(region, RegionStatus::Processing);
        debug!(region = %region, "Processing region");

        let processor = Arc::clone(&self.processor);
        let events = self.events_tx.clone();
        let ctx = ProcessContext::new(region, self.shared.cancellation.child_token());

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(async { processor.process(&ctx).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(ProcessorError::panicked(panic_message(payload))));
            // The run loop outlives every processor task it spawned.
            let _ = events.send(RunEvent::Processed { token, outcome });
        });
    }

    fn handle_load_failed(&mut self, region: RegionId, error: LoadError) {
        self.transition(region, RegionStatus::Failed);
        warn!(region = %region, error = %error, "Region load failed");
        self.region_finished();
        self.record_failure(region, RegionError::Load(error));
        self.top_up();
    }

    fn handle_processed(&mut self, token: PinToken, outcome: Result<(), ProcessorError>) {
        let region = token.region();
        self.release(token);
        self.transition(region, RegionStatus::Released);
        self.region_finished();

        match outcome {
            Ok(()) => {
                self.processed += 1;
                debug!(region = %region, remaining = self.remaining(), "Region processed");
                self.sink.emit(ProgressEvent::RegionProcessed {
                    region,
                    progress: self.progress(),
                });
            }
            Err(error) => {
                warn!(region = %region, error = %error, "Region processor failed");
                self.record_failure(region, RegionError::Processor(error));
            }
        }

        self.top_up();
    }

    /// Accounts for one region reaching `Released` or `Failed`.
    fn region_finished(&mut self) {
        self.in_flight -= 1;
        self.in_flight_gauge.store(self.in_flight, Ordering::Relaxed);
        self.shared.remaining.fetch_sub(1, Ordering::AcqRel);
        self.last_progress_ms.store(now_ms(), Ordering::Relaxed);
    }

    fn record_failure(&mut self, region: RegionId, error: RegionError) {
        self.failures.push(RegionFailure {
            region,
            error: error.clone(),
        });
        self.sink.emit(ProgressEvent::RegionFailed {
            region,
            error,
            progress: self.progress(),
        });
    }

    fn release(&self, token: PinToken) {
        let region = token.region();
        if let Err(e) = self.pins.release(token) {
            invariant_violation(e);
        }
        if self.config.unload_after {
            self.loader.unload(region);
        }
    }

    async fn finish(self, started_at: Instant) {
        let duration = started_at.elapsed();
        let progress = self.progress();
        let total = self.requested.len();

        let report = BatchReport {
            total,
            processed: self.processed,
            failures: self.failures,
            cancelled: self.cancelled,
            unprocessed: total - self.processed - progress.failed,
            peak_in_flight: self.peak_in_flight,
            duration,
        };
        *self.shared.report.lock().await = Some(report);

        let status = if self.cancelled {
            info!(
                remaining = progress.remaining,
                duration_ms = duration.as_millis(),
                "Batch run cancelled"
            );
            self.sink
                .emit(ProgressEvent::Cancelled { progress, duration });
            RunStatus::Cancelled
        } else {
            info!(
                processed = progress.processed,
                failed = progress.failed,
                duration_ms = duration.as_millis(),
                "Batch run completed"
            );
            self.sink
                .emit(ProgressEvent::Completed { progress, duration });
            RunStatus::Completed
        };

        self.shared.status_tx.send_replace(status);
    }
}
