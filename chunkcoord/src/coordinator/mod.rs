//! Chunk coordination.
//!
//! This module loads a bounded working set of host-owned regions, applies a
//! caller-supplied processor to each one while it is pinned, and reports
//! progress until every region is finished or the run is cancelled.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      BatchScheduler                          │
//! │  start / cancel / remaining_chunks / total_chunks / wait     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                        BatchRun                              │
//! │  Single-consumer loop: request loads, pin, process, release  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │ Region      │  │ Pin         │  │ Progress            │  │
//! │  │ Loader      │  │ Registry    │  │ Sink                │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **Region handle**: per-region status, advanced only along
//!   `Pending → Requested → Loaded → Processing → Released`, or to `Failed`
//!   when the load fails.
//!
//! - **Pin**: while a region is pinned the host must not reclaim it. Pins are
//!   [`PinToken`]s; releasing consumes the token.
//!
//! - **Throttling**: at most `max_concurrent_loads` regions are in flight.
//!   The loader may throttle further on its own.
//!
//! - **Cancellation**: cooperative. No new loads after `cancel()`; running
//!   processors finish and release their pins.
//!
//! # Example
//!
//! ```ignore
//! use chunkcoord::coord::RegionId;
//! use chunkcoord::coordinator::{
//!     BatchScheduler, FnProcessor, HostConfig, PinRegistry, SimulatedHost,
//! };
//!
//! let pins = PinRegistry::new();
//! let host = SimulatedHost::spawn(HostConfig::default(), pins.clone());
//!
//! let scheduler = BatchScheduler::builder()
//!     .area(RegionId::new(-2, -2), RegionId::new(2, 2))
//!     .max_concurrent_loads(4)
//!     .pin_registry(pins)
//!     .processor(FnProcessor::new(|ctx| {
//!         println!("processing {}", ctx.region());
//!         Ok(())
//!     }))
//!     .on_region_failed(|region, err| eprintln!("{}: {}", region, err))
//!     .build(host)?;
//!
//! scheduler.start()?;
//! let report = scheduler.wait().await?;
//! assert_eq!(report.processed, 25);
//! ```

mod adapters;
mod builder;
mod config;
mod handle;
mod loader;
mod pin;
mod processor;
mod progress;
mod report;
mod run;
mod scheduler;
mod tracker;
mod traits;
mod watchdog;

pub use adapters::{
    HostConfig, HostStats, SimulatedHost, DEFAULT_HOST_CONCURRENT_LOADS, DEFAULT_LOADS_PER_TICK,
    DEFAULT_LOAD_LATENCY_MS, DEFAULT_TICK_MS,
};
pub use builder::BatchSchedulerBuilder;
pub use config::{
    clamp_concurrent_loads, CoordinatorConfig, DEFAULT_MAX_CONCURRENT_LOADS,
    DEFAULT_STALL_THRESHOLD_SECS, MAX_CONCURRENT_LOADS_LIMIT,
};
pub use handle::{RegionHandle, RegionStatus, StatusTransitionError};
pub use loader::{LoadCompletion, LoadError, LoadErrorKind, RegionLoader};
pub use pin::{PinError, PinOwner, PinRegistry, PinStats, PinToken};
pub use processor::{
    AsyncFnProcessor, FnProcessor, ProcessContext, ProcessFuture, ProcessorError, RegionProcessor,
};
pub use progress::{
    CallbackProgressSink, MultiplexProgressSink, NullProgressSink, Progress, ProgressEvent,
    ProgressSink, TracingProgressSink,
};
pub use report::{BatchReport, RegionError, RegionFailure};
pub use scheduler::{BatchScheduler, CoordinatorError, RunStatus};
pub use tracker::{ProgressSnapshot, ProgressTracker, SharedProgressTracker, MAX_RECENT_FAILURES};
pub use traits::{ChunkCoordinator, NullCoordinator};
