//! Chunkcoord - bounded-concurrency coordination of host-owned regions
//!
//! This library loads a working set of regions from a host environment,
//! runs caller-supplied processing on each region while it is pinned
//! against host reclamation, and reports progress and cancellation.
//!
//! # High-Level API
//!
//! [`coordinator::BatchScheduler`] is the entry point:
//!
//! ```ignore
//! use chunkcoord::coord::RegionId;
//! use chunkcoord::coordinator::{BatchScheduler, FnProcessor};
//!
//! let scheduler = BatchScheduler::builder()
//!     .area(RegionId::new(0, 0), RegionId::new(7, 7))
//!     .processor(FnProcessor::new(|ctx| regenerate(ctx.region())))
//!     .build(loader)?;
//!
//! scheduler.start()?;
//! let report = scheduler.wait().await?;
//! ```

pub mod config;
pub mod coord;
pub mod coordinator;
pub mod logging;

/// Version of the chunkcoord library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
