//! Default values and constants for all configuration settings.
//!
//! Contains the `DEFAULT_*` constants and the `Default` implementations of
//! each section.

use std::path::PathBuf;

use super::settings::*;

// =============================================================================
// Coordinator
// =============================================================================

pub use crate::coordinator::{
    DEFAULT_MAX_CONCURRENT_LOADS, DEFAULT_STALL_THRESHOLD_SECS, MAX_CONCURRENT_LOADS_LIMIT,
};

/// Default for unloading regions after release.
pub const DEFAULT_UNLOAD_AFTER: bool = true;

// =============================================================================
// Simulated host
// =============================================================================

pub use crate::coordinator::{
    DEFAULT_HOST_CONCURRENT_LOADS, DEFAULT_LOADS_PER_TICK, DEFAULT_LOAD_LATENCY_MS,
    DEFAULT_TICK_MS,
};

/// Default for reclaiming unpinned regions.
pub const DEFAULT_RECLAIM_UNPINNED: bool = true;

// =============================================================================
// Logging
// =============================================================================

/// Default log directory, relative to the working directory.
pub const DEFAULT_LOG_DIRECTORY: &str = "logs";

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "chunkcoord.log";

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_loads: DEFAULT_MAX_CONCURRENT_LOADS,
            unload_after: DEFAULT_UNLOAD_AFTER,
            stall_threshold_secs: DEFAULT_STALL_THRESHOLD_SECS,
        }
    }
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            max_concurrent_loads: DEFAULT_HOST_CONCURRENT_LOADS,
            loads_per_tick: DEFAULT_LOADS_PER_TICK,
            tick_ms: DEFAULT_TICK_MS,
            load_latency_ms: DEFAULT_LOAD_LATENCY_MS,
            reclaim_unpinned: DEFAULT_RECLAIM_UNPINNED,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_LOG_DIRECTORY),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}
