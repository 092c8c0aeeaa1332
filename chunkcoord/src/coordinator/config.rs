//! Coordinator configuration.
//!
//! This module contains the [`CoordinatorConfig`] struct and related
//! constants for configuring batch runs.

use std::time::Duration;

// =============================================================================
// Configuration Constants
// =============================================================================

/// Default cap on regions in flight (requested, loaded or processing).
pub const DEFAULT_MAX_CONCURRENT_LOADS: usize = 16;

/// Upper bound accepted for `max_concurrent_loads`.
pub const MAX_CONCURRENT_LOADS_LIMIT: usize = 1024;

/// Default stall detection threshold.
pub const DEFAULT_STALL_THRESHOLD_SECS: u64 = 30;

/// Clamps a concurrency limit into `1..=MAX_CONCURRENT_LOADS_LIMIT`.
pub fn clamp_concurrent_loads(value: usize) -> usize {
    value.clamp(1, MAX_CONCURRENT_LOADS_LIMIT)
}

// =============================================================================
// Coordinator Configuration
// =============================================================================

/// Configuration for one batch run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Maximum regions in flight at once.
    pub max_concurrent_loads: usize,

    /// Ask the loader to unload each region after its pin is released.
    pub unload_after: bool,

    /// How long in-flight work may go without any region finishing before
    /// the watchdog warns. `None` disables the watchdog.
    pub stall_threshold: Option<Duration>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_loads: DEFAULT_MAX_CONCURRENT_LOADS,
            unload_after: true,
            stall_threshold: Some(Duration::from_secs(DEFAULT_STALL_THRESHOLD_SECS)),
        }
    }
}

impl CoordinatorConfig {
    /// Sets the in-flight limit, clamped to the accepted range.
    pub fn with_max_concurrent_loads(mut self, value: usize) -> Self {
        self.max_concurrent_loads = clamp_concurrent_loads(value);
        self
    }

    /// Sets whether regions are unloaded after release.
    pub fn with_unload_after(mut self, unload_after: bool) -> Self {
        self.unload_after = unload_after;
        self
    }

    /// Sets the stall threshold.
    pub fn with_stall_threshold(mut self, threshold: Option<Duration>) -> Self {
        self.stall_threshold = threshold;
        self
    }
}

impl From<&crate::config::CoordinatorSettings> for CoordinatorConfig {
    fn from(settings: &crate::config::CoordinatorSettings) -> Self {
        Self {
            max_concurrent_loads: clamp_concurrent_loads(settings.max_concurrent_loads),
            unload_after: settings.unload_after,
            stall_threshold: match settings.stall_threshold_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}
