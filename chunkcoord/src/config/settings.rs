//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    /// Coordinator settings
    pub coordinator: CoordinatorSettings,
    /// Simulated host settings
    pub host: HostSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Batch coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Maximum regions loading or processing at once (1-1024)
    pub max_concurrent_loads: usize,
    /// Ask the host to unload each region after its pin is released
    pub unload_after: bool,
    /// Seconds without progress before a stall warning (0 disables)
    pub stall_threshold_secs: u64,
}

/// Simulated host configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    /// Loads the host runs at once
    pub max_concurrent_loads: usize,
    /// Loads the host admits per tick
    pub loads_per_tick: usize,
    /// Host tick interval in milliseconds
    pub tick_ms: u64,
    /// Time each load takes in milliseconds
    pub load_latency_ms: u64,
    /// Reclaim loaded regions that are not pinned
    pub reclaim_unpinned: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Directory for log files
    pub directory: PathBuf,
    /// Log file name within the directory
    pub file: String,
}
