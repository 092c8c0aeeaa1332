//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[coordinator]
; Maximum regions loading or processing at once (default: 16, range 1-1024)
; Higher values finish large areas faster but keep more regions resident
max_concurrent_loads = {}
; Ask the host to unload each region once it has been processed (default: true)
unload_after = {}
; Warn when regions are in flight but none finished for this many seconds
; (default: 30, 0 disables the warning)
stall_threshold_secs = {}

[host]
; Simulated host used by `chunkcoord run`
; Loads the host runs at once (default: 8)
max_concurrent_loads = {}
; Loads the host admits per tick (default: 4)
loads_per_tick = {}
; Host tick interval in milliseconds (default: 50)
tick_ms = {}
; Time each load takes in milliseconds (default: 20)
load_latency_ms = {}
; Reclaim loaded regions nobody has pinned (default: true)
reclaim_unpinned = {}

[logging]
; Directory for log files (default: logs, relative to the working directory)
directory = {}
; Log file name (default: chunkcoord.log)
file = {}
"#,
        config.coordinator.max_concurrent_loads,
        config.coordinator.unload_after,
        config.coordinator.stall_threshold_secs,
        config.host.max_concurrent_loads,
        config.host.loads_per_tick,
        config.host.tick_ms,
        config.host.load_latency_ms,
        config.host.reclaim_unpinned,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

/// Convert a path to a string, replacing the home directory with `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
