//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::coordinator::{clamp_concurrent_loads, MAX_CONCURRENT_LOADS_LIMIT};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [coordinator] section
    if let Some(section) = ini.section(Some("coordinator")) {
        if let Some(v) = section.get("max_concurrent_loads") {
            let value: usize = parse_number(
                "coordinator",
                "max_concurrent_loads",
                v,
                "must be a positive integer",
            )?;
            if value == 0 {
                return Err(invalid(
                    "coordinator",
                    "max_concurrent_loads",
                    v,
                    "must be at least 1",
                ));
            }
            if value > MAX_CONCURRENT_LOADS_LIMIT {
                tracing::warn!(
                    value,
                    limit = MAX_CONCURRENT_LOADS_LIMIT,
                    "coordinator.max_concurrent_loads above limit, clamping"
                );
            }
            config.coordinator.max_concurrent_loads = clamp_concurrent_loads(value);
        }
        if let Some(v) = section.get("unload_after") {
            config.coordinator.unload_after = parse_bool("coordinator", "unload_after", v)?;
        }
        if let Some(v) = section.get("stall_threshold_secs") {
            config.coordinator.stall_threshold_secs = parse_number(
                "coordinator",
                "stall_threshold_secs",
                v,
                "must be a non-negative integer (seconds, 0 disables)",
            )?;
        }
    }

    // [host] section
    if let Some(section) = ini.section(Some("host")) {
        if let Some(v) = section.get("max_concurrent_loads") {
            config.host.max_concurrent_loads =
                parse_positive("host", "max_concurrent_loads", v)?;
        }
        if let Some(v) = section.get("loads_per_tick") {
            config.host.loads_per_tick = parse_positive("host", "loads_per_tick", v)?;
        }
        if let Some(v) = section.get("tick_ms") {
            config.host.tick_ms = parse_positive("host", "tick_ms", v)?;
        }
        if let Some(v) = section.get("load_latency_ms") {
            config.host.load_latency_ms = parse_number(
                "host",
                "load_latency_ms",
                v,
                "must be a non-negative integer (milliseconds)",
            )?;
        }
        if let Some(v) = section.get("reclaim_unpinned") {
            config.host.reclaim_unpinned = parse_bool("host", "reclaim_unpinned", v)?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_positive<T>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError>
where
    T: FromStr + PartialEq + Default,
{
    let parsed: T = parse_number(section, key, value, "must be a positive integer")?;
    if parsed == T::default() {
        return Err(invalid(section, key, value, "must be a positive integer"));
    }
    Ok(parsed)
}

/// Parse a boolean value from a string.
///
/// Accepts "true", "1", "yes", "on" and "false", "0", "no", "off"
/// (case-insensitive).
pub(super) fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(section, key, value, "must be true or false")),
    }
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;
    use tempfile::TempDir;

    fn load(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, content).unwrap();
        ConfigFile::load_from(&config_path)
    }

    #[test]
    fn test_partial_config() {
        let config = load(
            r#"
[coordinator]
max_concurrent_loads = 4
"#,
        )
        .unwrap();

        assert_eq!(config.coordinator.max_concurrent_loads, 4);
        assert_eq!(config.coordinator.unload_after, DEFAULT_UNLOAD_AFTER);
        assert_eq!(config.host.loads_per_tick, DEFAULT_LOADS_PER_TICK);
    }

    #[test]
    fn test_all_sections() {
        let config = load(
            r#"
[coordinator]
max_concurrent_loads = 32
unload_after = false
stall_threshold_secs = 0

[host]
max_concurrent_loads = 2
loads_per_tick = 1
tick_ms = 10
load_latency_ms = 0
reclaim_unpinned = no

[logging]
directory = /var/log/chunkcoord
file = run.log
"#,
        )
        .unwrap();

        assert_eq!(config.coordinator.max_concurrent_loads, 32);
        assert!(!config.coordinator.unload_after);
        assert_eq!(config.coordinator.stall_threshold_secs, 0);
        assert_eq!(config.host.max_concurrent_loads, 2);
        assert_eq!(config.host.loads_per_tick, 1);
        assert_eq!(config.host.tick_ms, 10);
        assert_eq!(config.host.load_latency_ms, 0);
        assert!(!config.host.reclaim_unpinned);
        assert_eq!(
            config.logging.directory,
            PathBuf::from("/var/log/chunkcoord")
        );
        assert_eq!(config.logging.file, "run.log");
    }

    #[test]
    fn test_concurrency_above_limit_is_clamped() {
        let config = load(
            r#"
[coordinator]
max_concurrent_loads = 5000
"#,
        )
        .unwrap();

        assert_eq!(
            config.coordinator.max_concurrent_loads,
            MAX_CONCURRENT_LOADS_LIMIT
        );
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = load(
            r#"
[coordinator]
max_concurrent_loads = 0
"#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("max_concurrent_loads"));
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_invalid_number() {
        let err = load(
            r#"
[host]
tick_ms = fast
"#,
        )
        .unwrap_err();

        match err {
            ConfigFileError::InvalidValue {
                section,
                key,
                value,
                ..
            } => {
                assert_eq!(section, "host");
                assert_eq!(key, "tick_ms");
                assert_eq!(value, "fast");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_zero_loads_per_tick_rejected() {
        assert!(load("[host]\nloads_per_tick = 0\n").is_err());
    }

    #[test]
    fn test_parse_bool() {
        let parse = |v| parse_bool("s", "k", v);
        assert!(parse("true").unwrap());
        assert!(parse("TRUE").unwrap());
        assert!(parse(" yes ").unwrap());
        assert!(parse("1").unwrap());
        assert!(parse("on").unwrap());
        assert!(!parse("false").unwrap());
        assert!(!parse("Off").unwrap());
        assert!(!parse("0").unwrap());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_misspelled_bool_rejected() {
        let err = load(
            r#"
[coordinator]
unload_after = ture
"#,
        )
        .unwrap_err();

        match err {
            ConfigFileError::InvalidValue {
                section,
                key,
                value,
                reason,
            } => {
                assert_eq!(section, "coordinator");
                assert_eq!(key, "unload_after");
                assert_eq!(value, "ture");
                assert!(reason.contains("true or false"));
            }
            other => panic!("unexpected error: {}", other),
        }

        assert!(load("[host]\nreclaim_unpinned = maybe\n").is_err());
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/test/path");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path, home.join("test/path"));
        }

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }
}
