//! CLI runner for common setup.
//!
//! Loads the configuration file and initializes logging so command handlers
//! start from a ready environment.

use crate::error::CliError;
use chunkcoord::config::{config_file_path, ConfigFile};
use chunkcoord::logging::{init_from_settings, LoggingGuard};
use std::path::{Path, PathBuf};
use tracing::info;

/// Runner that manages CLI lifecycle.
pub struct CliRunner {
    /// Keeps logging active while the runner exists
    logging_guard: LoggingGuard,
    config: ConfigFile,
    config_path: PathBuf,
}

impl CliRunner {
    /// Load config from `config_path` (or the default path) and start logging.
    pub fn new(config_path: Option<&Path>) -> Result<Self, CliError> {
        let config_path = resolve_config_path(config_path);
        let config = ConfigFile::load_from(&config_path)?;

        let logging_guard =
            init_from_settings(&config.logging).map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
            config_path,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("chunkcoord v{}", chunkcoord::VERSION);
        info!(
            config = %self.config_path.display(),
            log = %self.logging_guard.log_path().display(),
            "chunkcoord CLI: {} command",
            command
        );
    }
}

/// Returns the explicit config path, or the default one.
pub fn resolve_config_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path)
}
