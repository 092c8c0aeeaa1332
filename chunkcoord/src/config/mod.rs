//! Configuration file handling.
//!
//! User settings live in `~/.chunkcoord/config.ini`. The file is split into
//! one `[section]` per concern:
//!
//! - `[coordinator]`: in-flight limit, unload hints and stall detection
//! - `[host]`: limits of the simulated host used by the CLI
//! - `[logging]`: where log files are written
//!
//! Missing files and missing keys fall back to defaults. Settings structs
//! live in [`settings`], constants in [`defaults`], parsing in `parser` and
//! serialization in `writer`.
//!
//! # Example
//!
//! ```ignore
//! use chunkcoord::config::ConfigFile;
//! use chunkcoord::coordinator::CoordinatorConfig;
//!
//! let file = ConfigFile::load()?;
//! let config = CoordinatorConfig::from(&file.coordinator);
//! ```

pub mod defaults;
mod file;
mod parser;
pub mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, CoordinatorSettings, HostSettings, LoggingSettings};
