//! CLI command implementations.
//!
//! - [`config`] - Configuration management (init, path, show)
//! - [`run`] - Coordinate an area against the simulated host

pub mod config;
pub mod run;
