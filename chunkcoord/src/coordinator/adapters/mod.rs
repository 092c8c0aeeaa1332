//! Loader implementations.
//!
//! - [`SimulatedHost`]: an in-process host with throttling, latency, refusals
//!   and reclamation of unpinned regions. Drives the CLI and tests.

mod simulated;

pub use simulated::{
    HostConfig, HostStats, SimulatedHost, DEFAULT_HOST_CONCURRENT_LOADS, DEFAULT_LOADS_PER_TICK,
    DEFAULT_LOAD_LATENCY_MS, DEFAULT_TICK_MS,
};
