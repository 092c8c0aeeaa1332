//! Region coordinate module
//!
//! Provides the [`RegionId`] grid coordinate that identifies one unit of
//! schedulable work, plus rectangular area iteration and text parsing.

mod types;

pub use types::{RegionArea, RegionId, RegionIdParseError};

#[cfg(test)]
mod tests;
