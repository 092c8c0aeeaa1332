//! Per-region failure accounting and the final batch report.

use super::loader::LoadError;
use super::processor::ProcessorError;
use crate::coord::RegionId;
use std::time::Duration;
use thiserror::Error;

/// Why a single region did not complete successfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionError {
    /// The loader could not make the region available.
    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    /// The processor returned an error or panicked.
    #[error("processing failed: {0}")]
    Processor(#[from] ProcessorError),
}

/// A region that failed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionFailure {
    pub region: RegionId,
    pub error: RegionError,
}

/// Outcome of a finished run.
///
/// The scheduler never fails a batch as a whole. Callers decide what the
/// accumulated per-region failures mean for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of unique regions requested.
    pub total: usize,
    /// Regions whose processor completed successfully.
    pub processed: usize,
    /// Regions that failed to load or process, in the order they failed.
    pub failures: Vec<RegionFailure>,
    /// Whether the run ended by cancellation.
    pub cancelled: bool,
    /// Regions that never finished because the run was cancelled.
    pub unprocessed: usize,
    /// Highest number of regions in flight at any point of the run.
    pub peak_in_flight: usize,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl BatchReport {
    /// Returns the number of failed regions.
    #[inline]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Returns true if every region was processed without error.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.failures.is_empty() && self.processed == self.total
    }

    /// Returns the failure for `region`, if it failed.
    pub fn failure_for(&self, region: RegionId) -> Option<&RegionError> {
        self.failures
            .iter()
            .find(|f| f.region == region)
            .map(|f| &f.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_report_is_empty_success() {
        let report = BatchReport::default();
        assert!(report.is_success());
        assert_eq!(report.failure_count(), 0);
    }

    #[test]
    fn test_failures_make_report_unsuccessful() {
        let region = RegionId::new(1, 1);
        let report = BatchReport {
            total: 2,
            processed: 1,
            failures: vec![RegionFailure {
                region,
                error: RegionError::Load(LoadError::new("missing")),
            }],
            ..Default::default()
        };

        assert!(!report.is_success());
        assert_eq!(
            report.failure_for(region),
            Some(&RegionError::Load(LoadError::new("missing")))
        );
        assert!(report.failure_for(RegionId::new(0, 0)).is_none());
    }

    #[test]
    fn test_cancelled_report_is_unsuccessful() {
        let report = BatchReport {
            total: 4,
            processed: 1,
            cancelled: true,
            unprocessed: 3,
            ..Default::default()
        };
        assert!(!report.is_success());
    }

    #[test]
    fn test_region_error_display() {
        let err = RegionError::from(ProcessorError::new("bad data"));
        assert_eq!(err.to_string(), "processing failed: bad data");
        let err = RegionError::from(LoadError::new("host busy"));
        assert_eq!(err.to_string(), "load failed: host busy");
    }
}
