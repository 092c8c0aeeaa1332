//! The coordinator contract shared by real and test coordinators.

use super::scheduler::{BatchScheduler, CoordinatorError};
use std::sync::atomic::{AtomicBool, Ordering};

/// Operations every chunk coordinator exposes to callers.
pub trait ChunkCoordinator: Send + Sync {
    /// Begins the run.
    fn start(&self) -> Result<(), CoordinatorError>;

    /// Cancels the run. Idempotent.
    fn cancel(&self);

    /// Returns a snapshot of regions not yet finished.
    fn remaining_chunks(&self) -> usize;

    /// Returns the number of regions in the batch.
    fn total_chunks(&self) -> usize;
}

impl ChunkCoordinator for BatchScheduler {
    fn start(&self) -> Result<(), CoordinatorError> {
        BatchScheduler::start(self)
    }

    fn cancel(&self) {
        BatchScheduler::cancel(self)
    }

    fn remaining_chunks(&self) -> usize {
        BatchScheduler::remaining_chunks(self)
    }

    fn total_chunks(&self) -> usize {
        BatchScheduler::total_chunks(self)
    }
}

/// Coordinator that does nothing.
///
/// Reports a fixed total and zero remaining. Useful where a component needs
/// a coordinator but the test doesn't care about loading.
#[derive(Debug, Default)]
pub struct NullCoordinator {
    total: usize,
    started: AtomicBool,
}

impl NullCoordinator {
    /// Creates a coordinator that reports `total` regions.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            started: AtomicBool::new(false),
        }
    }
}

impl ChunkCoordinator for NullCoordinator {
    fn start(&self) -> Result<(), CoordinatorError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(CoordinatorError::AlreadyStarted);
        }
        Ok(())
    }

    fn cancel(&self) {}

    fn remaining_chunks(&self) -> usize {
        0
    }

    fn total_chunks(&self) -> usize {
        self.total
    }
}
