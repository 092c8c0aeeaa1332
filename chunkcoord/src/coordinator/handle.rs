//! Per-region state tracking.
//!
//! Every region in a batch owns one [`RegionHandle`] for the lifetime of the
//! run. The handle records where the region is in the pipeline and refuses
//! any transition that would move it backwards.
//!
//! ```text
//! Pending ──► Requested ──► Loaded ──► Processing ──► Released
//!                 │            │  └──────────────────────▲
//!                 └────────────┴──► Failed
//! ```

use crate::coord::RegionId;
use std::fmt;
use thiserror::Error;

/// Pipeline position of a single region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RegionStatus {
    /// Not yet requested from the loader.
    #[default]
    Pending,

    /// Load requested, waiting for the loader to answer.
    Requested,

    /// Loaded by the host and pinned.
    Loaded,

    /// Processor is running against the region.
    Processing,

    /// Pin released; the region is done.
    Released,

    /// The region could not be loaded.
    Failed,
}

impl RegionStatus {
    /// Returns true if the region no longer counts towards `remaining`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::Failed)
    }

    /// Returns true if the region counts towards the in-flight limit.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Requested | Self::Loaded | Self::Processing)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    ///
    /// `Loaded` may skip straight to `Released` when a load lands after the
    /// run was cancelled and the processor is never invoked.
    pub fn can_advance_to(self, next: RegionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Requested)
                | (Self::Requested, Self::Loaded)
                | (Self::Requested, Self::Failed)
                | (Self::Loaded, Self::Processing)
                | (Self::Loaded, Self::Released)
                | (Self::Loaded, Self::Failed)
                | (Self::Processing, Self::Released)
        )
    }
}

impl fmt::Display for RegionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Requested => write!(f, "Requested"),
            Self::Loaded => write!(f, "Loaded"),
            Self::Processing => write!(f, "Processing"),
            Self::Released => write!(f, "Released"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// An attempted transition that would break the forward-only ordering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Illegal status transition for region {region}: {from} -> {to}")]
pub struct StatusTransitionError {
    pub region: RegionId,
    pub from: RegionStatus,
    pub to: RegionStatus,
}

/// One unit of schedulable work: a region id plus its pipeline status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionHandle {
    id: RegionId,
    status: RegionStatus,
}

impl RegionHandle {
    /// Creates a handle in the `Pending` state.
    pub fn new(id: RegionId) -> Self {
        Self {
            id,
            status: RegionStatus::Pending,
        }
    }

    /// Returns the region this handle tracks.
    pub fn id(&self) -> RegionId {
        self.id
    }

    /// Returns the current status.
    pub fn status(&self) -> RegionStatus {
        self.status
    }

    /// Moves the handle to `next`.
    ///
    /// Fails without changing the handle if the transition is not forward.
    pub fn advance(&mut self, next: RegionStatus) -> Result<(), StatusTransitionError> {
        if !self.status.can_advance_to(next) {
            return Err(StatusTransitionError {
                region: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> RegionHandle {
        RegionHandle::new(RegionId::new(0, 0))
    }

    #[test]
    fn test_new_handle_is_pending() {
        let h = handle();
        assert_eq!(h.status(), RegionStatus::Pending);
        assert_eq!(h.id(), RegionId::new(0, 0));
    }

    #[test]
    fn test_full_forward_path() {
        let mut h = handle();
        for next in [
            RegionStatus::Requested,
            RegionStatus::Loaded,
            RegionStatus::Processing,
            RegionStatus::Released,
        ] {
            h.advance(next).unwrap();
            assert_eq!(h.status(), next);
        }
    }

    #[test]
    fn test_loaded_may_skip_to_released() {
        let mut h = handle();
        h.advance(RegionStatus::Requested).unwrap();
        h.advance(RegionStatus::Loaded).unwrap();
        assert!(h.advance(RegionStatus::Released).is_ok());
    }

    #[test]
    fn test_failed_only_from_requested_or_loaded() {
        assert!(RegionStatus::Requested.can_advance_to(RegionStatus::Failed));
        assert!(RegionStatus::Loaded.can_advance_to(RegionStatus::Failed));
        assert!(!RegionStatus::Pending.can_advance_to(RegionStatus::Failed));
        assert!(!RegionStatus::Processing.can_advance_to(RegionStatus::Failed));
        assert!(!RegionStatus::Released.can_advance_to(RegionStatus::Failed));
        assert!(!RegionStatus::Failed.can_advance_to(RegionStatus::Failed));
    }

    #[test]
    fn test_skipping_the_load_rejected() {
        assert!(!RegionStatus::Pending.can_advance_to(RegionStatus::Released));
        assert!(!RegionStatus::Requested.can_advance_to(RegionStatus::Processing));
    }

    #[test]
    fn test_regression_rejected() {
        let mut h = handle();
        h.advance(RegionStatus::Requested).unwrap();
        h.advance(RegionStatus::Loaded).unwrap();

        let err = h.advance(RegionStatus::Requested).unwrap_err();
        assert_eq!(err.from, RegionStatus::Loaded);
        assert_eq!(err.to, RegionStatus::Requested);
        assert_eq!(h.status(), RegionStatus::Loaded);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut h = handle();
        h.advance(RegionStatus::Requested).unwrap();
        h.advance(RegionStatus::Failed).unwrap();
        assert!(h.advance(RegionStatus::Released).is_err());
        assert!(h.status().is_terminal());
    }

    #[test]
    fn test_in_flight_classification() {
        assert!(!RegionStatus::Pending.is_in_flight());
        assert!(RegionStatus::Requested.is_in_flight());
        assert!(RegionStatus::Loaded.is_in_flight());
        assert!(RegionStatus::Processing.is_in_flight());
        assert!(!RegionStatus::Released.is_in_flight());
        assert!(!RegionStatus::Failed.is_in_flight());
    }

    #[test]
    fn test_transition_error_display() {
        let err = StatusTransitionError {
            region: RegionId::new(1, 2),
            from: RegionStatus::Released,
            to: RegionStatus::Loaded,
        };
        assert_eq!(
            err.to_string(),
            "Illegal status transition for region 1,2: Released -> Loaded"
        );
    }
}
