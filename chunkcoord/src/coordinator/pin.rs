//! Pin registry: protection of loaded regions from host reclamation.
//!
//! A region that is present in the [`PinRegistry`] must not be unloaded by
//! the host. The scheduler acquires a pin as soon as a region becomes
//! available and releases it once processing has finished (or immediately
//! when the run was cancelled).
//!
//! Pins are explicit resources: [`PinRegistry::acquire`] hands back a
//! [`PinToken`] and [`PinRegistry::release`] consumes it, so a pin can never
//! be released twice through the same token.
//!
//! Several schedulers may share one registry. Each one identifies itself
//! with a [`PinOwner`]; a region stays pinned while at least one owner holds
//! it.
//!
//! # Example
//!
//! ```
//! use chunkcoord::coord::RegionId;
//! use chunkcoord::coordinator::PinRegistry;
//!
//! let registry = PinRegistry::new();
//! let owner = registry.owner();
//! let region = RegionId::new(4, 2);
//!
//! let token = registry.acquire(owner, region).unwrap();
//! assert!(registry.is_pinned(region));
//!
//! registry.release(token).unwrap();
//! assert!(!registry.is_pinned(region));
//! ```

use crate::coord::RegionId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::trace;

/// Global counter so tokens can be matched to the registry that issued them.
static REGISTRY_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Misuse of the pin registry.
///
/// Both variants indicate a broken caller state machine rather than a
/// recoverable runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    /// The owner already holds a pin for this region.
    #[error("Region {region} is already pinned by owner {owner}")]
    DuplicateAcquire { region: RegionId, owner: PinOwner },

    /// The token does not correspond to a pin held in this registry.
    #[error("Release of region {region} which is not pinned by owner {owner}")]
    UnknownRelease { region: RegionId, owner: PinOwner },
}

/// Identity of one pin holder (typically one scheduler run).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PinOwner(u64);

impl fmt::Display for PinOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Proof that a region is pinned.
///
/// Not `Clone`: the only way to drop the protection is to hand the token
/// back to [`PinRegistry::release`].
#[must_use = "a pin that is never released keeps the region loaded forever"]
#[derive(Debug, PartialEq, Eq)]
pub struct PinToken {
    registry_id: u64,
    owner: PinOwner,
    region: RegionId,
}

impl PinToken {
    /// Returns the pinned region.
    pub fn region(&self) -> RegionId {
        self.region
    }

    /// Returns the owner that holds this pin.
    pub fn owner(&self) -> PinOwner {
        self.owner
    }
}

/// Counters over the registry's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinStats {
    /// Successful acquires.
    pub acquired: u64,
    /// Successful releases.
    pub released: u64,
    /// Regions pinned right now.
    pub pinned: usize,
}

/// Shared, thread-safe registry of pinned regions.
///
/// Cloning is cheap; all clones see the same pins.
#[derive(Clone)]
pub struct PinRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    id: u64,
    next_owner: AtomicU64,
    /// Holders per pinned region. The entry is removed with its last holder.
    entries: Mutex<HashMap<RegionId, Vec<PinOwner>>>,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl Default for PinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PinRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                id: REGISTRY_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
                next_owner: AtomicU64::new(0),
                entries: Mutex::new(HashMap::new()),
                acquired: AtomicU64::new(0),
                released: AtomicU64::new(0),
            }),
        }
    }

    /// Allocates a new owner identity for this registry.
    pub fn owner(&self) -> PinOwner {
        PinOwner(self.inner.next_owner.fetch_add(1, Ordering::Relaxed))
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<RegionId, Vec<PinOwner>>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Pins `region` on behalf of `owner`.
    ///
    /// Fails with [`PinError::DuplicateAcquire`] if `owner` already holds a
    /// pin for `region` that has not been released.
    pub fn acquire(&self, owner: PinOwner, region: RegionId) -> Result<PinToken, PinError> {
        let mut entries = self.entries();
        let holders = entries.entry(region).or_default();

        if holders.contains(&owner) {
            return Err(PinError::DuplicateAcquire { region, owner });
        }

        holders.push(owner);
        self.inner.acquired.fetch_add(1, Ordering::Relaxed);
        trace!(region = %region, owner = %owner, holders = holders.len(), "Pin acquired");

        Ok(PinToken {
            registry_id: self.inner.id,
            owner,
            region,
        })
    }

    /// Releases the pin represented by `token`.
    ///
    /// Fails with [`PinError::UnknownRelease`] if the token was issued by a
    /// different registry or its pin is no longer held.
    pub fn release(&self, token: PinToken) -> Result<(), PinError> {
        let PinToken {
            registry_id,
            owner,
            region,
        } = token;
        let unknown = PinError::UnknownRelease { region, owner };

        if registry_id != self.inner.id {
            return Err(unknown);
        }

        let mut entries = self.entries();
        let Some(holders) = entries.get_mut(&region) else {
            return Err(unknown);
        };
        let Some(index) = holders.iter().position(|h| *h == owner) else {
            return Err(unknown);
        };

        holders.swap_remove(index);
        let left = holders.len();
        if left == 0 {
            entries.remove(&region);
        }
        self.inner.released.fetch_add(1, Ordering::Relaxed);
        trace!(region = %region, owner = %owner, holders = left, "Pin released");

        Ok(())
    }

    /// Returns true if any owner holds a pin for `region`.
    pub fn is_pinned(&self, region: RegionId) -> bool {
        self.entries().contains_key(&region)
    }

    /// Returns the number of owners pinning `region`.
    pub fn holder_count(&self, region: RegionId) -> usize {
        self.entries().get(&region).map_or(0, Vec::len)
    }

    /// Returns the number of distinct regions currently pinned.
    pub fn pinned_count(&self) -> usize {
        self.entries().len()
    }

    /// Returns the currently pinned regions, sorted.
    pub fn pinned_regions(&self) -> Vec<RegionId> {
        let mut regions: Vec<RegionId> = self.entries().keys().copied().collect();
        regions.sort_unstable();
        regions
    }

    /// Returns lifetime acquire/release counters.
    pub fn stats(&self) -> PinStats {
        PinStats {
            acquired: self.inner.acquired.load(Ordering::Relaxed),
            released: self.inner.released.load(Ordering::Relaxed),
            pinned: self.pinned_count(),
        }
    }
}

impl fmt::Debug for PinRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinRegistry")
            .field("id", &self.inner.id)
            .field("pinned", &self.pinned_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let registry = PinRegistry::new();
        let owner = registry.owner();
        let region = RegionId::new(1, 1);

        let token = registry.acquire(owner, region).unwrap();
        assert_eq!(token.region(), region);
        assert_eq!(token.owner(), owner);
        assert!(registry.is_pinned(region));

        registry.release(token).unwrap();
        assert!(!registry.is_pinned(region));
        assert_eq!(registry.pinned_count(), 0);
    }

    #[test]
    fn test_duplicate_acquire_rejected() {
        let registry = PinRegistry::new();
        let owner = registry.owner();
        let region = RegionId::new(0, 3);

        let _token = registry.acquire(owner, region).unwrap();
        let err = registry.acquire(owner, region).unwrap_err();
        assert_eq!(err, PinError::DuplicateAcquire { region, owner });
        assert_eq!(registry.holder_count(region), 1);
    }

    #[test]
    fn test_reacquire_after_release() {
        let registry = PinRegistry::new();
        let owner = registry.owner();
        let region = RegionId::new(0, 3);

        let token = registry.acquire(owner, region).unwrap();
        registry.release(token).unwrap();
        let token = registry.acquire(owner, region).unwrap();
        registry.release(token).unwrap();

        let stats = registry.stats();
        assert_eq!(stats.acquired, 2);
        assert_eq!(stats.released, 2);
        assert_eq!(stats.pinned, 0);
    }

    #[test]
    fn test_region_stays_pinned_until_last_holder_releases() {
        let registry = PinRegistry::new();
        let a = registry.owner();
        let b = registry.owner();
        let region = RegionId::new(-5, 5);

        let token_a = registry.acquire(a, region).unwrap();
        let token_b = registry.acquire(b, region).unwrap();
        assert_eq!(registry.holder_count(region), 2);

        registry.release(token_a).unwrap();
        assert!(registry.is_pinned(region));

        registry.release(token_b).unwrap();
        assert!(!registry.is_pinned(region));
    }

    #[test]
    fn test_token_from_other_registry_is_unknown() {
        let first = PinRegistry::new();
        let second = PinRegistry::new();
        let region = RegionId::new(2, 2);

        let token = first.acquire(first.owner(), region).unwrap();
        let owner = token.owner();
        let err = second.release(token).unwrap_err();
        assert_eq!(err, PinError::UnknownRelease { region, owner });
        assert!(first.is_pinned(region));
    }

    #[test]
    fn test_clones_share_state() {
        let registry = PinRegistry::new();
        let clone = registry.clone();
        let region = RegionId::new(9, 9);

        let token = registry.acquire(registry.owner(), region).unwrap();
        assert!(clone.is_pinned(region));
        clone.release(token).unwrap();
        assert!(!registry.is_pinned(region));
    }

    #[test]
    fn test_pinned_regions_sorted() {
        let registry = PinRegistry::new();
        let owner = registry.owner();
        let _t1 = registry.acquire(owner, RegionId::new(3, 0)).unwrap();
        let _t2 = registry.acquire(owner, RegionId::new(-1, 0)).unwrap();

        assert_eq!(
            registry.pinned_regions(),
            vec![RegionId::new(-1, 0), RegionId::new(3, 0)]
        );
    }

    #[test]
    fn test_owners_are_unique() {
        let registry = PinRegistry::new();
        assert_ne!(registry.owner(), registry.owner());
    }
}
