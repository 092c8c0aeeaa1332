//! In-process simulated host.
//!
//! [`SimulatedHost`] behaves like a host environment that owns region data:
//!
//! - load requests queue up and are admitted at most `loads_per_tick` per
//!   tick, and at most `max_concurrent_loads` at a time
//! - every admitted load takes `load_latency` before it resolves
//! - regions in the configured fail set are refused
//! - when `reclaim_unpinned` is on, loaded regions that nobody pins are
//!   reclaimed on the next tick
//!
//! The host checks the shared [`PinRegistry`] before reclaiming, which is
//! exactly the protection the scheduler's pins provide.

use crate::coord::RegionId;
use crate::coordinator::{LoadCompletion, LoadError, PinRegistry, RegionLoader};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

/// Default host-side limit on concurrent loads.
pub const DEFAULT_HOST_CONCURRENT_LOADS: usize = 8;

/// Default number of loads admitted per tick.
pub const DEFAULT_LOADS_PER_TICK: usize = 4;

/// Default tick interval in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 50;

/// Default simulated load latency in milliseconds.
pub const DEFAULT_LOAD_LATENCY_MS: u64 = 20;

// =============================================================================
// Configuration
// =============================================================================

/// Limits and behaviour of the simulated host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostConfig {
    /// Loads the host runs at once.
    pub max_concurrent_loads: usize,
    /// Loads admitted per tick.
    pub loads_per_tick: usize,
    /// Tick interval.
    pub tick: Duration,
    /// Time each load takes.
    pub load_latency: Duration,
    /// Reclaim loaded regions that are not pinned.
    pub reclaim_unpinned: bool,
    /// Regions the host refuses to load.
    pub fail: HashSet<RegionId>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_concurrent_loads: DEFAULT_HOST_CONCURRENT_LOADS,
            loads_per_tick: DEFAULT_LOADS_PER_TICK,
            tick: Duration::from_millis(DEFAULT_TICK_MS),
            load_latency: Duration::from_millis(DEFAULT_LOAD_LATENCY_MS),
            reclaim_unpinned: true,
            fail: HashSet::new(),
        }
    }
}

impl HostConfig {
    /// Adds a region the host will refuse to load.
    pub fn with_failing_region(mut self, region: RegionId) -> Self {
        self.fail.insert(region);
        self
    }

    /// Sets the load latency.
    pub fn with_load_latency(mut self, latency: Duration) -> Self {
        self.load_latency = latency;
        self
    }

    /// Sets the tick interval.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }
}

impl From<&crate::config::HostSettings> for HostConfig {
    fn from(settings: &crate::config::HostSettings) -> Self {
        Self {
            max_concurrent_loads: settings.max_concurrent_loads.max(1),
            loads_per_tick: settings.loads_per_tick.max(1),
            tick: Duration::from_millis(settings.tick_ms.max(1)),
            load_latency: Duration::from_millis(settings.load_latency_ms),
            reclaim_unpinned: settings.reclaim_unpinned,
            fail: HashSet::new(),
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Counters describing what the host did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HostStats {
    /// Load requests received.
    pub requested: u64,
    /// Loads that succeeded.
    pub loaded: u64,
    /// Loads the host refused.
    pub failed: u64,
    /// Unpinned regions reclaimed by the host.
    pub reclaimed: u64,
    /// Regions unloaded on the coordinator's request.
    pub unloaded: u64,
    /// Highest number of loads running at once.
    pub peak_concurrent: usize,
}

#[derive(Default)]
struct Counters {
    requested: AtomicU64,
    loaded: AtomicU64,
    failed: AtomicU64,
    reclaimed: AtomicU64,
    unloaded: AtomicU64,
    running: AtomicUsize,
    peak_concurrent: AtomicUsize,
}

// =============================================================================
// Host
// =============================================================================

struct HostInner {
    config: HostConfig,
    pins: PinRegistry,
    queue: Mutex<VecDeque<LoadCompletion>>,
    /// Loaded regions and the tick they were loaded on.
    loaded: Mutex<HashMap<RegionId, u64>>,
    slots: Arc<Semaphore>,
    counters: Counters,
}

/// A [`RegionLoader`] that simulates a throttled host.
///
/// Cloning shares the same host. The tick task stops once every clone has
/// been dropped.
#[derive(Clone)]
pub struct SimulatedHost {
    inner: Arc<HostInner>,
}

impl SimulatedHost {
    /// Creates a host and starts its tick task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(config: HostConfig, pins: PinRegistry) -> Self {
        let inner = Arc::new(HostInner {
            slots: Arc::new(Semaphore::new(config.max_concurrent_loads.max(1))),
            config,
            pins,
            queue: Mutex::new(VecDeque::new()),
            loaded: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        });

        tokio::spawn(tick_loop(Arc::downgrade(&inner), inner.config.tick));
        debug!(
            max_concurrent_loads = inner.config.max_concurrent_loads,
            loads_per_tick = inner.config.loads_per_tick,
            failing = inner.config.fail.len(),
            "Simulated host started"
        );

        Self { inner }
    }

    /// Returns true if the host currently has `region` loaded.
    pub fn is_loaded(&self, region: RegionId) -> bool {
        lock(&self.inner.loaded).contains_key(&region)
    }

    /// Returns the number of loaded regions.
    pub fn loaded_count(&self) -> usize {
        lock(&self.inner.loaded).len()
    }

    /// Returns the number of requests waiting to be admitted.
    pub fn queued(&self) -> usize {
        lock(&self.inner.queue).len()
    }

    /// Returns host statistics.
    pub fn stats(&self) -> HostStats {
        let c = &self.inner.counters;
        HostStats {
            requested: c.requested.load(Ordering::Relaxed),
            loaded: c.loaded.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            reclaimed: c.reclaimed.load(Ordering::Relaxed),
            unloaded: c.unloaded.load(Ordering::Relaxed),
            peak_concurrent: c.peak_concurrent.load(Ordering::Relaxed),
        }
    }
}

impl RegionLoader for SimulatedHost {
    fn request_load(&self, region: RegionId, completion: LoadCompletion) {
        self.inner.counters.requested.fetch_add(1, Ordering::Relaxed);
        trace!(region = %region, "Host queued load");
        lock(&self.inner.queue).push_back(completion);
    }

    /// Ignored while any owner in the shared registry still pins `region`.
    fn unload(&self, region: RegionId) {
        if self.inner.pins.is_pinned(region) {
            trace!(region = %region, "Host kept pinned region");
            return;
        }
        if lock(&self.inner.loaded).remove(&region).is_some() {
            self.inner.counters.unloaded.fetch_add(1, Ordering::Relaxed);
            trace!(region = %region, "Host unloaded region");
        }
    }

    fn name(&self) -> &str {
        "simulated-host"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn tick_loop(host: Weak<HostInner>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut tick: u64 = 0;

    loop {
        interval.tick().await;
        tick += 1;

        let Some(host) = host.upgrade() else {
            debug!("Simulated host dropped, stopping tick task");
            break;
        };

        if host.config.reclaim_unpinned {
            reclaim(&host, tick);
        }
        admit(&host, tick);
    }
}

/// Reclaims regions loaded before this tick that nobody pins.
fn reclaim(host: &Arc<HostInner>, tick: u64) {
    let mut loaded = lock(&host.loaded);
    let before = loaded.len();
    loaded.retain(|region, loaded_at| *loaded_at >= tick || host.pins.is_pinned(*region));
    let reclaimed = before - loaded.len();
    if reclaimed > 0 {
        host.counters
            .reclaimed
            .fetch_add(reclaimed as u64, Ordering::Relaxed);
        trace!(reclaimed, tick, "Host reclaimed unpinned regions");
    }
}

/// Admits up to `loads_per_tick` queued requests with free host slots.
fn admit(host: &Arc<HostInner>, tick: u64) {
    for _ in 0..host.config.loads_per_tick {
        let Ok(permit) = Arc::clone(&host.slots).try_acquire_owned() else {
            break;
        };
        let Some(completion) = lock(&host.queue).pop_front() else {
            break;
        };

        let running = host.counters.running.fetch_add(1, Ordering::Relaxed) + 1;
        host.counters
            .peak_concurrent
            .fetch_max(running, Ordering::Relaxed);

        let host = Arc::clone(host);
        tokio::spawn(async move {
            tokio::time::sleep(host.config.load_latency).await;
            let region = completion.region();

            if host.config.fail.contains(&region) {
                host.counters.failed.fetch_add(1, Ordering::Relaxed);
                debug!(region = %region, "Host refused region");
                completion.failed(LoadError::new(format!("host refused region {}", region)));
            } else {
                host.counters.loaded.fetch_add(1, Ordering::Relaxed);
                lock(&host.loaded).insert(region, tick);
                trace!(region = %region, "Host loaded region");
                completion.available();
            }

            host.counters.running.fetch_sub(1, Ordering::Relaxed);
            drop(permit);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    fn fast_config() -> HostConfig {
        HostConfig::default()
            .with_tick(Duration::from_millis(5))
            .with_load_latency(Duration::from_millis(1))
    }

    async fn load(host: &SimulatedHost, region: RegionId) -> Result<(), LoadError> {
        let (tx, rx) = oneshot::channel();
        host.request_load(
            region,
            LoadCompletion::from_fn(region, move |_, outcome| {
                let _ = tx.send(outcome);
            }),
        );
        rx.await.expect("completion should fire")
    }

    #[tokio::test]
    async fn test_loads_region() {
        let host = SimulatedHost::spawn(
            HostConfig {
                reclaim_unpinned: false,
                ..fast_config()
            },
            PinRegistry::new(),
        );

        load(&host, RegionId::new(1, 2)).await.unwrap();

        assert!(host.is_loaded(RegionId::new(1, 2)));
        assert_eq!(host.stats().loaded, 1);
        assert_eq!(host.stats().requested, 1);
    }

    #[tokio::test]
    async fn test_refuses_failing_region() {
        let bad = RegionId::new(3, 3);
        let host = SimulatedHost::spawn(fast_config().with_failing_region(bad), PinRegistry::new());

        let err = load(&host, bad).await.unwrap_err();

        assert!(err.message.contains("3,3"));
        assert!(!err.is_abandoned());
        assert_eq!(host.stats().failed, 1);
        assert!(!host.is_loaded(bad));
    }

    #[tokio::test]
    async fn test_unload_removes_region() {
        let host = SimulatedHost::spawn(
            HostConfig {
                reclaim_unpinned: false,
                ..fast_config()
            },
            PinRegistry::new(),
        );
        let region = RegionId::new(0, 0);
        load(&host, region).await.unwrap();

        host.unload(region);
        host.unload(region);

        assert!(!host.is_loaded(region));
        assert_eq!(host.stats().unloaded, 1);
    }

    #[tokio::test]
    async fn test_unload_keeps_region_pinned_by_other_owner() {
        let pins = PinRegistry::new();
        let host = SimulatedHost::spawn(
            HostConfig {
                reclaim_unpinned: false,
                ..fast_config()
            },
            pins.clone(),
        );
        let region = RegionId::new(0, 0);
        load(&host, region).await.unwrap();

        let first = pins.acquire(pins.owner(), region).unwrap();
        let second = pins.acquire(pins.owner(), region).unwrap();

        pins.release(first).unwrap();
        host.unload(region);
        assert!(pins.is_pinned(region));
        assert!(host.is_loaded(region));
        assert_eq!(host.stats().unloaded, 0);

        pins.release(second).unwrap();
        host.unload(region);
        assert!(!host.is_loaded(region));
        assert_eq!(host.stats().unloaded, 1);
    }

    #[tokio::test]
    async fn test_pinned_region_survives_reclaim() {
        let pins = PinRegistry::new();
        let host = SimulatedHost::spawn(fast_config(), pins.clone());
        let pinned = RegionId::new(0, 0);
        let loose = RegionId::new(0, 1);

        let token = pins.acquire(pins.owner(), pinned).unwrap();
        load(&host, pinned).await.unwrap();
        load(&host, loose).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(host.is_loaded(pinned));
        assert!(!host.is_loaded(loose));
        assert!(host.stats().reclaimed >= 1);
        pins.release(token).unwrap();
    }

    #[tokio::test]
    async fn test_host_concurrency_cap() {
        let host = SimulatedHost::spawn(
            HostConfig {
                max_concurrent_loads: 2,
                loads_per_tick: 10,
                ..fast_config().with_load_latency(Duration::from_millis(20))
            },
            PinRegistry::new(),
        );

        let done = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        for x in 0..6 {
            let region = RegionId::new(x, 0);
            let done = Arc::clone(&done);
            let tx = tx.clone();
            host.request_load(
                region,
                LoadCompletion::from_fn(region, move |_, _| {
                    done.fetch_add(1, Ordering::SeqCst);
                    let _ = tx.send(());
                }),
            );
        }
        for _ in 0..6 {
            rx.recv().await.unwrap();
        }

        assert_eq!(done.load(Ordering::SeqCst), 6);
        assert!(host.stats().peak_concurrent <= 2);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = crate::config::HostSettings {
            max_concurrent_loads: 0,
            loads_per_tick: 3,
            tick_ms: 10,
            load_latency_ms: 5,
            reclaim_unpinned: false,
        };

        let config = HostConfig::from(&settings);

        assert_eq!(config.max_concurrent_loads, 1);
        assert_eq!(config.loads_per_tick, 3);
        assert_eq!(config.tick, Duration::from_millis(10));
        assert!(!config.reclaim_unpinned);
        assert!(config.fail.is_empty());
    }
}
