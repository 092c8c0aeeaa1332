//! Builder for [`BatchScheduler`].

use super::config::{clamp_concurrent_loads, CoordinatorConfig};
use super::loader::RegionLoader;
use super::pin::PinRegistry;
use super::processor::RegionProcessor;
use super::progress::{
    CallbackProgressSink, MultiplexProgressSink, ProgressSink, TracingProgressSink,
};
use super::report::RegionError;
use super::run::RunParts;
use super::scheduler::{BatchScheduler, CoordinatorError};
use crate::coord::RegionId;
use std::collections::HashSet;
use std::sync::Arc;

/// Configures and builds a [`BatchScheduler`].
///
/// # Example
///
/// ```ignore
/// use chunkcoord::coord::RegionId;
/// use chunkcoord::coordinator::{BatchScheduler, FnProcessor};
///
/// let scheduler = BatchScheduler::builder()
///     .area(RegionId::new(0, 0), RegionId::new(3, 3))
///     .max_concurrent_loads(4)
///     .processor(FnProcessor::new(|_ctx| Ok(())))
///     .on_complete(|| println!("done"))
///     .build(loader)?;
///
/// scheduler.start()?;
/// let report = scheduler.wait().await?;
/// ```
#[derive(Default)]
pub struct BatchSchedulerBuilder {
    regions: Vec<RegionId>,
    config: CoordinatorConfig,
    processor: Option<Arc<dyn RegionProcessor>>,
    sinks: Vec<Arc<dyn ProgressSink>>,
    callbacks: Option<CallbackProgressSink>,
    pins: Option<PinRegistry>,
}

impl BatchSchedulerBuilder {
    /// Creates a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds regions to the batch. Duplicates keep their first position.
    pub fn regions<I>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = RegionId>,
    {
        self.regions.extend(regions);
        self
    }

    /// Adds one region to the batch.
    pub fn region(mut self, region: RegionId) -> Self {
        self.regions.push(region);
        self
    }

    /// Adds every region in the inclusive rectangle between `a` and `b`.
    pub fn area(self, a: RegionId, b: RegionId) -> Self {
        self.regions(RegionId::area(a, b))
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the in-flight limit (clamped to a valid range).
    pub fn max_concurrent_loads(mut self, value: usize) -> Self {
        self.config.max_concurrent_loads = clamp_concurrent_loads(value);
        self
    }

    /// Asks the loader to unload each region after its pin is released.
    pub fn unload_after(mut self, unload_after: bool) -> Self {
        self.config.unload_after = unload_after;
        self
    }

    /// Sets the processor applied to each region.
    pub fn processor(mut self, processor: impl RegionProcessor) -> Self {
        self.processor = Some(Arc::new(processor));
        self
    }

    /// Sets a processor that is already shared.
    pub fn shared_processor(mut self, processor: Arc<dyn RegionProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Adds a progress sink. May be called several times.
    pub fn progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Sets the callback fired once when every region has finished.
    pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks = Some(self.callbacks.take().unwrap_or_default().on_complete(f));
        self
    }

    /// Sets the callback fired for each failed region.
    pub fn on_region_failed(
        mut self,
        f: impl Fn(RegionId, &RegionError) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks = Some(
            self.callbacks
                .take()
                .unwrap_or_default()
                .on_region_failed(f),
        );
        self
    }

    /// Uses a shared pin registry instead of a private one.
    ///
    /// Share the registry with the host so it can check
    /// [`PinRegistry::is_pinned`] before reclaiming a region.
    pub fn pin_registry(mut self, pins: PinRegistry) -> Self {
        self.pins = Some(pins);
        self
    }

    /// Builds the scheduler around `loader`.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::MissingProcessor`] if no processor was
    /// set.
    pub fn build<L>(self, loader: L) -> Result<BatchScheduler, CoordinatorError>
    where
        L: RegionLoader,
    {
        self.build_shared(Arc::new(loader))
    }

    /// Builds the scheduler around a loader that is already shared.
    pub fn build_shared(
        self,
        loader: Arc<dyn RegionLoader>,
    ) -> Result<BatchScheduler, CoordinatorError> {
        let processor = self.processor.ok_or(CoordinatorError::MissingProcessor)?;

        let mut seen = HashSet::with_capacity(self.regions.len());
        let regions: Vec<RegionId> = self
            .regions
            .into_iter()
            .filter(|region| seen.insert(*region))
            .collect();

        let mut sink = MultiplexProgressSink::new().with(Arc::new(TracingProgressSink));
        for extra in self.sinks {
            sink.push(extra);
        }
        if let Some(callbacks) = self.callbacks {
            sink.push(Arc::new(callbacks));
        }

        let mut config = self.config;
        config.max_concurrent_loads = clamp_concurrent_loads(config.max_concurrent_loads);

        Ok(BatchScheduler::from_parts(RunParts {
            regions,
            config,
            loader,
            processor,
            sink: Arc::new(sink),
            pins: self.pins.unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{LoadCompletion, ProcessContext, ProcessFuture};

    struct IgnoringLoader;

    impl RegionLoader for IgnoringLoader {
        fn request_load(&self, _region: RegionId, completion: LoadCompletion) {
            std::mem::forget(completion);
        }
    }

    struct Noop;

    impl RegionProcessor for Noop {
        fn process<'a>(&'a self, _ctx: &'a ProcessContext) -> ProcessFuture<'a> {
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn test_duplicates_are_removed() {
        let scheduler = BatchScheduler::builder()
            .region(RegionId::new(0, 0))
            .region(RegionId::new(1, 0))
            .region(RegionId::new(0, 0))
            .processor(Noop)
            .build(IgnoringLoader)
            .unwrap();

        assert_eq!(scheduler.total_chunks(), 2);
        assert_eq!(scheduler.remaining_chunks(), 2);
    }

    #[test]
    fn test_area_adds_rectangle() {
        let scheduler = BatchScheduler::builder()
            .area(RegionId::new(0, 0), RegionId::new(2, 1))
            .processor(Noop)
            .build(IgnoringLoader)
            .unwrap();

        assert_eq!(scheduler.total_chunks(), 6);
    }

    #[test]
    fn test_missing_processor() {
        let result = BatchScheduler::builder()
            .region(RegionId::new(0, 0))
            .build(IgnoringLoader);

        assert_eq!(result.unwrap_err(), CoordinatorError::MissingProcessor);
    }

    #[test]
    fn test_start_without_runtime_stays_startable() {
        let scheduler = BatchScheduler::builder()
            .region(RegionId::new(0, 0))
            .processor(Noop)
            .build(IgnoringLoader)
            .unwrap();

        assert_eq!(scheduler.start(), Err(CoordinatorError::NoRuntime));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            assert_eq!(scheduler.start(), Ok(()));
            assert_eq!(scheduler.start(), Err(CoordinatorError::AlreadyStarted));
            scheduler.cancel();
        });
    }
}
