//! Region processors: the caller-supplied work applied to each region.
//!
//! A [`RegionProcessor`] runs once per region while the region is pinned.
//! The scheduler treats the processor as finished only when its future
//! resolves, so processors may complete synchronously or after any amount of
//! asynchronous work.
//!
//! Two adapters cover the common cases:
//! - [`FnProcessor`] wraps a synchronous closure and runs it on the blocking
//!   thread pool so long-running work never stalls the async runtime.
//! - [`AsyncFnProcessor`] wraps a closure that returns a future.
//!
//! # Example
//!
//! ```ignore
//! use chunkcoord::coordinator::{FnProcessor, ProcessContext};
//!
//! let processor = FnProcessor::new(|ctx: &ProcessContext| {
//!     if ctx.is_cancelled() {
//!         return Ok(());
//!     }
//!     regenerate(ctx.region());
//!     Ok(())
//! });
//! ```

use crate::coord::RegionId;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Boxed future returned by [`RegionProcessor::process`].
pub type ProcessFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ProcessorError>> + Send + 'a>>;

/// Work applied to one pinned region.
pub trait RegionProcessor: Send + Sync + 'static {
    /// Processes the region described by `ctx`.
    ///
    /// The region stays pinned until the returned future resolves. Errors
    /// and panics are reported for this region only; they never abort the
    /// batch.
    fn process<'a>(&'a self, ctx: &'a ProcessContext) -> ProcessFuture<'a>;
}

// =============================================================================
// Process Context
// =============================================================================

/// Context handed to a processor for one region.
///
/// Cancellation is cooperative: a processor that is already running is
/// allowed to finish, but long-running processors should check
/// [`is_cancelled`](Self::is_cancelled) and return early.
#[derive(Clone, Debug)]
pub struct ProcessContext {
    region: RegionId,
    cancellation: CancellationToken,
}

impl ProcessContext {
    /// Creates a context for `region`.
    pub fn new(region: RegionId, cancellation: CancellationToken) -> Self {
        Self {
            region,
            cancellation,
        }
    }

    /// Returns the region being processed.
    pub fn region(&self) -> RegionId {
        self.region
    }

    /// Returns true if the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves when the run is cancelled.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }
}

// =============================================================================
// Processor Error
// =============================================================================

/// Failure of a processor for one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorError {
    /// Human-readable error message.
    pub message: String,
    /// Whether the processor panicked rather than returning an error.
    pub panicked: bool,
}

impl ProcessorError {
    /// Creates an error returned by a processor.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            panicked: false,
        }
    }

    /// Creates the error recorded for a panicking processor.
    pub fn panicked(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            panicked: true,
        }
    }
}

impl fmt::Display for ProcessorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.panicked {
            write!(f, "processor panicked: {}", self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProcessorError {}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// =============================================================================
// Adapters
// =============================================================================

/// Processor backed by a synchronous closure.
///
/// The closure runs on Tokio's blocking pool.
pub struct FnProcessor<F> {
    f: Arc<F>,
}

impl<F> FnProcessor<F>
where
    F: Fn(&ProcessContext) -> Result<(), ProcessorError> + Send + Sync + 'static,
{
    /// Wraps `f` as a processor.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F> RegionProcessor for FnProcessor<F>
where
    F: Fn(&ProcessContext) -> Result<(), ProcessorError> + Send + Sync + 'static,
{
    fn process<'a>(&'a self, ctx: &'a ProcessContext) -> ProcessFuture<'a> {
        let f = Arc::clone(&self.f);
        let ctx = ctx.clone();
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || f(&ctx)).await {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(ProcessorError::panicked(panic_message(
                    e.into_panic(),
                ))),
                Err(e) => Err(ProcessorError::new(format!(
                    "blocking processor did not run: {}",
                    e
                ))),
            }
        })
    }
}

impl<F> fmt::Debug for FnProcessor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProcessor").finish_non_exhaustive()
    }
}

/// Processor backed by a closure returning a future.
pub struct AsyncFnProcessor<F> {
    f: F,
}

impl<F, Fut> AsyncFnProcessor<F>
where
    F: Fn(ProcessContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ProcessorError>> + Send + 'static,
{
    /// Wraps `f` as a processor.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> RegionProcessor for AsyncFnProcessor<F>
where
    F: Fn(ProcessContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ProcessorError>> + Send + 'static,
{
    fn process<'a>(&'a self, ctx: &'a ProcessContext) -> ProcessFuture<'a> {
        Box::pin((self.f)(ctx.clone()))
    }
}

impl<F> fmt::Debug for AsyncFnProcessor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFnProcessor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn ctx(region: RegionId) -> ProcessContext {
        ProcessContext::new(region, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_fn_processor_runs_closure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let processor = FnProcessor::new(move |ctx: &ProcessContext| {
            assert_eq!(ctx.region(), RegionId::new(2, 3));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let context = ctx(RegionId::new(2, 3));
        processor.process(&context).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fn_processor_propagates_error() {
        let processor =
            FnProcessor::new(|_ctx: &ProcessContext| Err(ProcessorError::new("bad region")));

        let context = ctx(RegionId::new(0, 0));
        let err = processor.process(&context).await.unwrap_err();
        assert_eq!(err, ProcessorError::new("bad region"));
    }

    #[tokio::test]
    async fn test_fn_processor_converts_panic() {
        let processor = FnProcessor::new(|_ctx: &ProcessContext| -> Result<(), ProcessorError> {
            panic!("boom");
        });

        let context = ctx(RegionId::new(0, 0));
        let err = processor.process(&context).await.unwrap_err();
        assert!(err.panicked);
        assert_eq!(err.message, "boom");
        assert_eq!(err.to_string(), "processor panicked: boom");
    }

    #[tokio::test]
    async fn test_async_fn_processor_awaits_future() {
        let processor = AsyncFnProcessor::new(|ctx: ProcessContext| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if ctx.region().x < 0 {
                Err(ProcessorError::new("negative"))
            } else {
                Ok(())
            }
        });

        assert!(processor.process(&ctx(RegionId::new(1, 0))).await.is_ok());
        assert!(processor.process(&ctx(RegionId::new(-1, 0))).await.is_err());
    }

    #[tokio::test]
    async fn test_context_observes_cancellation() {
        let token = CancellationToken::new();
        let context = ProcessContext::new(RegionId::new(0, 0), token.clone());
        assert!(!context.is_cancelled());

        token.cancel();
        assert!(context.is_cancelled());
        tokio::time::timeout(Duration::from_millis(50), context.cancelled())
            .await
            .expect("cancelled() should resolve once cancelled");
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42_u8)), "unknown panic payload");
    }
}
