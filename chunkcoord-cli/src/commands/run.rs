//! Run command: coordinate a rectangular area against the simulated host.

use chunkcoord::coord::RegionId;
use chunkcoord::coordinator::{
    BatchReport, BatchScheduler, CoordinatorConfig, FnProcessor, HostConfig, PinRegistry,
    ProcessContext, ProgressTracker, SimulatedHost,
};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::CliError;
use crate::runner::CliRunner;

/// How often progress is printed.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Largest area the command will coordinate in one run.
const MAX_AREA_REGIONS: u64 = 1 << 20;

/// Arguments for `chunkcoord run`.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// First corner of the area, as X,Z
    #[arg(long, allow_hyphen_values = true)]
    pub from: RegionId,

    /// Opposite corner of the area, as X,Z
    #[arg(long, allow_hyphen_values = true)]
    pub to: RegionId,

    /// Regions loading or processing at once (overrides config)
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Region the host refuses to load, as X,Z (repeatable)
    #[arg(long = "fail", allow_hyphen_values = true)]
    pub fail: Vec<RegionId>,

    /// Cancel the run once this many regions were processed
    #[arg(long)]
    pub cancel_after: Option<usize>,

    /// Simulated processing time per region in milliseconds
    #[arg(long, default_value = "0")]
    pub work_ms: u64,
}

/// Run the command.
pub fn run(args: RunArgs, runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("run");
    check_area(args.from, args.to)?;

    let config = runner.config();
    let mut coordinator_config = CoordinatorConfig::from(&config.coordinator);
    if let Some(n) = args.max_concurrent {
        if n == 0 {
            return Err(CliError::InvalidArgument(
                "--max-concurrent must be at least 1".to_string(),
            ));
        }
        coordinator_config = coordinator_config.with_max_concurrent_loads(n);
    }

    let mut host_config = HostConfig::from(&config.host);
    host_config.fail.extend(args.fail.iter().copied());

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    let report = runtime.block_on(coordinate(&args, coordinator_config, host_config))?;

    print_report(&report);
    Ok(())
}

async fn coordinate(
    args: &RunArgs,
    coordinator_config: CoordinatorConfig,
    host_config: HostConfig,
) -> Result<BatchReport, CliError> {
    let pins = PinRegistry::new();
    let host = SimulatedHost::spawn(host_config, pins.clone());
    let tracker = ProgressTracker::new();
    let work = Duration::from_millis(args.work_ms);

    let scheduler = BatchScheduler::builder()
        .area(args.from, args.to)
        .config(coordinator_config.clone())
        .pin_registry(pins.clone())
        .progress_sink(tracker.clone())
        .processor(FnProcessor::new(move |ctx: &ProcessContext| {
            if !work.is_zero() && !ctx.is_cancelled() {
                std::thread::sleep(work);
            }
            Ok(())
        }))
        .on_region_failed(|region, err| eprintln!("  region {} failed: {}", region, err))
        .build(host.clone())?;

    println!(
        "Coordinating {} regions from {} to {} ({} in flight)",
        scheduler.total_chunks(),
        args.from,
        args.to,
        coordinator_config.max_concurrent_loads
    );

    scheduler.start()?;
    let scheduler = Arc::new(scheduler);

    let monitor = {
        let scheduler = Arc::clone(&scheduler);
        let tracker = Arc::clone(&tracker);
        let cancel_after = args.cancel_after;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
            loop {
                interval.tick().await;
                let snapshot = tracker.snapshot();
                if snapshot.finished {
                    break;
                }
                if let Some(limit) = cancel_after {
                    if snapshot.progress.processed >= limit && !scheduler.is_cancelled() {
                        println!("Cancelling after {} processed regions", limit);
                        scheduler.cancel();
                    }
                }
                println!(
                    "  {} [{} in flight, {} pinned]",
                    snapshot.progress,
                    snapshot.in_flight,
                    pins.pinned_count()
                );
            }
        })
    };

    let report = scheduler.wait().await?;
    let _ = monitor.await;

    let stats = host.stats();
    info!(
        requested = stats.requested,
        loaded = stats.loaded,
        failed = stats.failed,
        reclaimed = stats.reclaimed,
        unloaded = stats.unloaded,
        peak_concurrent = stats.peak_concurrent,
        "Simulated host statistics"
    );

    Ok(report)
}

/// Rejects areas with more than [`MAX_AREA_REGIONS`] regions.
fn check_area(from: RegionId, to: RegionId) -> Result<u64, CliError> {
    let width = (i64::from(from.x) - i64::from(to.x)).unsigned_abs() + 1;
    let depth = (i64::from(from.z) - i64::from(to.z)).unsigned_abs() + 1;
    let regions = width.saturating_mul(depth);
    if regions > MAX_AREA_REGIONS {
        return Err(CliError::InvalidArgument(format!(
            "area {} to {} covers {} regions, at most {} allowed",
            from, to, regions, MAX_AREA_REGIONS
        )));
    }
    Ok(regions)
}

fn print_report(report: &BatchReport) {
    println!();
    if report.cancelled {
        println!("Run cancelled");
    } else {
        println!("Run completed");
    }
    println!("  Total:         {}", report.total);
    println!("  Processed:     {}", report.processed);
    println!("  Failed:        {}", report.failure_count());
    println!("  Unprocessed:   {}", report.unprocessed);
    println!("  Peak in flight: {}", report.peak_in_flight);
    println!("  Duration:      {:.2}s", report.duration.as_secs_f64());

    for failure in &report.failures {
        println!("    {}: {}", failure.region, failure.error);
    }
}
