use anyhow::{Context, Result};
use clap::Parser;
use std::{cell::Cell, time::Duration};
use swmr_ringbuf::{Observer, RingBufferHandle, ShmRegion};
use swmr_ringbuf_tools::{
    config::{PipelineArgs, Sample, BUFFER1_NAME},
    init_tracing,
    pacing::PeriodRepeat,
    signal::generate_into,
};

/// Writes the test signal into a ring buffer at a steady rate.
#[derive(Parser)]
#[command(name = "swmr-generator", version)]
struct Cli {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Ring buffer to write into.
    #[arg(long, default_value = BUFFER1_NAME)]
    buf: String,

    /// How often to wake up and write a batch, in milliseconds.
    #[arg(long, default_value_t = 20)]
    interval_ms: u64,

    /// Stop after this many seconds instead of running until interrupted.
    #[arg(long)]
    seconds: Option<u64>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let region = ShmRegion::open(&cli.pipeline.region)
        .with_context(|| format!("cannot open region `{}`, run swmr-setup first", cli.pipeline.region))?;
    let rb = RingBufferHandle::<Sample>::open(&cli.buf, &region)
        .with_context(|| format!("cannot open ring buffer `{}`", cli.buf))?;

    let interval = Duration::from_millis(cli.interval_ms);
    let total = cli.seconds.map(|seconds| seconds * cli.pipeline.points_per_sec as u64);
    let mut batch = vec![0.0; cli.pipeline.points_per_interval(interval)];
    if batch.len() > rb.capacity().get() {
        tracing::warn!(batch = batch.len(), capacity = rb.capacity().get(), "batch exceeds capacity");
    }
    tracing::info!(buffer = cli.buf, batch = batch.len(), ?interval, "generating");

    let written = Cell::new(0u64);
    let mut wakeups = 0u64;
    PeriodRepeat::new(interval).run(
        || -> Result<()> {
            let j = written.get();
            let len = match total {
                Some(total) => usize::try_from(total - j).map_or(batch.len(), |left| left.min(batch.len())),
                None => batch.len(),
            };
            let batch = &mut batch[..len];
            generate_into(j, batch);
            let n = rb.write(batch)?;
            if n != batch.len() {
                tracing::error!(written = n, requested = batch.len(), "short write");
            }
            written.set(j + batch.len() as u64);

            wakeups += 1;
            if wakeups % 50 == 0 {
                tracing::info!(available = rb.read_available(0)?, "buffer contains");
            }
            Ok(())
        },
        || total.map_or(true, |total| written.get() < total),
    )?;

    tracing::info!(points = written.get(), "done");
    Ok(())
}
