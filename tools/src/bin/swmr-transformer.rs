use anyhow::{Context, Result};
use clap::Parser;
use std::{cell::Cell, time::Duration};
use swmr_ringbuf::{RingBufferHandle, ShmRegion};
use swmr_ringbuf_tools::{
    config::{PipelineArgs, Sample},
    init_tracing,
    pacing::PeriodRepeat,
    signal::transform,
};

/// Reads samples from one ring buffer, transforms them and writes them into another one.
#[derive(Parser)]
#[command(name = "swmr-transformer", version)]
struct Cli {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Ring buffer to read from.
    #[arg(long)]
    inbuf: String,

    /// Reader id in the input ring buffer.
    #[arg(long, default_value_t = 0)]
    id: usize,

    /// Ring buffer to write into.
    #[arg(long)]
    outbuf: String,

    /// How often to wake up and move samples, in milliseconds.
    #[arg(long, default_value_t = 40)]
    interval_ms: u64,

    /// How many seconds worth of samples to transform.
    #[arg(long, default_value_t = 600)]
    seconds: u64,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let region = ShmRegion::open(&cli.pipeline.region)
        .with_context(|| format!("cannot open region `{}`, run swmr-setup first", cli.pipeline.region))?;
    let input = RingBufferHandle::<Sample>::open(&cli.inbuf, &region)
        .with_context(|| format!("cannot open ring buffer `{}`", cli.inbuf))?;
    let output = RingBufferHandle::<Sample>::open(&cli.outbuf, &region)
        .with_context(|| format!("cannot open ring buffer `{}`", cli.outbuf))?;

    let interval = Duration::from_millis(cli.interval_ms);
    let total = cli.seconds * cli.pipeline.points_per_sec as u64;
    let mut batch = vec![0.0; cli.pipeline.points_per_interval(interval)];
    tracing::info!(input = cli.inbuf, id = cli.id, output = cli.outbuf, "transforming");

    let processed = Cell::new(0u64);
    PeriodRepeat::new(interval).run(
        || -> Result<()> {
            let n = input.read(cli.id, &mut batch)?;
            let mut j = processed.get();
            for x in &mut batch[..n] {
                *x = transform(j, *x);
                j += 1;
            }
            output.write(&batch[..n])?;
            processed.set(j);
            Ok(())
        },
        || processed.get() < total,
    )?;

    tracing::info!(points = processed.get(), "done");
    Ok(())
}
