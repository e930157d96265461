use anyhow::{Context, Result};
use clap::Parser;
use std::{cell::RefCell, path::PathBuf, time::Duration};
use swmr_ringbuf::{RingBufferHandle, ShmRegion};
use swmr_ringbuf_tools::{
    config::{PipelineArgs, Sample, BUFFER1_NAME},
    dataset::DatasetWriter,
    init_tracing,
    pacing::PeriodRepeat,
};

/// Reads samples from a ring buffer and stores them in files.
#[derive(Parser)]
#[command(name = "swmr-reader", version)]
struct Cli {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Ring buffer to read from.
    #[arg(long, default_value = BUFFER1_NAME)]
    buf: String,

    /// Reader id.
    #[arg(long, default_value_t = 0)]
    id: usize,

    /// Output file prefix, files are named `<prefix>_<seq>.f64`.
    #[arg(long, default_value = "testdata")]
    prefix: PathBuf,

    /// Samples per output file.
    #[arg(long, default_value_t = 1_000_000)]
    points_per_file: usize,

    /// How often to wake up and read, in milliseconds.
    #[arg(long, default_value_t = 40)]
    interval_ms: u64,

    /// How many seconds worth of samples to store.
    #[arg(long, default_value_t = 600)]
    seconds: u64,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let region = ShmRegion::open(&cli.pipeline.region)
        .with_context(|| format!("cannot open region `{}`, run swmr-setup first", cli.pipeline.region))?;
    let rb = RingBufferHandle::<Sample>::open(&cli.buf, &region)
        .with_context(|| format!("cannot open ring buffer `{}`", cli.buf))?;

    let interval = Duration::from_millis(cli.interval_ms);
    let total = cli.seconds * cli.pipeline.points_per_sec as u64;
    let mut batch = vec![0.0; cli.pipeline.points_per_interval(interval)];
    let writer = RefCell::new(DatasetWriter::new(&cli.prefix, cli.points_per_file));
    tracing::info!(buffer = cli.buf, id = cli.id, prefix = %cli.prefix.display(), "reading");

    let mut wakeups = 0u64;
    PeriodRepeat::new(interval).run(
        || -> Result<()> {
            let n = rb.read(cli.id, &mut batch)?;
            let mut writer = writer.borrow_mut();
            writer.write(&batch[..n])?;
            wakeups += 1;
            if wakeups % 50 == 0 {
                tracing::info!(points = writer.total(), "points written");
            }
            Ok(())
        },
        || writer.borrow().total() < total,
    )?;

    let files = writer.into_inner().finish()?;
    tracing::info!(files = files.len(), "done");
    Ok(())
}
