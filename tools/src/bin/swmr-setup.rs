use anyhow::{Context, Result};
use clap::Parser;
use swmr_ringbuf_tools::{
    config::{pipeline_setup, Sample, BUF_SIZE, READERS, REGION_NAME},
    init_tracing,
};

/// Creates the shared memory region hosting the pipeline ring buffers.
///
/// Anything left by a previous run is removed first.
#[derive(Parser)]
#[command(name = "swmr-setup", version)]
struct Cli {
    /// Name of the shared memory region.
    #[arg(long, default_value = REGION_NAME)]
    region: String,

    /// Capacity of every ring buffer in samples.
    #[arg(long, default_value_t = BUF_SIZE)]
    capacity: usize,

    /// Number of readers of every ring buffer.
    #[arg(long, default_value_t = READERS)]
    readers: usize,

    /// Only remove the region and the ring buffer locks.
    #[arg(long)]
    remove: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let setup = pipeline_setup(&cli.region, cli.capacity, cli.readers);

    if cli.remove {
        setup.teardown().context("cannot remove shared memory structures")?;
        return Ok(());
    }

    let region = setup
        .create::<Sample>()
        .with_context(|| format!("cannot set up region `{}`", cli.region))?;
    for entry in region.entries()? {
        tracing::info!(
            buffer = entry.name,
            offset = entry.allocation.offset,
            size = entry.allocation.size,
            "ring buffer ready"
        );
    }
    Ok(())
}
