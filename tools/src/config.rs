//! Defaults of the sample pipeline and command line arguments shared by the tools.

use clap::Args;
use std::time::Duration;
use swmr_ringbuf::{RingBufferConfig, Setup};

/// Items of every pipeline buffer.
pub type Sample = f64;

/// Samples produced per second.
pub const POINTS_PER_SEC: usize = 100_000;
/// How many seconds of samples a buffer holds.
pub const BUF_DEPTH_SEC: usize = 10;
/// Buffer capacity in samples.
pub const BUF_SIZE: usize = BUF_DEPTH_SEC * POINTS_PER_SEC;
/// Reader ids available in every buffer.
pub const READERS: usize = 3;

pub const REGION_NAME: &str = "MySharedMemory";
pub const BUFFER1_NAME: &str = "RING_BUFFER1";
pub const BUFFER2_NAME: &str = "RING_BUFFER2";

/// Location and geometry of the pipeline buffers.
#[derive(Args, Clone, Debug)]
pub struct PipelineArgs {
    /// Name of the shared memory region.
    #[arg(long, default_value = REGION_NAME)]
    pub region: String,

    /// Samples produced per second.
    #[arg(long, default_value_t = POINTS_PER_SEC)]
    pub points_per_sec: usize,
}

impl PipelineArgs {
    /// Number of samples handled per wake-up of a tool that wakes every `interval`.
    pub fn points_per_interval(&self, interval: Duration) -> usize {
        (self.points_per_sec as u128 * interval.as_micros() / 1_000_000) as usize
    }
}

/// Region with both pipeline buffers.
pub fn pipeline_setup(region: &str, capacity: usize, readers: usize) -> Setup {
    [BUFFER1_NAME, BUFFER2_NAME]
        .into_iter()
        .fold(Setup::new(region), |setup, name| {
            setup.buffer(name, RingBufferConfig::new(capacity, readers))
        })
}
