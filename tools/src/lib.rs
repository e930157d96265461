//! Building blocks of the sample pipeline shipped with `swmr-ringbuf`:
//! a generator writes samples into a ring buffer, transformers move them between buffers,
//! readers persist them into files and the verifier checks those files.

pub mod config;
pub mod dataset;
pub mod pacing;
pub mod signal;
pub mod verify;

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (`info` if unset).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
