//! Single-writer multiple-reader ring buffer located in named shared memory.
//!
//! A writer process appends fixed-size items and never waits. Each of a fixed number of readers (usually separate
//! processes) consumes the stream at its own pace, identified by a small integer id. A reader that falls behind by
//! more than the buffer capacity loses its oldest unread items and continues from the most recent `capacity` ones.
//!
//! # Structure
//!
//! + [`ShmRegion`] - named POSIX shared memory object hosting any number of named ring buffers.
//! + [`RingBufferCore`] - the buffer itself: items, write cursor and per-reader state. Not synchronized.
//! + [`RingBufferHandle`] - per-process handle that guards a core with a [`NamedLock`].
//! + [`lifecycle`] - construction and removal of buffers, and [`Setup`] for setup tools.
//!
//! # Example
//!
//! ```no_run
//! use swmr_ringbuf::{Observer, RingBufferConfig, RingBufferHandle, ShmRegion};
//!
//! # fn main() -> swmr_ringbuf::Result<()> {
//! let config = RingBufferConfig::new(1024, 2);
//! let size = ShmRegion::required_size([swmr_ringbuf::shm_size::<f64>(config.capacity, config.readers)?]);
//! let region = ShmRegion::open_or_create("example_region", size)?;
//!
//! let writer = RingBufferHandle::<f64>::attach("example_buffer", &region, &config)?;
//! writer.write(&[1.0, 2.0, 3.0])?;
//!
//! let reader = RingBufferHandle::<f64>::open("example_buffer", &region)?;
//! assert_eq!(reader.read_available(0)?, 3);
//! let mut buf = [0.0; 8];
//! assert_eq!(reader.read(0, &mut buf)?, 3);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod layout;
pub mod lifecycle;
mod lock;
pub mod observer;
pub mod raw;
pub mod rb;
pub mod region;

pub use config::{LockOwnership, RingBufferConfig};
pub use error::{Error, Result};
pub use layout::{CoreLayout, Element};
pub use lifecycle::{construct, destroy, remove, shm_size, Setup};
pub use lock::{NamedLock, NamedLockGuard};
pub use observer::Observer;
pub use rb::{RingBufferCore, RingBufferHandle};
pub use region::{EntryState, ShmRegion};

#[cfg(test)]
mod tests;
