mod base;
mod handle;

pub use base::RingBufferCore;
pub use handle::{lock_name, RingBufferHandle};
