use crate::{
    error::Result,
    layout::{CoreLayout, Element},
};

/// Who removes the named lock of a ring buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LockOwnership {
    /// Lock lives as long as the region; it is removed by explicit teardown.
    #[default]
    PerRegion,
    /// Lock is removed when the handle that attached with this setting is dropped.
    PerHandle,
}

/// Construction parameters of a ring buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingBufferConfig {
    pub capacity: usize,
    pub readers: usize,
    pub lock_ownership: LockOwnership,
}

impl RingBufferConfig {
    pub fn new(capacity: usize, readers: usize) -> Self {
        Self {
            capacity,
            readers,
            lock_ownership: LockOwnership::default(),
        }
    }

    pub fn with_lock_ownership(self, lock_ownership: LockOwnership) -> Self {
        Self { lock_ownership, ..self }
    }

    /// Layout of the core for items of type `T`.
    pub fn layout<T: Element>(&self) -> Result<CoreLayout> {
        CoreLayout::new::<T>(self.capacity, self.readers)
    }
}
