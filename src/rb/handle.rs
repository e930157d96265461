use super::RingBufferCore;
use crate::{
    config::{LockOwnership, RingBufferConfig},
    error::{Error, Result},
    layout::Element,
    lifecycle::construct_in,
    lock::NamedLock,
    observer::{Based, DelegateObserver},
    region::{Allocation, Directory, EntryState, ShmRegion},
};

/// Name of the lock guarding the ring buffer named `buffer`.
pub fn lock_name(buffer: &str) -> String {
    format!("{buffer}_mutex")
}

/// Process-local handle to a ring buffer located in a shared region.
///
/// The handle refers to the buffer by its place in the region and guards every access with the buffer's named lock,
/// so any number of processes can hold handles to the same buffer. Only one of them is supposed to write,
/// and each reader id is supposed to be used by a single reader.
///
/// Observer methods (like [`Observer::read_available`](`crate::Observer::read_available`)) do not take the lock.
pub struct RingBufferHandle<'r, T: Element> {
    region: &'r ShmRegion,
    name: String,
    core: RingBufferCore<T>,
    lock: NamedLock,
    ownership: LockOwnership,
}

impl<'r, T: Element> RingBufferHandle<'r, T> {
    /// Attaches to the ring buffer named `name`, constructing it in `region` if it does not exist yet.
    ///
    /// An existing buffer must have been constructed with the same capacity, reader count and item type,
    /// otherwise [`Error::LayoutMismatch`] is returned.
    pub fn attach(name: &str, region: &'r ShmRegion, config: &RingBufferConfig) -> Result<Self> {
        let layout = config.layout::<T>()?;
        let mut dir = region.directory()?;
        let (core, lock) = match dir.lookup(name) {
            Some((EntryState::Live, allocation)) => {
                let (core, lock) = Self::open_live(&dir, name, allocation)?;
                if core.layout() != layout {
                    return Err(Error::LayoutMismatch {
                        name: name.into(),
                        reason: format!(
                            "constructed with capacity {} and {} readers, requested capacity {} and {} readers",
                            core.layout().capacity(),
                            core.layout().readers(),
                            layout.capacity(),
                            layout.readers(),
                        ),
                    });
                }
                tracing::debug!(buffer = name, region = region.name(), "attached to ring buffer");
                (core, lock)
            }
            _ => construct_in(&mut dir, name, layout)?,
        };
        drop(dir);
        Ok(Self {
            region,
            name: name.into(),
            core,
            lock,
            ownership: config.lock_ownership,
        })
    }

    /// Attaches to an already constructed ring buffer.
    ///
    /// Fails with [`Error::NotFound`] if there is no live buffer named `name` in `region`.
    pub fn open(name: &str, region: &'r ShmRegion) -> Result<Self> {
        let mut dir = region.directory()?;
        let (core, lock) = match dir.lookup(name) {
            Some((EntryState::Live, allocation)) => Self::open_live(&dir, name, allocation)?,
            _ => return Err(Error::NotFound(name.into())),
        };
        drop(dir);
        tracing::debug!(buffer = name, region = region.name(), "opened ring buffer");
        Ok(Self {
            region,
            name: name.into(),
            core,
            lock,
            ownership: LockOwnership::default(),
        })
    }

    fn open_live(dir: &Directory<'r>, name: &str, allocation: Allocation) -> Result<(RingBufferCore<T>, NamedLock)> {
        let ptr = dir.region().ptr_at(allocation);
        let core = unsafe { RingBufferCore::attach(ptr, allocation.size) }.map_err(|reason| Error::LayoutMismatch {
            name: name.into(),
            reason,
        })?;
        let lock = NamedLock::open(&lock_name(name))?;
        Ok((core, lock))
    }

    /// Name of the ring buffer.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Region the ring buffer is located in.
    pub fn region(&self) -> &'r ShmRegion {
        self.region
    }

    /// Who removes the named lock of this buffer.
    pub fn lock_ownership(&self) -> LockOwnership {
        self.ownership
    }

    /// Makes this handle remove (or stop removing) the named lock on drop.
    pub fn set_lock_ownership(&mut self, ownership: LockOwnership) {
        self.ownership = ownership;
    }

    /// Appends items to the ring buffer overwriting the oldest unread items of slow readers.
    ///
    /// Never waits for readers. Returns `min(elems.len(), capacity)`; if the slice is longer than the capacity
    /// only its last `capacity` items are stored.
    pub fn write(&self, elems: &[T]) -> Result<usize> {
        let _guard = self.lock.lock()?;
        Ok(unsafe { self.core.write(elems) })
    }

    /// Appends a single item.
    pub fn write_one(&self, elem: T) -> Result<()> {
        self.write(&[elem]).map(|_| ())
    }

    /// Copies up to `elems.len()` unread items of `reader` into the slice, oldest first.
    ///
    /// Returns the number of items copied, zero if there is nothing to read.
    pub fn read(&self, reader: usize, elems: &mut [T]) -> Result<usize> {
        let _guard = self.lock.lock()?;
        unsafe { self.core.read(reader, elems) }
    }
}

impl<T: Element> Based for RingBufferHandle<'_, T> {
    type Base = RingBufferCore<T>;
    fn base(&self) -> &Self::Base {
        &self.core
    }
}

impl<T: Element> DelegateObserver for RingBufferHandle<'_, T> {}

impl<T: Element> Drop for RingBufferHandle<'_, T> {
    fn drop(&mut self) {
        if self.ownership == LockOwnership::PerHandle {
            if let Err(e) = NamedLock::remove(self.lock.name()) {
                tracing::error!(buffer = self.name, "failed to remove lock: {e}");
            }
        }
    }
}

impl<T: Element> core::fmt::Debug for RingBufferHandle<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RingBufferHandle")
            .field("name", &self.name)
            .field("region", &self.region.name())
            .field("layout", &self.core.layout())
            .field("ownership", &self.ownership)
            .finish()
    }
}
