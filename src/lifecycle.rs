//! Construction and removal of ring buffers in shared regions.
//!
//! A ring buffer goes through the states of its directory entry:
//!
//! + *absent* - nothing is allocated under the name,
//! + *constructing* - space is reserved but the core is not initialized yet,
//! + *live* - the core is initialized and its named lock exists.
//!
//! The directory lock of the region is held for the whole construction, so concurrent constructors of the same name
//! are serialized and an entry is only seen as *constructing* if its constructor died. Constructing from *absent* or
//! from such leftover entry first removes a lock left behind by a previous instance of the buffer.
//!
//! The lock and the core may also get out of sync the other way: a *live* core whose lock was removed.
//! [`construct`] treats it as left over and initializes it again, so `remove` followed by `construct`
//! recovers a buffer after an unclean shutdown.

use crate::{
    config::RingBufferConfig,
    error::{Error, Result},
    layout::{CoreLayout, Element},
    lock::NamedLock,
    rb::{lock_name, RingBufferCore},
    region::{Directory, EntryState, ShmRegion},
};

/// Exact number of bytes a ring buffer of `capacity` items of type `T` with `readers` readers takes in a region.
///
/// Allocations inside a region are aligned, so a region must also have [`ShmRegion::OVERHEAD`] spare bytes.
pub fn shm_size<T: Element>(capacity: usize, readers: usize) -> Result<usize> {
    Ok(CoreLayout::new::<T>(capacity, readers)?.size())
}

/// Constructs a new ring buffer named `name` in `region` and creates its lock.
///
/// The buffer starts empty with every cursor at zero.
/// Fails with [`Error::AlreadyExists`] if a live buffer with such name and its lock are already there.
/// A live buffer whose lock was [`remove`]d is initialized again, in place if it is large enough.
pub fn construct<T: Element>(name: &str, region: &ShmRegion, capacity: usize, readers: usize) -> Result<()> {
    let layout = CoreLayout::new::<T>(capacity, readers)?;
    let mut dir = region.directory()?;
    if let Some((EntryState::Live, _)) = dir.lookup(name) {
        if NamedLock::exists(&lock_name(name))? {
            return Err(Error::AlreadyExists(name.into()));
        }
        tracing::warn!(buffer = name, region = region.name(), "reinitializing ring buffer without lock");
        dir.reset(name);
    }
    construct_in::<T>(&mut dir, name, layout).map(|_| ())
}

/// Constructs a core while the directory is locked.
///
/// The entry named `name` must not be live.
pub(crate) fn construct_in<T: Element>(
    dir: &mut Directory<'_>,
    name: &str,
    layout: CoreLayout,
) -> Result<(RingBufferCore<T>, NamedLock)> {
    let region = dir.region();
    let lock_name = lock_name(name);
    if NamedLock::remove(&lock_name)? {
        tracing::warn!(buffer = name, lock = lock_name, "removed stale lock");
    }

    let allocation = dir.begin(name, layout.size())?;
    let lock = match NamedLock::create(&lock_name) {
        Ok(lock) => lock,
        Err(e) => {
            dir.release(name);
            return Err(e);
        }
    };
    let core = unsafe { RingBufferCore::init(region.ptr_at(allocation), layout) };
    dir.commit(name);

    tracing::debug!(
        buffer = name,
        region = region.name(),
        capacity = layout.capacity(),
        readers = layout.readers(),
        "constructed ring buffer"
    );
    Ok((core, lock))
}

/// Removes the named lock of the ring buffer `name`.
///
/// Does nothing if there is no such lock. Returns whether anything was removed.
pub fn remove(name: &str) -> Result<bool> {
    NamedLock::remove(&lock_name(name))
}

/// Removes the named lock of the ring buffer `name` and releases its space in `region`.
///
/// Handles that are still attached keep working on the released memory until the space is reused,
/// so all of them must be dropped beforehand.
pub fn destroy(name: &str, region: &ShmRegion) -> Result<bool> {
    let released = region.directory()?.release(name);
    let removed = remove(name)?;
    if released {
        tracing::debug!(buffer = name, region = region.name(), "destroyed ring buffer");
    }
    Ok(released || removed)
}

/// Current state of the ring buffer `name` in `region`.
pub fn state(name: &str, region: &ShmRegion) -> Result<EntryState> {
    region.state(name)
}

/// Plan of a region with a fixed set of ring buffers of item type `T`.
///
/// Used by setup tools to create everything at once and to remove it afterwards.
#[derive(Clone, Debug)]
pub struct Setup {
    region: String,
    buffers: Vec<(String, RingBufferConfig)>,
}

impl Setup {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.into(),
            buffers: Vec::new(),
        }
    }

    /// Adds a ring buffer to the plan.
    pub fn buffer(mut self, name: &str, config: RingBufferConfig) -> Self {
        self.buffers.push((name.into(), config));
        self
    }

    pub fn region_name(&self) -> &str {
        &self.region
    }

    pub fn buffers(&self) -> impl Iterator<Item = (&str, &RingBufferConfig)> {
        self.buffers.iter().map(|(name, config)| (name.as_str(), config))
    }

    /// Size of a region able to host every planned buffer.
    pub fn region_size<T: Element>(&self) -> Result<usize> {
        let sizes = self
            .buffers
            .iter()
            .map(|(_, config)| Ok(config.layout::<T>()?.size()))
            .collect::<Result<Vec<_>>>()?;
        Ok(ShmRegion::required_size(sizes))
    }

    /// Removes leftovers of a previous setup, creates the region and constructs every planned buffer.
    pub fn create<T: Element>(&self) -> Result<ShmRegion> {
        let size = self.region_size::<T>()?;
        self.teardown()?;
        let region = ShmRegion::create(&self.region, size)?;
        for (name, config) in &self.buffers {
            construct::<T>(name, &region, config.capacity, config.readers)?;
        }
        tracing::info!(region = self.region, size, buffers = self.buffers.len(), "setup complete");
        Ok(region)
    }

    /// Removes the region and the locks of every planned buffer.
    ///
    /// Missing objects are skipped, so teardown may be repeated.
    pub fn teardown(&self) -> Result<()> {
        for (name, _) in &self.buffers {
            remove(name)?;
        }
        if ShmRegion::remove(&self.region)? {
            tracing::info!(region = self.region, "removed region");
        }
        Ok(())
    }
}
