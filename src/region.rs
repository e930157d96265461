//! Named shared memory region hosting ring buffer cores.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐ 0
//! │ RegionHeader: magic, size, used             │
//! │ Entry × MAX_ENTRIES: state, name, extent    │
//! ├─────────────────────────────────────────────┤ DATA_OFFSET
//! │ allocations (bump allocated, ALLOC_ALIGN)   │
//! └─────────────────────────────────────────────┘ size
//! ```
//!
//! Directory changes are serialized between processes with `flock` on the region descriptor.

use crate::{
    error::{Error, Result},
    layout::{CoreHeader, PaddedReaderState},
    lock::{FdLock, FdLockGuard},
    raw::align_up,
};
use core::{
    mem::{align_of, size_of},
    ptr::{self, NonNull},
    time::Duration,
};
use rustix::{
    fs::{fstat, ftruncate, Mode},
    io::Errno,
    mm::{mmap, munmap, MapFlags, ProtFlags},
    shm,
};
use std::{thread, time::Instant};

const REGION_MAGIC: u64 = 0x5357_4d52_5245_4701;

/// Maximal number of named allocations in a region.
pub const MAX_ENTRIES: usize = 16;
/// Maximal length of an allocation name in bytes.
pub const MAX_NAME_LEN: usize = 64;
/// Every allocation starts at a multiple of this value.
///
/// At least 128 bytes and never less than the alignment of a ring buffer core.
pub const ALLOC_ALIGN: usize = {
    let core = max_usize(align_of::<CoreHeader>(), align_of::<PaddedReaderState>());
    max_usize(core, 128)
};

/// How long [`ShmRegion::open`] waits for another process to finish creating a region.
pub const CREATION_TIMEOUT: Duration = Duration::from_millis(200);
const CREATION_POLL: Duration = Duration::from_micros(100);

/// Longest name accepted by `shm_open` on common platforms, leading slash excluded.
const MAX_OBJECT_NAME_LEN: usize = 250;

const DATA_OFFSET: usize = align_up(size_of::<RegionHeader>(), ALLOC_ALIGN);

const fn max_usize(a: usize, b: usize) -> usize {
    if a > b {
        a
    } else {
        b
    }
}

/// Converts a user supplied name to a POSIX shared memory object name.
///
/// A leading slash is added if missing. Names must be non-empty and must not contain other slashes or NUL bytes.
pub(crate) fn object_name(name: &str) -> Result<String> {
    let bare = name.strip_prefix('/').unwrap_or(name);
    if bare.is_empty() || bare.len() > MAX_OBJECT_NAME_LEN || bare.contains(['/', '\0']) {
        return Err(Error::InvalidName(name.into()));
    }
    Ok(format!("/{bare}"))
}

/// State of a named allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryState {
    /// There is no allocation with such name.
    Absent,
    /// Allocation is reserved but its owner has not finished initializing it.
    ///
    /// Also the state left behind by a process that died during construction.
    Constructing,
    /// Allocation is initialized and ready for use.
    Live,
}

#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq)]
enum RawState {
    Free = 0,
    Constructing = 1,
    Live = 2,
}

#[repr(C)]
struct Entry {
    state: u32,
    name_len: u32,
    name: [u8; MAX_NAME_LEN],
    offset: u64,
    size: u64,
}

#[repr(C)]
struct RegionHeader {
    magic: u64,
    size: u64,
    used: u64,
    entries: [Entry; MAX_ENTRIES],
}

impl Entry {
    fn state(&self) -> RawState {
        match self.state {
            1 => RawState::Constructing,
            2 => RawState::Live,
            _ => RawState::Free,
        }
    }

    fn name(&self) -> &[u8] {
        &self.name[..usize::min(self.name_len as usize, MAX_NAME_LEN)]
    }

    fn is_named(&self, name: &str) -> bool {
        self.state() != RawState::Free && self.name() == name.as_bytes()
    }

    fn allocation(&self) -> Allocation {
        Allocation {
            offset: self.offset as usize,
            size: self.size as usize,
        }
    }
}

/// Location of a named allocation inside a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Allocation {
    /// Offset from the region start.
    pub offset: usize,
    /// Size in bytes.
    pub size: usize,
}

/// Description of a directory entry, see [`ShmRegion::entries`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub state: EntryState,
    pub allocation: Allocation,
}

/// Named POSIX shared memory object mapped into this process, with a directory of named allocations.
///
/// Dropping the region only unmaps it. The object itself lives until [`ShmRegion::remove`].
pub struct ShmRegion {
    name: String,
    ptr: NonNull<u8>,
    len: usize,
    lock: FdLock,
}

unsafe impl Send for ShmRegion {}
unsafe impl Sync for ShmRegion {}

impl ShmRegion {
    /// Bytes taken by the region's own bookkeeping plus alignment slack for every possible allocation.
    ///
    /// A region that hosts cores of sizes `s1, s2, ...` needs at least `s1 + s2 + ... + OVERHEAD` bytes.
    pub const OVERHEAD: usize = DATA_OFFSET + MAX_ENTRIES * ALLOC_ALIGN;

    /// Size of a region able to host allocations of specified sizes.
    pub fn required_size<I: IntoIterator<Item = usize>>(sizes: I) -> usize {
        sizes.into_iter().sum::<usize>() + Self::OVERHEAD
    }

    /// Creates a new region of `size` bytes.
    ///
    /// Fails with [`Error::AlreadyExists`] if an object with such name exists.
    pub fn create(name: &str, size: usize) -> Result<Self> {
        let path = object_name(name)?;
        if size < DATA_OFFSET {
            return Err(Error::RegionFull {
                region: name.into(),
                requested: DATA_OFFSET,
                free: size,
            });
        }
        let fd = match shm::open(
            path.as_str(),
            shm::OFlags::CREATE | shm::OFlags::EXCL | shm::OFlags::RDWR,
            Mode::RUSR | Mode::WUSR,
        ) {
            Ok(fd) => fd,
            Err(Errno::EXIST) => return Err(Error::AlreadyExists(name.into())),
            Err(e) => return Err(e.into()),
        };
        let lock = FdLock::new(fd);
        let result = (|| -> Result<NonNull<u8>> {
            // Openers wait on this lock until the header is written.
            let _guard = lock.lock()?;
            ftruncate(lock.fd(), size as u64)?;
            let ptr = unsafe { map(&lock, size)? };
            unsafe {
                // Fresh pages are zeroed, so every entry starts free.
                let header = ptr.cast::<RegionHeader>().as_ptr();
                (*header).size = size as u64;
                (*header).used = DATA_OFFSET as u64;
                (*header).magic = REGION_MAGIC;
            }
            Ok(ptr)
        })();
        match result {
            Ok(ptr) => {
                tracing::debug!(region = name, size, "created shared memory region");
                Ok(Self {
                    name: name.into(),
                    ptr,
                    len: size,
                    lock,
                })
            }
            Err(e) => {
                drop(lock);
                let _ = shm::unlink(path.as_str());
                Err(e)
            }
        }
    }

    /// Opens an existing region.
    ///
    /// Fails with [`Error::NotFound`] if there is no object with such name.
    /// A region that is still being created by another process is waited for up to [`CREATION_TIMEOUT`].
    pub fn open(name: &str) -> Result<Self> {
        let path = object_name(name)?;
        let deadline = Instant::now() + CREATION_TIMEOUT;
        loop {
            match Self::try_open(name, &path)? {
                Some(region) => break Ok(region),
                None if Instant::now() < deadline => thread::sleep(CREATION_POLL),
                None => break Err(Error::CorruptRegion(name.into())),
            }
        }
    }

    /// Returns `None` if the object has no header yet.
    fn try_open(name: &str, path: &str) -> Result<Option<Self>> {
        let fd = match shm::open(path, shm::OFlags::RDWR, Mode::empty()) {
            Ok(fd) => fd,
            Err(Errno::NOENT) => return Err(Error::NotFound(name.into())),
            Err(e) => return Err(e.into()),
        };
        let lock = FdLock::new(fd);
        let (ptr, len) = {
            let _guard = lock.lock()?;
            let len = usize::try_from(fstat(lock.fd())?.st_size).unwrap_or(0);
            if len == 0 {
                // Creator has not taken the lock yet.
                return Ok(None);
            }
            if len < DATA_OFFSET {
                return Err(Error::CorruptRegion(name.into()));
            }
            let ptr = unsafe { map(&lock, len)? };
            let header = unsafe { ptr.cast::<RegionHeader>().as_ref() };
            let (magic, size, used) = (header.magic, header.size as usize, header.used as usize);
            if magic != REGION_MAGIC || size != len || used > len {
                unsafe {
                    let _ = munmap(ptr.as_ptr().cast(), len);
                }
                return match magic {
                    0 => Ok(None),
                    _ => Err(Error::CorruptRegion(name.into())),
                };
            }
            (ptr, len)
        };
        tracing::debug!(region = name, size = len, "opened shared memory region");
        Ok(Some(Self {
            name: name.into(),
            ptr,
            len,
            lock,
        }))
    }

    /// Opens the region if it exists or creates it with `size` bytes otherwise.
    pub fn open_or_create(name: &str, size: usize) -> Result<Self> {
        match Self::open(name) {
            Err(Error::NotFound(_)) => match Self::create(name, size) {
                Err(Error::AlreadyExists(_)) => Self::open(name),
                other => other,
            },
            other => other,
        }
    }

    /// Removes the region name.
    ///
    /// Processes that have the region mapped keep their mapping.
    /// Returns `false` if there was nothing to remove.
    pub fn remove(name: &str) -> Result<bool> {
        let path = object_name(name)?;
        match shm::unlink(path.as_str()) {
            Ok(()) => {
                tracing::debug!(region = name, "removed shared memory region");
                Ok(true)
            }
            Err(Errno::NOENT) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Name of the region.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the region in bytes.
    pub fn size(&self) -> usize {
        self.len
    }

    /// Number of bytes not yet handed out by the bump allocator.
    pub fn free_len(&self) -> Result<usize> {
        let mut dir = self.directory()?;
        Ok(self.len - dir.header().used as usize)
    }

    /// Location of the allocation named `name` if it is live.
    pub fn find(&self, name: &str) -> Result<Option<Allocation>> {
        Ok(match self.directory()?.lookup(name) {
            Some((EntryState::Live, allocation)) => Some(allocation),
            _ => None,
        })
    }

    /// State of the allocation named `name`.
    pub fn state(&self, name: &str) -> Result<EntryState> {
        Ok(self.directory()?.lookup(name).map_or(EntryState::Absent, |(state, _)| state))
    }

    /// Lists all named allocations.
    pub fn entries(&self) -> Result<Vec<EntryInfo>> {
        let mut dir = self.directory()?;
        Ok(dir
            .header()
            .entries
            .iter()
            .filter_map(|entry| {
                let state = match entry.state() {
                    RawState::Free => return None,
                    RawState::Constructing => EntryState::Constructing,
                    RawState::Live => EntryState::Live,
                };
                Some(EntryInfo {
                    name: String::from_utf8_lossy(entry.name()).into_owned(),
                    state,
                    allocation: entry.allocation(),
                })
            })
            .collect())
    }

    /// Pointer to `offset` bytes from the region start.
    pub(crate) fn ptr_at(&self, allocation: Allocation) -> NonNull<u8> {
        debug_assert!(allocation.offset + allocation.size <= self.len);
        unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(allocation.offset)) }
    }

    /// Locks the directory for reading or modification.
    pub(crate) fn directory(&self) -> Result<Directory<'_>> {
        Ok(Directory {
            region: self,
            _guard: self.lock.lock()?,
        })
    }
}

impl Drop for ShmRegion {
    fn drop(&mut self) {
        if let Err(e) = unsafe { munmap(self.ptr.as_ptr().cast(), self.len) } {
            tracing::error!(region = self.name, "failed to unmap region: {e}");
        }
    }
}

impl core::fmt::Debug for ShmRegion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShmRegion")
            .field("name", &self.name)
            .field("len", &self.len)
            .finish()
    }
}

unsafe fn map(lock: &FdLock, len: usize) -> Result<NonNull<u8>> {
    let ptr = unsafe {
        mmap(
            ptr::null_mut(),
            len,
            ProtFlags::READ | ProtFlags::WRITE,
            MapFlags::SHARED,
            lock.fd(),
            0,
        )?
    };
    NonNull::new(ptr.cast::<u8>()).ok_or(Error::System(Errno::NOMEM))
}

/// Locked view of a region directory.
pub(crate) struct Directory<'a> {
    region: &'a ShmRegion,
    _guard: FdLockGuard<'a>,
}

impl<'a> Directory<'a> {
    pub fn region(&self) -> &'a ShmRegion {
        self.region
    }

    fn header(&mut self) -> &mut RegionHeader {
        // Exclusive access is provided by the directory lock.
        unsafe { self.region.ptr.cast::<RegionHeader>().as_mut() }
    }

    /// State and location of the allocation named `name`, if any.
    pub fn lookup(&mut self, name: &str) -> Option<(EntryState, Allocation)> {
        let entry = self.header().entries.iter().find(|entry| entry.is_named(name))?;
        let state = match entry.state() {
            RawState::Constructing => EntryState::Constructing,
            _ => EntryState::Live,
        };
        Some((state, entry.allocation()))
    }

    /// Reserves `size` bytes under `name` and marks the entry as constructing.
    ///
    /// An entry left in constructing state by a dead process is taken over if it is large enough,
    /// otherwise released and allocated again.
    pub fn begin(&mut self, name: &str, size: usize) -> Result<Allocation> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(Error::InvalidName(name.into()));
        }
        let region = self.region;
        let header = self.header();

        if let Some(index) = header.entries.iter().position(|entry| entry.is_named(name)) {
            let entry = &header.entries[index];
            if entry.state() == RawState::Live {
                return Err(Error::AlreadyExists(name.into()));
            }
            if entry.size as usize >= size {
                tracing::warn!(region = region.name, entry = name, "taking over unfinished construction");
                return Ok(entry.allocation());
            }
            tracing::warn!(region = region.name, entry = name, "releasing unfinished construction");
            release(header, name);
        }

        // Reuse a released extent if one fits, otherwise take space from the end.
        let reusable = header
            .entries
            .iter()
            .position(|entry| entry.state() == RawState::Free && entry.size as usize >= size);
        let index = match reusable {
            Some(index) => index,
            None => {
                let index = header
                    .entries
                    .iter()
                    .position(|entry| entry.state() == RawState::Free && entry.size == 0)
                    .ok_or_else(|| Error::DirectoryFull(region.name.clone()))?;
                let offset = align_up(header.used as usize, ALLOC_ALIGN);
                let free = region.len.saturating_sub(offset);
                if size > free {
                    return Err(Error::RegionFull {
                        region: region.name.clone(),
                        requested: size,
                        free,
                    });
                }
                header.used = (offset + size) as u64;
                let entry = &mut header.entries[index];
                entry.offset = offset as u64;
                entry.size = size as u64;
                index
            }
        };

        let entry = &mut header.entries[index];
        entry.name = [0; MAX_NAME_LEN];
        entry.name[..name.len()].copy_from_slice(name.as_bytes());
        entry.name_len = name.len() as u32;
        entry.state = RawState::Constructing as u32;
        Ok(entry.allocation())
    }

    /// Marks the allocation named `name` as live.
    pub fn commit(&mut self, name: &str) {
        if let Some(entry) = self.header().entries.iter_mut().find(|entry| entry.is_named(name)) {
            entry.state = RawState::Live as u32;
        }
    }

    /// Turns the live allocation named `name` back into constructing state, keeping its extent.
    pub fn reset(&mut self, name: &str) {
        if let Some(entry) = self.header().entries.iter_mut().find(|entry| entry.is_named(name)) {
            entry.state = RawState::Constructing as u32;
        }
    }

    /// Releases the allocation named `name`.
    ///
    /// Returns `false` if there was no such allocation.
    pub fn release(&mut self, name: &str) -> bool {
        release(self.header(), name)
    }
}

fn release(header: &mut RegionHeader, name: &str) -> bool {
    let Some(entry) = header.entries.iter_mut().find(|entry| entry.is_named(name)) else {
        return false;
    };
    entry.state = RawState::Free as u32;
    entry.name_len = 0;
    // Give the space back if this was the last allocation, otherwise keep the extent for reuse.
    if (entry.offset + entry.size) == header.used {
        header.used = entry.offset;
        entry.offset = 0;
        entry.size = 0;
    }
    true
}
