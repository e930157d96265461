//! Cross-process mutual exclusion addressed by name.
//!
//! A lock is a zero-length POSIX shared memory object locked with `flock(2)`.
//! The kernel drops the lock when the holder dies, so a crashed process never leaves other processes waiting.
//! Only the *name* outlives a crash, which is why constructors remove stale names before creating new ones.

use crate::{
    error::{Error, Result},
    region::object_name,
};
use rustix::{
    fd::OwnedFd,
    fs::{flock, FlockOperation, Mode},
    io::Errno,
    shm,
};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Exclusive `flock` on a descriptor, also serialized between threads of this process.
///
/// `flock` is attached to an open file description, so threads sharing the descriptor would not exclude each other
/// without the mutex.
pub(crate) struct FdLock {
    fd: OwnedFd,
    mutex: Mutex<()>,
}

pub(crate) struct FdLockGuard<'a> {
    fd: &'a OwnedFd,
    _inner: MutexGuard<'a, ()>,
}

impl FdLock {
    pub fn new(fd: OwnedFd) -> Self {
        Self { fd, mutex: Mutex::new(()) }
    }

    pub fn fd(&self) -> &OwnedFd {
        &self.fd
    }

    pub fn lock(&self) -> Result<FdLockGuard<'_>> {
        let inner = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        retry_on_intr(|| flock(&self.fd, FlockOperation::LockExclusive))?;
        Ok(FdLockGuard { fd: &self.fd, _inner: inner })
    }

    pub fn try_lock(&self) -> Result<Option<FdLockGuard<'_>>> {
        let inner = match self.mutex.try_lock() {
            Ok(guard) => guard,
            Err(std::sync::TryLockError::Poisoned(e)) => e.into_inner(),
            Err(std::sync::TryLockError::WouldBlock) => return Ok(None),
        };
        match retry_on_intr(|| flock(&self.fd, FlockOperation::NonBlockingLockExclusive)) {
            Ok(()) => Ok(Some(FdLockGuard { fd: &self.fd, _inner: inner })),
            Err(Errno::WOULDBLOCK) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for FdLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = flock(self.fd, FlockOperation::Unlock) {
            tracing::error!("failed to release flock: {e}");
        }
    }
}

fn retry_on_intr<F: FnMut() -> rustix::io::Result<()>>(mut f: F) -> rustix::io::Result<()> {
    loop {
        match f() {
            Err(Errno::INTR) => continue,
            other => return other,
        }
    }
}

/// Named cross-process exclusive lock.
///
/// Any number of `NamedLock` instances (in any number of processes) may refer to the same name;
/// at most one of them holds the lock at a time.
pub struct NamedLock {
    name: String,
    inner: FdLock,
}

/// Holds a [`NamedLock`] until dropped.
pub struct NamedLockGuard<'a> {
    _inner: FdLockGuard<'a>,
}

impl NamedLock {
    /// Creates a new named lock.
    ///
    /// Fails with [`Error::AlreadyExists`] if the name is taken.
    pub fn create(name: &str) -> Result<Self> {
        let path = object_name(name)?;
        let fd = match shm::open(
            path.as_str(),
            shm::OFlags::CREATE | shm::OFlags::EXCL | shm::OFlags::RDWR,
            Mode::RUSR | Mode::WUSR,
        ) {
            Ok(fd) => fd,
            Err(Errno::EXIST) => return Err(Error::AlreadyExists(name.into())),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(lock = name, "created named lock");
        Ok(Self {
            name: name.into(),
            inner: FdLock::new(fd),
        })
    }

    /// Opens an existing named lock.
    ///
    /// Fails with [`Error::NotFound`] if there is no lock with such name.
    pub fn open(name: &str) -> Result<Self> {
        let path = object_name(name)?;
        let fd = match shm::open(path.as_str(), shm::OFlags::RDWR, Mode::empty()) {
            Ok(fd) => fd,
            Err(Errno::NOENT) => return Err(Error::NotFound(name.into())),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            name: name.into(),
            inner: FdLock::new(fd),
        })
    }

    /// Removes the lock name.
    ///
    /// Instances that are already open keep working with each other, but new instances cannot open them anymore.
    ///
    /// Returns `false` if there was nothing to remove.
    pub fn remove(name: &str) -> Result<bool> {
        let path = object_name(name)?;
        match shm::unlink(path.as_str()) {
            Ok(()) => {
                tracing::debug!(lock = name, "removed named lock");
                Ok(true)
            }
            Err(Errno::NOENT) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Checks whether a lock with such name exists.
    pub fn exists(name: &str) -> Result<bool> {
        match Self::open(name) {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Name of the lock.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits until the lock is acquired.
    pub fn lock(&self) -> Result<NamedLockGuard<'_>> {
        Ok(NamedLockGuard {
            _inner: self.inner.lock()?,
        })
    }

    /// Acquires the lock if it is free.
    ///
    /// Returns `None` if the lock is held by someone else.
    pub fn try_lock(&self) -> Result<Option<NamedLockGuard<'_>>> {
        Ok(self.inner.try_lock()?.map(|inner| NamedLockGuard { _inner: inner }))
    }
}

impl core::fmt::Debug for NamedLock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NamedLock").field("name", &self.name).finish()
    }
}
