use thiserror::Error;

/// Result type alias used across the crate.
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
/// Errors returned by ring buffer, region and lock operations.
///
/// A short read and a reader overrun are *not* errors: the first is reported as a smaller count,
/// the second is absorbed silently by moving the reader forward.
pub enum Error {
    /// Reader id is outside of `0..readers`.
    #[error("invalid reader id {id}: buffer has {readers} readers")]
    InvalidReaderId { id: usize, readers: usize },

    /// Named object already exists and cannot be created again.
    #[error("`{0}` already exists")]
    AlreadyExists(String),

    /// Named object does not exist (or has not been constructed yet).
    #[error("`{0}` not found")]
    NotFound(String),

    /// Name cannot be used for a shared object.
    #[error("invalid name `{0}`")]
    InvalidName(String),

    /// Capacity or reader count is zero, or the layout size overflows.
    #[error("invalid geometry: capacity {capacity}, readers {readers}")]
    InvalidGeometry { capacity: usize, readers: usize },

    /// Existing ring buffer was constructed with a different geometry or element type.
    #[error("layout mismatch for `{name}`: {reason}")]
    LayoutMismatch { name: String, reason: String },

    /// Region has no room left for a new allocation.
    #[error("region `{region}` is full: {requested} bytes requested, {free} free")]
    RegionFull { region: String, requested: usize, free: usize },

    /// Every directory slot of the region is taken.
    #[error("region `{0}` has no free directory entries")]
    DirectoryFull(String),

    /// Region contents do not look like a region created by this crate.
    #[error("region `{0}` is corrupted or was not created by this crate")]
    CorruptRegion(String),

    /// System call failed.
    #[error("system error: {0}")]
    System(#[from] rustix::io::Errno),
}

impl Error {
    /// Whether the error reports a bad reader id.
    pub fn is_invalid_reader_id(&self) -> bool {
        matches!(self, Error::InvalidReaderId { .. })
    }

    /// Whether the error reports a missing named object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
