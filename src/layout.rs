//! Byte layout of a ring buffer core inside shared memory.
//!
//! ```text
//! ┌──────────────────────────────┐ 0
//! │ CoreHeader                   │
//! ├──────────────────────────────┤ readers_offset
//! │ ReaderState × readers        │ (each cache padded)
//! ├──────────────────────────────┤ storage_offset
//! │ T × capacity                 │
//! └──────────────────────────────┘ size
//! ```

use crate::{
    error::{Error, Result},
    raw::align_up,
};
use core::mem::{align_of, size_of};
#[cfg(not(feature = "portable-atomic"))]
pub(crate) use core::sync::atomic::AtomicUsize;
use crossbeam_utils::CachePadded;
#[cfg(feature = "portable-atomic")]
pub(crate) use portable_atomic::AtomicUsize;

/// Magic value written at the start of every constructed core.
pub(crate) const CORE_MAGIC: u64 = 0x5357_4d52_5242_0001;

/// Plain-old-data element that can be stored in shared memory.
///
/// # Safety
///
/// The type must not contain pointers or references, must have the same layout in every process that maps
/// the buffer, and every bit pattern (including all zeros) must be a valid value.
pub unsafe trait Element: Copy + Send + Sync + 'static {}

macro_rules! impl_element {
    ($($type:ty),* $(,)?) => {
        $(unsafe impl Element for $type {})*
    };
}

impl_element!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

unsafe impl<T: Element, const N: usize> Element for [T; N] {}

#[repr(C)]
pub(crate) struct CoreHeader {
    pub magic: u64,
    pub capacity: u64,
    pub readers: u64,
    pub elem_size: u64,
    pub elem_align: u64,
    /// Position where the next written element will land.
    pub write_cursor: CachePadded<AtomicUsize>,
}

/// Per-reader bookkeeping.
///
/// `available` is kept as a separate counter (instead of being derived from the write cursor) so that it can be
/// loaded without taking the buffer lock.
#[repr(C)]
pub(crate) struct ReaderState {
    pub cursor: AtomicUsize,
    pub available: AtomicUsize,
}

pub(crate) type PaddedReaderState = CachePadded<ReaderState>;

/// Geometry of a single ring buffer core.
///
/// Capacity and reader count are fixed at construction, so the size of the core is known before anything
/// is allocated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoreLayout {
    capacity: usize,
    readers: usize,
    elem_size: usize,
    elem_align: usize,
}

impl CoreLayout {
    /// Layout of a core holding `capacity` items of type `T` for `readers` independent readers.
    ///
    /// Fails if `capacity` or `readers` is zero or if the total size overflows.
    pub fn new<T: Element>(capacity: usize, readers: usize) -> Result<Self> {
        let this = Self {
            capacity,
            readers,
            elem_size: size_of::<T>(),
            elem_align: align_of::<T>(),
        };
        if capacity == 0 || readers == 0 || this.checked_size().is_none() {
            return Err(Error::InvalidGeometry { capacity, readers });
        }
        Ok(this)
    }

    /// Number of items the buffer holds.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Maximal number of readers.
    #[inline]
    pub fn readers(&self) -> usize {
        self.readers
    }

    /// Size of a single item in bytes.
    #[inline]
    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// Alignment required for the start of the core.
    #[inline]
    pub fn align(&self) -> usize {
        align_of::<CoreHeader>()
            .max(align_of::<PaddedReaderState>())
            .max(self.elem_align)
    }

    /// Offset of the first reader descriptor from the start of the core.
    #[inline]
    pub fn readers_offset(&self) -> usize {
        align_up(size_of::<CoreHeader>(), align_of::<PaddedReaderState>())
    }

    /// Offset of the item storage from the start of the core.
    #[inline]
    pub fn storage_offset(&self) -> usize {
        align_up(
            self.readers_offset() + self.readers * size_of::<PaddedReaderState>(),
            self.elem_align,
        )
    }

    /// Exact size of the core in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.storage_offset() + self.capacity * self.elem_size
    }

    fn checked_size(&self) -> Option<usize> {
        let readers = self.readers.checked_mul(size_of::<PaddedReaderState>())?;
        let storage = self.readers_offset().checked_add(readers)?.checked_add(self.elem_align)?;
        storage.checked_add(self.capacity.checked_mul(self.elem_size)?)
    }

    /// Compares the layout with the one recorded in a core header.
    pub(crate) fn check_header(&self, header: &CoreHeader) -> core::result::Result<(), String> {
        if header.magic != CORE_MAGIC {
            return Err("bad magic".into());
        }
        let expected = [
            ("capacity", self.capacity),
            ("readers", self.readers),
            ("element size", self.elem_size),
            ("element alignment", self.elem_align),
        ];
        let found = [header.capacity, header.readers, header.elem_size, header.elem_align];
        for ((what, expected), found) in expected.into_iter().zip(found) {
            if expected as u64 != found {
                return Err(format!("{what} is {found}, expected {expected}"));
            }
        }
        Ok(())
    }

    /// Reads the geometry recorded in a core header, using `T` for the element part.
    pub(crate) fn from_header<T: Element>(header: &CoreHeader) -> core::result::Result<Self, String> {
        if header.magic != CORE_MAGIC {
            return Err("bad magic".into());
        }
        let this = Self::new::<T>(header.capacity as usize, header.readers as usize).map_err(|e| e.to_string())?;
        this.check_header(header)?;
        Ok(this)
    }
}
