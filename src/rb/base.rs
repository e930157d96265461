use crate::{
    error::{Error, Result},
    layout::{CoreHeader, CoreLayout, Element, PaddedReaderState, CORE_MAGIC},
    observer::Observer,
    raw::{advance, covers, ranges},
};
use core::{
    marker::PhantomData,
    num::NonZeroUsize,
    ops::Range,
    ptr::{self, NonNull},
    slice,
    sync::atomic::Ordering,
};

/// Ring buffer with a single write cursor and a fixed set of independent readers.
///
/// This is a view of memory that is usually located in a shared region. It does not own the memory and does not
/// synchronize anything by itself: mutating methods are `unsafe` and must be called while holding the buffer lock
/// (see [`RingBufferHandle`](`crate::RingBufferHandle`) for the safe wrapper).
///
/// # Details
///
/// The buffer consists of an array of `capacity` items, a write cursor and a `(cursor, available)` pair for every reader.
/// The writer never waits for readers. When a write covers the position of a reader that still has unread items,
/// those items are lost for that reader only: its cursor is moved to the new write cursor and its `available`
/// counter saturates at `capacity`.
pub struct RingBufferCore<T: Element> {
    header: NonNull<CoreHeader>,
    readers: NonNull<PaddedReaderState>,
    storage: NonNull<T>,
    layout: CoreLayout,
    phantom: PhantomData<T>,
}

unsafe impl<T: Element> Send for RingBufferCore<T> {}
unsafe impl<T: Element> Sync for RingBufferCore<T> {}

impl<T: Element> RingBufferCore<T> {
    /// Creates a view of the core located at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must point to at least `layout.size()` bytes aligned to `layout.align()`
    /// that stay mapped for the whole lifetime of the returned value.
    unsafe fn from_raw_parts(ptr: NonNull<u8>, layout: CoreLayout) -> Self {
        debug_assert_eq!(ptr.as_ptr() as usize % layout.align(), 0);
        Self {
            header: ptr.cast(),
            readers: NonNull::new_unchecked(ptr.as_ptr().add(layout.readers_offset())).cast(),
            storage: NonNull::new_unchecked(ptr.as_ptr().add(layout.storage_offset())).cast(),
            layout,
            phantom: PhantomData,
        }
    }

    /// Initializes a new core at `ptr` and returns a view of it.
    ///
    /// The write cursor and every reader are reset to zero, items are zeroed.
    ///
    /// # Safety
    ///
    /// `ptr` must point to at least `layout.size()` bytes aligned to `layout.align()` that stay mapped for the whole
    /// lifetime of the returned value. Nobody else may access the memory until this call returns.
    pub unsafe fn init(ptr: NonNull<u8>, layout: CoreLayout) -> Self {
        ptr::write_bytes(ptr.as_ptr(), 0, layout.size());
        let this = Self::from_raw_parts(ptr, layout);
        let header = this.header.as_ptr();
        (*header).capacity = layout.capacity() as u64;
        (*header).readers = layout.readers() as u64;
        (*header).elem_size = layout.elem_size() as u64;
        (*header).elem_align = core::mem::align_of::<T>() as u64;
        (*header).write_cursor.store(0, Ordering::Relaxed);
        for state in this.reader_states() {
            state.cursor.store(0, Ordering::Relaxed);
            state.available.store(0, Ordering::Relaxed);
        }
        (*header).magic = CORE_MAGIC;
        this
    }

    /// Creates a view of an already initialized core at `ptr` that spans `len` bytes.
    ///
    /// Geometry is taken from the core header and checked against `T` and `len`.
    /// On failure returns the reason of mismatch.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` bytes aligned to [`CoreLayout::align`] that stay mapped for the whole lifetime
    /// of the returned value.
    pub(crate) unsafe fn attach(ptr: NonNull<u8>, len: usize) -> core::result::Result<Self, String> {
        if len < core::mem::size_of::<CoreHeader>() {
            return Err(format!("{len} bytes is too small for a core header"));
        }
        let layout = CoreLayout::from_header::<T>(ptr.cast::<CoreHeader>().as_ref())?;
        if layout.size() > len {
            return Err(format!("core needs {} bytes, only {len} available", layout.size()));
        }
        Ok(Self::from_raw_parts(ptr, layout))
    }

    /// Geometry of the core.
    #[inline]
    pub fn layout(&self) -> CoreLayout {
        self.layout
    }

    #[inline]
    fn header(&self) -> &CoreHeader {
        unsafe { self.header.as_ref() }
    }

    #[inline]
    fn reader_states(&self) -> &[PaddedReaderState] {
        unsafe { slice::from_raw_parts(self.readers.as_ptr(), self.layout.readers()) }
    }

    #[inline]
    fn reader_state(&self, reader: usize) -> Result<&PaddedReaderState> {
        self.reader_states().get(reader).ok_or(Error::InvalidReaderId {
            id: reader,
            readers: self.layout.readers(),
        })
    }

    #[inline]
    unsafe fn storage(&self, range: Range<usize>) -> &[T] {
        slice::from_raw_parts(self.storage.as_ptr().add(range.start), range.len())
    }

    #[allow(clippy::mut_from_ref)]
    #[inline]
    unsafe fn storage_mut(&self, range: Range<usize>) -> &mut [T] {
        slice::from_raw_parts_mut(self.storage.as_ptr().add(range.start), range.len())
    }

    /// Current read cursor of `reader`.
    pub fn read_cursor(&self, reader: usize) -> Result<usize> {
        Ok(self.reader_state(reader)?.cursor.load(Ordering::Acquire))
    }

    /// Appends items from slice to the ring buffer overwriting the oldest items if needed.
    ///
    /// If the slice is longer than the capacity then only the last `capacity` items from slice are stored.
    ///
    /// Returns count of items been written, which is `min(elems.len(), capacity)`.
    ///
    /// # Safety
    ///
    /// Must not be called concurrently with [`Self::write`] or [`Self::read`] on the same core,
    /// from this or any other process.
    pub unsafe fn write(&self, elems: &[T]) -> usize {
        let capacity = self.capacity();
        let elems = if elems.len() > capacity.get() {
            &elems[(elems.len() - capacity.get())..]
        } else {
            elems
        };
        let count = elems.len();
        if count == 0 {
            return 0;
        }

        let write = self.write_cursor();
        let (first, second) = ranges(capacity, write, count);
        let (left, right) = elems.split_at(first.len());
        self.storage_mut(first).copy_from_slice(left);
        self.storage_mut(second).copy_from_slice(right);
        let new_write = advance(capacity, write, count);

        for state in self.reader_states() {
            let available = state.available.load(Ordering::Acquire);
            // Unread items starting at the reader cursor are being overwritten.
            if available > 0 && covers(capacity, write, count, state.cursor.load(Ordering::Acquire)) {
                state.cursor.store(new_write, Ordering::Release);
            }
            state.available.store(usize::min(available + count, capacity.get()), Ordering::Release);
        }

        self.header().write_cursor.store(new_write, Ordering::Release);
        count
    }

    /// Removes items from the `reader` stream and copies them to the slice.
    ///
    /// Returns count of items been copied, which is less than `elems.len()` if `reader` has fewer items available.
    /// Fails if `reader` is out of range.
    ///
    /// # Safety
    ///
    /// Must not be called concurrently with [`Self::write`] or [`Self::read`] on the same core,
    /// from this or any other process.
    pub unsafe fn read(&self, reader: usize, elems: &mut [T]) -> Result<usize> {
        let state = self.reader_state(reader)?;
        let available = state.available.load(Ordering::Acquire);
        let count = usize::min(elems.len(), available);
        if count == 0 {
            return Ok(0);
        }

        let capacity = self.capacity();
        let cursor = state.cursor.load(Ordering::Acquire);
        let (first, second) = ranges(capacity, cursor, count);
        let (left, right) = elems[..count].split_at_mut(first.len());
        left.copy_from_slice(self.storage(first));
        right.copy_from_slice(self.storage(second));

        state.cursor.store(advance(capacity, cursor, count), Ordering::Release);
        state.available.store(available - count, Ordering::Release);
        Ok(count)
    }
}

impl<T: Element> Observer for RingBufferCore<T> {
    type Item = T;

    #[inline]
    fn capacity(&self) -> NonZeroUsize {
        unsafe { NonZeroUsize::new_unchecked(self.layout.capacity()) }
    }

    #[inline]
    fn readers(&self) -> usize {
        self.layout.readers()
    }

    #[inline]
    fn write_cursor(&self) -> usize {
        self.header().write_cursor.load(Ordering::Acquire)
    }

    #[inline]
    fn read_available(&self, reader: usize) -> Result<usize> {
        Ok(self.reader_state(reader)?.available.load(Ordering::Acquire))
    }
}
