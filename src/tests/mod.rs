use crate::{lifecycle, CoreLayout, Element, Result, RingBufferCore, ShmRegion};
use std::{
    alloc::{alloc_zeroed, dealloc, Layout},
    ops::Deref,
    process,
    ptr::NonNull,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

mod core_write;
mod region;
mod shared;

/// Core placed in process heap.
pub struct HeapCore<T: Element> {
    core: RingBufferCore<T>,
    ptr: NonNull<u8>,
    layout: Layout,
}

impl<T: Element> HeapCore<T> {
    pub fn new(capacity: usize, readers: usize) -> Self {
        let core_layout = CoreLayout::new::<T>(capacity, readers).unwrap();
        let layout = Layout::from_size_align(core_layout.size(), core_layout.align()).unwrap();
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout) }).unwrap();
        let core = unsafe { RingBufferCore::init(ptr, core_layout) };
        Self { core, ptr, layout }
    }

    pub fn write(&self, elems: &[T]) -> usize {
        unsafe { self.core.write(elems) }
    }

    pub fn read(&self, reader: usize, elems: &mut [T]) -> Result<usize> {
        unsafe { self.core.read(reader, elems) }
    }

    /// Reads everything available for `reader`.
    pub fn read_all(&self, reader: usize) -> Vec<T> {
        let mut buf = Vec::with_capacity(self.core.layout().capacity());
        buf.resize(self.core.layout().capacity(), unsafe { core::mem::zeroed() });
        let count = self.read(reader, &mut buf).unwrap();
        buf.truncate(count);
        buf
    }
}

impl<T: Element> Deref for HeapCore<T> {
    type Target = RingBufferCore<T>;
    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

impl<T: Element> Drop for HeapCore<T> {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/// Name that is not used by other tests, including tests running in other processes.
pub fn unique_name(prefix: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    format!(
        "swmr_{}_{}_{}",
        prefix,
        process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

/// Freshly created region that is removed with every buffer lock it handed out names for.
pub struct ScopedRegion {
    region: ShmRegion,
    buffers: Mutex<Vec<String>>,
}

impl ScopedRegion {
    pub fn new(size: usize) -> Self {
        Self {
            region: ShmRegion::create(&unique_name("region"), size).unwrap(),
            buffers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_buffers<T: Element>(buffers: &[(usize, usize)]) -> Self {
        Self::new(ShmRegion::required_size(
            buffers
                .iter()
                .map(|&(capacity, readers)| lifecycle::shm_size::<T>(capacity, readers).unwrap()),
        ))
    }

    /// Name for a new buffer.
    pub fn buffer(&self, prefix: &str) -> String {
        let name = unique_name(prefix);
        self.buffers.lock().unwrap().push(name.clone());
        name
    }

    /// Opens the same region once more, with its own mapping and descriptor.
    pub fn reopen(&self) -> ShmRegion {
        ShmRegion::open(self.region.name()).unwrap()
    }
}

impl Deref for ScopedRegion {
    type Target = ShmRegion;
    fn deref(&self) -> &ShmRegion {
        &self.region
    }
}

impl Drop for ScopedRegion {
    fn drop(&mut self) {
        for buffer in self.buffers.lock().unwrap().iter() {
            let _ = lifecycle::remove(buffer);
        }
        let _ = ShmRegion::remove(self.region.name());
    }
}
