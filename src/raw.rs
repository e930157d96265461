use core::{num::NonZeroUsize, ops::Range};

/// Returns a pair of ranges covering `len` consecutive slots that start at `start` in a ring of specific `capacity`.
///
/// `start` must be less than `capacity` and `len` must not exceed `capacity`.
///
/// The first range starts from `start` and ends at most at the end of the container.
/// The second range holds the wrapped remainder and always starts at zero. If nothing wraps then the second range is empty.
#[inline]
pub fn ranges(capacity: NonZeroUsize, start: usize, len: usize) -> (Range<usize>, Range<usize>) {
    debug_assert!(start < capacity.get());
    debug_assert!(len <= capacity.get());
    let head = capacity.get() - start;
    if len <= head {
        (start..(start + len), 0..0)
    } else {
        (start..capacity.get(), 0..(len - head))
    }
}

/// Moves `index` by `count` slots forward, wrapping at `capacity`.
#[inline]
pub fn advance(capacity: NonZeroUsize, index: usize, count: usize) -> usize {
    (index + count) % capacity
}

/// Checks whether `index` lies inside `len` slots starting at `start`.
///
/// The span may wrap around the end of the container.
#[inline]
pub fn covers(capacity: NonZeroUsize, start: usize, len: usize, index: usize) -> bool {
    (capacity.get() + index - start) % capacity < len
}

/// Rounds `value` up to a multiple of `align`.
///
/// `align` must be a power of two.
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}
