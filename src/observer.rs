use crate::{error::Result, layout::Element};
use core::num::NonZeroUsize;

/// Ring buffer observer.
///
/// Can observe ring buffer state without taking the buffer lock but cannot access its data.
pub trait Observer {
    type Item: Element;

    /// Capacity of the ring buffer.
    ///
    /// It is constant during the whole ring buffer lifetime.
    fn capacity(&self) -> NonZeroUsize;

    /// Maximal number of readers.
    ///
    /// Valid reader ids are `0..readers`.
    fn readers(&self) -> usize;

    /// Index of the slot where the next written item will land.
    ///
    /// Index value is in range `0..capacity`.
    fn write_cursor(&self) -> usize;

    /// The number of items `reader` can read at the moment.
    ///
    /// *Actual number may be greater or less than returned value due to concurring activity of the writer or reader.*
    /// *It must not be used to gate a read: reads always go through the locked path.*
    fn read_available(&self, reader: usize) -> Result<usize>;

    /// Checks if `reader` has read everything written so far.
    #[inline]
    fn is_caught_up(&self, reader: usize) -> Result<bool> {
        Ok(self.read_available(reader)? == 0)
    }

    /// Checks if the unread window of `reader` spans the whole buffer.
    ///
    /// A saturated reader has lost or is about to lose items on the next write.
    #[inline]
    fn is_saturated(&self, reader: usize) -> Result<bool> {
        Ok(self.read_available(reader)? == self.capacity().get())
    }
}

pub trait Based {
    type Base;
    fn base(&self) -> &Self::Base;
}

/// Trait used for delegating observer methods.
pub trait DelegateObserver: Based
where
    Self::Base: Observer,
{
}

impl<D: DelegateObserver> Observer for D
where
    D::Base: Observer,
{
    type Item = <D::Base as Observer>::Item;

    #[inline]
    fn capacity(&self) -> NonZeroUsize {
        self.base().capacity()
    }

    #[inline]
    fn readers(&self) -> usize {
        self.base().readers()
    }

    #[inline]
    fn write_cursor(&self) -> usize {
        self.base().write_cursor()
    }

    #[inline]
    fn read_available(&self, reader: usize) -> Result<usize> {
        self.base().read_available(reader)
    }
}
