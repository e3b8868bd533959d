use std::alloc::{Layout, alloc, dealloc};
use std::any::type_name;
use std::fmt;
use std::num::NonZero;
use std::ptr::NonNull;

use crate::{Error, Result};

/// Identifies a [`Segment`] within the arena of segments that owns it.
///
/// Segments link to each other by index rather than by pointer, so a chain of segments can be
/// owned by a single collection and torn down by dropping that collection.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SegmentIndex(usize);

impl SegmentIndex {
    /// The index of the first segment in a chain.
    pub const HEAD: Self = Self(0);

    /// Creates an index referring to the segment at `index` in its arena.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The position of the segment in its arena.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

/// A fixed-capacity, address-stable block of raw storage for `capacity` items of type `T`.
///
/// The buffer is allocated once when the segment is created and is never resized or moved,
/// so the address of every slot stays valid until the segment is dropped. Moving the
/// `Segment` value itself does not move the buffer.
///
/// The storage is uninitialized. The segment never reads, writes or drops values in its slots;
/// whoever writes a value into a slot is responsible for dropping it again.
///
/// Segments can be chained via [`set_next()`][1] and [`next()`][2]. The link is a plain
/// [`SegmentIndex`] with no ownership semantics - the arena that stores the segments owns them.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
///
/// use segment_pool::Segment;
///
/// let segment = Segment::<u32>::new(NonZero::new(4).unwrap()).unwrap();
///
/// let slot = segment.address_of(2).unwrap();
///
/// // SAFETY: The slot is in bounds and nobody else is using it.
/// unsafe {
///     slot.write(42);
///     assert_eq!(slot.read(), 42);
/// }
///
/// // Positions past the end have no address.
/// assert!(segment.address_of(4).is_none());
/// ```
///
/// [1]: Self::set_next
/// [2]: Self::next
pub struct Segment<T> {
    first_slot_ptr: NonNull<T>,

    /// Layout of the whole buffer, required again when deallocating.
    layout: Layout,

    capacity: NonZero<usize>,

    next: Option<SegmentIndex>,
}

impl<T> Segment<T> {
    /// Allocates a segment with room for exactly `capacity` items.
    ///
    /// # Errors
    ///
    /// * [`Error::ZeroSizedItem`] if `T` is zero-sized.
    /// * [`Error::CapacityOverflow`] if the buffer would exceed the limits of the address space.
    /// * [`Error::OutOfMemory`] if the allocator fails to provide the buffer.
    pub fn new(capacity: NonZero<usize>) -> Result<Self> {
        if size_of::<T>() == 0 {
            return Err(Error::ZeroSizedItem {
                type_name: type_name::<T>(),
            });
        }

        let layout =
            Layout::array::<T>(capacity.get()).map_err(|source| Error::CapacityOverflow {
                type_name: type_name::<T>(),
                capacity: capacity.get(),
                source,
            })?;

        // SAFETY: The layout is not zero-sized because both the capacity and the item size are
        // non-zero, as verified above.
        let ptr = unsafe { alloc(layout) };

        let first_slot_ptr = NonNull::new(ptr.cast::<T>()).ok_or(Error::OutOfMemory { layout })?;

        Ok(Self {
            first_slot_ptr,
            layout,
            capacity,
            next: None,
        })
    }

    /// The number of slots in the segment, as requested when it was created.
    #[must_use]
    pub fn capacity(&self) -> NonZero<usize> {
        self.capacity
    }

    /// Returns the address of the slot at `position`, or `None` if `position` is out of bounds.
    ///
    /// The slot is raw storage. Nothing is known about whether it holds a value.
    #[must_use]
    pub fn address_of(&self, position: usize) -> Option<NonNull<T>> {
        if position >= self.capacity.get() {
            return None;
        }

        // SAFETY: The position is in bounds (checked above) and the buffer holds `capacity`
        // contiguous items of `T`, so the result stays inside the same allocation.
        Some(unsafe { self.first_slot_ptr.add(position) })
    }

    /// Iterates over the addresses of all slots in ascending position order.
    pub fn slots(&self) -> impl DoubleEndedIterator<Item = NonNull<T>> + '_ {
        (0..self.capacity.get()).filter_map(|position| self.address_of(position))
    }

    /// Whether `ptr` is the address of one of the slots of this segment.
    #[must_use]
    pub fn contains(&self, ptr: NonNull<T>) -> bool {
        let start = self.first_slot_ptr.as_ptr().addr();

        let Some(offset) = ptr.as_ptr().addr().checked_sub(start) else {
            return false;
        };

        offset < self.layout.size() && offset.checked_rem(size_of::<T>()) == Some(0)
    }

    /// Links this segment to the segment that follows it in the chain.
    pub fn set_next(&mut self, next: Option<SegmentIndex>) {
        self.next = next;
    }

    /// The segment that follows this one in the chain, if any.
    #[must_use]
    pub fn next(&self) -> Option<SegmentIndex> {
        self.next
    }
}

impl<T> fmt::Debug for Segment<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("first_slot_ptr", &self.first_slot_ptr)
            .field("layout", &self.layout)
            .field("capacity", &self.capacity)
            .field("next", &self.next)
            .finish()
    }
}

impl<T> Drop for Segment<T> {
    fn drop(&mut self) {
        // SAFETY: The pointer came from `alloc()` with this same layout and is deallocated once.
        unsafe {
            dealloc(self.first_slot_ptr.as_ptr().cast(), self.layout);
        }
    }
}

// SAFETY: The segment is a uniquely owned buffer, like a `Box<[MaybeUninit<T>]>`. Nothing about
// it is tied to the thread that allocated it, so it can move between threads as long as `T` can.
unsafe impl<T: Send> Send for Segment<T> {}

// SAFETY: Shared access only computes addresses and never touches slot contents.
unsafe impl<T: Sync> Sync for Segment<T> {}
