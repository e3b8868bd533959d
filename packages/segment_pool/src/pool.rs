use std::alloc::handle_alloc_error;
use std::any::type_name;
use std::fmt;
use std::num::NonZero;
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{debug, trace, warn};

use crate::{DropPolicy, Error, Result, Segment, SegmentIndex, SegmentPoolBuilder};

/// The number of slots in each segment when the caller does not choose a capacity.
pub const DEFAULT_SEGMENT_CAPACITY: NonZero<usize> =
    NonZero::new(100).expect("100 is not zero");

/// A thread-safe pool of fixed-size storage slots for items of type `T`.
///
/// The pool hands out the addresses of uninitialized slots via [`allocate()`][1] and takes them
/// back via [`release()`][2]. Released slots are reused before any new memory is reserved.
/// When no slot is available, the pool appends a new [`Segment`] of the configured capacity.
/// Segments are never removed or moved, so a slot address stays valid for as long as the pool
/// lives.
///
/// # Slot order
///
/// Slots of a fresh segment are handed out in ascending position order. Released slots are
/// handed out again before anything else, most recently released first.
///
/// # Caller obligations
///
/// The pool trusts its callers. It does not track which slots are checked out, so it cannot
/// detect a slot being released twice, a foreign address being released, or a slot being used
/// after release. Any of these lets the pool hand the same storage to two callers at once.
/// This is why [`release()`][2] and [`remove()`][4] are `unsafe`: their callers promise to
/// return only addresses this pool handed out, each exactly once. Every other way to read or
/// write slot contents is also an `unsafe` pointer operation.
///
/// The pool never reads, writes or drops the values in its slots. A caller that writes a value
/// into a slot must drop it (if needed) before releasing the slot. [`insert()`][3] and
/// [`remove()`][4] bundle the two steps.
///
/// # Thread safety
///
/// All operations take `&self` and are serialized by a single lock, including growth.
///
/// # Examples
///
/// ```
/// use segment_pool::SegmentPool;
///
/// let pool = SegmentPool::<u64>::new();
///
/// let slot = pool.allocate().expect("a growing pool always has a slot");
///
/// // SAFETY: The slot was just allocated to us and holds no value yet.
/// unsafe {
///     slot.write(42);
///     assert_eq!(slot.read(), 42);
/// }
///
/// // SAFETY: The slot came from this pool and is not used after being released.
/// unsafe { pool.release(Some(slot)) };
/// ```
///
/// [1]: Self::allocate
/// [2]: Self::release
/// [3]: Self::insert
/// [4]: Self::remove
pub struct SegmentPool<T> {
    state: Mutex<PoolState<T>>,

    /// Capacity of every segment, including the first one. Immutable, so read without the lock.
    segment_capacity: NonZero<usize>,

    drop_policy: DropPolicy,
}

/// Everything the lock protects.
struct PoolState<T> {
    /// Arena that owns the chain of segments. The head is at [`SegmentIndex::HEAD`] and each
    /// segment links to the one appended after it.
    segments: Vec<Segment<T>>,

    /// The most recently appended segment, which new segments are linked from.
    tail: SegmentIndex,

    /// Addresses of the slots that are not checked out. The end of the vector is the front of
    /// the list: that is where addresses are pushed to and popped from.
    recycled: Vec<NonNull<T>>,
}

impl<T> SegmentPool<T> {
    /// Creates a pool with segments of [`DEFAULT_SEGMENT_CAPACITY`] slots.
    ///
    /// The first segment is allocated immediately.
    ///
    /// # Examples
    ///
    /// ```
    /// use segment_pool::SegmentPool;
    ///
    /// let pool = SegmentPool::<String>::new();
    ///
    /// assert_eq!(pool.segment_count(), 1);
    /// assert_eq!(pool.capacity(), 100);
    /// assert_eq!(pool.available(), 100);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized. Aborts via [`handle_alloc_error()`] if the first segment
    /// cannot be allocated.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a pool whose segments each hold `segment_capacity` slots.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZero;
    ///
    /// use segment_pool::SegmentPool;
    ///
    /// let pool = SegmentPool::<u32>::with_capacity(NonZero::new(8).unwrap());
    ///
    /// assert_eq!(pool.segment_capacity().get(), 8);
    /// assert_eq!(pool.capacity(), 8);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized or if a segment of this capacity cannot fit in memory.
    /// Aborts via [`handle_alloc_error()`] if the first segment cannot be allocated.
    #[must_use]
    pub fn with_capacity(segment_capacity: NonZero<usize>) -> Self {
        Self::builder().segment_capacity(segment_capacity).build()
    }

    /// Starts building a new [`SegmentPool`].
    ///
    /// Use this when you want to customize the pool configuration beyond the defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZero;
    ///
    /// use segment_pool::{DropPolicy, SegmentPool};
    ///
    /// let pool = SegmentPool::<u32>::builder()
    ///     .segment_capacity(NonZero::new(16).unwrap())
    ///     .drop_policy(DropPolicy::MustNotAbandonSlots)
    ///     .build();
    ///
    /// assert_eq!(pool.capacity(), 16);
    /// ```
    pub fn builder() -> SegmentPoolBuilder<T> {
        SegmentPoolBuilder::new()
    }

    pub(crate) fn new_inner(
        segment_capacity: NonZero<usize>,
        drop_policy: DropPolicy,
    ) -> Result<Self> {
        let state = PoolState::new(segment_capacity)?;

        debug!(
            item_type = type_name::<T>(),
            segment_capacity = segment_capacity.get(),
            ?drop_policy,
            "created segment pool"
        );

        Ok(Self {
            state: Mutex::new(state),
            segment_capacity,
            drop_policy,
        })
    }

    /// Takes a slot out of the pool, growing the pool by one segment if no slot is available.
    ///
    /// The returned address points to uninitialized storage for one `T`. It stays valid until
    /// the pool is dropped and belongs to the caller until it is passed to [`release()`][1].
    ///
    /// Returns `None` only if growth produced no usable slot, which does not happen with the
    /// segments this pool creates. Allocation failure during growth is fatal, reported via
    /// [`handle_alloc_error()`]; use [`try_allocate()`][2] to receive it as an error instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZero;
    ///
    /// use segment_pool::SegmentPool;
    ///
    /// let pool = SegmentPool::<u32>::with_capacity(NonZero::new(1).unwrap());
    ///
    /// let first = pool.allocate().unwrap();
    ///
    /// // The only slot is taken, so this appends a second segment.
    /// let second = pool.allocate().unwrap();
    ///
    /// assert_ne!(first, second);
    /// assert_eq!(pool.segment_count(), 2);
    /// # // SAFETY: Both slots came from this pool and are released once.
    /// # unsafe {
    /// #     pool.release(Some(first));
    /// #     pool.release(Some(second));
    /// # }
    /// ```
    ///
    /// [1]: Self::release
    /// [2]: Self::try_allocate
    #[must_use]
    pub fn allocate(&self) -> Option<NonNull<T>> {
        self.allocate_core().unwrap_or_else(|error| fail_fatally(error))
    }

    /// Takes a slot out of the pool, like [`allocate()`][1], but reports failures as errors.
    ///
    /// # Errors
    ///
    /// * [`Error::OutOfMemory`] if the pool needed to grow and the allocator could not provide a
    ///   new segment. The pool is left unchanged and remains usable.
    /// * [`Error::Exhausted`] where [`allocate()`][1] would return `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use segment_pool::SegmentPool;
    ///
    /// let pool = SegmentPool::<u32>::new();
    ///
    /// let slot = pool.try_allocate()?;
    ///
    /// // SAFETY: The slot came from this pool and is released once.
    /// unsafe { pool.release(Some(slot)) };
    /// # Ok::<(), segment_pool::Error>(())
    /// ```
    ///
    /// [1]: Self::allocate
    pub fn try_allocate(&self) -> Result<NonNull<T>> {
        self.allocate_core()?.ok_or(Error::Exhausted)
    }

    fn allocate_core(&self) -> Result<Option<NonNull<T>>> {
        let mut state = self.lock_state();

        if state.recycled.is_empty() {
            state.append_segment(self.segment_capacity)?;

            debug!(
                item_type = type_name::<T>(),
                segment_count = state.segments.len(),
                segment_capacity = self.segment_capacity.get(),
                "recycling list exhausted, appended a segment"
            );
        }

        let slot = state.recycled.pop();

        trace!(?slot, available = state.recycled.len(), "allocated slot");

        Ok(slot)
    }

    /// Returns a slot to the pool so it can be handed out again.
    ///
    /// Passing `None` does nothing. Released slots are reused before any other slot, most
    /// recently released first.
    ///
    /// The pool does not verify where `slot` came from or whether it was already released.
    /// Debug builds assert that the address belongs to one of the pool's segments.
    ///
    /// # Safety
    ///
    /// If `slot` is `Some`, the caller must guarantee that:
    ///
    /// * The address was returned by [`allocate()`][1], [`try_allocate()`][2] or
    ///   [`insert()`][3] on this pool.
    /// * The address has not been released since it was last handed out. Each allocation is
    ///   released at most once.
    /// * The caller does not access the slot after this call. Any value the caller wrote into the
    ///   slot has already been dropped or moved out; the pool will not drop it.
    ///
    /// Violating these lets the pool hand the same storage, or storage it does not own, to
    /// later callers, which may write to it concurrently.
    ///
    /// # Examples
    ///
    /// ```
    /// use segment_pool::SegmentPool;
    ///
    /// let pool = SegmentPool::<u32>::new();
    ///
    /// let slot = pool.allocate();
    ///
    /// // SAFETY: The slot came from this pool and is released once.
    /// unsafe { pool.release(slot) };
    ///
    /// // The most recently released slot is handed out next.
    /// assert_eq!(pool.allocate(), slot);
    ///
    /// // SAFETY: Releasing nothing has no obligations.
    /// unsafe { pool.release(None) };
    /// # // SAFETY: The slot was handed out again above.
    /// # unsafe { pool.release(slot) };
    /// ```
    ///
    /// Releasing requires an `unsafe` block, so safe code cannot hand the pool an address it
    /// does not own:
    ///
    /// ```compile_fail,E0133
    /// use std::ptr::NonNull;
    ///
    /// use segment_pool::SegmentPool;
    ///
    /// let pool = SegmentPool::<u32>::new();
    /// let mut local = 0_u32;
    ///
    /// pool.release(Some(NonNull::from(&mut local)));
    /// ```
    ///
    /// [1]: Self::allocate
    /// [2]: Self::try_allocate
    /// [3]: Self::insert
    pub unsafe fn release(&self, slot: Option<NonNull<T>>) {
        let Some(slot) = slot else {
            return;
        };

        let mut state = self.lock_state();

        debug_assert!(
            state.owns(slot),
            "released address {slot:?} does not belong to this pool of {}",
            type_name::<T>()
        );

        state.recycled.push(slot);

        trace!(?slot, available = state.recycled.len(), "released slot");
    }

    /// Allocates a slot and moves `value` into it.
    ///
    /// The value stays in the slot until the caller drops it. Use [`remove()`][1] to drop it
    /// and release the slot in one step.
    ///
    /// # Examples
    ///
    /// ```
    /// use segment_pool::SegmentPool;
    ///
    /// let pool = SegmentPool::<String>::new();
    ///
    /// let greeting = pool.insert("Hello".to_string());
    ///
    /// // SAFETY: The slot holds the value we inserted and nobody else is using it.
    /// unsafe {
    ///     assert_eq!(greeting.as_ref(), "Hello");
    ///     pool.remove(greeting);
    /// }
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the pool cannot provide a slot, which does not happen with the segments this
    /// pool creates. Allocation failure during growth is fatal, as with [`allocate()`][2].
    ///
    /// [1]: Self::remove
    /// [2]: Self::allocate
    #[must_use]
    pub fn insert(&self, value: T) -> NonNull<T> {
        let slot = self
            .allocate()
            .expect("every segment has at least one slot, so growth always makes one available");

        // SAFETY: The slot was just removed from the recycling list, so it is valid for writes
        // and nobody else has access to it.
        unsafe {
            slot.write(value);
        }

        slot
    }

    /// Drops the value in a slot and releases the slot back to the pool.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that:
    ///
    /// * `slot` was obtained from this pool and has not been released since.
    /// * `slot` holds an initialized `T`, for example one written by [`insert()`][1].
    /// * No references to the value exist and the address is not used again after this call.
    ///
    /// [1]: Self::insert
    pub unsafe fn remove(&self, slot: NonNull<T>) {
        // SAFETY: Forwarding the caller's guarantee that the slot holds an initialized value
        // that nobody else is using.
        unsafe {
            slot.drop_in_place();
        }

        // SAFETY: The caller guarantees the slot came from this pool, is released once and is
        // not used afterwards.
        unsafe {
            self.release(Some(slot));
        }
    }

    /// The number of slots in each segment.
    #[must_use]
    pub fn segment_capacity(&self) -> NonZero<usize> {
        self.segment_capacity
    }

    /// The number of segments the pool has allocated. This never decreases.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.lock_state().segments.len()
    }

    /// The total number of slots in all segments, whether checked out or not.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock_state().capacity(self.segment_capacity)
    }

    /// The number of slots that can be allocated without growing the pool.
    #[must_use]
    pub fn available(&self) -> usize {
        self.lock_state().recycled.len()
    }

    /// The number of slots currently checked out by callers.
    ///
    /// This is derived from the recycling list, so it is only accurate while callers honour the
    /// release contract.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.lock_state().outstanding(self.segment_capacity)
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState<T>> {
        // No user code runs under the lock and every mutation completes before the guard is
        // released, so a poisoned lock still guards consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn with_state<R>(&self, f: impl FnOnce(&PoolState<T>) -> R) -> R {
        f(&self.lock_state())
    }
}

impl<T> PoolState<T> {
    fn new(segment_capacity: NonZero<usize>) -> Result<Self> {
        let head = Segment::new(segment_capacity)?;

        let mut state = Self {
            segments: vec![head],
            tail: SegmentIndex::HEAD,
            recycled: Vec::with_capacity(segment_capacity.get()),
        };

        state.recycle_all_slots(SegmentIndex::HEAD);

        Ok(state)
    }

    /// Appends a new segment to the tail of the chain and makes all of its slots available.
    ///
    /// On failure, nothing is changed.
    fn append_segment(&mut self, segment_capacity: NonZero<usize>) -> Result<()> {
        let segment = Segment::new(segment_capacity)?;
        let index = SegmentIndex::new(self.segments.len());

        self.segments.push(segment);

        self.segments
            .get_mut(self.tail.get())
            .expect("the tail always refers to a segment in the arena")
            .set_next(Some(index));
        self.tail = index;

        self.recycle_all_slots(index);

        Ok(())
    }

    /// Pushes the slots of a segment from the last position down to the first, so that they
    /// are popped in ascending position order.
    fn recycle_all_slots(&mut self, index: SegmentIndex) {
        let segment = self
            .segments
            .get(index.get())
            .expect("only called for segments in the arena");

        self.recycled.extend(segment.slots().rev());
    }

    fn owns(&self, slot: NonNull<T>) -> bool {
        self.segments.iter().any(|segment| segment.contains(slot))
    }

    fn capacity(&self, segment_capacity: NonZero<usize>) -> usize {
        self.segments
            .len()
            .checked_mul(segment_capacity.get())
            .expect("every segment is a live allocation, so the total cannot exceed the address space")
    }

    fn outstanding(&self, segment_capacity: NonZero<usize>) -> usize {
        // Saturating because a caller who released too many addresses may have overfilled the list.
        self.capacity(segment_capacity)
            .saturating_sub(self.recycled.len())
    }

    /// Walks the chain from the head via the segment links.
    #[cfg(test)]
    fn chain(&self) -> impl Iterator<Item = &Segment<T>> {
        std::iter::successors(self.segments.first(), |segment| {
            segment
                .next()
                .and_then(|index| self.segments.get(index.get()))
        })
    }
}

impl<T> Default for SegmentPool<T> {
    /// Creates a pool with segments of [`DEFAULT_SEGMENT_CAPACITY`] slots.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SegmentPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();

        f.debug_struct("SegmentPool")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("segment_capacity", &self.segment_capacity)
            .field("drop_policy", &self.drop_policy)
            .field("segment_count", &state.segments.len())
            .field("available", &state.recycled.len())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for SegmentPool<T> {
    fn drop(&mut self) {
        let segment_capacity = self.segment_capacity;
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);

        let outstanding = state.outstanding(segment_capacity);

        if outstanding == 0 {
            return;
        }

        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the original panic was, leading to debug difficulties.
        if self.drop_policy == DropPolicy::MustNotAbandonSlots && !thread::panicking() {
            panic!(
                "dropped a pool of {} with {outstanding} slots still checked out, with a policy that says all slots must be released first",
                type_name::<T>()
            );
        }

        warn!(
            item_type = type_name::<T>(),
            outstanding, "dropped a segment pool with slots still checked out"
        );
    }
}

// SAFETY: The state owns its segments and the recycled addresses only point into those segments.
// Nothing is tied to the thread that created it, so it can move between threads if `T` can.
unsafe impl<T: Send> Send for PoolState<T> {}

/// Reports a failure to reserve storage in a constructor or infallible allocation path.
#[cfg_attr(test, mutants::skip)] // Cannot be tested without exhausting memory.
pub(crate) fn fail_fatally(error: Error) -> ! {
    if let Error::OutOfMemory { layout } = error {
        handle_alloc_error(layout);
    }

    panic!("{error}");
}
