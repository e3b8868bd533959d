use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::num::NonZero;

use crate::{DEFAULT_SEGMENT_CAPACITY, DropPolicy, Result, SegmentPool, fail_fatally};

/// Builder for creating an instance of [`SegmentPool`].
///
/// You only need to use this builder if you want to customize the pool configuration.
/// The default configuration used by [`SegmentPool::new()`][1] is sufficient for most use cases.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
///
/// use segment_pool::SegmentPool;
///
/// let pool = SegmentPool::<u32>::builder()
///     .segment_capacity(NonZero::new(32).unwrap())
///     .build();
///
/// assert_eq!(pool.capacity(), 32);
/// ```
///
/// [1]: SegmentPool::new
#[must_use]
pub struct SegmentPoolBuilder<T> {
    segment_capacity: NonZero<usize>,
    drop_policy: DropPolicy,

    _item: PhantomData<T>,
}

impl<T> fmt::Debug for SegmentPoolBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentPoolBuilder")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("segment_capacity", &self.segment_capacity)
            .field("drop_policy", &self.drop_policy)
            .finish()
    }
}

impl<T> SegmentPoolBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            segment_capacity: DEFAULT_SEGMENT_CAPACITY,
            drop_policy: DropPolicy::default(),
            _item: PhantomData,
        }
    }

    /// Sets the number of slots in each segment, including the first one.
    ///
    /// Defaults to [`DEFAULT_SEGMENT_CAPACITY`].
    pub fn segment_capacity(mut self, capacity: NonZero<usize>) -> Self {
        self.segment_capacity = capacity;
        self
    }

    /// Sets the [drop policy][DropPolicy] for the pool. This governs what happens if slots are
    /// still checked out when the pool is dropped.
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds the pool with the specified configuration, allocating its first segment.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized or if a segment of the configured capacity cannot fit in
    /// memory. Aborts via [`std::alloc::handle_alloc_error()`] if the first segment cannot be
    /// allocated.
    #[must_use]
    pub fn build(self) -> SegmentPool<T> {
        self.try_build().unwrap_or_else(|error| fail_fatally(error))
    }

    /// Builds the pool with the specified configuration, reporting failure to reserve the first
    /// segment as an error.
    ///
    /// # Errors
    ///
    /// Returns the error from [`Segment::new()`][crate::Segment::new] if the first segment
    /// cannot be created.
    ///
    /// # Examples
    ///
    /// ```
    /// use segment_pool::{Error, SegmentPool};
    ///
    /// let result = SegmentPool::<()>::builder().try_build();
    ///
    /// assert!(matches!(result, Err(Error::ZeroSizedItem { .. })));
    /// ```
    pub fn try_build(self) -> Result<SegmentPool<T>> {
        SegmentPool::new_inner(self.segment_capacity, self.drop_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn defaults() {
        let builder = SegmentPoolBuilder::<u32>::new();

        assert_eq!(builder.segment_capacity, DEFAULT_SEGMENT_CAPACITY);
        assert_eq!(builder.drop_policy, DropPolicy::MayAbandonSlots);
    }

    #[test]
    fn try_build_reports_capacity_overflow() {
        let result = SegmentPool::<u64>::builder()
            .segment_capacity(NonZero::new(usize::MAX).unwrap())
            .try_build();

        assert!(matches!(result, Err(Error::CapacityOverflow { .. })));
    }

    #[test]
    fn debug_output_names_item_type() {
        let builder = SegmentPool::<u16>::builder();

        assert!(format!("{builder:?}").contains("u16"));
    }
}
