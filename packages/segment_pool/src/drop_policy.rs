/// Determines what happens when a pool is dropped while callers still hold slots from it.
///
/// The pool never drops values stored in its slots - it only frees the storage. Any value a
/// caller left in a slot is leaked, and any address a caller still holds becomes dangling.
///
/// # Examples
///
/// ```
/// use segment_pool::{DropPolicy, SegmentPool};
///
/// let pool = SegmentPool::<u64>::builder()
///     .drop_policy(DropPolicy::MustNotAbandonSlots)
///     .build();
///
/// let slot = pool.allocate();
///
/// // SAFETY: The slot came from this pool and is released once.
/// unsafe { pool.release(slot) };
///
/// // All slots are back in the pool, so this drop is allowed.
/// drop(pool);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// The pool may be dropped with slots still checked out. This is the default.
    ///
    /// A warning is logged when this happens.
    #[default]
    MayAbandonSlots,

    /// The pool will panic if any slot is still checked out when it is dropped.
    ///
    /// Useful when slots are referenced from unsafe code that must be torn down before the
    /// storage goes away.
    MustNotAbandonSlots,
}
