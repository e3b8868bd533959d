//! Integration tests for the allocate/release contract of `SegmentPool`.
//!
//! These tests only use the public API and verify the ordering, growth and reuse behavior that
//! callers are allowed to rely on.

use std::collections::HashSet;
use std::num::NonZero;
use std::ptr::NonNull;

use segment_pool::{Error, SegmentPool};

fn nz(value: usize) -> NonZero<usize> {
    NonZero::new(value).unwrap()
}

fn addr<T>(slot: NonNull<T>) -> usize {
    slot.as_ptr().addr()
}

#[test]
fn allocations_without_release_are_distinct() {
    let pool = SegmentPool::<u64>::with_capacity(nz(10));

    let addresses = (0..35)
        .map(|_| addr(pool.allocate().unwrap()))
        .collect::<HashSet<_>>();

    assert_eq!(addresses.len(), 35);
    assert_eq!(pool.segment_count(), 4);
    assert_eq!(pool.outstanding(), 35);
}

#[test]
fn allocation_past_capacity_grows() {
    const CAPACITY: usize = 16;

    let pool = SegmentPool::<u32>::with_capacity(nz(CAPACITY));

    let first_segment = (0..CAPACITY)
        .map(|_| pool.allocate().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(pool.segment_count(), 1);
    assert_eq!(pool.available(), 0);

    let overflow = pool.allocate();

    assert!(overflow.is_some());
    assert!(!first_segment.contains(&overflow.unwrap()));
    assert_eq!(pool.segment_count(), 2);
    assert_eq!(pool.capacity(), CAPACITY * 2);
    assert_eq!(pool.available(), CAPACITY - 1);
}

#[test]
fn release_then_allocate_returns_same_slot() {
    let pool = SegmentPool::<String>::new();

    let a = pool.allocate();

    // SAFETY: The slot came from this pool and is released once.
    unsafe { pool.release(a) };

    assert_eq!(pool.allocate(), a);
}

#[test]
fn fresh_segment_is_handed_out_in_ascending_order() {
    const CAPACITY: usize = 12;

    let pool = SegmentPool::<u64>::with_capacity(nz(CAPACITY));

    let addresses = (0..CAPACITY)
        .map(|_| addr(pool.allocate().unwrap()))
        .collect::<Vec<_>>();

    // Consecutive positions of one segment are adjacent in memory.
    for pair in addresses.windows(2) {
        assert_eq!(pair[1] - pair[0], size_of::<u64>());
    }
}

#[test]
fn each_new_segment_starts_at_its_first_position() {
    const CAPACITY: usize = 4;

    let pool = SegmentPool::<u64>::with_capacity(nz(CAPACITY));

    let addresses = (0..CAPACITY * 3)
        .map(|_| addr(pool.allocate().unwrap()))
        .collect::<Vec<_>>();

    for segment in addresses.chunks(CAPACITY) {
        for pair in segment.windows(2) {
            assert_eq!(pair[1] - pair[0], size_of::<u64>());
        }
    }
}

#[test]
fn end_to_end_with_single_slot_segments() {
    let pool = SegmentPool::<u32>::with_capacity(nz(1));

    let a1 = pool.allocate();
    assert!(a1.is_some());
    assert_eq!(pool.segment_count(), 1);

    let a2 = pool.allocate();
    assert!(a2.is_some());
    assert_ne!(a1, a2);
    assert_eq!(pool.segment_count(), 2);

    // SAFETY: Both slots came from this pool and are released once.
    unsafe { pool.release(a1) };
    // SAFETY: As above.
    unsafe { pool.release(a2) };

    assert_eq!(pool.allocate(), a2);
    assert_eq!(pool.allocate(), a1);
    assert_eq!(pool.segment_count(), 2);
}

#[test]
fn release_none_changes_nothing() {
    let pool = SegmentPool::<u32>::with_capacity(nz(3));

    let a = pool.allocate();
    let available = pool.available();

    // SAFETY: Releasing nothing touches no slot.
    unsafe { pool.release(None) };

    assert_eq!(pool.available(), available);
    assert_eq!(pool.outstanding(), 1);

    // The next slot is still the one that would have come next anyway.
    let b = pool.allocate().unwrap();
    assert_eq!(addr(b) - addr(a.unwrap()), size_of::<u32>());
}

#[test]
fn reuse_is_last_released_first() {
    let pool = SegmentPool::<u64>::with_capacity(nz(8));

    let slots = (0..6).map(|_| pool.allocate()).collect::<Vec<_>>();

    for &slot in &slots {
        // SAFETY: Each slot came from this pool and is released once.
        unsafe { pool.release(slot) };
    }

    let reused = (0..6).map(|_| pool.allocate()).collect::<Vec<_>>();

    assert_eq!(reused, slots.into_iter().rev().collect::<Vec<_>>());
}

#[test]
fn try_allocate_grows_like_allocate() {
    let pool = SegmentPool::<u32>::with_capacity(nz(1));

    let a = pool.try_allocate().unwrap();
    let b = pool.try_allocate().unwrap();

    assert_ne!(a, b);
    assert_eq!(pool.segment_count(), 2);
}

#[test]
fn try_build_rejects_zero_sized_items() {
    let result = SegmentPool::<()>::builder().try_build();

    assert!(matches!(result, Err(Error::ZeroSizedItem { .. })));
}

#[test]
fn slots_stay_valid_across_growth() {
    let pool = SegmentPool::<u64>::with_capacity(nz(2));

    let values = (0..50_u64).map(|i| pool.insert(i)).collect::<Vec<_>>();

    assert_eq!(pool.segment_count(), 25);

    for (expected, slot) in (0..50_u64).zip(&values) {
        // SAFETY: Each slot holds the value we inserted and nobody else is using it.
        assert_eq!(unsafe { slot.read() }, expected);
    }

    for slot in values {
        // SAFETY: As above, and each slot is removed exactly once.
        unsafe {
            pool.remove(slot);
        }
    }

    assert_eq!(pool.outstanding(), 0);
}
