//! Basic usage of the `segment_pool` crate:
//!
//! * Creating a pool.
//! * Allocating and releasing raw slots.
//! * Inserting and removing values.
//! * Watching the pool grow.

use std::num::NonZero;

use segment_pool::SegmentPool;

fn main() {
    let pool = SegmentPool::<String>::with_capacity(NonZero::new(2).unwrap());

    println!(
        "Pool starts with {} segment of {} slots",
        pool.segment_count(),
        pool.segment_capacity()
    );

    // Slots are raw storage. Writing into one is up to you.
    let slot = pool.allocate().expect("a growing pool always has a slot");

    // SAFETY: The slot was just allocated to us and holds no value yet.
    unsafe {
        slot.write("Alice".to_string());
    }

    // Or let the pool write the value for you.
    let bob = pool.insert("Bob".to_string());

    // Both slots of the first segment are in use, so this grows the pool.
    let charlie = pool.insert("Charlie".to_string());

    println!(
        "After three insertions the pool has {} segments and {} free slots",
        pool.segment_count(),
        pool.available()
    );

    // SAFETY: Each slot holds a value we wrote and is still live.
    let names = unsafe { (slot.as_ref(), bob.as_ref(), charlie.as_ref()) };
    println!("Removing {}, {} and {}", names.0, names.1, names.2);

    for written in [slot, bob, charlie] {
        // SAFETY: Each slot holds a value we wrote and is not used after removal.
        unsafe { pool.remove(written) };
    }

    // The most recently released slot is reused first.
    let dave = pool.insert("Dave".to_string());
    assert_eq!(dave, charlie);

    // SAFETY: As above.
    unsafe {
        pool.remove(dave);
    }

    println!("{} slots are checked out at the end", pool.outstanding());
}
