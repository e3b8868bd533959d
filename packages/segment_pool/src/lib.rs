//! A thread-safe memory pool of fixed-size slots for a single element type.
//!
//! This crate provides [`SegmentPool`], which hands out the addresses of uninitialized storage
//! slots for values of one type `T`, takes them back for reuse and grows by appending new
//! fixed-capacity [`Segment`]s when it runs out. It is meant for programs that repeatedly create
//! and destroy many short-lived objects of one type and want to avoid a trip to the general
//! purpose allocator for each of them.
//!
//! # Key Features
//!
//! - **Stable addresses**: Segments are never moved, resized or freed while the pool lives
//! - **Reuse first**: Released slots are handed out again before the pool grows, most recently
//!   released first
//! - **Predictable order**: Slots of a fresh segment are handed out in ascending position order
//! - **Thread safety**: All operations take `&self` and are serialized by one lock
//! - **Raw storage**: The pool never constructs, reads or drops values - callers do
//!
//! # Trust boundary
//!
//! The pool does not track which slots are checked out. Releasing a slot twice or releasing an
//! address that did not come from the pool corrupts the pool's bookkeeping and lets it hand out
//! the same storage twice. Releasing is therefore `unsafe`: the caller promises to return only
//! addresses the pool handed out, each exactly once. Debug builds assert that a released address
//! belongs to the pool; release builds check nothing.
//!
//! # Examples
//!
//! ## Raw slots
//!
//! ```rust
//! use std::num::NonZero;
//!
//! use segment_pool::SegmentPool;
//!
//! let pool = SegmentPool::<u64>::with_capacity(NonZero::new(2).unwrap());
//!
//! let a = pool.allocate();
//! let b = pool.allocate();
//!
//! // Both slots of the first segment are taken, so the pool grows.
//! let c = pool.allocate();
//! assert_eq!(pool.segment_count(), 2);
//!
//! // SAFETY: The slot came from this pool and is released once.
//! unsafe { pool.release(b) };
//!
//! // The released slot is reused right away.
//! assert_eq!(pool.allocate(), b);
//! # // SAFETY: All three slots are checked out and are released once.
//! # unsafe {
//! #     pool.release(a);
//! #     pool.release(b);
//! #     pool.release(c);
//! # }
//! ```
//!
//! ## Values
//!
//! ```rust
//! use segment_pool::SegmentPool;
//!
//! let pool = SegmentPool::<String>::new();
//!
//! let mut name = pool.insert("Alice".to_string());
//!
//! // SAFETY: The slot holds the value we inserted and nobody else is using it.
//! unsafe {
//!     name.as_mut().push_str(" Smith");
//!     assert_eq!(name.as_ref(), "Alice Smith");
//!
//!     // Drops the string and returns the slot to the pool.
//!     pool.remove(name);
//! }
//! ```

mod builder;
mod drop_policy;
mod error;
mod pool;
mod segment;

pub use builder::SegmentPoolBuilder;
pub use drop_policy::DropPolicy;
pub use error::Error;
pub(crate) use error::Result;
pub(crate) use pool::fail_fatally;
pub use pool::{DEFAULT_SEGMENT_CAPACITY, SegmentPool};
pub use segment::{Segment, SegmentIndex};
