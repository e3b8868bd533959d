//! Multithreaded tests for `SegmentPool`.

use std::collections::HashSet;
use std::num::NonZero;
use std::sync::Arc;

use segment_pool::{DropPolicy, SegmentPool};
use testing::{run_contended, with_watchdog};

const THREADS: usize = 8;

#[test]
fn contended_allocations_never_share_a_slot() {
    with_watchdog(|| {
        const PER_THREAD: usize = 200;

        let pool = Arc::new(SegmentPool::<u64>::with_capacity(NonZero::new(3).unwrap()));

        let per_thread = {
            let pool = Arc::clone(&pool);
            run_contended(THREADS, move |_| {
                (0..PER_THREAD)
                    .map(|_| pool.allocate().unwrap().as_ptr().addr())
                    .collect::<Vec<_>>()
            })
        };

        let all = per_thread.into_iter().flatten().collect::<Vec<_>>();
        let distinct = all.iter().copied().collect::<HashSet<_>>();

        assert_eq!(all.len(), THREADS * PER_THREAD);
        assert_eq!(distinct.len(), all.len());
        assert_eq!(pool.outstanding(), THREADS * PER_THREAD);
    });
}

#[test]
fn batches_written_and_released_in_pairs() {
    with_watchdog(|| {
        const BATCH: usize = 10;

        // Single-slot segments force growth on nearly every allocation while other threads are
        // releasing, which is the worst case for the lock.
        let pool = Arc::new(
            SegmentPool::<usize>::builder()
                .segment_capacity(NonZero::new(1).unwrap())
                .drop_policy(DropPolicy::MustNotAbandonSlots)
                .build(),
        );

        {
            let pool = Arc::clone(&pool);
            run_contended(THREADS, move |thread_index| {
                let mut batch = Vec::with_capacity(BATCH);

                for i in 0..BATCH {
                    let value = thread_index * 1000 + i;
                    batch.push(pool.insert(value));

                    if i % 2 == 1 {
                        let second = batch.pop().unwrap();
                        let first = batch.pop().unwrap();

                        // SAFETY: Both slots hold values this thread inserted. If the pool had
                        // handed either slot to another thread too, these values would differ.
                        unsafe {
                            assert_eq!(first.read(), value - 1);
                            assert_eq!(second.read(), value);

                            pool.remove(first);
                            pool.remove(second);
                        }
                    }
                }
            });
        }

        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.available(), pool.capacity());

        // The strict drop policy verifies that every slot came back.
        drop(Arc::into_inner(pool).unwrap());
    });
}

#[test]
fn pool_can_move_between_threads() {
    with_watchdog(|| {
        let pool = SegmentPool::<String>::new();
        let slot = pool.allocate();

        let pool = std::thread::spawn(move || {
            assert_eq!(pool.outstanding(), 1);
            pool
        })
        .join()
        .unwrap();

        // Addresses stay valid after the pool has moved, since the segments did not.
        // SAFETY: The slot came from this pool and is released once.
        unsafe { pool.release(slot) };
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.allocate(), slot);
    });
}
