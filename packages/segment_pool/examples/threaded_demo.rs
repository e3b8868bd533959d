//! Several threads share one pool with single-slot segments, so the pool grows and recycles
//! slots constantly:
//!
//! * Each thread inserts a batch of objects, one at a time.
//! * After every second object, the thread reports the last two and removes them again.
//!
//! Logging is set to DEBUG so that the pool's growth events are visible.

use std::num::NonZero;
use std::thread;
use std::time::Duration;

use segment_pool::SegmentPool;
use tracing::{Level, info};

const OBJECTS_PER_THREAD: usize = 10;
const THREADS: usize = 2;

struct DummyObj {
    value: i32,
}

impl DummyObj {
    fn new() -> Self {
        info!(value = -1, "dummy object created");
        Self { value: -1 }
    }
}

impl Drop for DummyObj {
    fn drop(&mut self) {
        info!(value = self.value, "dummy object destroyed");
    }
}

fn worker(pool: &SegmentPool<DummyObj>, thread_id: usize) {
    let mut objects = Vec::with_capacity(OBJECTS_PER_THREAD);

    for i in 0..OBJECTS_PER_THREAD {
        let mut object = pool.insert(DummyObj::new());

        // SAFETY: We just inserted the object and are its only user.
        unsafe {
            object.as_mut().value = i32::try_from(i + 1).unwrap();
        }

        objects.push(object);
        thread::sleep(Duration::from_millis(1));

        if i % 2 == 1 {
            let second = objects.pop().unwrap();
            let first = objects.pop().unwrap();

            // SAFETY: Both objects were inserted by this thread and are still live.
            let (first_value, second_value) =
                unsafe { (first.as_ref().value, second.as_ref().value) };

            info!(
                thread_id,
                first = first_value,
                second = second_value,
                "releasing a pair of objects"
            );

            for object in [first, second] {
                // SAFETY: Each object was inserted by this thread and is not used after removal.
                unsafe { pool.remove(object) };
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let pool = SegmentPool::<DummyObj>::with_capacity(NonZero::new(1).unwrap());

    thread::scope(|s| {
        for thread_id in 1..=THREADS {
            let pool = &pool;
            s.spawn(move || worker(pool, thread_id));
        }
    });

    info!(
        segments = pool.segment_count(),
        available = pool.available(),
        "all threads finished"
    );
}
