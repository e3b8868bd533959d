//! Private helpers for testing pool behavior from many threads at once.

use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::Duration;

/// How long a test may run before [`with_watchdog()`] gives up on it.
const TIMEOUT: Duration = Duration::from_secs(10);

/// Runs a test on a separate thread and fails it if it does not finish within 10 seconds.
///
/// Concurrency tests that deadlock would otherwise hang the test run forever.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog is disabled
/// and the test function is executed directly, so that mutation testing can detect hangs itself.
///
/// # Panics
///
/// Panics if the test exceeds the timeout. Panics from the test itself are propagated.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let answer = with_watchdog(|| 2 + 2);
/// assert_eq!(answer, 4);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_handle = thread::spawn(move || {
        // If this fails, the receiver has already timed out and nobody wants the result.
        drop(tx.send(test_fn()));
    });

    match rx.recv_timeout(TIMEOUT) {
        Ok(result) => {
            test_handle.join().expect("test thread sent its result, so it cannot have panicked");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded the {TIMEOUT:?} timeout");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_handle.join() {
            Ok(()) => panic!("test thread disconnected without sending a result"),
            Err(e) => std::panic::resume_unwind(e),
        },
    }
}

/// Runs `f` on `threads` threads that all start at the same moment, returning the results in
/// thread order.
///
/// Each invocation receives the index of its thread. Starting all threads behind a barrier
/// maximizes contention on whatever shared state `f` touches.
///
/// # Panics
///
/// Panics if any of the threads panics.
///
/// # Example
///
/// ```rust
/// use testing::run_contended;
///
/// let results = run_contended(4, |index| index * 10);
/// assert_eq!(results, vec![0, 10, 20, 30]);
/// ```
pub fn run_contended<F, R>(threads: usize, f: F) -> Vec<R>
where
    F: Fn(usize) -> R + Send + Sync + 'static,
    R: Send + 'static,
{
    let f = Arc::new(f);
    let barrier = Arc::new(Barrier::new(threads));

    let handles = (0..threads)
        .map(|index| {
            let f = Arc::clone(&f);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait();
                f(index)
            })
        })
        .collect::<Vec<_>>();

    handles
        .into_iter()
        .map(|handle| {
            handle
                .join()
                .unwrap_or_else(|e| std::panic::resume_unwind(e))
        })
        .collect()
}
