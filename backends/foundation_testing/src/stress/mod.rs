//! Stress test framework for the queue and the guard.
//!
//! Provides configurable high-contention testing with:
//! - Thread count control
//! - Iteration limits
//! - Time-based duration, enforced through a [`CancelToken`]
//! - Success rate tracking

use core::time::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use foundation_sync::CancelToken;

pub mod config;
pub mod sync;

pub use config::StressConfig;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Total operations completed successfully
    pub successes: usize,
    /// Total operations that failed
    pub failures: usize,
    /// Total time taken for the test
    pub duration: Duration,
    /// Number of threads used
    pub thread_count: usize,
    /// Whether the time limit cut the run short
    pub cancelled: bool,
}

impl StressResult {
    #[must_use]
    pub const fn new(
        successes: usize,
        failures: usize,
        duration: Duration,
        thread_count: usize,
        cancelled: bool,
    ) -> Self {
        Self {
            successes,
            failures,
            duration,
            thread_count,
            cancelled,
        }
    }

    #[must_use]
    pub const fn total_operations(&self) -> usize {
        self.successes + self.failures
    }

    /// Returns the success rate as a value between 0.0 and 1.0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_operations() == 0 {
            0.0
        } else {
            self.successes as f64 / self.total_operations() as f64
        }
    }

    /// Returns operations per second.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn operations_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.total_operations() as f64 / secs
        }
    }
}

/// Base stress test harness.
///
/// Spawns multiple threads that execute a closure repeatedly until every
/// thread ran its iterations or the configured duration elapsed.
pub struct StressHarness {
    config: StressConfig,
    cancel: CancelToken,
}

impl StressHarness {
    #[must_use]
    pub fn new(config: StressConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Token handed to every operation; fired when the duration elapses.
    ///
    /// Cancelling it from outside stops the run early as well.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs a stress test with the given operation closure.
    ///
    /// The closure receives:
    /// - `thread_id`: Index of the thread (`0..thread_count`)
    /// - `iteration`: Iteration number for this thread
    /// - `cancel`: the harness token, to pass to blocking calls
    ///
    /// Returns `true` on success, `false` on failure. An operation that
    /// fails because the token fired is still counted as a failure, the
    /// thread then stops.
    ///
    /// # Examples
    ///
    /// ```
    /// use foundation_sync::ReadWriteGuard;
    /// use foundation_testing::stress::{StressConfig, StressHarness};
    ///
    /// let guard = ReadWriteGuard::new(0_usize);
    /// let config = StressConfig::new().threads(4).iterations(100);
    ///
    /// let shared = guard.clone();
    /// let result = StressHarness::new(config).run(move |_thread_id, _iteration, cancel| {
    ///     shared.update(|count| *count += 1, cancel).is_ok()
    /// });
    ///
    /// assert_eq!(result.successes, 400);
    /// assert_eq!(guard.try_read().map(|count| *count), Ok(400));
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if any worker thread panics during the stress test execution.
    pub fn run<F>(self, operation: F) -> StressResult
    where
        F: Fn(usize, usize, &CancelToken) -> bool + Send + Sync + 'static,
    {
        let start = Instant::now();
        let operation = Arc::new(operation);

        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));

        // the timer sleeps on its own token so it can be released as soon
        // as the workers are done
        let timer_done = CancelToken::new();
        let timer = self.config.get_duration().map(|duration| {
            let cancel = self.cancel.clone();
            let timer_done = timer_done.clone();
            thread::spawn(move || {
                if !timer_done.wait_timeout(duration) {
                    tracing::debug!(?duration, "stress duration elapsed, cancelling workers");
                    cancel.cancel();
                }
            })
        });

        let mut handles = Vec::with_capacity(self.config.get_thread_count());

        for thread_id in 0..self.config.get_thread_count() {
            let operation = Arc::clone(&operation);
            let successes = Arc::clone(&successes);
            let failures = Arc::clone(&failures);
            let cancel = self.cancel.clone();
            let iterations = self.config.get_iterations();

            let handle = thread::spawn(move || {
                for iteration in 0..iterations {
                    if cancel.is_cancelled() {
                        break;
                    }

                    if operation(thread_id, iteration, &cancel) {
                        successes.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });

            handles.push(handle);
        }

        for handle in handles {
            handle.join().expect("Thread panicked during stress test");
        }

        let duration = start.elapsed();
        let cancelled = self.cancel.is_cancelled();

        timer_done.cancel();
        if let Some(timer) = timer {
            timer.join().expect("Timer thread panicked during stress test");
        }

        StressResult::new(
            successes.load(Ordering::Relaxed),
            failures.load(Ordering::Relaxed),
            duration,
            self.config.get_thread_count(),
            cancelled,
        )
    }
}
