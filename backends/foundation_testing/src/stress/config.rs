//! Stress test configuration.

use core::time::Duration;

/// Configuration for stress tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressConfig {
    /// Number of worker threads to spawn
    thread_count: usize,
    /// Operations each worker attempts
    iterations: usize,
    /// Optional time limit; workers are cancelled once it elapses
    duration: Option<Duration>,
}

impl StressConfig {
    /// Creates a new stress test configuration with default values.
    ///
    /// Defaults:
    /// - `thread_count`: 4
    /// - `iterations`: 1000
    /// - `duration`: None (no time limit)
    #[must_use]
    pub const fn new() -> Self {
        Self {
            thread_count: 4,
            iterations: 1000,
            duration: None,
        }
    }

    #[must_use]
    pub const fn threads(mut self, count: usize) -> Self {
        self.thread_count = count;
        self
    }

    #[must_use]
    pub const fn iterations(mut self, count: usize) -> Self {
        self.iterations = count;
        self
    }

    /// Splits `total` operations as evenly as possible over the configured
    /// threads, rounding up so at least `total` are attempted.
    #[must_use]
    pub const fn total_operations(mut self, total: usize) -> Self {
        let threads = if self.thread_count == 0 {
            1
        } else {
            self.thread_count
        };
        self.iterations = total.div_ceil(threads);
        self
    }

    /// Sets the maximum duration for the test.
    ///
    /// When it elapses the harness fires its [`CancelToken`](foundation_sync::CancelToken),
    /// which also wakes workers blocked inside a primitive.
    #[must_use]
    pub const fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub const fn duration_secs(mut self, secs: u64) -> Self {
        self.duration = Some(Duration::from_secs(secs));
        self
    }

    #[must_use]
    pub const fn get_thread_count(&self) -> usize {
        self.thread_count
    }

    #[must_use]
    pub const fn get_iterations(&self) -> usize {
        self.iterations
    }

    #[must_use]
    pub const fn get_duration(&self) -> Option<Duration> {
        self.duration
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self::new()
    }
}
