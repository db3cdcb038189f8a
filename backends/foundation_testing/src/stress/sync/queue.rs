//! `BoundedQueue` stress runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use foundation_sync::{BoundedQueue, CancelToken, SyncError};

use crate::stress::{StressConfig, StressHarness, StressResult};

use super::StressError;

/// Outcome of [`run_queue_stress`].
#[derive(Debug, Clone)]
pub struct QueueStressResult {
    /// Producer side: one operation per `put`.
    pub producers: StressResult,
    /// Items handed out by `take`.
    pub consumed: usize,
    /// Items taken more than once.
    pub duplicated: usize,
    /// Items put successfully but never taken.
    pub lost: usize,
    /// Largest queue length a producer observed right after its `put`.
    pub max_observed_len: usize,
    pub capacity: usize,
}

impl QueueStressResult {
    /// True when nothing was lost or duplicated and the capacity held.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.duplicated == 0 && self.lost == 0 && self.max_observed_len <= self.capacity
    }

    /// Items moved through the queue per second.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn items_per_second(&self) -> f64 {
        let secs = self.producers.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.consumed as f64 / secs
        }
    }
}

/// Pushes unique items through one queue from the configured producer
/// threads while `consumers` threads drain it, then checks that every
/// produced item came out exactly once.
///
/// Producers run under a [`StressHarness`]; once they finish (or the
/// configured duration cancels them) the queue is closed and consumers
/// drain what is left.
///
/// # Examples
///
/// ```
/// use foundation_testing::stress::{StressConfig, sync::run_queue_stress};
///
/// let config = StressConfig::new().threads(4).iterations(250);
/// let result = run_queue_stress(config, 3, 4).unwrap();
///
/// assert_eq!(result.consumed, 1000);
/// assert!(result.is_clean());
/// ```
///
/// # Errors
///
/// [`StressError::Sync`] with `InvalidConfiguration` for a zero capacity,
/// [`StressError::NoConsumers`] when `consumers` is zero.
///
/// # Panics
///
/// Panics if a producer or consumer thread panics.
pub fn run_queue_stress(
    config: StressConfig,
    capacity: usize,
    consumers: usize,
) -> Result<QueueStressResult, StressError> {
    if consumers == 0 {
        return Err(StressError::NoConsumers);
    }

    let queue = BoundedQueue::new(capacity)?;
    let iterations = config.get_iterations();
    let max_observed_len = Arc::new(AtomicUsize::new(0));

    // consumers only stop on close so they always drain the queue
    let drain = CancelToken::new();
    let consumer_handles: Vec<_> = (0..consumers)
        .map(|_| {
            let queue = queue.clone();
            let drain = drain.clone();
            thread::spawn(move || {
                let mut taken = Vec::new();
                loop {
                    match queue.take(&drain) {
                        Ok(item) => taken.push(item),
                        Err(SyncError::Closed) => break taken,
                        Err(error) => {
                            tracing::warn!(%error, "consumer stopped unexpectedly");
                            break taken;
                        }
                    }
                }
            })
        })
        .collect();

    let producers = {
        let queue = queue.clone();
        let max_observed_len = Arc::clone(&max_observed_len);
        StressHarness::new(config).run(move |thread_id, iteration, cancel| {
            let item = thread_id * iterations + iteration;
            if queue.put(item, cancel).is_err() {
                return false;
            }
            max_observed_len.fetch_max(queue.len(), Ordering::Relaxed);
            true
        })
    };

    queue.close();

    let mut seen: HashMap<usize, usize> = HashMap::new();
    for handle in consumer_handles {
        for item in handle.join().expect("Consumer thread panicked during stress test") {
            *seen.entry(item).or_default() += 1;
        }
    }

    let consumed = seen.values().sum();
    let duplicated = seen.values().filter(|count| **count > 1).count();
    let lost = producers.successes.saturating_sub(seen.len());

    let result = QueueStressResult {
        producers,
        consumed,
        duplicated,
        lost,
        max_observed_len: max_observed_len.load(Ordering::Relaxed),
        capacity,
    };

    tracing::info!(
        consumed = result.consumed,
        duplicated = result.duplicated,
        lost = result.lost,
        max_len = result.max_observed_len,
        capacity,
        "queue stress finished"
    );
    Ok(result)
}

/// Producers hammer a tiny queue for `duration` while consumers drain it,
/// exercising cancellation of producers blocked on a full queue.
///
/// # Errors
///
/// See [`run_queue_stress`].
pub fn run_queue_cancellation_stress(
    threads: usize,
    duration: Duration,
) -> Result<QueueStressResult, StressError> {
    let config = StressConfig::new()
        .threads(threads)
        .iterations(usize::MAX / threads.max(1))
        .duration(duration);
    run_queue_stress(config, 1, 1)
}
