//! `ReadWriteGuard` stress runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::scenarios::{GuardObservations, InstrumentedGuard};
use crate::stress::{StressConfig, StressHarness, StressResult};

/// Outcome of [`run_guard_stress`].
#[derive(Debug, Clone)]
pub struct GuardStressResult {
    pub run: StressResult,
    pub observations: GuardObservations,
    /// Reads that saw the two halves of the value disagree.
    pub torn_reads: usize,
}

impl GuardStressResult {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.observations.violations == 0 && self.torn_reads == 0
    }
}

/// Runs `readers + writers` threads against one [`InstrumentedGuard`].
///
/// Thread ids below `writers` write, the rest read; `config`'s thread count
/// is replaced by `readers + writers`. Writers bump both halves of a pair
/// in two steps, so a reader that ever sees the halves differ caught a
/// torn value.
///
/// # Examples
///
/// ```
/// use foundation_testing::stress::{StressConfig, sync::run_guard_stress};
///
/// let result = run_guard_stress(StressConfig::new().iterations(200), 6, 2);
///
/// assert!(result.is_clean());
/// assert_eq!(result.observations.writes, 400);
/// assert_eq!(result.observations.reads, 1200);
/// ```
#[must_use]
pub fn run_guard_stress(config: StressConfig, readers: usize, writers: usize) -> GuardStressResult {
    let guard = InstrumentedGuard::new((0_u64, 0_u64));
    let torn = Arc::new(AtomicUsize::new(0));

    let run = {
        let guard = guard.clone();
        let torn = Arc::clone(&torn);
        StressHarness::new(config.threads(readers + writers)).run(
            move |thread_id, _iteration, cancel| {
                if thread_id < writers {
                    guard
                        .update(
                            |pair| {
                                pair.0 += 1;
                                std::hint::spin_loop();
                                pair.1 += 1;
                            },
                            cancel,
                        )
                        .is_ok()
                } else {
                    match guard.read_value(cancel) {
                        Ok((left, right)) if left == right => true,
                        Ok(_) => {
                            torn.fetch_add(1, Ordering::Relaxed);
                            false
                        }
                        Err(_) => false,
                    }
                }
            },
        )
    };

    let torn_reads = torn.load(Ordering::Relaxed);
    let result = GuardStressResult {
        run,
        observations: guard.observations(),
        torn_reads,
    };

    tracing::info!(
        readers,
        writers,
        reads = result.observations.reads,
        writes = result.observations.writes,
        max_concurrent_readers = result.observations.max_concurrent_readers,
        violations = result.observations.violations,
        torn_reads,
        "guard stress finished"
    );
    result
}
