//! Wiring of the two demos: build the primitive, spawn its workers.

use foundation_sync::{BoundedQueue, ReadWriteGuard};

use crate::config::{GuardConfig, QueueConfig};
use crate::drivers::{random_below, random_letters, Consumer, Producer, Reader, Writer};
use crate::{WorkerGroup, WorkerResult};

/// Length of the random words the queue demo produces.
pub const WORD_LEN: usize = 5;

/// Builds the demo queue and spawns its producers and consumers into
/// `group`.
///
/// Producers put random five-letter words; consumers log what they take.
///
/// # Errors
///
/// Zero capacity, or a worker thread that could not be spawned.
pub fn spawn_queue_demo(
    config: &QueueConfig,
    group: &mut WorkerGroup,
) -> WorkerResult<BoundedQueue<String>> {
    let queue = BoundedQueue::new(config.capacity)?;

    for index in 0..config.producers {
        group.spawn(
            Producer::new(index, queue.clone(), random_letters(WORD_LEN))
                .max_pause(config.max_produce_pause()),
        )?;
    }
    for index in 0..config.consumers {
        group.spawn(Consumer::new(index, queue.clone()).max_pause(config.max_consume_pause()))?;
    }

    tracing::info!(
        capacity = config.capacity,
        producers = config.producers,
        consumers = config.consumers,
        "queue demo started"
    );
    Ok(queue)
}

/// Builds the demo guard (starting at zero) and spawns its readers and
/// writers into `group`.
///
/// # Errors
///
/// A worker thread that could not be spawned.
pub fn spawn_guard_demo(
    config: &GuardConfig,
    group: &mut WorkerGroup,
) -> WorkerResult<ReadWriteGuard<u64>> {
    let guard = ReadWriteGuard::new(0_u64);

    for index in 0..config.readers {
        group.spawn(Reader::new(index, guard.clone()).max_pause(config.max_read_pause()))?;
    }
    for index in 0..config.writers {
        group.spawn(
            Writer::new(index, guard.clone(), random_below(config.max_value))
                .max_pause(config.max_write_pause()),
        )?;
    }

    tracing::info!(
        readers = config.readers,
        writers = config.writers,
        "guard demo started"
    );
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{Exit, Role};
    use foundation_sync::SyncError;
    use serial_test::serial;
    use std::time::Duration;

    fn fast_queue() -> QueueConfig {
        QueueConfig {
            capacity: 3,
            producers: 2,
            consumers: 3,
            max_produce_pause_ms: 2,
            max_consume_pause_ms: 2,
        }
    }

    /// WHY: the CLI closes the queue on stop and prints every report
    /// WHAT: after running briefly, all workers stop and report their role
    #[test]
    #[serial]
    #[ntest::timeout(10000)]
    fn test_queue_demo_runs_and_stops() {
        let mut group = WorkerGroup::new();
        let queue = spawn_queue_demo(&fast_queue(), &mut group).unwrap();
        let cancel = group.token();

        assert!(!cancel.wait_timeout(Duration::from_millis(100)));
        group.stop();
        queue.close();

        let reports = group.join();
        assert_eq!(reports.len(), 5);
        assert_eq!(
            reports.iter().filter(|r| r.role == Role::Producer).count(),
            2
        );
        assert!(reports
            .iter()
            .all(|r| matches!(r.exit, Exit::Cancelled | Exit::Closed)));
        assert!(queue.len() <= queue.capacity());
    }

    #[test]
    fn test_queue_demo_rejects_zero_capacity() {
        let mut group = WorkerGroup::new();
        let config = QueueConfig {
            capacity: 0,
            ..fast_queue()
        };
        assert!(matches!(
            spawn_queue_demo(&config, &mut group),
            Err(crate::WorkerError::Sync(SyncError::InvalidConfiguration { capacity: 0 }))
        ));
        assert!(group.is_empty());
    }

    /// WHY: written values must stay inside the configured range
    /// WHAT: the guard value after a short run is below max_value
    #[test]
    #[serial]
    #[ntest::timeout(10000)]
    fn test_guard_demo_writes_bounded_values() {
        let config = GuardConfig {
            readers: 3,
            writers: 2,
            max_read_pause_ms: 1,
            max_write_pause_ms: 1,
            max_value: 10,
        };
        let mut group = WorkerGroup::new();
        let guard = spawn_guard_demo(&config, &mut group).unwrap();

        assert!(!group.token().wait_timeout(Duration::from_millis(100)));
        let reports = group.shutdown();

        assert_eq!(reports.len(), 5);
        assert!(reports.iter().all(|r| r.exit == Exit::Cancelled));
        assert!(reports
            .iter()
            .any(|r| r.role == Role::Writer && r.operations > 0));
        assert!(*guard.try_read().unwrap() < 10);
    }
}
