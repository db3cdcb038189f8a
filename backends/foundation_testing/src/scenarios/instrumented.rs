//! A [`ReadWriteGuard`] that checks its own exclusion rules while in use.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use foundation_sync::{CancelToken, ReadWriteGuard, Rejected, SyncResult};

/// Counters kept next to the guard by [`InstrumentedGuard`].
#[derive(Debug, Default)]
struct Probe {
    active_readers: AtomicUsize,
    active_writers: AtomicUsize,
    max_concurrent_readers: AtomicUsize,
    violations: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

/// Snapshot of what an [`InstrumentedGuard`] observed so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardObservations {
    pub reads: usize,
    pub writes: usize,
    /// Largest number of reader sections seen open at the same time.
    pub max_concurrent_readers: usize,
    /// Times a section found another section it must exclude.
    pub violations: usize,
}

/// Wraps a guard and records every section it hands out.
///
/// A reader that sees an active writer, or a writer that sees any other
/// active section, counts as a violation. A correct guard keeps that
/// count at zero under any load.
///
/// # Examples
///
/// ```
/// use foundation_sync::CancelToken;
/// use foundation_testing::scenarios::InstrumentedGuard;
///
/// let guard = InstrumentedGuard::new(1_u32);
/// let cancel = CancelToken::new();
///
/// guard.write_value(2, &cancel).unwrap();
/// assert_eq!(guard.read_value(&cancel).unwrap(), 2);
///
/// let seen = guard.observations();
/// assert_eq!((seen.reads, seen.writes, seen.violations), (1, 1, 0));
/// ```
pub struct InstrumentedGuard<T> {
    guard: ReadWriteGuard<T>,
    probe: Arc<Probe>,
}

impl<T> Clone for InstrumentedGuard<T> {
    fn clone(&self) -> Self {
        Self {
            guard: self.guard.clone(),
            probe: Arc::clone(&self.probe),
        }
    }
}

impl<T: Send + Sync + 'static> InstrumentedGuard<T> {
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            guard: ReadWriteGuard::new(initial),
            probe: Arc::new(Probe::default()),
        }
    }

    /// The wrapped guard, for calls that should not be recorded.
    #[must_use]
    pub fn inner(&self) -> &ReadWriteGuard<T> {
        &self.guard
    }

    /// Runs `f` inside a recorded reader section.
    ///
    /// # Errors
    ///
    /// Whatever [`ReadWriteGuard::read`] returns.
    pub fn read_with<R>(&self, f: impl FnOnce(&T) -> R, cancel: &CancelToken) -> SyncResult<R> {
        let section = self.guard.read(cancel)?;
        let probe = &self.probe;

        let readers = probe.active_readers.fetch_add(1, Ordering::SeqCst) + 1;
        probe
            .max_concurrent_readers
            .fetch_max(readers, Ordering::SeqCst);
        if probe.active_writers.load(Ordering::SeqCst) != 0 {
            probe.violations.fetch_add(1, Ordering::SeqCst);
        }

        let result = f(&section);

        probe.reads.fetch_add(1, Ordering::Relaxed);
        probe.active_readers.fetch_sub(1, Ordering::SeqCst);
        drop(section);
        Ok(result)
    }

    /// Runs `f` inside a recorded writer section.
    ///
    /// # Errors
    ///
    /// Whatever [`ReadWriteGuard::write`] returns.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R, cancel: &CancelToken) -> SyncResult<R> {
        let mut section = self.guard.write(cancel)?;
        let probe = &self.probe;

        let writers_before = probe.active_writers.fetch_add(1, Ordering::SeqCst);
        if writers_before != 0 || probe.active_readers.load(Ordering::SeqCst) != 0 {
            probe.violations.fetch_add(1, Ordering::SeqCst);
        }

        let result = f(&mut section);

        probe.writes.fetch_add(1, Ordering::Relaxed);
        probe.active_writers.fetch_sub(1, Ordering::SeqCst);
        drop(section);
        Ok(result)
    }

    /// # Errors
    ///
    /// See [`read_with`](Self::read_with).
    pub fn read_value(&self, cancel: &CancelToken) -> SyncResult<T>
    where
        T: Clone,
    {
        self.read_with(T::clone, cancel)
    }

    /// # Errors
    ///
    /// Hands `value` back when the writer section could not be opened.
    pub fn write_value(&self, value: T, cancel: &CancelToken) -> Result<(), Rejected<T>> {
        let mut slot = Some(value);
        match self.update(|current| slot.take().map(|next| *current = next), cancel) {
            Ok(_) => Ok(()),
            Err(error) => match slot {
                Some(value) => Err(Rejected::new(value, error)),
                None => Ok(()),
            },
        }
    }

    #[must_use]
    pub fn observations(&self) -> GuardObservations {
        GuardObservations {
            reads: self.probe.reads.load(Ordering::SeqCst),
            writes: self.probe.writes.load(Ordering::SeqCst),
            max_concurrent_readers: self.probe.max_concurrent_readers.load(Ordering::SeqCst),
            violations: self.probe.violations.load(Ordering::SeqCst),
        }
    }
}
