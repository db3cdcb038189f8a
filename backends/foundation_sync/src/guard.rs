//! Reader-writer guard around a single mutable value.
//!
//! Any number of readers may hold the value at once; a writer holds it
//! alone. The guard is **writer-preferring**: a reader arriving while a
//! writer is waiting queues behind that writer, so sustained read load
//! cannot starve writers. The trade-off is that a continuous stream of
//! writers delays readers until the stream pauses.
//!
//! Reader/writer bookkeeping lives behind one mutex with a condition
//! variable per side; the value itself sits outside that mutex so reader
//! sections really do run in parallel.
//!
//! # Examples
//!
//! ```
//! use foundation_sync::{CancelToken, ReadWriteGuard};
//!
//! let guard = ReadWriteGuard::new(0);
//! let cancel = CancelToken::new();
//!
//! guard.write_value(5, &cancel).unwrap();
//! assert_eq!(guard.read_value(&cancel).unwrap(), 5);
//!
//! // sections give borrowed access without cloning
//! {
//!     let r1 = guard.read(&cancel).unwrap();
//!     let r2 = guard.read(&cancel).unwrap();
//!     assert_eq!(*r1 + *r2, 10);
//! }
//!
//! guard.update(|value| *value += 1, &cancel).unwrap();
//! assert_eq!(guard.read_value(&cancel).unwrap(), 6);
//! ```

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::cancel::{CancelToken, Registration, Waker};
use crate::wait::Wait;
use crate::{Rejected, SyncError, SyncResult};

/// Snapshot of who currently holds or waits for the guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardState {
    /// Reader sections currently open.
    pub readers: usize,
    pub writer_active: bool,
    /// Writers parked waiting for exclusive access.
    pub writers_waiting: usize,
}

/// A clonable handle to one value shared between readers and writers.
pub struct ReadWriteGuard<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    state: Mutex<GuardState>,
    can_read: Condvar,
    can_write: Condvar,
    poisoned: AtomicBool,
    value: UnsafeCell<T>,
}

// SAFETY: `value` is only reached through ReadSection (shared, while
// `readers > 0` and no writer is active) or WriteSection (exclusive, while
// `writer_active` and `readers == 0`); the state mutex enforces both.
unsafe impl<T: Send> Send for Inner<T> {}
unsafe impl<T: Send + Sync> Sync for Inner<T> {}

impl<T> Clone for ReadWriteGuard<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> ReadWriteGuard<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(GuardState::default()),
                can_read: Condvar::new(),
                can_write: Condvar::new(),
                poisoned: AtomicBool::new(false),
                value: UnsafeCell::new(initial),
            }),
        }
    }

    /// Returns who holds or waits for the guard at the time of the call.
    #[must_use]
    pub fn state(&self) -> GuardState {
        *self.inner.lock_state()
    }

    /// Checks if a writer panicked inside its section.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.inner.poisoned.load(Ordering::Acquire)
    }

    /// Accepts the current value as consistent again after a poisoning.
    pub fn clear_poison(&self) {
        self.inner.poisoned.store(false, Ordering::Release);
    }
}

impl<T: Send + Sync + 'static> ReadWriteGuard<T> {
    /// Opens a reader section, blocking while a writer is active or waiting.
    ///
    /// # Errors
    ///
    /// [`SyncError::Cancelled`] when `cancel` fires, [`SyncError::Poisoned`]
    /// after a writer panicked, [`SyncError::InterruptedWait`] if the
    /// internal lock was poisoned.
    pub fn read(&self, cancel: &CancelToken) -> SyncResult<ReadSection<'_, T>> {
        self.acquire_read(Wait::Forever, Some(cancel))
    }

    /// Like [`read`](Self::read) but gives up with [`SyncError::TimedOut`].
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub fn read_timeout(
        &self,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> SyncResult<ReadSection<'_, T>> {
        self.acquire_read(Wait::within(timeout), Some(cancel))
    }

    /// Opens a reader section only if that is possible right now.
    ///
    /// # Errors
    ///
    /// [`SyncError::WouldBlock`] while a writer is active or waiting.
    pub fn try_read(&self) -> SyncResult<ReadSection<'_, T>> {
        self.acquire_read(Wait::Never, None)
    }

    /// Opens the writer section, blocking while any reader or writer holds
    /// the guard.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub fn write(&self, cancel: &CancelToken) -> SyncResult<WriteSection<'_, T>> {
        self.acquire_write(Wait::Forever, Some(cancel))
    }

    /// Like [`write`](Self::write) but gives up with [`SyncError::TimedOut`].
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub fn write_timeout(
        &self,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> SyncResult<WriteSection<'_, T>> {
        self.acquire_write(Wait::within(timeout), Some(cancel))
    }

    /// Opens the writer section only if the guard is free right now.
    ///
    /// # Errors
    ///
    /// [`SyncError::WouldBlock`] while the guard is held.
    pub fn try_write(&self) -> SyncResult<WriteSection<'_, T>> {
        self.acquire_write(Wait::Never, None)
    }

    /// Returns a copy of the value taken inside a reader section.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub fn read_value(&self, cancel: &CancelToken) -> SyncResult<T>
    where
        T: Clone,
    {
        self.read_with(T::clone, cancel)
    }

    /// Runs `f` against the value inside a reader section.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub fn read_with<R>(&self, f: impl FnOnce(&T) -> R, cancel: &CancelToken) -> SyncResult<R> {
        let section = self.read(cancel)?;
        Ok(f(&section))
    }

    /// Replaces the value inside a writer section.
    ///
    /// # Errors
    ///
    /// Hands `value` back inside [`Rejected`]; causes as for
    /// [`write`](Self::write).
    pub fn write_value(&self, value: T, cancel: &CancelToken) -> Result<(), Rejected<T>> {
        self.replace(value, cancel).map(drop)
    }

    /// Replaces the value and returns the previous one.
    ///
    /// # Errors
    ///
    /// See [`write_value`](Self::write_value).
    pub fn replace(&self, value: T, cancel: &CancelToken) -> Result<T, Rejected<T>> {
        match self.write(cancel) {
            Ok(mut section) => Ok(core::mem::replace(&mut *section, value)),
            Err(error) => Err(Rejected::new(value, error)),
        }
    }

    /// Runs `f` against the value inside a writer section.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R, cancel: &CancelToken) -> SyncResult<R> {
        let mut section = self.write(cancel)?;
        Ok(f(&mut section))
    }

    fn acquire_read(
        &self,
        wait: Wait,
        cancel: Option<&CancelToken>,
    ) -> SyncResult<ReadSection<'_, T>> {
        let mut registration: Option<Registration<'_>> = None;
        let mut state = self.inner.state.lock()?;

        let error = loop {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                break SyncError::Cancelled;
            }
            if self.is_poisoned() {
                break SyncError::Poisoned;
            }

            if !state.writer_active && state.writers_waiting == 0 {
                state.readers += 1;
                return Ok(ReadSection { inner: &self.inner });
            }

            if let Some(error) = wait.exhausted() {
                break error;
            }

            if registration.is_none() {
                if let Some(token) = cancel {
                    registration = Some(token.register(self.waker()));
                    continue;
                }
            }

            state = wait.park(&self.inner.can_read, state)?;
        };

        self.inner.pass_on(&state);
        Err(error)
    }

    fn acquire_write(
        &self,
        wait: Wait,
        cancel: Option<&CancelToken>,
    ) -> SyncResult<WriteSection<'_, T>> {
        let mut registration: Option<Registration<'_>> = None;
        let mut state = self.inner.state.lock()?;
        let mut queued = false;

        let error = loop {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                break SyncError::Cancelled;
            }
            if self.is_poisoned() {
                break SyncError::Poisoned;
            }

            if !state.writer_active && state.readers == 0 {
                if queued {
                    state.writers_waiting -= 1;
                }
                state.writer_active = true;
                return Ok(WriteSection { inner: &self.inner });
            }

            if let Some(error) = wait.exhausted() {
                break error;
            }

            // announcing ourselves is what holds back new readers
            if !queued {
                state.writers_waiting += 1;
                queued = true;
            }

            if registration.is_none() {
                if let Some(token) = cancel {
                    registration = Some(token.register(self.waker()));
                    continue;
                }
            }

            state = wait.park(&self.inner.can_write, state)?;
        };

        if queued {
            state.writers_waiting -= 1;
        }
        self.inner.pass_on(&state);
        Err(error)
    }

    fn waker(&self) -> std::sync::Weak<dyn Waker + Send + Sync> {
        let inner: std::sync::Weak<Inner<T>> = Arc::downgrade(&self.inner);
        inner
    }
}

impl<T> Inner<T> {
    fn lock_state(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands a wake-up on when a waiter leaves without using it.
    fn pass_on(&self, state: &GuardState) {
        if state.writer_active {
            return;
        }
        if state.writers_waiting > 0 {
            if state.readers == 0 {
                self.can_write.notify_one();
            }
        } else {
            self.can_read.notify_all();
        }
    }

    fn release_read(&self) {
        let mut state = self.lock_state();
        state.readers -= 1;
        if state.readers == 0 && state.writers_waiting > 0 {
            self.can_write.notify_one();
        }
    }

    fn release_write(&self) {
        let mut state = self.lock_state();
        state.writer_active = false;

        if self.poisoned.load(Ordering::Acquire) {
            self.can_write.notify_all();
            self.can_read.notify_all();
        } else if state.writers_waiting > 0 {
            self.can_write.notify_one();
        } else {
            self.can_read.notify_all();
        }
    }
}

impl<T> Waker for Inner<T> {
    fn wake(&self) {
        let _state = self.state.lock();
        self.can_read.notify_all();
        self.can_write.notify_all();
    }
}

impl<T: Default> Default for ReadWriteGuard<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for ReadWriteGuard<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> fmt::Debug for ReadWriteGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadWriteGuard")
            .field("state", &self.state())
            .field("poisoned", &self.is_poisoned())
            .finish_non_exhaustive()
    }
}

/// Shared access to the guarded value, released on drop.
pub struct ReadSection<'a, T> {
    inner: &'a Inner<T>,
}

impl<T> Deref for ReadSection<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.inner.value.get() }
    }
}

impl<T> Drop for ReadSection<'_, T> {
    fn drop(&mut self) {
        self.inner.release_read();
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadSection<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Exclusive access to the guarded value, released on drop.
///
/// Dropping it while the thread panics poisons the guard.
pub struct WriteSection<'a, T> {
    inner: &'a Inner<T>,
}

impl<T> Deref for WriteSection<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.inner.value.get() }
    }
}

impl<T> DerefMut for WriteSection<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.inner.value.get() }
    }
}

impl<T> Drop for WriteSection<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.inner.poisoned.store(true, Ordering::Release);
        }
        self.inner.release_write();
    }
}

impl<T: fmt::Debug> fmt::Debug for WriteSection<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::mpsc;
    use std::thread;

    /// WHY: readers must share the guard
    /// WHAT: two reader sections open at once, try_write is refused meanwhile
    #[test]
    fn test_readers_share_and_exclude_writers() {
        let guard = ReadWriteGuard::new(vec![1, 2, 3]);
        let cancel = CancelToken::new();

        let r1 = guard.read(&cancel).unwrap();
        let r2 = guard.try_read().unwrap();
        assert_eq!(guard.state().readers, 2);
        assert_eq!(*r1, *r2);
        assert_eq!(guard.try_write().unwrap_err(), SyncError::WouldBlock);

        drop(r1);
        drop(r2);
        assert_eq!(guard.state(), GuardState::default());
        guard.try_write().unwrap().push(4);
        assert_eq!(guard.read_value(&cancel).unwrap(), vec![1, 2, 3, 4]);
    }

    /// WHY: a writer excludes everybody else
    /// WHAT: while a write section is open try_read and try_write both refuse
    #[test]
    fn test_writer_is_exclusive() {
        let guard = ReadWriteGuard::new(0_u32);
        let section = guard.try_write().unwrap();

        assert!(guard.state().writer_active);
        assert_eq!(guard.try_read().unwrap_err(), SyncError::WouldBlock);
        assert_eq!(guard.try_write().unwrap_err(), SyncError::WouldBlock);
        drop(section);
        assert!(!guard.state().writer_active);
    }

    /// WHY: writer preference is the documented fairness policy
    /// WHAT: once a writer waits behind a reader, new readers are refused
    #[test]
    #[ntest::timeout(5000)]
    fn test_waiting_writer_blocks_new_readers() {
        let guard = ReadWriteGuard::new(0_i64);
        let cancel = CancelToken::new();
        let reader = guard.read(&cancel).unwrap();

        let (tx, rx) = mpsc::channel();
        let writer = {
            let guard = guard.clone();
            let cancel = cancel.clone();
            thread::spawn(move || {
                guard.write_value(9, &cancel).unwrap();
                tx.send(()).unwrap();
            })
        };

        while guard.state().writers_waiting == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(guard.try_read().unwrap_err(), SyncError::WouldBlock);
        assert!(rx.try_recv().is_err());

        drop(reader);
        rx.recv().unwrap();
        writer.join().unwrap();
        assert_eq!(guard.read_value(&cancel).unwrap(), 9);
    }

    /// WHY: a writer giving up must not leave readers locked out
    /// WHAT: after a queued writer times out, readers get in again
    #[test]
    #[serial]
    #[ntest::timeout(5000)]
    fn test_timed_out_writer_releases_readers() {
        let guard = ReadWriteGuard::new(1_u8);
        let cancel = CancelToken::new();
        let reader = guard.read(&cancel).unwrap();

        let err = guard
            .write_timeout(Duration::from_millis(20), &cancel)
            .unwrap_err();
        assert_eq!(err, SyncError::TimedOut);
        assert_eq!(guard.state().writers_waiting, 0);

        let second = guard.try_read().unwrap();
        assert_eq!(*reader + *second, 2);
    }

    /// WHY: a panic mid-write may leave a torn value behind
    /// WHAT: the guard refuses access until the poison is cleared
    #[test]
    fn test_panicking_writer_poisons() {
        let guard = ReadWriteGuard::new(String::from("ok"));
        let cancel = CancelToken::new();

        let remote = guard.clone();
        let cancel_clone = cancel.clone();
        let result = thread::spawn(move || {
            let _: Option<()> = remote
                .update(
                    |value| {
                        value.push_str("-partial");
                        panic!("writer failed mid-update");
                    },
                    &cancel_clone,
                )
                .ok();
        })
        .join();
        assert!(result.is_err());

        assert!(guard.is_poisoned());
        assert_eq!(guard.read_value(&cancel).unwrap_err(), SyncError::Poisoned);

        guard.clear_poison();
        assert_eq!(guard.read_value(&cancel).unwrap(), "ok-partial");
        assert!(!guard.state().writer_active);
    }

    /// WHY: rejected writes must not lose the caller's value
    /// WHAT: write_value with a fired token hands the value back untouched
    #[test]
    fn test_cancelled_write_hands_value_back() {
        let guard = ReadWriteGuard::new(String::from("old"));
        let cancel = CancelToken::new();
        cancel.cancel();

        let rejected = guard.write_value(String::from("new"), &cancel).unwrap_err();
        assert_eq!(rejected.error(), SyncError::Cancelled);
        assert_eq!(rejected.into_inner(), "new");
        assert_eq!(*guard.try_read().unwrap(), "old");
    }

    #[test]
    fn test_replace_returns_previous() {
        let guard = ReadWriteGuard::from(3);
        let cancel = CancelToken::new();
        assert_eq!(guard.replace(4, &cancel).unwrap(), 3);
        assert_eq!(guard.read_with(|v| v * 10, &cancel).unwrap(), 40);
    }
}
