//! Fixed-capacity FIFO queue shared by producer and consumer workers.
//!
//! [`BoundedQueue`] is a classic monitor: one mutex guards the items and two
//! condition variables park producers while the queue is full and consumers
//! while it is empty. The fullness/emptiness check, the mutation and the
//! wake-up of the other side run as one critical section.
//!
//! # Examples
//!
//! ```
//! use foundation_sync::{BoundedQueue, CancelToken};
//! use std::thread;
//!
//! let queue = BoundedQueue::new(2).unwrap();
//! let cancel = CancelToken::new();
//!
//! let producer = {
//!     let queue = queue.clone();
//!     let cancel = cancel.clone();
//!     thread::spawn(move || {
//!         for i in 0..5 {
//!             queue.put(i, &cancel).unwrap();
//!         }
//!     })
//! };
//!
//! let taken: Vec<i32> = (0..5).map(|_| queue.take(&cancel).unwrap()).collect();
//! producer.join().unwrap();
//! assert_eq!(taken, vec![0, 1, 2, 3, 4]);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::cancel::{CancelToken, Registration, Waker};
use crate::wait::Wait;
use crate::{Rejected, SyncError, SyncResult};

/// A thread-safe, capacity-bounded FIFO queue.
///
/// Cloning the queue hands out another handle to the same storage.
pub struct BoundedQueue<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Outcome of one attempt made under the queue lock.
enum Attempt<R> {
    Done(R),
    Blocked,
    Failed(SyncError),
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> BoundedQueue<T> {
    /// Creates an empty queue holding at most `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfiguration`] when `capacity` is zero.
    pub fn new(capacity: usize) -> SyncResult<Self> {
        if capacity == 0 {
            return Err(SyncError::InvalidConfiguration { capacity });
        }

        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    items: VecDeque::with_capacity(capacity),
                    closed: false,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity,
            }),
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Returns the number of queued items at the time of the call.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().items.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.snapshot().items.len() >= self.inner.capacity
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.snapshot().closed
    }

    /// Closes the queue and wakes every blocked worker.
    ///
    /// Later `put` calls fail with [`SyncError::Closed`]; `take` keeps
    /// draining what is left and fails with [`SyncError::Closed`] once the
    /// queue is empty. Returns `true` if this call closed the queue.
    pub fn close(&self) -> bool {
        let mut state = self.snapshot();
        if state.closed {
            return false;
        }

        state.closed = true;
        self.inner.not_empty.notify_all();
        self.inner.not_full.notify_all();
        true
    }

    // Read-only snapshots recover from poisoning: nothing is mutated
    // through them beyond the closed flag, which is always valid.
    fn snapshot(&self) -> MutexGuard<'_, State<T>> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + 'static> BoundedQueue<T> {
    /// Appends `item`, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Hands `item` back inside [`Rejected`] when `cancel` fires, the queue
    /// is closed, or the internal lock was poisoned.
    pub fn put(&self, item: T, cancel: &CancelToken) -> Result<(), Rejected<T>> {
        self.put_with(item, Wait::Forever, Some(cancel))
    }

    /// Like [`put`](Self::put) but gives up with [`SyncError::TimedOut`]
    /// after `timeout`.
    ///
    /// # Errors
    ///
    /// See [`put`](Self::put).
    pub fn put_timeout(
        &self,
        item: T,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<(), Rejected<T>> {
        self.put_with(item, Wait::within(timeout), Some(cancel))
    }

    /// Appends `item` only if there is room right now.
    ///
    /// # Errors
    ///
    /// [`SyncError::WouldBlock`] when full, [`SyncError::Closed`] when closed.
    pub fn try_put(&self, item: T) -> Result<(), Rejected<T>> {
        self.put_with(item, Wait::Never, None)
    }

    /// Removes and returns the oldest item, blocking while the queue is
    /// empty.
    ///
    /// # Errors
    ///
    /// [`SyncError::Cancelled`] when `cancel` fires, [`SyncError::Closed`]
    /// once a closed queue is drained, [`SyncError::InterruptedWait`] if the
    /// internal lock was poisoned.
    pub fn take(&self, cancel: &CancelToken) -> SyncResult<T> {
        self.take_with(Wait::Forever, Some(cancel))
    }

    /// Like [`take`](Self::take) but gives up with [`SyncError::TimedOut`]
    /// after `timeout`.
    ///
    /// # Errors
    ///
    /// See [`take`](Self::take).
    pub fn take_timeout(&self, timeout: Duration, cancel: &CancelToken) -> SyncResult<T> {
        self.take_with(Wait::within(timeout), Some(cancel))
    }

    /// Removes the oldest item only if one is available right now.
    ///
    /// # Errors
    ///
    /// [`SyncError::WouldBlock`] when empty, [`SyncError::Closed`] when
    /// closed and drained.
    pub fn try_take(&self) -> SyncResult<T> {
        self.take_with(Wait::Never, None)
    }

    fn put_with(
        &self,
        item: T,
        wait: Wait,
        cancel: Option<&CancelToken>,
    ) -> Result<(), Rejected<T>> {
        let capacity = self.inner.capacity;
        let mut slot = Some(item);

        let outcome = self.run(&self.inner.not_full, &self.inner.not_empty, wait, cancel, |state| {
            if state.closed {
                return Attempt::Failed(SyncError::Closed);
            }
            if state.items.len() >= capacity {
                return Attempt::Blocked;
            }
            if let Some(item) = slot.take() {
                state.items.push_back(item);
            }
            Attempt::Done(())
        });

        match (outcome, slot) {
            (Err(error), Some(item)) => Err(Rejected::new(item, error)),
            _ => Ok(()),
        }
    }

    fn take_with(&self, wait: Wait, cancel: Option<&CancelToken>) -> SyncResult<T> {
        self.run(&self.inner.not_empty, &self.inner.not_full, wait, cancel, |state| {
            match state.items.pop_front() {
                Some(item) => Attempt::Done(item),
                None if state.closed => Attempt::Failed(SyncError::Closed),
                None => Attempt::Blocked,
            }
        })
    }

    /// Runs `attempt` under the lock until it completes, parking on
    /// `park_on` between tries and signalling `wake_up` on success.
    fn run<R>(
        &self,
        park_on: &Condvar,
        wake_up: &Condvar,
        wait: Wait,
        cancel: Option<&CancelToken>,
        mut attempt: impl FnMut(&mut State<T>) -> Attempt<R>,
    ) -> SyncResult<R> {
        let mut registration: Option<Registration<'_>> = None;
        let mut state = self.inner.state.lock()?;

        let error = loop {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                break SyncError::Cancelled;
            }

            match attempt(&mut *state) {
                Attempt::Done(value) => {
                    wake_up.notify_one();
                    return Ok(value);
                }
                Attempt::Failed(error) => break error,
                Attempt::Blocked => {}
            }

            if let Some(error) = wait.exhausted() {
                break error;
            }

            // register, then look at the token once more before sleeping
            if registration.is_none() {
                if let Some(token) = cancel {
                    registration = Some(token.register(self.waker()));
                    continue;
                }
            }

            state = wait.park(park_on, state)?;
        };

        self.pass_on(&state);
        Err(error)
    }

    /// A waiter leaving without consuming its wake-up hands it on.
    fn pass_on(&self, state: &State<T>) {
        if !state.items.is_empty() {
            self.inner.not_empty.notify_one();
        }
        if state.items.len() < self.inner.capacity && !state.closed {
            self.inner.not_full.notify_one();
        }
    }

    fn waker(&self) -> std::sync::Weak<dyn Waker + Send + Sync> {
        let inner: std::sync::Weak<Inner<T>> = Arc::downgrade(&self.inner);
        inner
    }
}

impl<T> Waker for Inner<T> {
    fn wake(&self) {
        // holding the lock orders this after the waiter's last token check
        let _state = self.state.lock();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.snapshot();
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.inner.capacity)
            .field("len", &state.items.len())
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::thread;

    /// WHY: a queue that can never hold anything would deadlock producers
    /// WHAT: zero capacity is rejected at construction
    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = BoundedQueue::<u8>::new(0).unwrap_err();
        assert_eq!(err, SyncError::InvalidConfiguration { capacity: 0 });
    }

    /// WHY: content ordering is the queue's core contract
    /// WHAT: items come out in the order they went in
    #[test]
    fn test_fifo_order() {
        let queue = BoundedQueue::new(4).unwrap();
        let cancel = CancelToken::new();

        for i in 1..=4 {
            queue.put(i, &cancel).unwrap();
        }
        assert!(queue.is_full());

        let taken: Vec<_> = (0..4).map(|_| queue.take(&cancel).unwrap()).collect();
        assert_eq!(taken, vec![1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    /// WHY: non-blocking calls must report fullness/emptiness, not wait
    /// WHAT: try_put on a full queue and try_take on an empty one would block
    #[test]
    fn test_try_variants_would_block() {
        let queue = BoundedQueue::new(1).unwrap();

        assert_eq!(queue.try_take().unwrap_err(), SyncError::WouldBlock);
        queue.try_put('a').unwrap();

        let rejected = queue.try_put('b').unwrap_err();
        assert_eq!(rejected.error(), SyncError::WouldBlock);
        assert_eq!(rejected.into_inner(), 'b');
        assert_eq!(queue.try_take().unwrap(), 'a');
    }

    /// WHY: a fired token must never be followed by a false success
    /// WHAT: put with a cancelled token hands the item back even with room
    #[test]
    fn test_cancelled_token_rejects_before_effect() {
        let queue = BoundedQueue::new(2).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let rejected = queue.put(7, &cancel).unwrap_err();
        assert_eq!(rejected.error(), SyncError::Cancelled);
        assert_eq!(rejected.into_inner(), 7);
        assert!(queue.is_empty());

        queue.try_put(8).unwrap();
        assert_eq!(queue.take(&cancel).unwrap_err(), SyncError::Cancelled);
        assert_eq!(queue.len(), 1);
    }

    /// WHY: close is the graceful shutdown path for consumers
    /// WHAT: puts fail after close, takes drain what is left then fail
    #[test]
    fn test_close_drains_then_fails() {
        let queue = BoundedQueue::new(3).unwrap();
        let cancel = CancelToken::new();
        queue.put("a", &cancel).unwrap();
        queue.put("b", &cancel).unwrap();

        assert!(queue.close());
        assert!(!queue.close());
        assert!(queue.is_closed());

        let rejected = queue.put("c", &cancel).unwrap_err();
        assert_eq!(rejected.error(), SyncError::Closed);

        assert_eq!(queue.take(&cancel).unwrap(), "a");
        assert_eq!(queue.take(&cancel).unwrap(), "b");
        assert_eq!(queue.take(&cancel).unwrap_err(), SyncError::Closed);
    }

    /// WHY: deadline variants must give up instead of blocking forever
    /// WHAT: take_timeout on empty and put_timeout on full time out
    #[test]
    #[serial]
    #[ntest::timeout(5000)]
    fn test_timeouts_expire() {
        let queue = BoundedQueue::new(1).unwrap();
        let cancel = CancelToken::new();

        let err = queue.take_timeout(Duration::from_millis(20), &cancel).unwrap_err();
        assert_eq!(err, SyncError::TimedOut);

        queue.put(1, &cancel).unwrap();
        let rejected = queue
            .put_timeout(2, Duration::from_millis(20), &cancel)
            .unwrap_err();
        assert_eq!(rejected.error(), SyncError::TimedOut);
        assert_eq!(rejected.into_inner(), 2);
    }

    /// WHY: closing must release workers that are already parked
    /// WHAT: a consumer blocked on an empty queue returns Closed
    #[test]
    #[ntest::timeout(5000)]
    fn test_close_wakes_blocked_consumer() {
        let queue = BoundedQueue::<u32>::new(1).unwrap();
        let cancel = CancelToken::new();

        let consumer = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            thread::spawn(move || queue.take(&cancel))
        };

        thread::sleep(Duration::from_millis(50));
        queue.close();
        assert_eq!(consumer.join().unwrap().unwrap_err(), SyncError::Closed);
    }

    /// WHY: blocked waiters must unregister from the token when they leave
    /// WHAT: after a blocked take is cancelled the token has no waiters
    #[test]
    #[ntest::timeout(5000)]
    fn test_registration_is_released() {
        let queue = BoundedQueue::<u32>::new(1).unwrap();
        let cancel = CancelToken::new();

        let consumer = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            thread::spawn(move || queue.take(&cancel))
        };

        while cancel.waiting() == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        cancel.cancel();

        assert_eq!(consumer.join().unwrap().unwrap_err(), SyncError::Cancelled);
        assert_eq!(cancel.waiting(), 0);
    }
}
