// Implements a cancellation signal that can be threaded through every
// blocking call of the queue and the guard.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

/// Anything a [`CancelToken`] can wake when it fires.
///
/// Primitives implement this by taking their own lock before notifying
/// their waiters, which orders the wake-up after any waiter's last look
/// at the token.
pub trait Waker {
    fn wake(&self);
}

type WeakWaker = Weak<dyn Waker + Send + Sync>;

/// `CancelToken` is a clonable stop signal shared by a harness and its
/// workers.
///
/// All clones observe the same signal. Firing it wakes every primitive
/// that currently has a blocked call registered against the token, so the
/// call can return [`SyncError::Cancelled`](crate::SyncError::Cancelled)
/// instead of waiting forever.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: AtomicBool,
    next_id: AtomicU64,

    /// Wakers of the primitives with a call currently blocked on this token.
    registry: Mutex<Vec<(u64, WeakWaker)>>,

    /// Lets threads sleep on the token itself (see [`CancelToken::wait_timeout`]).
    event: Condvar,
}

impl Default for TokenInner {
    fn default() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            registry: Mutex::new(Vec::new()),
            event: Condvar::new(),
        }
    }
}

impl TokenInner {
    // The registry holds no invariant a panic could break, so a poisoned
    // lock is recovered rather than reported.
    fn registry(&self) -> MutexGuard<'_, Vec<(u64, WeakWaker)>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token.
    ///
    /// Returns `true` for the call that actually fired it and `false` if it
    /// was already cancelled.
    pub fn cancel(&self) -> bool {
        if self
            .inner
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        // snapshot under the registry lock, wake outside of it: a waker
        // takes its primitive's lock and waiters register while holding it.
        let wakers: Vec<_> = {
            let registry = self.inner.registry();
            self.inner.event.notify_all();
            registry.iter().filter_map(|(_, waker)| waker.upgrade()).collect()
        };

        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Returns true once the token has fired.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleeps for up to `duration`, returning early when the token fires.
    ///
    /// Returns `true` if the token was cancelled.
    #[must_use]
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(duration) else {
            self.wait();
            return true;
        };

        let mut registry = self.inner.registry();
        loop {
            if self.is_cancelled() {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            registry = match self.inner.event.wait_timeout(registry, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Blocks the current thread until the token fires.
    pub fn wait(&self) {
        let mut registry = self.inner.registry();
        while !self.is_cancelled() {
            registry = self
                .inner
                .event
                .wait(registry)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Registers `waker` to be woken if the token fires while the returned
    /// [`Registration`] is alive.
    pub(crate) fn register(&self, waker: WeakWaker) -> Registration<'_> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.registry().push((id, waker));
        Registration { token: self, id }
    }

    /// Number of blocked calls currently registered against this token.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.inner.registry().len()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Removes its waker from the token's registry when dropped.
pub(crate) struct Registration<'a> {
    token: &'a CancelToken,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let id = self.id;
        self.token.inner.registry().retain(|(entry, _)| *entry != id);
    }
}
