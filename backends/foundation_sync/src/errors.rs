//! Error types shared by the queue and the guard.

use core::fmt;

use thiserror::Error;

pub type SyncResult<T> = core::result::Result<T, SyncError>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    /// A queue was asked to hold zero items.
    #[error("invalid configuration: capacity must be at least 1, got {capacity}")]
    InvalidConfiguration { capacity: usize },

    /// The caller's [`CancelToken`](crate::CancelToken) fired before or
    /// while the operation was waiting.
    #[error("operation was cancelled")]
    Cancelled,

    /// The wait was torn down by something other than the caller's token,
    /// which today means a peer panicked while holding the primitive's
    /// internal lock.
    #[error("wait was interrupted: internal lock poisoned by a panicking worker")]
    InterruptedWait,

    /// The queue was closed and no item can be accepted or returned.
    #[error("queue is closed")]
    Closed,

    #[error("operation timed out")]
    TimedOut,

    /// Returned by the `try_*` family when the operation would have blocked.
    #[error("operation would block")]
    WouldBlock,

    /// A writer panicked inside its section, the guarded value may be torn.
    #[error("guarded value is poisoned by a panicking writer")]
    Poisoned,
}

impl SyncError {
    /// Returns true for the errors a worker should read as "stop working":
    /// explicit cancellation and an interrupted wait.
    #[must_use]
    pub fn is_stop(&self) -> bool {
        matches!(self, SyncError::Cancelled | SyncError::InterruptedWait)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, SyncError::Closed)
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, SyncError::TimedOut)
    }
}

impl<G> From<std::sync::PoisonError<G>> for SyncError {
    fn from(_: std::sync::PoisonError<G>) -> Self {
        SyncError::InterruptedWait
    }
}

/// A failed `put`/`write_value` style call.
///
/// Carries the caller's value back so nothing is lost when an operation is
/// cancelled, times out or hits a closed queue.
#[derive(Error, PartialEq, Eq)]
#[error("{error}")]
pub struct Rejected<T> {
    pub value: T,
    pub error: SyncError,
}

impl<T> Rejected<T> {
    pub fn new(value: T, error: SyncError) -> Self {
        Self { value, error }
    }

    #[must_use]
    pub fn error(&self) -> SyncError {
        self.error
    }

    /// Consumes the error, returning the rejected value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

// Manual impl so `Rejected<T>` stays `Debug` for any `T`.
impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> From<Rejected<T>> for SyncError {
    fn from(value: Rejected<T>) -> Self {
        value.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// WHY: workers rely on `is_stop` to treat both stop causes the same way
    /// WHAT: Cancelled and InterruptedWait are stops, everything else is not
    #[test]
    fn test_stop_classification() {
        assert!(SyncError::Cancelled.is_stop());
        assert!(SyncError::InterruptedWait.is_stop());
        assert!(!SyncError::Closed.is_stop());
        assert!(!SyncError::TimedOut.is_stop());
        assert!(!SyncError::WouldBlock.is_stop());
        assert!(!SyncError::Poisoned.is_stop());
    }

    /// WHY: a poisoned std mutex must surface as an interrupted wait
    /// WHAT: From<PoisonError> maps to InterruptedWait
    #[test]
    fn test_poison_maps_to_interrupted_wait() {
        let err: SyncError = std::sync::PoisonError::new(()).into();
        assert_eq!(err, SyncError::InterruptedWait);
    }

    /// WHY: rejected values must be recoverable by the caller
    /// WHAT: into_inner hands back the value, Display shows the cause
    #[test]
    fn test_rejected_hands_value_back() {
        let rejected = Rejected::new(String::from("abcde"), SyncError::Closed);
        assert_eq!(rejected.to_string(), "queue is closed");
        assert_eq!(rejected.error(), SyncError::Closed);
        assert_eq!(rejected.into_inner(), "abcde");
    }
}
