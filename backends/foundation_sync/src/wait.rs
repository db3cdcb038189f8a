//! How long a blocking call is willing to wait.

use std::sync::{Condvar, MutexGuard};
use std::time::{Duration, Instant};

use crate::SyncError;

/// Wait policy of a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wait {
    /// `try_*` calls: fail with [`SyncError::WouldBlock`] instead of waiting.
    Never,
    Forever,
    Until(Instant),
}

impl Wait {
    /// Waits at most `timeout` from now. A timeout too large to represent
    /// as an `Instant` waits forever.
    pub(crate) fn within(timeout: Duration) -> Self {
        Instant::now()
            .checked_add(timeout)
            .map_or(Wait::Forever, Wait::Until)
    }

    /// Returns the error to fail with if the caller may not wait any longer.
    pub(crate) fn exhausted(&self) -> Option<SyncError> {
        match self {
            Wait::Never => Some(SyncError::WouldBlock),
            Wait::Forever => None,
            Wait::Until(deadline) if Instant::now() >= *deadline => Some(SyncError::TimedOut),
            Wait::Until(_) => None,
        }
    }

    /// Parks on `cond`, releasing `guard` while asleep and reacquiring it
    /// before returning. Callers re-check their predicate afterwards since
    /// wake-ups may be spurious or stale.
    pub(crate) fn park<'a, S>(
        &self,
        cond: &Condvar,
        guard: MutexGuard<'a, S>,
    ) -> Result<MutexGuard<'a, S>, SyncError> {
        match self {
            Wait::Never => Ok(guard),
            Wait::Forever => Ok(cond.wait(guard)?),
            Wait::Until(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let (guard, _) = cond.wait_timeout(guard, remaining)?;
                Ok(guard)
            }
        }
    }
}
