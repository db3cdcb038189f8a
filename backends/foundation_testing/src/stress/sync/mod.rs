//! Stress runs for the `foundation_sync` primitives.

use foundation_sync::SyncError;

pub mod guard;
pub mod queue;

pub use guard::{run_guard_stress, GuardStressResult};
pub use queue::{run_queue_cancellation_stress, run_queue_stress, QueueStressResult};

#[derive(Debug, derive_more::From)]
pub enum StressError {
    Sync(SyncError),

    #[from(ignore)]
    NoConsumers,
}

impl std::error::Error for StressError {}

impl core::fmt::Display for StressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
