//! Workers that drive the `foundation_sync` queue and guard.
//!
//! The primitives never log; every produce/consume/read/write event and
//! every stop reason is reported here through `tracing`.

use derive_more::derive::From;
use foundation_sync::SyncError;

pub mod config;
pub mod demo;
pub mod drivers;
mod group;

pub use drivers::{
    Consumer, Exit, Pause, Producer, Reader, Role, Worker, WorkerReport, Writer,
};
pub use group::WorkerGroup;

#[derive(Debug, From)]
pub enum WorkerError {
    /// A worker thread could not be spawned.
    Spawn(std::io::Error),

    Sync(SyncError),
}

impl std::error::Error for WorkerError {}

impl core::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

pub type WorkerResult<T> = std::result::Result<T, WorkerError>;
