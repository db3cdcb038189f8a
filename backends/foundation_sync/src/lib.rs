//! Blocking coordination primitives built on [`std::sync::Mutex`] and
//! [`std::sync::Condvar`]:
//!
//! - [`BoundedQueue`]: a fixed-capacity FIFO buffer whose producers block
//!   while it is full and whose consumers block while it is empty.
//! - [`ReadWriteGuard`]: a single value shared by many concurrent readers
//!   or one exclusive writer, preferring writers.
//!
//! Every blocking call takes a [`CancelToken`]. Firing the token wakes the
//! call and makes it return [`SyncError::Cancelled`] without having taken
//! effect, so a harness can stop all of its workers without leaving any of
//! them parked forever.
//!
//! The crate never logs; callers decide what an outcome is worth reporting.

mod cancel;
mod errors;
mod guard;
mod queue;
mod wait;

pub use cancel::{CancelToken, Waker};
pub use errors::{Rejected, SyncError, SyncResult};
pub use guard::{GuardState, ReadSection, ReadWriteGuard, WriteSection};
pub use queue::BoundedQueue;
