//! Instrumented wrappers used by the stress runners.

pub mod instrumented;

pub use instrumented::{GuardObservations, InstrumentedGuard};
