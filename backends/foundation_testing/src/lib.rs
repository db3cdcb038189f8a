//! Reusable stress testing infrastructure for the `foundation_sync` primitives.
//!
//! This crate provides:
//! - **Stress test framework**: configurable high-contention runs whose time
//!   limit is enforced through a [`CancelToken`](foundation_sync::CancelToken)
//! - **Queue and guard runners**: loss/duplication and capacity checks for
//!   [`BoundedQueue`](foundation_sync::BoundedQueue), exclusion checks for
//!   [`ReadWriteGuard`](foundation_sync::ReadWriteGuard)
//! - **Instrumented guard**: counts exclusion violations as they happen
//! - **Criterion benchmarks**: queue throughput and guard read/write paths
//!
//! # Examples
//!
//! ```rust
//! use foundation_testing::stress::{StressConfig, sync::run_guard_stress};
//!
//! let config = StressConfig::new().threads(60).total_operations(10_000);
//! let result = run_guard_stress(config, 50, 10);
//!
//! assert!(result.run.successes >= 10_000);
//! assert_eq!(result.observations.violations, 0);
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Common for testing crates

pub mod scenarios;
pub mod stress;

pub use scenarios::{GuardObservations, InstrumentedGuard};
pub use stress::{StressConfig, StressHarness, StressResult};
