//! Thin loops that drive a queue or a guard until told to stop.
//!
//! Every driver pauses for a random time in `[0, max_pause)` around its
//! operation. Pauses sleep on the worker's [`CancelToken`], so a stop
//! request ends them immediately.

use core::fmt;
use std::time::Duration;

use foundation_sync::{BoundedQueue, CancelToken, ReadWriteGuard, SyncError};

/// What kind of work a driver does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Producer,
    Consumer,
    Reader,
    Writer,
}

impl Role {
    /// Prefix of the default worker names (`ProdThread_0`, `Reader_2`, ...).
    #[must_use]
    pub fn default_name(self, index: usize) -> String {
        match self {
            Role::Producer => format!("ProdThread_{index}"),
            Role::Consumer => format!("ConsThread_{index}"),
            Role::Reader => format!("Reader_{index}"),
            Role::Writer => format!("Writer_{index}"),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Producer => "producer",
            Role::Consumer => "consumer",
            Role::Reader => "reader",
            Role::Writer => "writer",
        };
        f.write_str(label)
    }
}

/// Why a driver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The worker's token fired.
    Cancelled,
    /// The queue was closed (and, for consumers, drained).
    Closed,
    /// The worker reached its operation limit.
    Completed,
    Failed(SyncError),
    /// The worker thread panicked; only produced by
    /// [`WorkerGroup::join`](crate::WorkerGroup::join).
    Panicked,
}

impl Exit {
    fn from_error(error: SyncError) -> Self {
        match error {
            SyncError::Cancelled => Exit::Cancelled,
            SyncError::Closed => Exit::Closed,
            other => Exit::Failed(other),
        }
    }
}

/// Summary a driver hands back when its loop ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub name: String,
    pub role: Role,
    /// Operations that took effect.
    pub operations: usize,
    pub exit: Exit,
}

impl fmt::Display for WorkerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {} operations, exit {:?}",
            self.name, self.role, self.operations, self.exit
        )
    }
}

/// A driver that can be handed to a [`WorkerGroup`](crate::WorkerGroup).
pub trait Worker: Send + 'static {
    fn name(&self) -> &str;

    fn role(&self) -> Role;

    /// Runs the worker's loop on the current thread until it stops.
    fn run(self, cancel: &CancelToken) -> WorkerReport;
}

/// Random, cancellable pause in `[0, max)`.
#[derive(Debug, Clone)]
pub struct Pause {
    max: Duration,
    rng: fastrand::Rng,
}

impl Pause {
    #[must_use]
    pub fn new(max: Duration) -> Self {
        Self {
            max,
            rng: fastrand::Rng::new(),
        }
    }

    /// A pause that never sleeps.
    #[must_use]
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Picks the next pause length.
    pub fn next_duration(&mut self) -> Duration {
        let max_nanos = u64::try_from(self.max.as_nanos()).unwrap_or(u64::MAX);
        if max_nanos == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.rng.u64(0..max_nanos))
    }

    /// Sleeps for a random time unless `cancel` fires first.
    ///
    /// Returns `true` if the worker should stop.
    pub fn sleep(&mut self, cancel: &CancelToken) -> bool {
        let duration = self.next_duration();
        if duration.is_zero() {
            return cancel.is_cancelled();
        }
        cancel.wait_timeout(duration)
    }
}

struct Common {
    name: String,
    role: Role,
    pause: Pause,
    limit: Option<usize>,
    operations: usize,
}

impl Common {
    fn new(role: Role, name: String) -> Self {
        Self {
            name,
            role,
            pause: Pause::none(),
            limit: None,
            operations: 0,
        }
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.operations >= limit)
    }

    fn finish(self, exit: Exit) -> WorkerReport {
        match exit {
            Exit::Completed => tracing::debug!(
                worker = %self.name,
                operations = self.operations,
                "operation limit reached, stopping"
            ),
            Exit::Failed(error) if error.is_stop() => tracing::debug!(
                worker = %self.name,
                %error,
                "wait interrupted, stopping"
            ),
            Exit::Failed(error) => tracing::warn!(
                worker = %self.name,
                %error,
                "operation failed, stopping"
            ),
            other => tracing::debug!(worker = %self.name, exit = ?other, "stopping"),
        }

        WorkerReport {
            name: self.name,
            role: self.role,
            operations: self.operations,
            exit,
        }
    }
}

macro_rules! builder_methods {
    () => {
        /// Overrides the default worker name.
        #[must_use]
        pub fn named(mut self, name: impl Into<String>) -> Self {
            self.common.name = name.into();
            self
        }

        /// Sets the upper bound of the random pause around each operation.
        #[must_use]
        pub fn max_pause(mut self, max: Duration) -> Self {
            self.common.pause = Pause::new(max);
            self
        }

        /// Stops with [`Exit::Completed`] after `operations` successful
        /// operations.
        #[must_use]
        pub fn limit(mut self, operations: usize) -> Self {
            self.common.limit = Some(operations);
            self
        }
    };
}

/// Pauses, generates an item and puts it into the queue, repeatedly.
pub struct Producer<T, G> {
    common: Common,
    queue: BoundedQueue<T>,
    generate: G,
}

impl<T, G> Producer<T, G>
where
    T: fmt::Debug + Send + 'static,
    G: FnMut() -> T + Send + 'static,
{
    pub fn new(index: usize, queue: BoundedQueue<T>, generate: G) -> Self {
        Self {
            common: Common::new(Role::Producer, Role::Producer.default_name(index)),
            queue,
            generate,
        }
    }

    builder_methods!();
}

impl<T, G> Worker for Producer<T, G>
where
    T: fmt::Debug + Send + 'static,
    G: FnMut() -> T + Send + 'static,
{
    fn name(&self) -> &str {
        &self.common.name
    }

    fn role(&self) -> Role {
        Role::Producer
    }

    fn run(mut self, cancel: &CancelToken) -> WorkerReport {
        let exit = loop {
            if self.common.limit_reached() {
                break Exit::Completed;
            }
            if self.common.pause.sleep(cancel) {
                break Exit::Cancelled;
            }

            let item = (self.generate)();
            let shown = format!("{item:?}");
            match self.queue.put(item, cancel) {
                Ok(()) => {
                    self.common.operations += 1;
                    tracing::info!(
                        worker = %self.common.name,
                        item = %shown,
                        queue_len = self.queue.len(),
                        "produced"
                    );
                }
                Err(rejected) => {
                    tracing::debug!(worker = %self.common.name, item = %shown, "item not queued");
                    break Exit::from_error(rejected.error());
                }
            }
        };
        self.common.finish(exit)
    }
}

type Sink<T> = Box<dyn FnMut(T) + Send>;

/// Takes items off the queue and processes them, pausing after each one.
///
/// Keeps draining a closed queue and stops with [`Exit::Closed`] once it
/// is empty.
pub struct Consumer<T> {
    common: Common,
    queue: BoundedQueue<T>,
    sink: Option<Sink<T>>,
}

impl<T> Consumer<T>
where
    T: fmt::Debug + Send + 'static,
{
    pub fn new(index: usize, queue: BoundedQueue<T>) -> Self {
        Self {
            common: Common::new(Role::Consumer, Role::Consumer.default_name(index)),
            queue,
            sink: None,
        }
    }

    /// Hands every consumed item to `sink` after it was logged.
    #[must_use]
    pub fn sink(mut self, sink: impl FnMut(T) + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    builder_methods!();
}

impl<T> Worker for Consumer<T>
where
    T: fmt::Debug + Send + 'static,
{
    fn name(&self) -> &str {
        &self.common.name
    }

    fn role(&self) -> Role {
        Role::Consumer
    }

    fn run(mut self, cancel: &CancelToken) -> WorkerReport {
        let exit = loop {
            if self.common.limit_reached() {
                break Exit::Completed;
            }

            match self.queue.take(cancel) {
                Ok(item) => {
                    self.common.operations += 1;
                    tracing::info!(
                        worker = %self.common.name,
                        item = ?item,
                        queue_len = self.queue.len(),
                        "consumed"
                    );
                    if let Some(sink) = self.sink.as_mut() {
                        sink(item);
                    }
                }
                Err(error) => break Exit::from_error(error),
            }

            // simulated processing time
            if self.common.pause.sleep(cancel) {
                break Exit::Cancelled;
            }
        };
        self.common.finish(exit)
    }
}

/// Reads a copy of the guarded value, then pauses, repeatedly.
pub struct Reader<T> {
    common: Common,
    guard: ReadWriteGuard<T>,
}

impl<T> Reader<T>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
{
    pub fn new(index: usize, guard: ReadWriteGuard<T>) -> Self {
        Self {
            common: Common::new(Role::Reader, Role::Reader.default_name(index)),
            guard,
        }
    }

    builder_methods!();
}

impl<T> Worker for Reader<T>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.common.name
    }

    fn role(&self) -> Role {
        Role::Reader
    }

    fn run(mut self, cancel: &CancelToken) -> WorkerReport {
        let exit = loop {
            if self.common.limit_reached() {
                break Exit::Completed;
            }

            match self.guard.read_value(cancel) {
                Ok(value) => {
                    self.common.operations += 1;
                    tracing::info!(worker = %self.common.name, value = ?value, "read");
                }
                Err(error) => break Exit::from_error(error),
            }

            if self.common.pause.sleep(cancel) {
                break Exit::Cancelled;
            }
        };
        self.common.finish(exit)
    }
}

/// Computes a new value and writes it into the guard, then pauses,
/// repeatedly.
pub struct Writer<T, G> {
    common: Common,
    guard: ReadWriteGuard<T>,
    generate: G,
}

impl<T, G> Writer<T, G>
where
    T: fmt::Debug + Send + Sync + 'static,
    G: FnMut() -> T + Send + 'static,
{
    pub fn new(index: usize, guard: ReadWriteGuard<T>, generate: G) -> Self {
        Self {
            common: Common::new(Role::Writer, Role::Writer.default_name(index)),
            guard,
            generate,
        }
    }

    builder_methods!();
}

impl<T, G> Worker for Writer<T, G>
where
    T: fmt::Debug + Send + Sync + 'static,
    G: FnMut() -> T + Send + 'static,
{
    fn name(&self) -> &str {
        &self.common.name
    }

    fn role(&self) -> Role {
        Role::Writer
    }

    fn run(mut self, cancel: &CancelToken) -> WorkerReport {
        let exit = loop {
            if self.common.limit_reached() {
                break Exit::Completed;
            }

            let value = (self.generate)();
            let shown = format!("{value:?}");
            match self.guard.write_value(value, cancel) {
                Ok(()) => {
                    self.common.operations += 1;
                    tracing::info!(worker = %self.common.name, value = %shown, "wrote");
                }
                Err(rejected) => break Exit::from_error(rejected.error()),
            }

            if self.common.pause.sleep(cancel) {
                break Exit::Cancelled;
            }
        };
        self.common.finish(exit)
    }
}

/// Item generator producing `len` random lowercase ASCII letters.
pub fn random_letters(len: usize) -> impl FnMut() -> String + Send + 'static {
    let mut rng = fastrand::Rng::new();
    move || (0..len).map(|_| rng.lowercase()).collect()
}

/// Value generator producing integers in `[0, max)`.
///
/// A `max` of zero always yields zero.
pub fn random_below(max: u64) -> impl FnMut() -> u64 + Send + 'static {
    let mut rng = fastrand::Rng::new();
    move || if max == 0 { 0 } else { rng.u64(0..max) }
}
