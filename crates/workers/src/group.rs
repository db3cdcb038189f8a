use std::thread::{self, JoinHandle};

use foundation_sync::CancelToken;

use crate::drivers::{Exit, Role, Worker, WorkerReport};
use crate::WorkerResult;

struct Running {
    name: String,
    role: Role,
    handle: JoinHandle<WorkerReport>,
}

/// `WorkerGroup` runs workers on named OS threads that share one
/// [`CancelToken`].
///
/// [`stop`](Self::stop) fires the token, which also wakes workers blocked
/// inside a queue or guard. Dropping a group stops it and waits for every
/// thread, so no worker outlives its group.
pub struct WorkerGroup {
    cancel: CancelToken,
    running: Vec<Running>,
}

impl Default for WorkerGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::with_token(CancelToken::new())
    }

    /// Builds a group around an existing token, e.g. one a Ctrl-C handler
    /// already holds.
    #[must_use]
    pub fn with_token(cancel: CancelToken) -> Self {
        Self {
            cancel,
            running: Vec::new(),
        }
    }

    #[must_use]
    pub fn token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.running.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Starts `worker` on a thread named after it.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread could not be spawned.
    pub fn spawn<W: Worker>(&mut self, worker: W) -> WorkerResult<()> {
        let name = worker.name().to_owned();
        let role = worker.role();
        let cancel = self.cancel.clone();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker.run(&cancel))?;

        tracing::debug!(worker = %name, %role, "worker started");
        self.running.push(Running { name, role, handle });
        Ok(())
    }

    /// Fires the shared token. Returns `true` if this call fired it.
    pub fn stop(&self) -> bool {
        self.cancel.cancel()
    }

    /// Waits for every worker and returns their reports in spawn order.
    ///
    /// Does not stop the workers; call [`stop`](Self::stop) first unless
    /// they end on their own.
    #[must_use]
    pub fn join(mut self) -> Vec<WorkerReport> {
        Self::join_all(std::mem::take(&mut self.running))
    }

    /// Stops the group and waits for every worker.
    #[must_use]
    pub fn shutdown(self) -> Vec<WorkerReport> {
        self.stop();
        self.join()
    }

    fn join_all(running: Vec<Running>) -> Vec<WorkerReport> {
        running
            .into_iter()
            .map(|Running { name, role, handle }| {
                handle.join().unwrap_or_else(|_| {
                    tracing::error!(worker = %name, "worker panicked");
                    WorkerReport {
                        name,
                        role,
                        operations: 0,
                        exit: Exit::Panicked,
                    }
                })
            })
            .collect()
    }
}

impl Drop for WorkerGroup {
    fn drop(&mut self) {
        if self.running.is_empty() {
            return;
        }
        self.stop();
        let _ = Self::join_all(std::mem::take(&mut self.running));
    }
}
