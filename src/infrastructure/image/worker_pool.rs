//! Fixed-size pool of async execution slots.
//!
//! The pool is started lazily on the first submission. Tasks are queued FIFO
//! and a dispatcher hands each one a semaphore permit before spawning it, so
//! at most `size` tasks run at once.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, trace};

use crate::domain::errors::{CacheError, CacheResult};

/// Default number of concurrent tasks.
pub const DEFAULT_POOL_SIZE: usize = 3;

type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type FaultHandler = Box<dyn FnOnce(String) + Send + 'static>;

struct Job {
    task: BoxedTask,
    on_fault: FaultHandler,
}

/// What happens to queued and running tasks on shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Queued and running tasks are allowed to finish.
    #[default]
    Graceful,
    /// Queued tasks are dropped and running tasks are aborted.
    Abort,
}

enum PoolState {
    Idle,
    Running {
        job_tx: mpsc::UnboundedSender<Job>,
        dispatcher: JoinHandle<()>,
    },
    ShutDown,
}

/// Bounded pool running fetch tasks off the caller's thread.
pub struct WorkerPool {
    size: usize,
    policy: ShutdownPolicy,
    runtime: Handle,
    state: Mutex<PoolState>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("policy", &self.policy)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Creates a pool that will spawn its tasks on `runtime`.
    ///
    /// Nothing is spawned until the first [`submit`](Self::submit).
    #[must_use]
    pub fn new(size: usize, policy: ShutdownPolicy, runtime: Handle) -> Self {
        Self {
            size: size.max(1),
            policy,
            runtime,
            state: Mutex::new(PoolState::Idle),
        }
    }

    /// Returns the number of execution slots.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Returns true once the dispatcher has been started and not shut down.
    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(*self.state.lock(), PoolState::Running { .. })
    }

    /// Returns true after [`shutdown`](Self::shutdown).
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        matches!(*self.state.lock(), PoolState::ShutDown)
    }

    /// Queues a task.
    ///
    /// If the task panics, the panic is contained, logged and passed to
    /// `on_fault`; other tasks keep running.
    ///
    /// # Errors
    /// Returns `PoolShutDown` if the pool no longer accepts work.
    pub fn submit<F, H>(&self, task: F, on_fault: H) -> CacheResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
        H: FnOnce(String) + Send + 'static,
    {
        let job = Job {
            task: Box::pin(task),
            on_fault: Box::new(on_fault),
        };

        let mut state = self.state.lock();
        if matches!(*state, PoolState::Idle) {
            let (job_tx, job_rx) = mpsc::unbounded_channel();
            let semaphore = Arc::new(Semaphore::new(self.size));
            let dispatcher = self
                .runtime
                .spawn(Self::run_dispatcher(job_rx, semaphore));
            info!(size = self.size, "Started worker pool");
            *state = PoolState::Running { job_tx, dispatcher };
        }

        match &*state {
            PoolState::Running { job_tx, .. } => {
                job_tx.send(job).map_err(|_| CacheError::PoolShutDown)?;
                trace!("Queued worker task");
                Ok(())
            }
            PoolState::Idle | PoolState::ShutDown => Err(CacheError::PoolShutDown),
        }
    }

    /// Stops accepting work. Idempotent.
    pub fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), PoolState::ShutDown);
        match previous {
            PoolState::Running { job_tx, dispatcher } => {
                drop(job_tx);
                if self.policy == ShutdownPolicy::Abort {
                    dispatcher.abort();
                }
                info!(policy = ?self.policy, "Shut down worker pool");
            }
            PoolState::Idle => debug!("Shut down worker pool before it started"),
            PoolState::ShutDown => trace!("Worker pool already shut down"),
        }
    }

    /// Dispatcher loop: hands queued jobs to free slots.
    ///
    /// Running tasks live in a `JoinSet`, so aborting the dispatcher aborts
    /// them too.
    async fn run_dispatcher(mut job_rx: mpsc::UnboundedReceiver<Job>, semaphore: Arc<Semaphore>) {
        let mut running = JoinSet::new();

        loop {
            tokio::select! {
                job = job_rx.recv() => {
                    let Some(job) = job else { break };
                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                        break;
                    };
                    running.spawn(async move {
                        let Job { task, on_fault } = job;
                        if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                            let message = panic_message(panic.as_ref());
                            error!(error = %message, "Worker task panicked");
                            on_fault(message);
                        }
                        drop(permit);
                    });
                }
                Some(joined) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Worker task failed to complete");
                    }
                }
            }
        }

        while running.join_next().await.is_some() {}
        debug!("Worker pool dispatcher stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
