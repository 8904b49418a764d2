//! Fixed-size worker pool
//!
//! `size` named threads pull boxed jobs from a shared crossbeam channel.
//! Submission never blocks (the job channel is unbounded; the bank queue in
//! front of the pool is what bounds in-flight work).
//!
//! Shutdown happens in two phases:
//!
//! 1. **Drain**: the job sender is dropped so no new work is accepted, and
//!    the caller waits up to a grace period for the workers to empty the
//!    channel and exit.
//! 2. **Force**: if the grace period runs out, the abort flag is raised and
//!    every job still in the channel is drained and dropped. A job already
//!    running cannot be interrupted, so its thread is detached.
//!
//! A panicking job is caught and logged; its worker keeps serving the pool.

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Error, PartialEq)]
pub enum PoolError {
    #[error("Worker pool is shut down")]
    ShutDown,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Result of [`WorkerPool::shutdown`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReport {
    /// Every submitted job ran and every worker exited in time
    Graceful,

    /// The grace period elapsed
    Forced {
        /// Jobs dropped without running
        discarded: usize,
        /// Workers still busy and left detached
        detached: usize,
    },
}

#[derive(Default)]
struct Shared {
    aborted: AtomicBool,
    discarded: AtomicUsize,
    running: AtomicUsize,
    live_workers: Mutex<usize>,
    exited: Condvar,
}

/// Fixed set of worker threads executing submitted closures
pub struct WorkerPool {
    name: String,
    sender: Option<Sender<Job>>,
    receiver: Receiver<Job>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Start `size` workers named `<name>-worker-<n>`
    pub fn new(name: &str, size: usize) -> Result<Self, PoolError> {
        let (sender, receiver) = channel::unbounded::<Job>();
        let shared = Arc::new(Shared::default());

        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = receiver.clone();
            let shared_for_worker = Arc::clone(&shared);
            let pool_name = name.to_string();
            *shared.live_workers.lock() += 1;
            let spawned = std::thread::Builder::new()
                .name(format!("{}-worker-{}", name, index))
                .spawn(move || worker_loop(&pool_name, receiver, shared_for_worker));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    *shared.live_workers.lock() -= 1;
                    return Err(PoolError::Spawn(err.to_string()));
                }
            }
        }

        debug!(pool = name, size, "Worker pool started");
        Ok(Self {
            name: name.to_string(),
            sender: Some(sender),
            receiver,
            workers,
            shared,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Jobs currently executing
    pub fn running(&self) -> usize {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Jobs waiting for a free worker
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }

    /// Hand `job` to the pool without waiting for it to run
    pub fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolError::ShutDown)?;
        sender.send(Box::new(job)).map_err(|_| PoolError::ShutDown)
    }

    /// Stop accepting work, drain for up to `grace`, then force
    pub fn shutdown(&mut self, grace: Duration) -> ShutdownReport {
        // Dropping the sender disconnects the channel once it is empty.
        self.sender = None;

        let deadline = Instant::now() + grace;
        let mut live = self.shared.live_workers.lock();
        while *live > 0 {
            if self.shared.exited.wait_until(&mut live, deadline).timed_out() {
                break;
            }
        }
        let remaining = *live;
        drop(live);

        if remaining == 0 {
            for handle in self.workers.drain(..) {
                let _ = handle.join();
            }
            debug!(pool = %self.name, "Worker pool drained");
            return ShutdownReport::Graceful;
        }

        self.shared.aborted.store(true, Ordering::SeqCst);
        let drained = self.receiver.try_iter().count();
        self.shared.discarded.fetch_add(drained, Ordering::SeqCst);

        let mut detached = 0;
        for handle in self.workers.drain(..) {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                detached += 1;
            }
        }
        let discarded = self.shared.discarded.load(Ordering::SeqCst);
        warn!(pool = %self.name, discarded, detached, "Worker pool shutdown forced");
        ShutdownReport::Forced {
            discarded,
            detached,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Disconnect so idle workers exit; never block in drop.
        self.sender = None;
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("size", &self.workers.len())
            .field("accepting", &self.sender.is_some())
            .finish()
    }
}

fn worker_loop(pool: &str, receiver: Receiver<Job>, shared: Arc<Shared>) {
    while let Ok(job) = receiver.recv() {
        if shared.aborted.load(Ordering::SeqCst) {
            shared.discarded.fetch_add(1, Ordering::SeqCst);
            continue;
        }
        shared.running.fetch_add(1, Ordering::SeqCst);
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!(pool, "Job panicked; worker continues");
        }
        shared.running.fetch_sub(1, Ordering::SeqCst);
    }

    let mut live = shared.live_workers.lock();
    *live -= 1;
    shared.exited.notify_all();
}
