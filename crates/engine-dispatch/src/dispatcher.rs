//! The affinity dispatcher.
//!
//! This module:
//! - spawns one dedicated, named OS thread per dispatcher;
//! - queues closures from any caller onto that thread (global FIFO);
//! - runs closures inline when the caller already *is* that thread, so a
//!   job may call back into the dispatcher without deadlocking;
//! - bridges results and panics back to the caller.
//!
//! The actual loop lives in the `worker` module.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::types::{self, Job, JobRx, JobTx, Pending};
use crate::worker;

/// Default name of the affinity thread.
pub const DEFAULT_THREAD_NAME: &str = "engine-affinity";

/// Sender side of the queue plus the next sequence number.
///
/// Both live under one lock so sequence order is enqueue order.
struct Queue {
    tx: Option<JobTx>,
    next_seq: u64,
}

/// Runs work on a single dedicated thread.
///
/// `invoke` may be called from any thread. Jobs never run concurrently and
/// always run in the order they were enqueued. There is no timeout; use
/// [`submit`](Self::submit) and abandon the [`Pending`] for a bounded wait.
pub struct AffinityDispatcher {
    thread_id: ThreadId,
    thread_name: String,
    queue: Mutex<Queue>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AffinityDispatcher {
    /// Spawn a dispatcher whose thread is named [`DEFAULT_THREAD_NAME`].
    pub fn new() -> Result<Self, DispatchError> {
        AffinityDispatcher::with_thread_name(DEFAULT_THREAD_NAME)
    }

    pub fn with_thread_name(name: impl Into<String>) -> Result<Self, DispatchError> {
        let thread_name = name.into();
        let (job_tx, job_rx): (JobTx, JobRx) = mpsc::unbounded_channel();

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || worker::run_affinity_loop(job_rx))?;

        // Known before any job can be queued, so the re-entrancy check
        // never races the thread's startup.
        let thread_id = handle.thread().id();
        info!(thread = %thread_name, "affinity dispatcher started");

        Ok(AffinityDispatcher {
            thread_id,
            thread_name,
            queue: Mutex::new(Queue {
                tx: Some(job_tx),
                next_seq: 0,
            }),
            worker: Mutex::new(Some(handle)),
        })
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Whether the current thread is the affinity thread.
    pub fn is_affinity_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// `true` once [`shutdown`](Self::shutdown) has closed the queue.
    pub fn is_disposed(&self) -> bool {
        self.queue.lock().tx.is_none()
    }

    /// Run `work` on the affinity thread and return its result.
    ///
    /// - On the affinity thread: runs `work` immediately, inline.
    /// - Elsewhere: queues it and blocks until it has run.
    ///
    /// A panic in `work` does not kill the affinity thread; it is resumed
    /// on the calling thread. Errors are ordinary values of `T`.
    ///
    /// Fails with [`DispatchError::Disposed`] after shutdown. A job that is
    /// already running may still re-enter while the queue drains.
    pub fn invoke<T, F>(&self, work: F) -> Result<T, DispatchError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_affinity_thread() {
            return Ok(work());
        }

        self.submit(work)?.wait()
    }

    /// Queue `work` without waiting for it.
    ///
    /// Always enqueues, even from the affinity thread (waiting on the
    /// result from there would deadlock; use [`invoke`](Self::invoke)).
    pub fn submit<T, F>(&self, work: F) -> Result<Pending<T>, DispatchError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut queue = self.queue.lock();
        let seq = queue.next_seq;
        let tx = queue.tx.as_ref().ok_or(DispatchError::Disposed)?;
        let (done, pending) = types::completion(seq);

        let run = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(work));
            if outcome.is_err() {
                warn!(seq, "job panicked; resuming on caller");
            }
            // The caller may have stopped waiting.
            done.complete(outcome);
        });

        tx.send(Job { seq, run })
            .map_err(|_| DispatchError::Disposed)?;
        queue.next_seq += 1;

        Ok(pending)
    }

    /// Stop accepting work, drain the queue and join the affinity thread.
    ///
    /// Idempotent. Called from the affinity thread itself it only closes
    /// the queue; the thread exits after the current job and the backlog.
    pub fn shutdown(&self) {
        let was_open = self.queue.lock().tx.take().is_some();
        if was_open {
            info!(thread = %self.thread_name, "affinity dispatcher shutting down");
        }

        if self.is_affinity_thread() {
            return;
        }

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(thread = %self.thread_name, "affinity thread terminated abnormally");
            }
            debug!(thread = %self.thread_name, "affinity thread joined");
        }
    }
}

impl Drop for AffinityDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AffinityDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffinityDispatcher")
            .field("thread_id", &self.thread_id)
            .field("thread_name", &self.thread_name)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
