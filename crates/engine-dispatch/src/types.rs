//! Shared types for the dispatcher.
//!
//! This module defines:
//! - `Job`: a queued unit of work, stamped with its enqueue sequence number
//! - channel aliases between callers and the affinity thread
//! - `Completion` / `Pending`: the two ends of a job's result slot

use std::panic;
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use tokio::sync::{mpsc, Notify};

use crate::error::DispatchError;

/// A unit of work flowing from a caller into the affinity thread.
///
/// `run` already contains the panic guard and the completion signal, so
/// the worker loop only has to call it.
pub(crate) struct Job {
    pub seq: u64,
    pub run: Box<dyn FnOnce() + Send + 'static>,
}

/// Channel from callers → affinity thread.
pub(crate) type JobTx = mpsc::UnboundedSender<Job>;
pub(crate) type JobRx = mpsc::UnboundedReceiver<Job>;

/// Value or captured panic payload of a finished job.
pub(crate) type Outcome<T> = thread::Result<T>;

enum Slot<T> {
    Waiting,
    Done(Outcome<T>),
    /// The job was dropped without running.
    Abandoned,
    Taken,
}

/// Result slot shared by a job and its `Pending`.
///
/// A blocking waiter parks on the condvar, an async waiter on the
/// `Notify`; neither depends on being inside (or outside) a runtime.
struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
    notify: Notify,
}

impl<T> Shared<T> {
    fn finish(&self, slot: Slot<T>) {
        {
            let mut current = self.slot.lock();
            if !matches!(*current, Slot::Waiting) {
                return;
            }
            *current = slot;
        }
        self.ready.notify_all();
        // Stores a permit if the async waiter is not parked yet.
        self.notify.notify_one();
    }

    fn try_take(&self) -> Option<Result<T, DispatchError>> {
        let mut current = self.slot.lock();
        if matches!(*current, Slot::Waiting) {
            return None;
        }
        Some(unpack(std::mem::replace(&mut *current, Slot::Taken)))
    }
}

/// Job side of the slot. Dropping it unfinished wakes the waiter with
/// [`DispatchError::Disposed`].
pub(crate) struct Completion<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Completion<T> {
    pub fn complete(self, outcome: Outcome<T>) {
        self.shared.finish(Slot::Done(outcome));
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        self.shared.finish(Slot::Abandoned);
    }
}

/// A new, connected pair of result-slot ends.
pub(crate) fn completion<T>(seq: u64) -> (Completion<T>, Pending<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Waiting),
        ready: Condvar::new(),
        notify: Notify::new(),
    });
    (
        Completion {
            shared: shared.clone(),
        },
        Pending { seq, shared },
    )
}

/// A job that has been queued but not necessarily run yet.
///
/// Dropping a `Pending` stops waiting; it does not cancel the job, which
/// still runs to completion on the affinity thread.
#[must_use = "a Pending does nothing unless waited on"]
pub struct Pending<T> {
    seq: u64,
    shared: Arc<Shared<T>>,
}

impl<T> Pending<T> {
    /// Position of this job in the global FIFO order.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Block the calling thread until the job has run.
    ///
    /// Works from any thread, including a runtime worker (which is then
    /// blocked for the duration). A panic inside the job is resumed here,
    /// on the caller's thread.
    pub fn wait(self) -> Result<T, DispatchError> {
        let mut current = self.shared.slot.lock();
        while matches!(*current, Slot::Waiting) {
            self.shared.ready.wait(&mut current);
        }
        unpack(std::mem::replace(&mut *current, Slot::Taken))
    }

    /// Await the job. Wrap in `tokio::time::timeout` for a bounded wait.
    pub async fn wait_async(self) -> Result<T, DispatchError> {
        loop {
            if let Some(result) = self.shared.try_take() {
                return result;
            }
            self.shared.notify.notified().await;
        }
    }
}

fn unpack<T>(slot: Slot<T>) -> Result<T, DispatchError> {
    match slot {
        Slot::Done(Ok(value)) => Ok(value),
        Slot::Done(Err(payload)) => panic::resume_unwind(payload),
        // The job was dropped without running: the queue was torn down.
        Slot::Abandoned | Slot::Taken | Slot::Waiting => Err(DispatchError::Disposed),
    }
}
