//! Affinity thread loop.
//!
//! The thread owns the receiving end of the job queue and runs jobs one at
//! a time, in the order they were enqueued. It exits once every sender is
//! gone and the queue has drained.

use tracing::{debug, trace};

use crate::types::{Job, JobRx};

/// Run the affinity loop until the queue is closed and empty.
pub(crate) fn run_affinity_loop(mut job_rx: JobRx) {
    debug!("affinity thread started");

    let mut executed: u64 = 0;
    while let Some(job) = job_rx.blocking_recv() {
        let Job { seq, run } = job;

        trace!(seq, "running job");
        run();
        executed += 1;
    }

    debug!(executed, "affinity thread exiting (queue closed)");
}
