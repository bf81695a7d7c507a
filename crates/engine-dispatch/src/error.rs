//! Error types for the dispatcher.

use thiserror::Error;

/// Failures of the dispatch mechanism itself.
///
/// Failures produced *by* a job are part of the job's return value and
/// never show up here.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The dispatcher has been shut down (or its thread is gone).
    #[error("dispatcher disposed")]
    Disposed,

    /// The affinity thread could not be started.
    #[error("failed to spawn affinity thread: {0}")]
    Spawn(#[from] std::io::Error),
}
