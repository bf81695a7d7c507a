//! Error types shared by the whole workspace.
//!
//! Every session operation returns [`Result<T>`]. Engine-side failures keep
//! the engine's own diagnostics (error/warning counters, failure code) so
//! callers can decide whether a retry makes sense; nothing is retried here.

use thiserror::Error;

use crate::engine::{EngineFailure, OpCounters};
use crate::operation::Operation;

/// Result type for engine-core and session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to session callers.
#[derive(Debug, Error)]
pub enum Error {
    /// Not connected, or attaching / launching the engine failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The handle was never issued, has been closed, or its object is stale.
    #[error("unknown handle: {0}")]
    HandleNotFound(String),

    /// A component reference matched neither a name nor a tracked path.
    #[error("component not found: {0}")]
    ComponentNotFound(String),

    /// The engine reported non-zero counters or returned no object.
    #[error("{operation} failed: {detail} (errors={}, warnings={})", counters.errors, counters.warnings)]
    OperationFailed {
        operation: Operation,
        detail: String,
        counters: OpCounters,
    },

    /// An engine call failed outright; the failure is carried verbatim.
    #[error("{operation} failed: {failure}")]
    Engine {
        operation: Operation,
        failure: EngineFailure,
    },

    /// Malformed input, rejected before anything reaches the engine.
    #[error("validation error: {0}")]
    Validation(String),

    /// The dispatcher has been shut down.
    #[error("dispatcher disposed")]
    Disposed,
}

impl Error {
    /// `OperationFailed` without counters.
    pub fn failed(operation: Operation, detail: impl Into<String>) -> Self {
        Error::OperationFailed {
            operation,
            detail: detail.into(),
            counters: OpCounters::default(),
        }
    }

    /// `OperationFailed` carrying the engine's error/warning counters.
    pub fn failed_with(operation: Operation, detail: impl Into<String>, counters: OpCounters) -> Self {
        Error::OperationFailed {
            operation,
            detail: detail.into(),
            counters,
        }
    }

    /// Wrap a raw engine failure for the given operation.
    pub fn engine(operation: Operation, failure: EngineFailure) -> Self {
        Error::Engine { operation, failure }
    }

    pub fn not_connected() -> Self {
        Error::Connection("not connected; call connect() first".to_string())
    }
}
