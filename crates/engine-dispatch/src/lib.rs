//! engine-dispatch
//!
//! Thread-affinity dispatcher: every closure handed to it runs on one
//! dedicated thread, one at a time, in global FIFO order, no matter which
//! thread submitted it.

pub mod dispatcher;
pub mod error;
pub mod types;

// internal module, not re-exported
mod worker;

pub use dispatcher::{AffinityDispatcher, DEFAULT_THREAD_NAME};
pub use error::DispatchError;
pub use types::Pending;
