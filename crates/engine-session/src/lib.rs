//! engine-session
//!
//! A handle-based session over an engine that must only ever be called
//! from one thread. Every operation is marshalled onto the session's
//! affinity thread through an [`engine_dispatch::AffinityDispatcher`].

pub mod config;
pub mod logging;
pub mod session;
pub mod state;

// these are internal modules, not re-exported
mod assembly;
mod shared;

pub use crate::config::SessionConfig;
pub use crate::shared::{ComponentOf, DocOf};
pub use crate::session::{DocumentInfo, EngineSession};
pub use crate::state::ConnectionPhase;

pub use engine_core::{DocumentHandle, DocumentKind, Error, Result};
