//! Affinity-confined session state.
//!
//! Everything in here is only touched from closures running on the
//! affinity thread. The surrounding lock is never contended; it is there
//! because the state has to be shared with those closures.

use serde::Serialize;

use engine_core::{Engine, Error, HandleRegistry, Result};

/// Connection lifecycle: `Disconnected → Connecting → Connected → Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
}

pub(crate) struct SessionState<E: Engine> {
    pub phase: ConnectionPhase,
    pub engine: Option<E>,
    /// Whether this session started the engine (and so owns its lifetime).
    pub launched_by_us: bool,
    pub documents: HandleRegistry<E::Document>,
}

impl<E: Engine> SessionState<E> {
    pub fn new() -> Self {
        SessionState {
            phase: ConnectionPhase::Disconnected,
            engine: None,
            launched_by_us: false,
            documents: HandleRegistry::new(),
        }
    }

    /// The live engine and the registry, or "not connected".
    pub fn connected(&mut self) -> Result<(&E, &mut HandleRegistry<E::Document>)> {
        match self.engine.as_ref() {
            Some(engine) if self.phase == ConnectionPhase::Connected => {
                Ok((engine, &mut self.documents))
            }
            _ => Err(Error::not_connected()),
        }
    }
}
