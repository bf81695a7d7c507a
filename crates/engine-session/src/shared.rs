//! The shared half of a session: dispatcher, launcher and confined state.
//!
//! Closures sent to the affinity thread capture an `Arc<SessionCore>`, so
//! any of them can dispatch again (re-entrantly) through the same core.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use engine_core::{
    Document, DocumentHandle, Engine, EngineLauncher, Error, HandleRegistry, Operation, Result,
};
use engine_dispatch::{AffinityDispatcher, DispatchError};

use crate::state::SessionState;

/// Document type produced by a launcher's engine.
pub type DocOf<L> = <<L as EngineLauncher>::Engine as Engine>::Document;

/// Component type inside a launcher's documents.
pub type ComponentOf<L> = <DocOf<L> as Document>::Component;

pub(crate) struct SessionCore<L: EngineLauncher> {
    pub dispatcher: AffinityDispatcher,
    pub launcher: L,
    pub state: Mutex<SessionState<L::Engine>>,
}

impl<L: EngineLauncher> SessionCore<L> {
    pub fn new(launcher: L, thread_name: &str) -> Result<Self> {
        let dispatcher = AffinityDispatcher::with_thread_name(thread_name).map_err(dispatch_error)?;
        Ok(SessionCore {
            dispatcher,
            launcher,
            state: Mutex::new(SessionState::new()),
        })
    }

    /// Run `op` on the affinity thread.
    pub fn run<T, F>(self: &Arc<Self>, op: F) -> Result<T>
    where
        F: FnOnce(&Arc<Self>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let core = Arc::clone(self);
        self.dispatcher
            .invoke(move || op(&core))
            .map_err(dispatch_error)?
    }

    /// Run `op` on the affinity thread with the engine and registry.
    ///
    /// The state lock is held for the duration of `op`, so `op` must not
    /// dispatch again.
    pub fn with_engine<T, F>(self: &Arc<Self>, op: F) -> Result<T>
    where
        F: FnOnce(&L::Engine, &mut HandleRegistry<DocOf<L>>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.run(move |core| {
            let mut state = core.state.lock();
            let (engine, documents) = state.connected()?;
            op(engine, documents)
        })
    }

    /// Save a tracked document. Safe to call from inside another job.
    pub fn save(self: &Arc<Self>, handle: DocumentHandle, silent: bool) -> Result<()> {
        self.with_engine(move |_, documents| {
            let doc = &documents.resolve(handle.as_str())?.document;
            let counters = doc.save(silent);
            if counters.has_errors() {
                return Err(Error::failed_with(
                    Operation::Save,
                    format!("could not save {}", doc.title()),
                    counters,
                ));
            }
            debug!(%handle, warnings = counters.warnings, "saved document");
            Ok(())
        })
    }
}

pub(crate) fn dispatch_error(err: DispatchError) -> Error {
    match err {
        DispatchError::Disposed => Error::Disposed,
        DispatchError::Spawn(e) => Error::Connection(format!("could not start affinity thread: {}", e)),
    }
}
