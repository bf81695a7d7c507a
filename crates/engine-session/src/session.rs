//! `EngineSession`: one engine connection plus handle-based document tracking.
//!
//! Every public operation wraps its engine calls in a closure and runs it
//! on the session's affinity thread. Input validation happens on the
//! caller's thread, before anything is dispatched.
//!
//! Component and transform operations live in the `assembly` module.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use engine_core::{
    Document, DocumentHandle, DocumentKind, Engine, EngineLauncher, Error, OpenOptions, Operation,
    Result,
};

use crate::config::SessionConfig;
use crate::shared::{DocOf, SessionCore};
use crate::state::ConnectionPhase;

/// A tracked document as reported by [`EngineSession::documents`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub handle: DocumentHandle,
    pub kind: DocumentKind,
    pub title: String,
    pub path: Option<String>,
    pub opened_at: DateTime<Utc>,
    /// `false` once the engine has discarded the object; such a handle
    /// only resolves again to be closed.
    pub alive: bool,
}

/// A live connection to the engine.
///
/// Dropping the session disposes it: the engine is released (and exited if
/// this session launched it) and the affinity thread is retired.
pub struct EngineSession<L: EngineLauncher> {
    pub(crate) core: Arc<SessionCore<L>>,
    config: SessionConfig,
}

impl<L: EngineLauncher> EngineSession<L> {
    /// New, disconnected session with default configuration.
    pub fn new(launcher: L) -> Result<Self> {
        EngineSession::with_config(launcher, SessionConfig::default())
    }

    pub fn with_config(launcher: L, config: SessionConfig) -> Result<Self> {
        let core = SessionCore::new(launcher, &config.thread_name)?;
        Ok(EngineSession {
            core: Arc::new(core),
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The launcher this session connects through.
    pub fn launcher(&self) -> &L {
        &self.core.launcher
    }

    // -------------------------------------------------------------------------
    // Connection lifecycle
    // -------------------------------------------------------------------------

    /// Connect to the engine. No-op if already connected.
    ///
    /// With `attach_if_running`, a running instance is reused and left
    /// running on shutdown; otherwise (or if none is running) a new one is
    /// launched and owned by this session.
    pub fn connect(&self, visible: bool, attach_if_running: bool) -> Result<()> {
        self.core.run(move |core| {
            let mut state = core.state.lock();
            if state.phase == ConnectionPhase::Connected {
                debug!("connect: already connected");
                return Ok(());
            }

            state.phase = ConnectionPhase::Connecting;
            match establish(&core.launcher, visible, attach_if_running) {
                Ok((engine, launched_by_us)) => {
                    state.engine = Some(engine);
                    state.launched_by_us = launched_by_us;
                    state.phase = ConnectionPhase::Connected;
                    info!(visible, launched_by_us, "connected to engine");
                    Ok(())
                }
                Err(e) => {
                    state.phase = ConnectionPhase::Disconnected;
                    Err(e)
                }
            }
        })
    }

    /// [`connect`](Self::connect) with the configured visibility and attach policy.
    pub fn connect_with_defaults(&self) -> Result<()> {
        self.connect(self.config.visible, self.config.attach_if_running)
    }

    pub fn is_connected(&self) -> bool {
        self.phase() == ConnectionPhase::Connected
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.core
            .run(|core| Ok(core.state.lock().phase))
            .unwrap_or(ConnectionPhase::Disconnected)
    }

    /// Whether the connected engine was started by this session.
    pub fn launched_by_us(&self) -> bool {
        self.core
            .run(|core| {
                let state = core.state.lock();
                Ok(state.phase == ConnectionPhase::Connected && state.launched_by_us)
            })
            .unwrap_or(false)
    }

    /// Disconnect. No-op when disconnected.
    ///
    /// The engine process is exited only if `force` is set or this session
    /// launched it. Every tracked handle is retired. Cleanup failures are
    /// logged, never returned.
    pub fn shutdown(&self, force: bool) {
        let outcome = self.core.run(move |core| {
            let mut state = core.state.lock();
            if state.phase == ConnectionPhase::Disconnected {
                return Ok(());
            }

            if let Some(engine) = state.engine.take() {
                if force || state.launched_by_us {
                    if let Err(failure) = engine.exit() {
                        warn!(%failure, "engine exit failed; releasing anyway");
                    }
                }
                // Released here, on the affinity thread.
                drop(engine);
            }

            let retired = state.documents.clear();
            state.launched_by_us = false;
            state.phase = ConnectionPhase::Disconnected;
            info!(force, retired, "disconnected from engine");
            Ok(())
        });

        if let Err(e) = outcome {
            debug!(error = %e, "shutdown skipped");
        }
    }

    /// `shutdown(false)`, then retire the affinity thread. Idempotent.
    pub fn dispose(&self) {
        self.shutdown(false);
        self.core.dispatcher.shutdown();
    }

    // -------------------------------------------------------------------------
    // Documents
    // -------------------------------------------------------------------------

    /// Open a document and start tracking it.
    pub fn open(&self, path: &str, kind: DocumentKind, silent: bool) -> Result<DocumentHandle> {
        require_non_empty("path", path)?;
        let path = path.to_string();

        self.core.with_engine(move |engine, documents| {
            let outcome = engine.open_document(&path, kind, OpenOptions { silent });
            match outcome.document {
                Some(doc) => {
                    let handle = documents.track(doc, kind);
                    debug!(%handle, %path, %kind, warnings = outcome.counters.warnings, "opened document");
                    Ok(handle)
                }
                None => Err(Error::failed_with(
                    Operation::Open,
                    format!("could not open {} {}", kind, path),
                    outcome.counters,
                )),
            }
        })
    }

    pub fn open_part(&self, path: &str, silent: bool) -> Result<DocumentHandle> {
        self.open(path, DocumentKind::Part, silent)
    }

    pub fn open_assembly(&self, path: &str, silent: bool) -> Result<DocumentHandle> {
        self.open(path, DocumentKind::Assembly, silent)
    }

    /// The engine object behind a handle.
    pub fn resolve_handle(&self, handle: &DocumentHandle) -> Result<DocOf<L>> {
        let handle = handle.clone();
        self.core.with_engine(move |_, documents| {
            Ok(documents.resolve(handle.as_str())?.document.clone())
        })
    }

    /// Persisted path of a tracked document (`None` if never saved).
    pub fn document_path(&self, handle: &DocumentHandle) -> Result<Option<String>> {
        let handle = handle.clone();
        self.core
            .with_engine(move |_, documents| Ok(documents.resolve(handle.as_str())?.document.path()))
    }

    /// Tracked documents, oldest first, stale ones included.
    pub fn documents(&self) -> Result<Vec<DocumentInfo>> {
        self.core.with_engine(|_, documents| {
            Ok(documents
                .iter()
                .map(|(handle, tracked)| DocumentInfo {
                    handle: handle.clone(),
                    kind: tracked.kind,
                    title: tracked.document.title(),
                    path: tracked.document.path(),
                    opened_at: tracked.opened_at,
                    alive: tracked.document.is_alive(),
                })
                .collect())
        })
    }

    /// Save in place. Non-zero engine errors fail with the counters.
    pub fn save(&self, handle: &DocumentHandle, silent: bool) -> Result<()> {
        self.core.save(handle.clone(), silent)
    }

    /// Save under a new path.
    pub fn save_as(&self, handle: &DocumentHandle, path: &str, silent: bool) -> Result<()> {
        require_non_empty("path", path)?;
        let handle = handle.clone();
        let path = path.to_string();

        self.core.with_engine(move |_, documents| {
            let doc = &documents.resolve(handle.as_str())?.document;
            let outcome = doc.save_as(&path, silent);
            if !outcome.ok || outcome.counters.has_errors() {
                return Err(Error::failed_with(
                    Operation::SaveAs,
                    format!("could not save to {} (ok={})", path, outcome.ok),
                    outcome.counters,
                ));
            }
            debug!(%handle, %path, "saved document as");
            Ok(())
        })
    }

    pub fn rebuild(&self, handle: &DocumentHandle, top_only: bool) -> Result<()> {
        let handle = handle.clone();
        self.core.with_engine(move |_, documents| {
            documents
                .resolve(handle.as_str())?
                .document
                .rebuild(top_only)
                .map_err(|f| Error::engine(Operation::Rebuild, f))
        })
    }

    /// Close a document, optionally saving it first.
    ///
    /// A failed save leaves the document open and tracked. Otherwise the
    /// handle is retired even when the engine's close fails; that failure
    /// is still returned. A stale handle is retired and reported as
    /// [`Error::HandleNotFound`].
    pub fn close(&self, handle: &DocumentHandle, save: bool, silent_save: bool) -> Result<()> {
        let handle = handle.clone();

        self.core.run(move |core| {
            if save {
                // Nested dispatch; runs inline on this thread.
                match core.save(handle.clone(), silent_save) {
                    // Unknown or stale: the lookup below sorts it out.
                    Ok(()) | Err(Error::HandleNotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }

            let mut state = core.state.lock();
            let (engine, documents) = state.connected()?;

            let title = match documents.resolve(handle.as_str()) {
                Ok(tracked) => tracked.document.title(),
                Err(e) => {
                    if documents.remove(handle.as_str()).is_some() {
                        debug!(%handle, "retired stale handle");
                    }
                    return Err(e);
                }
            };
            let closed = engine.close_document(&title);
            documents.remove(handle.as_str());

            match closed {
                Ok(()) => {
                    debug!(%handle, %title, "closed document");
                    Ok(())
                }
                Err(failure) => {
                    warn!(%handle, %title, %failure, "engine close failed; handle retired");
                    Err(Error::engine(Operation::Close, failure))
                }
            }
        })
    }

    // -------------------------------------------------------------------------
    // Configured silence
    // -------------------------------------------------------------------------

    /// [`open`](Self::open) with the configured `silent` flag.
    pub fn open_with_defaults(&self, path: &str, kind: DocumentKind) -> Result<DocumentHandle> {
        self.open(path, kind, self.config.silent)
    }

    /// [`save`](Self::save) with the configured `silent` flag.
    pub fn save_with_defaults(&self, handle: &DocumentHandle) -> Result<()> {
        self.save(handle, self.config.silent)
    }

    /// [`save_as`](Self::save_as) with the configured `silent` flag.
    pub fn save_as_with_defaults(&self, handle: &DocumentHandle, path: &str) -> Result<()> {
        self.save_as(handle, path, self.config.silent)
    }

    /// [`close`](Self::close) with the configured `silent` flag for the save.
    pub fn close_with_defaults(&self, handle: &DocumentHandle, save: bool) -> Result<()> {
        self.close(handle, save, self.config.silent)
    }

    /// Engine revision string.
    pub fn revision(&self) -> Result<String> {
        self.core
            .with_engine(|engine, _| engine.revision().map_err(|f| Error::engine(Operation::Revision, f)))
    }
}

impl<L: EngineLauncher> Drop for EngineSession<L> {
    /// Blocks until the engine is released, also inside an async runtime.
    /// A panic from the engine during cleanup is logged, not propagated.
    fn drop(&mut self) {
        if panic::catch_unwind(AssertUnwindSafe(|| self.dispose())).is_err() {
            warn!("engine panicked while the session was being dropped");
        }
    }
}

/// Find or start an engine; returns it with the "launched by us" flag.
fn establish<L: EngineLauncher>(
    launcher: &L,
    visible: bool,
    attach_if_running: bool,
) -> Result<(L::Engine, bool)> {
    let mut attached = None;
    if attach_if_running {
        match launcher.attach() {
            Ok(found) => attached = found,
            Err(failure) => debug!(%failure, "attach failed; launching a new instance"),
        }
    }

    let (engine, launched_by_us) = match attached {
        Some(engine) => (engine, false),
        None => {
            let engine = launcher
                .launch()
                .map_err(|f| Error::Connection(format!("launch failed: {}", f)))?;
            (engine, true)
        }
    };

    if let Err(failure) = engine.set_visible(visible) {
        if launched_by_us {
            if let Err(exit_failure) = engine.exit() {
                warn!(%exit_failure, "could not exit engine after failed connect");
            }
        }
        return Err(Error::Connection(format!("could not set visibility: {}", failure)));
    }

    Ok((engine, launched_by_us))
}

pub(crate) fn require_non_empty(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} is required", what)));
    }
    Ok(())
}
