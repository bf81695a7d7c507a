//! Collaborator traits for the external engine.
//!
//! The session never talks to a concrete engine; it talks to these traits.
//! Every object here is a *reference* to something living inside the engine
//! process, so methods take `&self` and implementations are expected to be
//! cheap to clone (think reference-counted proxies).
//!
//! All of these calls must happen on the affinity thread. The traits only
//! require `Send` so the session can hand objects to that thread; they are
//! never called concurrently.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transform::RigidTransform;

/// Result of a single engine call.
pub type EngineResult<T> = std::result::Result<T, EngineFailure>;

/// A failure reported by the engine: `(code, message)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("engine failure {code}: {message}")]
pub struct EngineFailure {
    pub code: i32,
    pub message: String,
}

impl EngineFailure {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        EngineFailure {
            code,
            message: message.into(),
        }
    }
}

/// Error / warning counters the engine returns alongside open and save calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpCounters {
    pub errors: i32,
    pub warnings: i32,
}

impl OpCounters {
    pub fn new(errors: i32, warnings: i32) -> Self {
        OpCounters { errors, warnings }
    }

    /// Warnings alone do not fail an operation.
    pub fn has_errors(&self) -> bool {
        self.errors != 0
    }
}

/// Which kind of document to open.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Part,
    Assembly,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Part => f.write_str("part"),
            DocumentKind::Assembly => f.write_str("assembly"),
        }
    }
}

/// Flags for [`Engine::open_document`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Suppress engine dialogs.
    pub silent: bool,
}

/// What the engine hands back from an open call.
///
/// `document` is `None` when the engine refused to open the file; the
/// counters then explain why.
#[derive(Debug, Clone)]
pub struct OpenOutcome<D> {
    pub document: Option<D>,
    pub counters: OpCounters,
}

/// What the engine hands back from a save-as call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveAsOutcome {
    pub ok: bool,
    pub counters: OpCounters,
}

/// Creates or finds an engine instance.
///
/// Both calls run on the affinity thread.
pub trait EngineLauncher: Send + Sync + 'static {
    type Engine: Engine;

    /// Attach to an already running instance. `Ok(None)` means none is running.
    fn attach(&self) -> EngineResult<Option<Self::Engine>>;

    /// Start a fresh instance owned by the caller.
    fn launch(&self) -> EngineResult<Self::Engine>;
}

/// The engine application itself.
pub trait Engine: Send + 'static {
    type Document: Document;

    fn set_visible(&self, visible: bool) -> EngineResult<()>;

    fn open_document(
        &self,
        path: &str,
        kind: DocumentKind,
        options: OpenOptions,
    ) -> OpenOutcome<Self::Document>;

    /// Close the document with the given title.
    fn close_document(&self, title: &str) -> EngineResult<()>;

    fn revision(&self) -> EngineResult<String>;

    /// Terminate the engine process.
    fn exit(&self) -> EngineResult<()>;
}

/// An open document (part or assembly).
///
/// Assembly-only calls (`component_by_name`, `add_component`, ...) are
/// never made on part documents; the session checks [`Document::kind`]
/// first.
pub trait Document: Clone + Send + 'static {
    type Component: Component;

    fn title(&self) -> String;

    /// Persisted path, `None` if the document has never been saved.
    fn path(&self) -> Option<String>;

    fn kind(&self) -> DocumentKind;

    /// `false` once the engine has discarded the underlying object.
    fn is_alive(&self) -> bool {
        true
    }

    fn save(&self, silent: bool) -> OpCounters;

    fn save_as(&self, path: &str, silent: bool) -> SaveAsOutcome;

    fn rebuild(&self, top_only: bool) -> EngineResult<()>;

    fn component_by_name(&self, name: &str) -> Option<Self::Component>;

    /// Direct children of this assembly.
    fn components(&self) -> Vec<Self::Component>;

    fn clear_selection(&self);

    /// Delete whatever is selected. `false` if nothing was deleted.
    fn delete_selection(&self) -> bool;

    /// Insert the file at `path` as a new child placed at `position`.
    fn add_component(&self, path: &str, position: [f64; 3]) -> Option<Self::Component>;

    /// Fix (`true`) or float (`false`) the selected components.
    fn set_selected_fixed(&self, fixed: bool) -> EngineResult<()>;
}

/// A child placed inside an assembly.
pub trait Component: Clone + Send + 'static {
    fn name(&self) -> String;

    /// Path of the file this component instantiates.
    fn path(&self) -> Option<String>;

    /// Placement including every enclosing assembly, when the engine can compute it.
    fn total_transform(&self) -> Option<RigidTransform>;

    /// Placement relative to the immediate parent assembly.
    fn transform(&self) -> Option<RigidTransform>;

    fn set_transform(&self, transform: RigidTransform) -> EngineResult<()>;

    /// Select this component; `append` keeps the current selection.
    fn select(&self, append: bool) -> bool;
}
