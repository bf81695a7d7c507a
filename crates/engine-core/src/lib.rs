//! engine-core
//!
//! Pure logic shared by the dispatcher-backed session:
//! - error taxonomy and operation labels
//! - collaborator traits for the external engine
//! - document handle registry
//! - component reference resolution
//! - rigid transform math
//! - an in-memory engine for tests (`testing`, behind the `testing` feature)

pub mod engine;
pub mod error;
pub mod handle;
pub mod operation;
pub mod resolve;
pub mod transform;

#[cfg(feature = "testing")]
pub mod testing;

pub use engine::{
    Component,
    Document,
    DocumentKind,
    Engine,
    EngineFailure,
    EngineLauncher,
    EngineResult,
    OpCounters,
    OpenOptions,
    OpenOutcome,
    SaveAsOutcome,
};

pub use error::{Error, Result};
pub use handle::{DocumentHandle, HandleRegistry, TrackedDocument};
pub use operation::Operation;
pub use resolve::resolve_component;
pub use transform::{Matrix3, RigidTransform};
