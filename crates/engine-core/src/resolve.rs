//! Component reference resolution.
//!
//! A reference is either the name of a child inside the container, or the
//! handle of a tracked document whose file is instantiated by one of the
//! container's children. Names always win over handles.

use crate::engine::{Component, Document};
use crate::error::{Error, Result};
use crate::handle::HandleRegistry;

/// Resolve `reference` to a child of `container`.
///
/// 1. child named `reference`;
/// 2. if `reference` is a tracked handle with a persisted path, the first
///    child whose path matches it case-insensitively;
/// 3. otherwise [`Error::ComponentNotFound`].
pub fn resolve_component<D: Document>(
    container: &D,
    reference: &str,
    registry: &HandleRegistry<D>,
) -> Result<D::Component> {
    if let Some(component) = container.component_by_name(reference) {
        return Ok(component);
    }

    if let Some(path) = tracked_path(registry, reference) {
        let found = container.components().into_iter().find(|c| {
            c.path()
                .map(|p| paths_equal(&p, &path))
                .unwrap_or(false)
        });
        if let Some(component) = found {
            return Ok(component);
        }
    }

    Err(Error::ComponentNotFound(reference.to_string()))
}

/// Persisted path of a tracked (and live) document, if it has one.
pub fn tracked_path<D: Document>(registry: &HandleRegistry<D>, handle: &str) -> Option<String> {
    registry
        .resolve(handle)
        .ok()
        .and_then(|tracked| tracked.document.path())
        .filter(|p| !p.trim().is_empty())
}

/// Engine paths compare case-insensitively.
pub fn paths_equal(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
