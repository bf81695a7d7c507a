//! Opaque document handles and the registry that maps them to engine objects.
//!
//! The registry is not thread-safe on purpose: the session only touches it
//! from closures running on the affinity thread.

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{Document, DocumentKind};
use crate::error::{Error, Result};

/// Identifier for a tracked document.
///
/// A random UUID v4 rendered as 32 lowercase hex digits. Unique over the
/// lifetime of the process; once removed from a registry it never
/// resolves again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentHandle(String);

impl DocumentHandle {
    pub fn generate() -> Self {
        DocumentHandle(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentHandle {
    fn from(s: &str) -> Self {
        DocumentHandle(s.to_string())
    }
}

impl From<String> for DocumentHandle {
    fn from(s: String) -> Self {
        DocumentHandle(s)
    }
}

impl Borrow<str> for DocumentHandle {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DocumentHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A registry entry.
#[derive(Debug, Clone)]
pub struct TrackedDocument<D> {
    pub document: D,
    pub kind: DocumentKind,
    pub opened_at: DateTime<Utc>,
}

/// Handle -> engine document, in the order documents were tracked.
#[derive(Debug)]
pub struct HandleRegistry<D> {
    entries: IndexMap<DocumentHandle, TrackedDocument<D>>,
}

impl<D> Default for HandleRegistry<D> {
    fn default() -> Self {
        HandleRegistry {
            entries: IndexMap::new(),
        }
    }
}

impl<D> HandleRegistry<D> {
    pub fn new() -> Self {
        HandleRegistry::default()
    }

    /// Start tracking `document` under a freshly generated handle.
    pub fn track(&mut self, document: D, kind: DocumentKind) -> DocumentHandle {
        let mut handle = DocumentHandle::generate();
        // Never re-point a live handle.
        while self.entries.contains_key(&handle) {
            handle = DocumentHandle::generate();
        }

        self.entries.insert(
            handle.clone(),
            TrackedDocument {
                document,
                kind,
                opened_at: Utc::now(),
            },
        );
        handle
    }

    pub fn get(&self, handle: &str) -> Option<&TrackedDocument<D>> {
        self.entries.get(handle)
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.entries.contains_key(handle)
    }

    /// Stop tracking a handle. Preserves the order of the remaining entries.
    pub fn remove(&mut self, handle: &str) -> Option<TrackedDocument<D>> {
        self.entries.shift_remove(handle)
    }

    /// Drop every entry; returns how many were tracked.
    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DocumentHandle, &TrackedDocument<D>)> {
        self.entries.iter()
    }
}

impl<D: Document> HandleRegistry<D> {
    /// Look up a live document.
    ///
    /// Fails with [`Error::HandleNotFound`] for unknown handles and for
    /// handles whose engine object has gone stale.
    pub fn resolve(&self, handle: &str) -> Result<&TrackedDocument<D>> {
        match self.entries.get(handle) {
            Some(tracked) if tracked.document.is_alive() => Ok(tracked),
            _ => Err(Error::HandleNotFound(handle.to_string())),
        }
    }

    /// Like [`resolve`](Self::resolve) but also requires an assembly.
    pub fn resolve_assembly(&self, handle: &str) -> Result<&D> {
        let tracked = self.resolve(handle)?;
        if tracked.document.kind() != DocumentKind::Assembly {
            return Err(Error::Validation(format!(
                "document {} is a {}, not an assembly",
                handle, tracked.document.kind()
            )));
        }
        Ok(&tracked.document)
    }
}
