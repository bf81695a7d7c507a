//! In-memory engine for tests and demos.
//!
//! [`MockEngine`] behaves like a tiny document engine: it has a set of
//! files it can open, tracks which documents are open, and journals every
//! engine/document call together with the thread it ran on, so tests can
//! check that everything happened on the affinity thread. Component
//! placement and selection calls are journaled too.
//!
//! Failure injection:
//! - [`MockEngine::refuse_open`]: open returns no document with counters;
//! - [`MockEngine::fail_close`]: close discards the document but reports a failure;
//! - [`MockDocument::set_save_counters`]: save reports errors;
//! - [`MockComponent::set_selectable`]: select returns `false`;
//! - [`MockDocument::set_delete_fails`] / [`MockDocument::set_reject_inserts`].
//!
//! # Example
//!
//! ```
//! use engine_core::testing::{MockComponent, MockDocument, MockEngine};
//! use engine_core::{Document, DocumentKind, Engine, OpenOptions};
//!
//! let engine = MockEngine::new();
//! let asm = MockDocument::assembly("C:/work/frame.sldasm");
//! asm.add_child(MockComponent::new("bolt-1", "C:/work/bolt.sldprt"));
//! engine.add_file(asm);
//!
//! let out = engine.open_document("C:/work/frame.sldasm", DocumentKind::Assembly, OpenOptions::default());
//! let doc = out.document.unwrap();
//! assert_eq!(doc.components().len(), 1);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::engine::{
    Component, Document, DocumentKind, Engine, EngineFailure, EngineLauncher, EngineResult,
    OpCounters, OpenOptions, OpenOutcome, SaveAsOutcome,
};
use crate::resolve::paths_equal;
use crate::transform::RigidTransform;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// One journaled call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub name: String,
    pub thread: ThreadId,
}

type Journal = Arc<Mutex<Vec<Call>>>;

fn record(journal: &Journal, name: impl Into<String>) {
    journal.lock().push(Call {
        name: name.into(),
        thread: thread::current().id(),
    });
}

/// Last path segment without its extension; accepts both separators.
fn file_stem(path: &str) -> &str {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

// -----------------------------------------------------------------------------
// Engine
// -----------------------------------------------------------------------------

#[derive(Debug)]
struct EngineInner {
    visible: bool,
    exited: bool,
    revision: String,
    files: Vec<MockDocument>,
    open: Vec<MockDocument>,
    refused: HashMap<String, OpCounters>,
    close_failure: Option<EngineFailure>,
    open_flags: Vec<bool>,
}

/// In-memory engine instance. Clones share state.
#[derive(Debug, Clone)]
pub struct MockEngine {
    id: u64,
    inner: Arc<Mutex<EngineInner>>,
    journal: Journal,
}

impl Default for MockEngine {
    fn default() -> Self {
        MockEngine::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        MockEngine {
            id: NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed),
            inner: Arc::new(Mutex::new(EngineInner {
                visible: false,
                exited: false,
                revision: "31.1.0".to_string(),
                files: Vec::new(),
                open: Vec::new(),
                refused: HashMap::new(),
                close_failure: None,
                open_flags: Vec::new(),
            })),
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Identity of this instance; clones share it.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Make a file available to [`Engine::open_document`].
    pub fn add_file(&self, document: MockDocument) {
        document.attach_journal(self.journal.clone());
        self.inner.lock().files.push(document);
    }

    /// Opening `path` fails with the given counters.
    pub fn refuse_open(&self, path: &str, counters: OpCounters) {
        self.inner.lock().refused.insert(path.to_lowercase(), counters);
    }

    /// Every subsequent close reports `failure` after discarding the document.
    pub fn fail_close(&self, failure: EngineFailure) {
        self.inner.lock().close_failure = Some(failure);
    }

    pub fn is_visible(&self) -> bool {
        self.inner.lock().visible
    }

    pub fn has_exited(&self) -> bool {
        self.inner.lock().exited
    }

    /// Titles of the documents currently open in the engine.
    pub fn open_titles(&self) -> Vec<String> {
        self.inner.lock().open.iter().map(|d| d.title()).collect()
    }

    /// `silent` option of every open request, in order.
    pub fn open_flags(&self) -> Vec<bool> {
        self.inner.lock().open_flags.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.journal.lock().clone()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.journal.lock().iter().map(|c| c.name.clone()).collect()
    }

    /// Distinct threads that have called into this engine.
    pub fn call_threads(&self) -> Vec<ThreadId> {
        let mut threads: Vec<ThreadId> = Vec::new();
        for call in self.journal.lock().iter() {
            if !threads.contains(&call.thread) {
                threads.push(call.thread);
            }
        }
        threads
    }
}

impl Engine for MockEngine {
    type Document = MockDocument;

    fn set_visible(&self, visible: bool) -> EngineResult<()> {
        record(&self.journal, "set_visible");
        self.inner.lock().visible = visible;
        Ok(())
    }

    fn open_document(
        &self,
        path: &str,
        kind: DocumentKind,
        options: OpenOptions,
    ) -> OpenOutcome<MockDocument> {
        record(&self.journal, format!("open {}", path));
        let mut inner = self.inner.lock();
        inner.open_flags.push(options.silent);

        if let Some(counters) = inner.refused.get(&path.to_lowercase()) {
            return OpenOutcome {
                document: None,
                counters: *counters,
            };
        }

        let found = inner
            .files
            .iter()
            .find(|d| d.kind() == kind && d.path().map(|p| paths_equal(&p, path)).unwrap_or(false))
            .cloned();

        match found {
            Some(doc) => {
                doc.set_alive(true);
                if !inner.open.iter().any(|d| d.same_as(&doc)) {
                    inner.open.push(doc.clone());
                }
                OpenOutcome {
                    document: Some(doc),
                    counters: OpCounters::default(),
                }
            }
            // File not found.
            None => OpenOutcome {
                document: None,
                counters: OpCounters::new(2, 0),
            },
        }
    }

    fn close_document(&self, title: &str) -> EngineResult<()> {
        record(&self.journal, format!("close {}", title));
        let mut inner = self.inner.lock();

        let pos = inner
            .open
            .iter()
            .position(|d| d.title() == title)
            .ok_or_else(|| EngineFailure::new(2, format!("no open document titled {}", title)))?;
        let doc = inner.open.remove(pos);
        doc.set_alive(false);

        match &inner.close_failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }

    fn revision(&self) -> EngineResult<String> {
        record(&self.journal, "revision");
        Ok(self.inner.lock().revision.clone())
    }

    fn exit(&self) -> EngineResult<()> {
        record(&self.journal, "exit");
        let mut inner = self.inner.lock();
        inner.exited = true;
        for doc in inner.open.drain(..) {
            doc.set_alive(false);
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Launcher
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LauncherInner {
    running: Option<MockEngine>,
    launched: Vec<MockEngine>,
    attach_attempts: usize,
    launch_failure: Option<EngineFailure>,
    template: Option<MockEngine>,
}

/// Launcher over [`MockEngine`]s.
#[derive(Debug, Clone, Default)]
pub struct MockLauncher {
    inner: Arc<Mutex<LauncherInner>>,
}

impl MockLauncher {
    /// No instance is running; every launch creates a fresh engine.
    pub fn new() -> Self {
        MockLauncher::default()
    }

    /// `engine` is already running and can be attached to.
    pub fn with_running(engine: MockEngine) -> Self {
        let launcher = MockLauncher::new();
        launcher.inner.lock().running = Some(engine);
        launcher
    }

    /// Launch hands out `engine` (a clone of it) instead of a blank instance.
    pub fn launching(engine: MockEngine) -> Self {
        let launcher = MockLauncher::new();
        launcher.inner.lock().template = Some(engine);
        launcher
    }

    pub fn fail_launch(&self, failure: EngineFailure) {
        self.inner.lock().launch_failure = Some(failure);
    }

    /// Engines started through [`EngineLauncher::launch`], oldest first.
    pub fn launched(&self) -> Vec<MockEngine> {
        self.inner.lock().launched.clone()
    }

    pub fn attach_attempts(&self) -> usize {
        self.inner.lock().attach_attempts
    }
}

impl EngineLauncher for MockLauncher {
    type Engine = MockEngine;

    fn attach(&self) -> EngineResult<Option<MockEngine>> {
        let mut inner = self.inner.lock();
        inner.attach_attempts += 1;
        Ok(inner.running.clone().filter(|e| !e.has_exited()))
    }

    fn launch(&self) -> EngineResult<MockEngine> {
        let mut inner = self.inner.lock();
        if let Some(failure) = &inner.launch_failure {
            return Err(failure.clone());
        }
        let engine = inner.template.clone().unwrap_or_default();
        inner.launched.push(engine.clone());
        Ok(engine)
    }
}

// -----------------------------------------------------------------------------
// Document
// -----------------------------------------------------------------------------

#[derive(Debug)]
struct DocumentInner {
    title: String,
    path: Option<String>,
    kind: DocumentKind,
    alive: bool,
    children: Vec<MockComponent>,
    save_counters: OpCounters,
    saves: usize,
    silent_flags: Vec<bool>,
    rebuilds: usize,
    delete_fails: bool,
    reject_inserts: bool,
    journal: Option<Journal>,
}

/// In-memory document. Clones share state.
#[derive(Debug, Clone)]
pub struct MockDocument {
    inner: Arc<Mutex<DocumentInner>>,
}

impl MockDocument {
    pub fn new(path: &str, kind: DocumentKind) -> Self {
        MockDocument {
            inner: Arc::new(Mutex::new(DocumentInner {
                title: file_name(path).to_string(),
                path: Some(path.to_string()),
                kind,
                alive: true,
                children: Vec::new(),
                save_counters: OpCounters::default(),
                saves: 0,
                silent_flags: Vec::new(),
                rebuilds: 0,
                delete_fails: false,
                reject_inserts: false,
                journal: None,
            })),
        }
    }

    pub fn part(path: &str) -> Self {
        MockDocument::new(path, DocumentKind::Part)
    }

    pub fn assembly(path: &str) -> Self {
        MockDocument::new(path, DocumentKind::Assembly)
    }

    pub fn add_child(&self, component: MockComponent) {
        let mut inner = self.inner.lock();
        if let Some(journal) = &inner.journal {
            component.attach_journal(journal.clone());
        }
        inner.children.push(component);
    }

    /// Forget (or change) the persisted path, as for a never-saved document.
    pub fn set_path(&self, path: Option<&str>) {
        self.inner.lock().path = path.map(str::to_string);
    }

    pub fn set_save_counters(&self, counters: OpCounters) {
        self.inner.lock().save_counters = counters;
    }

    pub fn set_delete_fails(&self, fails: bool) {
        self.inner.lock().delete_fails = fails;
    }

    pub fn set_reject_inserts(&self, reject: bool) {
        self.inner.lock().reject_inserts = reject;
    }

    pub fn set_alive(&self, alive: bool) {
        self.inner.lock().alive = alive;
    }

    pub fn save_count(&self) -> usize {
        self.inner.lock().saves
    }

    /// `silent` argument of every save / save-as, in order.
    pub fn silent_flags(&self) -> Vec<bool> {
        self.inner.lock().silent_flags.clone()
    }

    pub fn rebuild_count(&self) -> usize {
        self.inner.lock().rebuilds
    }

    pub fn child(&self, name: &str) -> Option<MockComponent> {
        self.inner.lock().children.iter().find(|c| c.name() == name).cloned()
    }

    pub fn child_names(&self) -> Vec<String> {
        self.inner.lock().children.iter().map(|c| c.name()).collect()
    }

    /// Whether two values refer to the same document.
    pub fn same_as(&self, other: &MockDocument) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn attach_journal(&self, journal: Journal) {
        let mut inner = self.inner.lock();
        for child in inner.children.iter() {
            child.attach_journal(journal.clone());
        }
        inner.journal = Some(journal);
    }

    fn record(&self, name: &str) {
        let journal = self.inner.lock().journal.clone();
        if let Some(journal) = journal {
            record(&journal, format!("{} {}", name, self.title()));
        }
    }
}

impl Document for MockDocument {
    type Component = MockComponent;

    fn title(&self) -> String {
        self.inner.lock().title.clone()
    }

    fn path(&self) -> Option<String> {
        self.inner.lock().path.clone()
    }

    fn kind(&self) -> DocumentKind {
        self.inner.lock().kind
    }

    fn is_alive(&self) -> bool {
        self.inner.lock().alive
    }

    fn save(&self, silent: bool) -> OpCounters {
        self.record("save");
        let mut inner = self.inner.lock();
        inner.silent_flags.push(silent);
        inner.saves += 1;
        inner.save_counters
    }

    fn save_as(&self, path: &str, silent: bool) -> SaveAsOutcome {
        self.record("save_as");
        let mut inner = self.inner.lock();
        inner.silent_flags.push(silent);
        if inner.save_counters.has_errors() {
            return SaveAsOutcome {
                ok: false,
                counters: inner.save_counters,
            };
        }
        inner.saves += 1;
        inner.path = Some(path.to_string());
        inner.title = file_name(path).to_string();
        SaveAsOutcome {
            ok: true,
            counters: inner.save_counters,
        }
    }

    fn rebuild(&self, _top_only: bool) -> EngineResult<()> {
        self.record("rebuild");
        self.inner.lock().rebuilds += 1;
        Ok(())
    }

    fn component_by_name(&self, name: &str) -> Option<MockComponent> {
        self.record("component_by_name");
        self.child(name)
    }

    fn components(&self) -> Vec<MockComponent> {
        self.record("components");
        self.inner.lock().children.clone()
    }

    fn clear_selection(&self) {
        self.record("clear_selection");
        for child in self.inner.lock().children.iter() {
            child.inner.lock().selected = false;
        }
    }

    fn delete_selection(&self) -> bool {
        self.record("delete_selection");
        let mut inner = self.inner.lock();
        if inner.delete_fails {
            return false;
        }
        let before = inner.children.len();
        inner.children.retain(|c| !c.is_selected());
        inner.children.len() != before
    }

    fn add_component(&self, path: &str, position: [f64; 3]) -> Option<MockComponent> {
        self.record("add_component");
        let mut inner = self.inner.lock();
        if inner.reject_inserts {
            return None;
        }

        let stem = file_stem(path).to_string();
        let mut n = 1;
        while inner.children.iter().any(|c| c.name() == format!("{}-{}", stem, n)) {
            n += 1;
        }

        let component = MockComponent::new(&format!("{}-{}", stem, n), path);
        component.set_local_transform(Some(RigidTransform::from_translation(position)));
        if let Some(journal) = &inner.journal {
            component.attach_journal(journal.clone());
        }
        inner.children.push(component.clone());
        Some(component)
    }

    fn set_selected_fixed(&self, fixed: bool) -> EngineResult<()> {
        self.record(if fixed { "fix" } else { "unfix" });
        for child in self.inner.lock().children.iter() {
            let mut c = child.inner.lock();
            if c.selected {
                c.fixed = fixed;
            }
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Component
// -----------------------------------------------------------------------------

#[derive(Debug)]
struct ComponentInner {
    name: String,
    path: Option<String>,
    local: Option<RigidTransform>,
    total: Option<RigidTransform>,
    selectable: bool,
    selected: bool,
    fixed: bool,
    journal: Option<Journal>,
}

/// In-memory assembly child. Clones share state.
#[derive(Debug, Clone)]
pub struct MockComponent {
    inner: Arc<Mutex<ComponentInner>>,
}

impl MockComponent {
    /// A child at the identity placement with no total transform.
    pub fn new(name: &str, path: &str) -> Self {
        MockComponent {
            inner: Arc::new(Mutex::new(ComponentInner {
                name: name.to_string(),
                path: Some(path.to_string()),
                local: Some(RigidTransform::IDENTITY),
                total: None,
                selectable: true,
                selected: false,
                fixed: false,
                journal: None,
            })),
        }
    }

    pub fn set_local_transform(&self, transform: Option<RigidTransform>) {
        self.inner.lock().local = transform;
    }

    pub fn set_total_transform(&self, transform: Option<RigidTransform>) {
        self.inner.lock().total = transform;
    }

    pub fn set_selectable(&self, selectable: bool) {
        self.inner.lock().selectable = selectable;
    }

    pub fn is_selected(&self) -> bool {
        self.inner.lock().selected
    }

    pub fn is_fixed(&self) -> bool {
        self.inner.lock().fixed
    }

    pub fn local_transform(&self) -> Option<RigidTransform> {
        self.inner.lock().local
    }

    fn attach_journal(&self, journal: Journal) {
        self.inner.lock().journal = Some(journal);
    }

    fn record(&self, call: &str) {
        let (journal, name) = {
            let inner = self.inner.lock();
            (inner.journal.clone(), inner.name.clone())
        };
        if let Some(journal) = journal {
            record(&journal, format!("{} {}", call, name));
        }
    }
}

impl Component for MockComponent {
    fn name(&self) -> String {
        self.inner.lock().name.clone()
    }

    fn path(&self) -> Option<String> {
        self.inner.lock().path.clone()
    }

    fn total_transform(&self) -> Option<RigidTransform> {
        self.inner.lock().total
    }

    fn transform(&self) -> Option<RigidTransform> {
        self.inner.lock().local
    }

    fn set_transform(&self, transform: RigidTransform) -> EngineResult<()> {
        self.record("set_transform");
        let mut inner = self.inner.lock();
        inner.local = Some(transform);
        // The engine recomputes the total placement on the next rebuild.
        inner.total = None;
        Ok(())
    }

    fn select(&self, _append: bool) -> bool {
        self.record("select");
        let mut inner = self.inner.lock();
        if !inner.selectable {
            return false;
        }
        inner.selected = true;
        true
    }
}
