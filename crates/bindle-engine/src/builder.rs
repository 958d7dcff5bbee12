//! Dependency graph construction
//!
//! Walks entry seeds across a worker pool, resolving and transforming
//! every reachable module exactly once per pass. The memoization table
//! is the only shared mutable structure; claiming a path's slot is the
//! single-writer-per-key point, so concurrent discoveries of one module
//! coalesce into a single build.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use regex::Regex;
use rustc_hash::FxHashSet;

use crate::cache::SourceCache;
use crate::error::{BuildError, BuildResult};
use crate::graph::{BuildGraph, Module};
use crate::hooks::PluginSet;
use crate::resolver::Resolver;
use crate::transform::TransformRegistry;

/// Extracts dependency specifiers from transformed content.
pub trait DependencyParser: Send + Sync {
    /// Return specifiers in source order; duplicates are tolerated.
    fn extract(&self, path: &Path, content: &str) -> Vec<String>;
}

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    // import x from "spec"; import { a } from 'spec'; import "spec";
    // export { a } from "spec"; export * from "spec"
    Regex::new(r#"(?m)^\s*(?:import|export)\s+(?:[^'";]*?\s+from\s+)?['"]([^'"]+)['"]"#)
        .expect("import pattern")
});

static REQUIRE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("require pattern")
});

/// Default parser: a lexically naive scan for ES-style imports and
/// CommonJS requires. It does not understand comments or strings;
/// supply a real parser through [`DependencyParser`] when that matters.
pub struct ImportScanner;

impl DependencyParser for ImportScanner {
    fn extract(&self, _path: &Path, content: &str) -> Vec<String> {
        let mut specifiers = Vec::new();
        for caps in IMPORT_RE.captures_iter(content) {
            specifiers.push(caps[1].to_string());
        }
        for caps in REQUIRE_RE.captures_iter(content) {
            specifiers.push(caps[1].to_string());
        }
        specifiers
    }
}

/// Terminal or in-flight state of one module slot
enum SlotState {
    /// Claimed; the owning worker is building
    InFlight,
    /// Built successfully
    Ready(Arc<Module>),
    /// Build failed; the pass error cell has the cause
    Failed,
}

/// One shared pending result per module key
struct Slot {
    state: Mutex<SlotState>,
    done: Condvar,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::InFlight),
            done: Condvar::new(),
        }
    }
}

/// Outcome of claiming a path in the table
pub enum Claim {
    /// The caller owns the build for this path
    Owner,
    /// Another caller already owns it; the result can be awaited
    Pending,
}

/// Pass-local memoization table.
///
/// One per build pass, owned by its builder; never shared across
/// passes. A module's build cost is paid at most once per pass
/// regardless of how many modules depend on it.
pub struct ModuleTable {
    slots: DashMap<PathBuf, Arc<Slot>>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Claim the build of `path`. The first claimant becomes the owner
    /// and must eventually call [`fulfill`](Self::fulfill) or
    /// [`fail`](Self::fail); everyone else shares the owner's result.
    pub fn claim(&self, path: &Path) -> Claim {
        use dashmap::mapref::entry::Entry;
        match self.slots.entry(path.to_path_buf()) {
            Entry::Occupied(_) => Claim::Pending,
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Slot::new()));
                Claim::Owner
            }
        }
    }

    /// Publish the owner's finished module.
    pub fn fulfill(&self, module: Arc<Module>) {
        if let Some(slot) = self.slots.get(&module.path) {
            let mut state = slot.state.lock();
            *state = SlotState::Ready(module.clone());
            slot.done.notify_all();
        }
    }

    /// Mark the owner's build as failed.
    pub fn fail(&self, path: &Path) {
        if let Some(slot) = self.slots.get(path) {
            let mut state = slot.state.lock();
            *state = SlotState::Failed;
            slot.done.notify_all();
        }
    }

    /// Block until `path` reaches a terminal state. Returns the module,
    /// or `None` if the path was never claimed or its build failed.
    pub fn wait(&self, path: &Path) -> Option<Arc<Module>> {
        let slot = match self.slots.get(path) {
            Some(entry) => Arc::clone(entry.value()),
            None => return None,
        };
        let mut state = slot.state.lock();
        loop {
            match &*state {
                SlotState::Ready(module) => return Some(module.clone()),
                SlotState::Failed => return None,
                SlotState::InFlight => slot.done.wait(&mut state),
            }
        }
    }

    /// Get a finished module without blocking.
    pub fn get(&self, path: &Path) -> Option<Arc<Module>> {
        let slot = self.slots.get(path)?;
        let state = slot.state.lock();
        match &*state {
            SlotState::Ready(module) => Some(module.clone()),
            _ => None,
        }
    }

    /// Number of claimed slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Collect all finished modules.
    fn finished(&self) -> Vec<Arc<Module>> {
        let mut modules = Vec::with_capacity(self.slots.len());
        for entry in self.slots.iter() {
            let state = entry.value().state.lock();
            if let SlotState::Ready(module) = &*state {
                modules.push(module.clone());
            }
        }
        modules
    }
}

impl Default for ModuleTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Options controlling a build pass traversal
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Worker threads for the traversal
    pub workers: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
        }
    }
}

/// Shared cancellation token.
///
/// Checked at every step boundary; once set, the pass discards all
/// in-flight work and emits nothing.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

enum Work {
    Build(PathBuf),
    Quit,
}

/// Shared state of one traversal
struct PassState {
    table: ModuleTable,
    pending: AtomicUsize,
    error: Mutex<Option<BuildError>>,
    tx: channel::Sender<Work>,
    workers: usize,
    cancel: CancelToken,
}

impl PassState {
    /// Record the first error and cancel everything else.
    fn fail(&self, err: BuildError) {
        let mut cell = self.error.lock();
        if cell.is_none() {
            *cell = Some(err);
        }
        drop(cell);
        self.cancel.cancel();
    }

    /// Enqueue a freshly claimed path. Pairs with `finish` exactly once.
    fn enqueue(&self, path: PathBuf) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        // Send only fails once every receiver is gone, i.e. the pool
        // has already shut down
        let _ = self.tx.send(Work::Build(path));
    }

    /// Mark one unit of work finished; the last finisher releases the
    /// pool.
    fn finish(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.release_pool();
        }
    }

    fn release_pool(&self) {
        for _ in 0..self.workers {
            let _ = self.tx.send(Work::Quit);
        }
    }
}

/// Builds the dependency graph for one pass.
pub struct GraphBuilder<'a> {
    resolver: &'a Resolver,
    registry: &'a TransformRegistry,
    plugins: &'a PluginSet,
    parser: &'a dyn DependencyParser,
    sources: &'a SourceCache,
    options: BuildOptions,
    cancel: CancelToken,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        resolver: &'a Resolver,
        registry: &'a TransformRegistry,
        plugins: &'a PluginSet,
        parser: &'a dyn DependencyParser,
        sources: &'a SourceCache,
        options: BuildOptions,
        cancel: CancelToken,
    ) -> Self {
        Self {
            resolver,
            registry,
            plugins,
            parser,
            sources,
            options,
            cancel,
        }
    }

    /// Traverse from resolved entry seeds and assemble the graph.
    ///
    /// `entries` pairs each chunk name with its seed paths. Every
    /// reachable module is visited exactly once; the first failure
    /// cancels the pass and is returned with no graph.
    pub fn build(&self, entries: Vec<(String, Vec<PathBuf>)>) -> BuildResult<BuildGraph> {
        let workers = self.options.workers.max(1);
        let (tx, rx) = channel::unbounded::<Work>();
        let state = PassState {
            table: ModuleTable::new(),
            pending: AtomicUsize::new(0),
            error: Mutex::new(None),
            tx,
            workers,
            cancel: self.cancel.clone(),
        };

        for (_, seeds) in &entries {
            for seed in seeds {
                if let Claim::Owner = state.table.claim(seed) {
                    state.enqueue(seed.clone());
                }
            }
        }
        if state.pending.load(Ordering::SeqCst) == 0 {
            state.release_pool();
        }

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let rx = rx.clone();
                let state = &state;
                scope.spawn(move || {
                    while let Ok(work) = rx.recv() {
                        match work {
                            Work::Quit => break,
                            Work::Build(path) => {
                                if state.cancel.is_cancelled() {
                                    state.table.fail(&path);
                                } else if let Err(err) = self.build_module(&path, state) {
                                    state.table.fail(&path);
                                    state.fail(err);
                                }
                                state.finish();
                            }
                        }
                    }
                });
            }
        });

        if let Some(err) = state.error.lock().take() {
            return Err(err);
        }
        if self.cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }

        Ok(BuildGraph::assemble(state.table.finished(), entries)?)
    }

    /// Build one module: read, transform, extract and resolve its
    /// dependencies, enqueue unseen ones, publish to the table.
    fn build_module(&self, path: &Path, state: &PassState) -> BuildResult<()> {
        let raw = self.sources.read(path).map_err(|e| BuildError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if self.cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }

        let transformed = self.registry.apply(path, &raw)?;
        let content = self.plugins.after_transform(path, transformed)?;

        if self.cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }

        let mut deps: Vec<(String, PathBuf)> = Vec::new();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        for specifier in self.parser.extract(path, &content) {
            if !seen.insert(specifier.clone()) {
                continue;
            }
            let rewritten = self.plugins.before_resolve(&specifier, Some(path))?;
            let resolved =
                self.resolver
                    .resolve(&rewritten, path)
                    .map_err(|source| BuildError::Resolve {
                        from: path.to_path_buf(),
                        source,
                    })?;
            if let Claim::Owner = state.table.claim(&resolved.path) {
                state.enqueue(resolved.path.clone());
            }
            deps.push((specifier, resolved.path));
        }

        state.table.fulfill(Arc::new(Module {
            path: path.to_path_buf(),
            raw: raw.as_ref().clone(),
            content,
            deps,
        }));
        Ok(())
    }
}
