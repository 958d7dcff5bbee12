//! Build graph
//!
//! The aggregate of built modules and their dependency edges. Cycles
//! are permitted; where the topology cannot decide an order, emission
//! falls back to the deterministic first-visit rank.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

/// Errors related to graph assembly
#[derive(Debug, Error, Clone)]
pub enum GraphError {
    /// An edge points at a module missing from the table
    #[error("Dangling edge: {} -> {} (via '{specifier}')", from.display(), to.display())]
    DanglingEdge {
        from: PathBuf,
        to: PathBuf,
        specifier: String,
    },
}

/// A fully built module.
///
/// Identity is the canonical absolute path. Immutable once transformed;
/// owned by the pass's module table.
#[derive(Debug)]
pub struct Module {
    /// Canonical absolute path
    pub path: PathBuf,
    /// Raw content as read from disk
    pub raw: String,
    /// Content after the transform chain and after-transform hooks
    pub content: String,
    /// Ordered (specifier, resolved path) pairs extracted from `content`
    pub deps: Vec<(String, PathBuf)>,
}

/// One output chunk: a named set of modules emitted as one artifact
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk id (index in entry declaration order)
    pub id: usize,
    /// Chunk name (the entry name)
    pub name: String,
    /// Entry modules seeding this chunk, in seed order
    pub entries: Vec<PathBuf>,
    /// Member modules, in first-visit order
    pub members: Vec<PathBuf>,
}

/// The finished build graph for one pass
#[derive(Debug, Default)]
pub struct BuildGraph {
    /// Module table keyed by canonical path
    modules: FxHashMap<PathBuf, Arc<Module>>,
    /// Deterministic first-visit rank (sequential DFS from entries)
    rank: FxHashMap<PathBuf, usize>,
    /// Entry (chunk name, seed paths) pairs in declaration order
    entries: Vec<(String, Vec<PathBuf>)>,
}

impl BuildGraph {
    /// Assemble a graph from a finished module table.
    ///
    /// Validates that every edge's target exists in the table, then
    /// computes the deterministic first-visit order. The parallel
    /// traversal discovers modules in a nondeterministic order; this
    /// rank is what keeps chunk assignment and emission stable across
    /// runs.
    pub fn assemble(
        modules: Vec<Arc<Module>>,
        entries: Vec<(String, Vec<PathBuf>)>,
    ) -> Result<Self, GraphError> {
        let mut table: FxHashMap<PathBuf, Arc<Module>> = FxHashMap::default();
        for module in modules {
            table.insert(module.path.clone(), module);
        }
        for module in table.values() {
            for (specifier, target) in &module.deps {
                if !table.contains_key(target) {
                    return Err(GraphError::DanglingEdge {
                        from: module.path.clone(),
                        to: target.clone(),
                        specifier: specifier.clone(),
                    });
                }
            }
        }
        let mut graph = Self {
            modules: table,
            rank: FxHashMap::default(),
            entries,
        };
        graph.rank = graph.compute_rank();
        Ok(graph)
    }

    /// Sequential preorder DFS from entries in declaration order,
    /// dependencies in extraction order.
    fn compute_rank(&self) -> FxHashMap<PathBuf, usize> {
        let mut rank: FxHashMap<PathBuf, usize> = FxHashMap::default();
        let mut next = 0usize;
        let mut stack: Vec<&PathBuf> = Vec::new();
        for (_, seeds) in &self.entries {
            for seed in seeds {
                stack.push(seed);
                while let Some(path) = stack.pop() {
                    if rank.contains_key(path) {
                        continue;
                    }
                    rank.insert(path.clone(), next);
                    next += 1;
                    if let Some(module) = self.modules.get(path) {
                        // reversed so the first dependency is visited first
                        for (_, dep) in module.deps.iter().rev() {
                            if !rank.contains_key(dep) {
                                stack.push(dep);
                            }
                        }
                    }
                }
            }
        }
        rank
    }

    /// Get a module by path.
    pub fn get(&self, path: &Path) -> Option<&Arc<Module>> {
        self.modules.get(path)
    }

    /// All modules (unordered).
    pub fn modules(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.modules.values()
    }

    /// Number of modules in the table.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Deterministic first-visit rank of a module.
    pub fn rank_of(&self, path: &Path) -> Option<usize> {
        self.rank.get(path).copied()
    }

    /// Entry (chunk name, seeds) pairs in declaration order.
    pub fn entries(&self) -> &[(String, Vec<PathBuf>)] {
        &self.entries
    }

    /// Assign every reachable module to exactly one chunk.
    ///
    /// Walks entries in declaration order; a module joins the first
    /// chunk whose entry reaches it. Members are listed in first-visit
    /// order.
    pub fn assign_chunks(&self) -> Vec<Chunk> {
        let mut owner: FxHashSet<&Path> = FxHashSet::default();
        let mut chunks: Vec<Chunk> = Vec::with_capacity(self.entries.len());
        for (id, (name, seeds)) in self.entries.iter().enumerate() {
            let mut members: Vec<PathBuf> = Vec::new();
            let mut stack: Vec<&Path> = Vec::new();
            for seed in seeds {
                stack.push(seed.as_path());
            }
            while let Some(path) = stack.pop() {
                if owner.contains(path) {
                    continue;
                }
                owner.insert(path);
                members.push(path.to_path_buf());
                if let Some(module) = self.modules.get(path) {
                    for (_, dep) in module.deps.iter().rev() {
                        if !owner.contains(dep.as_path()) {
                            stack.push(dep.as_path());
                        }
                    }
                }
            }
            members.sort_by_key(|p| self.rank.get(p).copied().unwrap_or(usize::MAX));
            chunks.push(Chunk {
                id,
                name: name.clone(),
                entries: seeds.clone(),
                members,
            });
        }
        chunks
    }

    /// Emission order for a chunk: topological (dependencies first)
    /// where the subgraph allows, first-visit rank within any cycle.
    /// Deterministic given an identical graph.
    ///
    /// Computed over the condensation: strongly connected components in
    /// reverse topological order, each component's members in rank
    /// order.
    pub fn emit_order(&self, chunk: &Chunk) -> Vec<PathBuf> {
        let rank_of = |p: &Path| self.rank.get(p).copied().unwrap_or(usize::MAX);

        // Index members by rank so the DFS start order is deterministic
        let mut nodes: Vec<&Path> = chunk.members.iter().map(|p| p.as_path()).collect();
        nodes.sort_by_key(|p| rank_of(p));
        let ids: FxHashMap<&Path, usize> =
            nodes.iter().enumerate().map(|(i, p)| (*p, i)).collect();

        // In-chunk adjacency, dependency extraction order, self-edges dropped
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        for (id, path) in nodes.iter().enumerate() {
            if let Some(module) = self.modules.get(*path) {
                let mut seen: FxHashSet<usize> = FxHashSet::default();
                for (_, dep) in &module.deps {
                    if let Some(&dep_id) = ids.get(dep.as_path()) {
                        if dep_id != id && seen.insert(dep_id) {
                            adj[id].push(dep_id);
                        }
                    }
                }
            }
        }

        // Tarjan pops each component after everything it depends on,
        // so the component order is already dependencies-first
        let mut order: Vec<PathBuf> = Vec::with_capacity(nodes.len());
        for mut component in strongly_connected(&adj) {
            component.sort_unstable();
            for id in component {
                order.push(nodes[id].to_path_buf());
            }
        }
        order
    }
}

/// Iterative Tarjan over an adjacency list.
///
/// Components come out in reverse topological order of the
/// condensation: a component is emitted before every component that
/// depends on it.
fn strongly_connected(adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adj.len();
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut low: Vec<usize> = vec![0; n];
    let mut on_stack: Vec<bool> = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut components: Vec<Vec<usize>> = Vec::new();
    // (node, next child offset) frames instead of recursion, so deep
    // or cyclic graphs cannot exhaust the call stack
    let mut frames: Vec<(usize, usize)> = Vec::new();

    for start in 0..n {
        if index[start].is_some() {
            continue;
        }
        frames.push((start, 0));
        while let Some(&(v, child)) = frames.last() {
            if index[v].is_none() {
                index[v] = Some(next_index);
                low[v] = next_index;
                next_index += 1;
                stack.push(v);
                on_stack[v] = true;
            }
            if child < adj[v].len() {
                if let Some(frame) = frames.last_mut() {
                    frame.1 += 1;
                }
                let w = adj[v][child];
                if index[w].is_none() {
                    frames.push((w, 0));
                } else if on_stack[w] {
                    if let Some(wi) = index[w] {
                        low[v] = low[v].min(wi);
                    }
                }
            } else {
                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    low[parent] = low[parent].min(low[v]);
                }
                if index[v] == Some(low[v]) {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    components.push(component);
                }
            }
        }
    }
    components
}
