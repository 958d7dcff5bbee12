//! Build session
//!
//! Owns a configured bundler and runs build passes end to end, driving
//! the pass state machine:
//! `Idle → Resolving → Transforming → GraphComplete → Emitting → Done`,
//! with `Failed` reachable from every non-terminal state.
//!
//! A session may run many passes (watch mode); each pass gets a fresh
//! module table and fresh built-in plugin instances. Only the
//! read-through source cache persists across passes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builder::{BuildOptions, CancelToken, DependencyParser, GraphBuilder, ImportScanner};
use crate::cache::SourceCache;
use crate::emit::{Artifact, Emitter};
use crate::error::{BuildError, BuildResult};
use crate::graph::{BuildGraph, Chunk};
use crate::hooks::{Plugin, PluginSet};
use crate::manifest::{Manifest, PluginConfig};
use crate::plugins::{CopyAssetsPlugin, CssExtractPlugin};
use crate::resolver::Resolver;
use crate::transform::{Transform, TransformRegistry};

/// States of a single build pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Resolving,
    Transforming,
    GraphComplete,
    Emitting,
    Done,
    Failed,
}

/// Summary of a finished pass
#[derive(Debug)]
pub struct BuildReport {
    /// Artifacts written, one per chunk
    pub artifacts: Vec<Artifact>,
    /// Number of modules in the final module table
    pub module_count: usize,
    /// Chunk assignment used for emission
    pub chunks: Vec<Chunk>,
}

/// One configured bundler instance
pub struct BuildSession {
    manifest: Manifest,
    project_root: PathBuf,
    out_dir: PathBuf,
    resolver: Resolver,
    registry: TransformRegistry,
    extra_plugins: Vec<Arc<dyn Plugin>>,
    parser: Arc<dyn DependencyParser>,
    sources: SourceCache,
    options: BuildOptions,
    state: BuildState,
}

impl BuildSession {
    /// Construct a session from a manifest.
    ///
    /// `project_root` anchors entry specifiers, the resolution root,
    /// and the output directory.
    pub fn new(manifest: Manifest, project_root: PathBuf) -> BuildResult<Self> {
        Self::with_transforms(manifest, project_root, Vec::new())
    }

    /// Construct a session, registering extra transforms before rule
    /// compilation so rules may reference them by name.
    pub fn with_transforms(
        manifest: Manifest,
        project_root: PathBuf,
        transforms: Vec<Arc<dyn Transform>>,
    ) -> BuildResult<Self> {
        let project_root = project_root.canonicalize().map_err(|e| BuildError::Io {
            path: project_root.clone(),
            message: e.to_string(),
        })?;

        let resolver = Resolver::new(
            project_root.clone(),
            manifest.resolve.extensions.clone(),
        );

        let mut registry = TransformRegistry::new();
        for transform in transforms {
            registry.register(transform);
        }
        for rule in &manifest.rules {
            registry.add_rule(
                &rule.name,
                &rule.pattern,
                rule.exclude.as_deref(),
                &rule.transforms,
            )?;
        }

        let out_dir = project_root.join(&manifest.output.dir);

        Ok(Self {
            manifest,
            project_root,
            out_dir,
            resolver,
            registry,
            extra_plugins: Vec::new(),
            parser: Arc::new(ImportScanner),
            sources: SourceCache::new(),
            options: BuildOptions::default(),
            state: BuildState::Idle,
        })
    }

    /// Register an additional plugin for subsequent passes.
    ///
    /// Registered plugins run after the manifest-configured built-ins,
    /// in registration order.
    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        self.extra_plugins.push(plugin);
    }

    /// Replace the default dependency parser.
    pub fn set_parser(&mut self, parser: Arc<dyn DependencyParser>) {
        self.parser = parser;
    }

    /// Override traversal options.
    pub fn set_options(&mut self, options: BuildOptions) {
        self.options = options;
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn source_cache(&self) -> &SourceCache {
        &self.sources
    }

    /// Run one build pass.
    pub fn run(&mut self) -> BuildResult<BuildReport> {
        self.run_with_cancel(CancelToken::new())
    }

    /// Run one build pass honoring an external cancellation token.
    pub fn run_with_cancel(&mut self, cancel: CancelToken) -> BuildResult<BuildReport> {
        let result = self.run_inner(&cancel);
        self.state = match result {
            Ok(_) => BuildState::Done,
            Err(_) => BuildState::Failed,
        };
        result
    }

    /// Build the graph without emitting (inspection). The session is
    /// left in `GraphComplete` on success.
    pub fn build_graph(&mut self) -> BuildResult<BuildGraph> {
        let cancel = CancelToken::new();
        let plugins = self.build_plugin_set();
        let result = self.build_graph_inner(&plugins, &cancel);
        if result.is_err() {
            self.state = BuildState::Failed;
        }
        result
    }

    fn run_inner(&mut self, cancel: &CancelToken) -> BuildResult<BuildReport> {
        let plugins = self.build_plugin_set();
        let graph = self.build_graph_inner(&plugins, cancel)?;

        self.state = BuildState::Emitting;
        if cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        let chunks = graph.assign_chunks();
        let emitter = Emitter::new(
            &self.project_root,
            &self.out_dir,
            &self.manifest.output.filename,
            &plugins,
        );
        let artifacts = emitter.emit(&graph, &chunks)?;

        Ok(BuildReport {
            artifacts,
            module_count: graph.len(),
            chunks,
        })
    }

    fn build_graph_inner(
        &mut self,
        plugins: &PluginSet,
        cancel: &CancelToken,
    ) -> BuildResult<BuildGraph> {
        // Resolving: entry specifiers → seed paths
        self.state = BuildState::Resolving;
        let mut entries: Vec<(String, Vec<PathBuf>)> =
            Vec::with_capacity(self.manifest.entries.len());
        for entry in &self.manifest.entries {
            let mut seeds = Vec::with_capacity(entry.modules.len());
            for specifier in &entry.modules {
                let rewritten = plugins.before_resolve(specifier, None)?;
                let resolved = self.resolver.resolve_entry(&rewritten)?;
                seeds.push(resolved.path);
            }
            entries.push((entry.name.clone(), seeds));
        }
        if cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }

        // Transforming: traverse and build every reachable module
        self.state = BuildState::Transforming;
        let builder = GraphBuilder::new(
            &self.resolver,
            &self.registry,
            plugins,
            self.parser.as_ref(),
            &self.sources,
            self.options.clone(),
            cancel.clone(),
        );
        let graph = builder.build(entries)?;
        self.state = BuildState::GraphComplete;
        Ok(graph)
    }

    /// Fresh plugin set for one pass: manifest built-ins first, then
    /// programmatically registered plugins.
    fn build_plugin_set(&self) -> PluginSet {
        let mut plugins = PluginSet::new();
        for plugin in &self.manifest.plugins {
            match plugin {
                PluginConfig::CopyAssets { from, to } => {
                    let dest = match to {
                        Some(to) => self.out_dir.join(to),
                        None => self.out_dir.clone(),
                    };
                    plugins.register(Arc::new(CopyAssetsPlugin::new(
                        self.project_root.join(from),
                        dest,
                    )));
                }
                PluginConfig::ExtractCss { filename } => {
                    plugins.register(Arc::new(CssExtractPlugin::new(
                        self.out_dir.clone(),
                        PathBuf::from(filename),
                    )));
                }
            }
        }
        for plugin in &self.extra_plugins {
            plugins.register(plugin.clone());
        }
        plugins
    }
}
