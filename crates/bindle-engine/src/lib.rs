//! Bindle bundler engine.
//!
//! A dependency-graph-driven asset bundler core: entry specifiers are
//! resolved to source files, transformed through pattern-matched rule
//! chains, traversed into a build graph, and emitted as one artifact
//! per chunk, with plugin hooks observing each stage.

pub mod builder;
pub mod cache;
pub mod emit;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod manifest;
pub mod plugins;
pub mod resolver;
pub mod session;
pub mod transform;

pub use builder::{
    BuildOptions, CancelToken, Claim, DependencyParser, GraphBuilder, ImportScanner, ModuleTable,
};
pub use cache::SourceCache;
pub use emit::{Artifact, EmitError, Emitter};
pub use error::{BuildError, BuildResult};
pub use graph::{BuildGraph, Chunk, GraphError, Module};
pub use hooks::{Plugin, PluginError, PluginSet};
pub use manifest::{Manifest, ManifestError, PluginConfig};
pub use resolver::{Resolved, ResolveError, Resolver};
pub use session::{BuildReport, BuildSession, BuildState};
pub use transform::{FnTransform, Transform, TransformError, TransformRegistry};
