//! Build error types.

use std::path::PathBuf;

use crate::emit::EmitError;
use crate::graph::GraphError;
use crate::hooks::PluginError;
use crate::resolver::ResolveError;
use crate::transform::TransformError;

/// Errors that can occur during a build pass.
///
/// Every kind is fail-fast: the first one aborts the pass and no
/// partial artifact reaches the output directory.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// An entry specifier failed to resolve
    #[error("Failed to resolve entry: {0}")]
    Entry(#[from] ResolveError),

    /// An import failed to resolve; `from` is the requesting module
    #[error("Failed to resolve import in {}: {source}", from.display())]
    Resolve {
        from: PathBuf,
        #[source]
        source: ResolveError,
    },

    /// A transform chain failed
    #[error("{0}")]
    Transform(#[from] TransformError),

    /// A plugin hook failed
    #[error("{0}")]
    Plugin(#[from] PluginError),

    /// Graph assembly failed
    #[error("{0}")]
    Graph(#[from] GraphError),

    /// Writing an output artifact failed
    #[error("{0}")]
    Emit(#[from] EmitError),

    /// IO error reading a source file
    #[error("Failed to read {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    /// The pass was cancelled before completing
    #[error("build pass cancelled")]
    Cancelled,
}

/// Result type for build passes
pub type BuildResult<T> = Result<T, BuildError>;
