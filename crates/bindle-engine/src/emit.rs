//! Bundle emission
//!
//! Walks the finished graph chunk by chunk and renders one artifact per
//! chunk: each member wrapped under its module id with a per-module
//! specifier map, so intra-chunk references resolve by resolved path
//! rather than by source-level identifier.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::error::BuildResult;
use crate::graph::{BuildGraph, Chunk, Module};
use crate::hooks::PluginSet;

/// Errors writing output artifacts
#[derive(Debug, Error)]
pub enum EmitError {
    /// I/O failure writing an artifact
    #[error("Failed to write {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    /// Filename pattern produced an absolute or escaping path
    #[error("Output filename escapes the output directory: {0}")]
    UnsafeFilename(String),
}

/// One emitted output artifact.
///
/// Immutable once returned from emission; plugins replace rather than
/// mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Chunk name this artifact was emitted for
    pub chunk: String,
    /// Path relative to the output directory
    pub filename: PathBuf,
    /// Final file content
    pub content: String,
}

/// Shared module registry, defined once per page and reused by every
/// chunk loaded after the first. Modules are cached before their body
/// runs, so cyclic requires terminate.
const RUNTIME_PREAMBLE: &str = r#"var __bindle = globalThis.__bindle || (globalThis.__bindle = (function () {
  var defs = {}, cache = {};
  function require(id) {
    if (cache[id]) return cache[id].exports;
    var def = defs[id];
    if (!def) throw new Error("Unknown module: " + id);
    var mod = (cache[id] = { exports: {} });
    def.fn.call(mod.exports, function (spec) { return require(def.map[spec] || spec); }, mod, mod.exports);
    return mod.exports;
  }
  return {
    define: function (id, map, fn) { defs[id] = { map: map, fn: fn }; },
    require: require
  };
})());
"#;

/// Bundle emitter
pub struct Emitter<'a> {
    project_root: &'a Path,
    out_dir: &'a Path,
    filename_pattern: &'a str,
    plugins: &'a PluginSet,
}

impl<'a> Emitter<'a> {
    /// `project_root` must be canonical so module ids come out
    /// root-relative.
    pub fn new(
        project_root: &'a Path,
        out_dir: &'a Path,
        filename_pattern: &'a str,
        plugins: &'a PluginSet,
    ) -> Self {
        Self {
            project_root,
            out_dir,
            filename_pattern,
            plugins,
        }
    }

    /// Render and write every chunk.
    ///
    /// Each artifact passes through the after-emit hooks, then lands
    /// atomically in the output directory (temp file, then rename).
    pub fn emit(&self, graph: &BuildGraph, chunks: &[Chunk]) -> BuildResult<Vec<Artifact>> {
        let mut artifacts = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let artifact = self.render_chunk(graph, chunk)?;
            let artifact = self.plugins.after_emit(artifact)?;
            self.write_artifact(&artifact)?;
            artifacts.push(artifact);
        }
        Ok(artifacts)
    }

    /// Render a chunk without writing it.
    pub fn render_chunk(&self, graph: &BuildGraph, chunk: &Chunk) -> BuildResult<Artifact> {
        let filename = PathBuf::from(self.filename_pattern.replace("[name]", &chunk.name));
        if filename.is_absolute()
            || filename
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(EmitError::UnsafeFilename(filename.display().to_string()).into());
        }

        let mut out = String::from(RUNTIME_PREAMBLE);
        for path in graph.emit_order(chunk) {
            let module = graph
                .get(&path)
                .expect("chunk member missing from module table");
            let id = module_id(self.project_root, &path);
            out.push_str("__bindle.define(");
            out.push_str(&json_str(&id));
            out.push_str(", ");
            out.push_str(&dep_map(self.project_root, module));
            out.push_str(", function (require, module, exports) {\n");
            out.push_str(&module.content);
            if !module.content.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("});\n");
        }
        for entry in &chunk.entries {
            out.push_str("__bindle.require(");
            out.push_str(&json_str(&module_id(self.project_root, entry)));
            out.push_str(");\n");
        }

        Ok(Artifact {
            chunk: chunk.name.clone(),
            filename,
            content: out,
        })
    }

    /// Write an artifact atomically: temp file in the output directory,
    /// then rename over the final path.
    fn write_artifact(&self, artifact: &Artifact) -> Result<(), EmitError> {
        let final_path = self.out_dir.join(&artifact.filename);
        if let Some(parent) = final_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EmitError::Io {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }
        let mut tmp_name = final_path.clone().into_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = std::fs::File::create(&tmp_path).map_err(|e| EmitError::Io {
            path: tmp_path.clone(),
            message: e.to_string(),
        })?;
        file.write_all(artifact.content.as_bytes())
            .map_err(|e| EmitError::Io {
                path: tmp_path.clone(),
                message: e.to_string(),
            })?;
        drop(file);

        std::fs::rename(&tmp_path, &final_path).map_err(|e| EmitError::Io {
            path: final_path.clone(),
            message: e.to_string(),
        })
    }
}

/// Module id: project-root-relative path with forward slashes.
pub fn module_id(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let s = rel.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace('\\', "/")
    }
}

/// JSON object literal mapping each dependency specifier to its module id.
fn dep_map(root: &Path, module: &Module) -> String {
    let mut out = String::from("{");
    for (i, (specifier, target)) in module.deps.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&json_str(specifier));
        out.push_str(": ");
        out.push_str(&json_str(&module_id(root, target)));
    }
    out.push('}');
    out
}

fn json_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
