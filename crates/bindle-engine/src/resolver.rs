//! Module path resolution
//!
//! Handles resolving import specifiers to absolute file paths.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during module resolution
#[derive(Debug, Error, Clone)]
pub enum ResolveError {
    /// No candidate file exists for the specifier
    #[error("Module not found: {specifier} (tried: {tried:?})")]
    NotFound {
        specifier: String,
        tried: Vec<PathBuf>,
    },

    /// More than one known extension matches an extensionless specifier
    #[error("Ambiguous specifier {specifier}: candidates {candidates:?}")]
    Ambiguous {
        specifier: String,
        candidates: Vec<PathBuf>,
    },

    /// The resolved file lies outside the project root
    #[error("Module {} is outside the permitted root {}", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// Requesting file has no parent directory
    #[error("Cannot resolve import: requesting file has no parent directory")]
    NoParentDirectory,

    /// IO error during resolution
    #[error("IO error: {0}")]
    Io(String),
}

/// A resolved module with its canonical absolute path
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Canonical absolute path to the module file
    pub path: PathBuf,
    /// Whether this was resolved from a directory index file
    pub is_index: bool,
}

/// Module resolver for import specifiers
///
/// Resolution is a pure function over the filesystem snapshot at call
/// time: the same (specifier, requesting directory) pair always yields
/// the same path.
#[derive(Debug, Clone)]
pub struct Resolver {
    /// Project root directory; resolved modules must stay inside it
    project_root: PathBuf,
    /// Extension priority order for extensionless specifiers
    extensions: Vec<String>,
}

impl Resolver {
    /// Create a resolver rooted at `project_root`.
    pub fn new(project_root: PathBuf, extensions: Vec<String>) -> Self {
        Self {
            project_root,
            extensions,
        }
    }

    /// Get the project root
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Resolve an import specifier from the file containing it.
    ///
    /// `./` and `../` specifiers resolve against the requesting file's
    /// directory; anything else resolves against the project root.
    ///
    /// # Resolution Order
    /// 1. The exact path, if it names an existing file
    /// 2. The path with each configured extension appended, in priority
    ///    order (two hits is an error, not a pick)
    /// 3. A directory index file (`index.<ext>`, same priority order)
    pub fn resolve(&self, specifier: &str, from_file: &Path) -> Result<Resolved, ResolveError> {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let from_dir = from_file.parent().ok_or(ResolveError::NoParentDirectory)?;
            self.resolve_in(specifier, from_dir)
        } else {
            self.resolve_in(specifier, &self.project_root)
        }
    }

    /// Resolve an entry specifier against the project root.
    pub fn resolve_entry(&self, specifier: &str) -> Result<Resolved, ResolveError> {
        self.resolve_in(specifier, &self.project_root)
    }

    fn resolve_in(&self, specifier: &str, base_dir: &Path) -> Result<Resolved, ResolveError> {
        let base = base_dir.join(specifier);
        let mut tried = Vec::new();

        // 1. Exact file match
        tried.push(base.clone());
        if base.is_file() {
            return self.finish(&base, false);
        }

        // 2. Extension-inferred match
        let mut candidates = Vec::new();
        for ext in &self.extensions {
            let with_ext = append_extension(&base, ext);
            tried.push(with_ext.clone());
            if with_ext.is_file() {
                candidates.push(with_ext);
            }
        }
        match candidates.len() {
            1 => return self.finish(&candidates[0], false),
            0 => {}
            _ => {
                return Err(ResolveError::Ambiguous {
                    specifier: specifier.to_string(),
                    candidates,
                })
            }
        }

        // 3. Directory index file
        if base.is_dir() {
            for ext in &self.extensions {
                let index = base.join(format!("index.{ext}"));
                tried.push(index.clone());
                if index.is_file() {
                    return self.finish(&index, true);
                }
            }
        }

        Err(ResolveError::NotFound {
            specifier: specifier.to_string(),
            tried,
        })
    }

    /// Canonicalize the match and confine it to the project root.
    fn finish(&self, path: &Path, is_index: bool) -> Result<Resolved, ResolveError> {
        let canonical = self.canonicalize(path)?;
        let root = self.canonicalize(&self.project_root)?;
        if !canonical.starts_with(&root) {
            return Err(ResolveError::OutsideRoot {
                path: canonical,
                root,
            });
        }
        Ok(Resolved {
            path: canonical,
            is_index,
        })
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, ResolveError> {
        path.canonicalize().map_err(|e| {
            ResolveError::Io(format!("Failed to canonicalize {}: {}", path.display(), e))
        })
    }
}

/// Append (not replace) an extension: `lib.min` + `js` → `lib.min.js`.
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_project() -> (TempDir, Resolver) {
        let temp_dir = TempDir::new().unwrap();
        let resolver = Resolver::new(
            temp_dir.path().to_path_buf(),
            vec!["js".to_string(), "json".to_string()],
        );
        (temp_dir, resolver)
    }

    #[test]
    fn test_resolve_exact_path() {
        let (temp_dir, resolver) = create_test_project();

        let src_dir = temp_dir.path().join("src");
        fs::create_dir_all(&src_dir).unwrap();
        fs::write(src_dir.join("main.js"), "import \"./utils.js\";").unwrap();
        fs::write(src_dir.join("utils.js"), "module.exports = 1;").unwrap();

        let main_file = src_dir.join("main.js");
        let resolved = resolver.resolve("./utils.js", &main_file).unwrap();

        assert_eq!(
            resolved.path,
            src_dir.join("utils.js").canonicalize().unwrap()
        );
        assert!(!resolved.is_index);
    }

    #[test]
    fn test_resolve_extension_inference() {
        let (temp_dir, resolver) = create_test_project();

        let src_dir = temp_dir.path().join("src");
        fs::create_dir_all(&src_dir).unwrap();
        fs::write(src_dir.join("main.js"), "import \"./utils\";").unwrap();
        fs::write(src_dir.join("utils.js"), "module.exports = 1;").unwrap();

        let main_file = src_dir.join("main.js");
        let resolved = resolver.resolve("./utils", &main_file).unwrap();

        assert_eq!(
            resolved.path,
            src_dir.join("utils.js").canonicalize().unwrap()
        );
    }

    #[test]
    fn test_resolve_ambiguous_extensions() {
        let (temp_dir, resolver) = create_test_project();

        let src_dir = temp_dir.path().join("src");
        fs::create_dir_all(&src_dir).unwrap();
        fs::write(src_dir.join("main.js"), "import \"./data\";").unwrap();
        fs::write(src_dir.join("data.js"), "").unwrap();
        fs::write(src_dir.join("data.json"), "{}").unwrap();

        let main_file = src_dir.join("main.js");
        let result = resolver.resolve("./data", &main_file);

        match result {
            Err(ResolveError::Ambiguous { candidates, .. }) => {
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected Ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_directory_index() {
        let (temp_dir, resolver) = create_test_project();

        let src_dir = temp_dir.path().join("src");
        let lib_dir = src_dir.join("lib");
        fs::create_dir_all(&lib_dir).unwrap();
        fs::write(src_dir.join("main.js"), "import \"./lib\";").unwrap();
        fs::write(lib_dir.join("index.js"), "module.exports = 2;").unwrap();

        let main_file = src_dir.join("main.js");
        let resolved = resolver.resolve("./lib", &main_file).unwrap();

        assert_eq!(
            resolved.path,
            lib_dir.join("index.js").canonicalize().unwrap()
        );
        assert!(resolved.is_index);
    }

    #[test]
    fn test_exact_match_beats_extension_inference() {
        let (temp_dir, resolver) = create_test_project();

        let src_dir = temp_dir.path().join("src");
        fs::create_dir_all(&src_dir).unwrap();
        fs::write(src_dir.join("main.js"), "").unwrap();
        // An extensionless file with the exact specifier name
        fs::write(src_dir.join("LICENSE"), "text").unwrap();
        fs::write(src_dir.join("LICENSE.js"), "").unwrap();

        let main_file = src_dir.join("main.js");
        let resolved = resolver.resolve("./LICENSE", &main_file).unwrap();

        assert_eq!(
            resolved.path,
            src_dir.join("LICENSE").canonicalize().unwrap()
        );
    }

    #[test]
    fn test_resolve_parent_directory() {
        let (temp_dir, resolver) = create_test_project();

        let src_dir = temp_dir.path().join("src");
        let nested_dir = src_dir.join("nested");
        fs::create_dir_all(&nested_dir).unwrap();
        fs::write(nested_dir.join("module.js"), "import \"../shared\";").unwrap();
        fs::write(src_dir.join("shared.js"), "module.exports = 42;").unwrap();

        let module_file = nested_dir.join("module.js");
        let resolved = resolver.resolve("../shared", &module_file).unwrap();

        assert_eq!(
            resolved.path,
            src_dir.join("shared.js").canonicalize().unwrap()
        );
    }

    #[test]
    fn test_bare_specifier_resolves_from_root() {
        let (temp_dir, resolver) = create_test_project();

        let src_dir = temp_dir.path().join("src");
        fs::create_dir_all(&src_dir).unwrap();
        fs::write(src_dir.join("helper.js"), "").unwrap();
        fs::write(src_dir.join("main.js"), "").unwrap();

        let main_file = src_dir.join("main.js");
        let resolved = resolver.resolve("src/helper", &main_file).unwrap();

        assert_eq!(
            resolved.path,
            src_dir.join("helper.js").canonicalize().unwrap()
        );
    }

    #[test]
    fn test_resolve_not_found_reports_tried_paths() {
        let (temp_dir, resolver) = create_test_project();

        let src_dir = temp_dir.path().join("src");
        fs::create_dir_all(&src_dir).unwrap();
        fs::write(src_dir.join("main.js"), "import \"./missing\";").unwrap();

        let main_file = src_dir.join("main.js");
        let result = resolver.resolve("./missing", &main_file);

        match result {
            Err(ResolveError::NotFound { tried, .. }) => {
                // exact + two extensions
                assert_eq!(tried.len(), 3);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_outside_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("project");
        let src_dir = root.join("src");
        fs::create_dir_all(&src_dir).unwrap();
        fs::write(src_dir.join("main.js"), "").unwrap();
        // A sibling of the project root, reachable via ../..
        fs::write(temp_dir.path().join("secret.js"), "").unwrap();

        let resolver = Resolver::new(root, vec!["js".to_string()]);
        let main_file = src_dir.join("main.js");
        let result = resolver.resolve("../../secret", &main_file);

        assert!(matches!(result, Err(ResolveError::OutsideRoot { .. })));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let (temp_dir, resolver) = create_test_project();

        let src_dir = temp_dir.path().join("src");
        fs::create_dir_all(&src_dir).unwrap();
        fs::write(src_dir.join("main.js"), "").unwrap();
        fs::write(src_dir.join("utils.js"), "").unwrap();

        let main_file = src_dir.join("main.js");
        let first = resolver.resolve("./utils", &main_file).unwrap();
        let second = resolver.resolve("./utils", &main_file).unwrap();

        assert_eq!(first.path, second.path);
    }
}
