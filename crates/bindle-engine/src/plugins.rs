//! Built-in plugins
//!
//! Minimal analogs of the copy-assets and CSS-extraction packaging
//! plugins, implemented against the ordinary hook surface. Both carry
//! per-pass state, so the session constructs fresh instances for every
//! pass.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::emit::Artifact;
use crate::hooks::Plugin;

/// Copies a static asset directory into the output directory.
///
/// Runs once per build, on the first `after-emit` invocation.
pub struct CopyAssetsPlugin {
    from: PathBuf,
    dest: PathBuf,
    done: AtomicBool,
}

impl CopyAssetsPlugin {
    /// `from` is the source directory; `dest` the destination
    /// (usually the output directory or a subdirectory of it).
    pub fn new(from: PathBuf, dest: PathBuf) -> Self {
        Self {
            from,
            dest,
            done: AtomicBool::new(false),
        }
    }

    fn copy_all(&self) -> Result<usize, String> {
        let pattern = format!("{}/**/*", self.from.display());
        let mut copied = 0usize;
        for entry in glob::glob(&pattern).map_err(|e| e.to_string())? {
            let source = entry.map_err(|e| e.to_string())?;
            if !source.is_file() {
                continue;
            }
            let rel = source
                .strip_prefix(&self.from)
                .map_err(|e| e.to_string())?;
            let target = self.dest.join(rel);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            std::fs::copy(&source, &target).map_err(|e| e.to_string())?;
            copied += 1;
        }
        Ok(copied)
    }
}

impl Plugin for CopyAssetsPlugin {
    fn name(&self) -> &str {
        "copy-assets"
    }

    fn after_emit(&self, _artifact: &Artifact) -> Result<Option<Artifact>, String> {
        if self.done.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        self.copy_all()?;
        Ok(None)
    }
}

/// Collects stylesheet content during `after-transform` and writes one
/// CSS artifact per build.
///
/// Stylesheet modules stay in their chunk as empty placeholders; the
/// collected text is written (sorted by path, so output is stable) on
/// the first `after-emit`.
pub struct CssExtractPlugin {
    out_dir: PathBuf,
    filename: PathBuf,
    collected: Mutex<Vec<(PathBuf, String)>>,
    written: AtomicBool,
}

impl CssExtractPlugin {
    pub fn new(out_dir: PathBuf, filename: PathBuf) -> Self {
        Self {
            out_dir,
            filename,
            collected: Mutex::new(Vec::new()),
            written: AtomicBool::new(false),
        }
    }

    fn is_stylesheet(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("css") | Some("sass") | Some("scss")
        )
    }
}

impl Plugin for CssExtractPlugin {
    fn name(&self) -> &str {
        "extract-css"
    }

    fn after_transform(&self, path: &Path, content: &str) -> Result<Option<String>, String> {
        if !Self::is_stylesheet(path) {
            return Ok(None);
        }
        self.collected
            .lock()
            .push((path.to_path_buf(), content.to_string()));
        // The chunk keeps an empty placeholder module
        Ok(Some(String::new()))
    }

    fn after_emit(&self, _artifact: &Artifact) -> Result<Option<Artifact>, String> {
        if self.written.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        let mut sheets = self.collected.lock();
        if sheets.is_empty() {
            return Ok(None);
        }
        sheets.sort_by(|a, b| a.0.cmp(&b.0));

        let mut css = String::new();
        for (path, content) in sheets.iter() {
            css.push_str(&format!("/* {} */\n", path.display()));
            css.push_str(content);
            if !content.ends_with('\n') {
                css.push('\n');
            }
        }

        let target = self.out_dir.join(&self.filename);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        // Same atomic discipline as chunk artifacts
        let mut tmp_name = target.clone().into_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        std::fs::write(&tmp_path, css.as_bytes()).map_err(|e| e.to_string())?;
        std::fs::rename(&tmp_path, &target).map_err(|e| e.to_string())?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn artifact() -> Artifact {
        Artifact {
            chunk: "app".to_string(),
            filename: PathBuf::from("app.js"),
            content: String::new(),
        }
    }

    #[test]
    fn test_copy_assets_mirrors_tree() {
        let temp_dir = TempDir::new().unwrap();
        let assets = temp_dir.path().join("assets");
        let nested = assets.join("img");
        fs::create_dir_all(&nested).unwrap();
        fs::write(assets.join("robots.txt"), "User-agent: *").unwrap();
        fs::write(nested.join("logo.svg"), "<svg/>").unwrap();

        let out_dir = temp_dir.path().join("dist");
        fs::create_dir_all(&out_dir).unwrap();

        let plugin = CopyAssetsPlugin::new(assets, out_dir.clone());
        plugin.after_emit(&artifact()).unwrap();

        assert_eq!(
            fs::read_to_string(out_dir.join("robots.txt")).unwrap(),
            "User-agent: *"
        );
        assert_eq!(
            fs::read_to_string(out_dir.join("img/logo.svg")).unwrap(),
            "<svg/>"
        );
    }

    #[test]
    fn test_copy_assets_runs_once() {
        let temp_dir = TempDir::new().unwrap();
        let assets = temp_dir.path().join("assets");
        fs::create_dir_all(&assets).unwrap();
        fs::write(assets.join("a.txt"), "1").unwrap();

        let out_dir = temp_dir.path().join("dist");
        fs::create_dir_all(&out_dir).unwrap();

        let plugin = CopyAssetsPlugin::new(assets.clone(), out_dir.clone());
        plugin.after_emit(&artifact()).unwrap();

        // A second artifact does not re-copy
        fs::write(assets.join("a.txt"), "2").unwrap();
        plugin.after_emit(&artifact()).unwrap();
        assert_eq!(fs::read_to_string(out_dir.join("a.txt")).unwrap(), "1");
    }

    #[test]
    fn test_css_extract_collects_and_writes() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path().to_path_buf();

        let plugin = CssExtractPlugin::new(out_dir.clone(), PathBuf::from("css/app.css"));

        let replaced = plugin
            .after_transform(Path::new("/p/b.sass"), "body { color: red }")
            .unwrap();
        assert_eq!(replaced.as_deref(), Some(""));
        let replaced = plugin
            .after_transform(Path::new("/p/a.css"), "h1 { margin: 0 }")
            .unwrap();
        assert_eq!(replaced.as_deref(), Some(""));

        // JS content is left alone
        let untouched = plugin
            .after_transform(Path::new("/p/a.js"), "let x;")
            .unwrap();
        assert!(untouched.is_none());

        plugin.after_emit(&artifact()).unwrap();

        let css = fs::read_to_string(out_dir.join("css/app.css")).unwrap();
        // sorted by path: a.css before b.sass
        let a_pos = css.find("h1 { margin: 0 }").unwrap();
        let b_pos = css.find("body { color: red }").unwrap();
        assert!(a_pos < b_pos);
        assert!(!out_dir.join("css/app.css.tmp").exists());
    }

    #[test]
    fn test_css_extract_skips_empty_collection() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path().to_path_buf();

        let plugin = CssExtractPlugin::new(out_dir.clone(), PathBuf::from("app.css"));
        plugin.after_emit(&artifact()).unwrap();

        assert!(!out_dir.join("app.css").exists());
    }
}
