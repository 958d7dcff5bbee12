//! Read-through source cache
//!
//! Long-lived file content cache keyed by path + mtime. Strictly an
//! optimization: a changed or unreadable mtime falls through to disk
//! and the entry is replaced. The cache carries no per-pass state and
//! may be shared across watch-mode passes.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;

/// Cached file content with the mtime observed at read time
#[derive(Debug, Clone)]
struct CachedSource {
    mtime: Option<SystemTime>,
    content: Arc<String>,
}

/// Shared read-through source cache
#[derive(Debug, Default)]
pub struct SourceCache {
    entries: DashMap<PathBuf, CachedSource>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl SourceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `path`, reusing the cached content when the mtime is
    /// unchanged.
    pub fn read(&self, path: &Path) -> io::Result<Arc<String>> {
        let mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        if let Some(entry) = self.entries.get(path) {
            if entry.mtime.is_some() && entry.mtime == mtime {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.content.clone());
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let content = Arc::new(std::fs::read_to_string(path)?);
        self.entries.insert(
            path.to_path_buf(),
            CachedSource {
                mtime,
                content: content.clone(),
            },
        );
        Ok(content)
    }

    /// Drop a single entry.
    pub fn invalidate(&self, path: &Path) {
        self.entries.remove(path);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) counters since creation.
    pub fn stats(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_second_read_hits_cache() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.js");
        fs::write(&path, "let x = 1;").unwrap();

        let cache = SourceCache::new();
        let first = cache.read(&path).unwrap();
        let second = cache.read(&path).unwrap();

        assert_eq!(first, second);
        let (hits, misses) = cache.stats();
        assert_eq!(hits, 1);
        assert_eq!(misses, 1);
    }

    #[test]
    fn test_modified_file_invalidates_entry() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.js");
        fs::write(&path, "let x = 1;").unwrap();

        let cache = SourceCache::new();
        let _ = cache.read(&path).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(&path, "let x = 2;").unwrap();

        let reread = cache.read(&path).unwrap();
        assert_eq!(reread.as_str(), "let x = 2;");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let cache = SourceCache::new();
        let result = cache.read(Path::new("/nonexistent/a.js"));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalidate_forces_reread() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.js");
        fs::write(&path, "x").unwrap();

        let cache = SourceCache::new();
        let _ = cache.read(&path).unwrap();
        cache.invalidate(&path);
        let _ = cache.read(&path).unwrap();

        let (hits, misses) = cache.stats();
        assert_eq!(hits, 0);
        assert_eq!(misses, 2);
    }
}
