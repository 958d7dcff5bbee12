//! File-type transform rules
//!
//! Maps path patterns to ordered chains of content transforms. Rules
//! are static configuration: loaded once, never mutated during a build.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Errors that can occur while building or running transform chains
#[derive(Debug, Error)]
pub enum TransformError {
    /// A chain step failed; `position` is the zero-based step index
    #[error("Transform rule '{rule}' failed on {} at chain position {position}: {cause}", path.display())]
    Chain {
        rule: String,
        path: PathBuf,
        position: usize,
        cause: String,
    },

    /// A rule's pattern or exclude failed to compile
    #[error("Invalid pattern in rule '{rule}': {cause}")]
    Pattern { rule: String, cause: String },

    /// A rule references a transform name that was never registered
    #[error("Unknown transform '{transform}' referenced by rule '{rule}'")]
    Unknown { rule: String, transform: String },
}

/// A single content-rewriting step.
///
/// Transforms are pure functions of (path, content); the registry never
/// retains their output across build passes.
pub trait Transform: Send + Sync {
    /// Registered name, referenced by rules.
    fn name(&self) -> &str;

    /// Rewrite `content`. An error aborts the whole file's build.
    fn apply(&self, path: &Path, content: &str) -> Result<String, String>;
}

/// Adapter turning a closure into a named [`Transform`].
pub struct FnTransform<F> {
    name: String,
    func: F,
}

impl<F> FnTransform<F>
where
    F: Fn(&Path, &str) -> Result<String, String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(&Path, &str) -> Result<String, String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, path: &Path, content: &str) -> Result<String, String> {
        (self.func)(path, content)
    }
}

/// Re-emits a JSON file as a module exporting the parsed value.
pub struct JsonTransform;

impl Transform for JsonTransform {
    fn name(&self) -> &str {
        "json"
    }

    fn apply(&self, path: &Path, content: &str) -> Result<String, String> {
        let value: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))?;
        Ok(format!("module.exports = {};", value))
    }
}

/// Re-emits any file as a module exporting its content as a string.
pub struct TextTransform;

impl Transform for TextTransform {
    fn name(&self) -> &str {
        "text"
    }

    fn apply(&self, _path: &Path, content: &str) -> Result<String, String> {
        // serde_json string encoding doubles as a JS string literal
        Ok(format!(
            "module.exports = {};",
            serde_json::Value::String(content.to_string())
        ))
    }
}

/// A pattern-matched rule with its ordered transform chain
struct Rule {
    name: String,
    pattern: Regex,
    exclude: Option<Regex>,
    chain: Vec<Arc<dyn Transform>>,
}

/// Ordered transform rules, matched by pattern against module paths.
///
/// A file matching zero rules passes through unchanged. Matching rules
/// run in declaration order; each chain step consumes the previous
/// step's output.
pub struct TransformRegistry {
    transforms: FxHashMap<String, Arc<dyn Transform>>,
    rules: Vec<Rule>,
}

impl TransformRegistry {
    /// Create a registry with the built-in transforms registered.
    pub fn new() -> Self {
        let mut registry = Self {
            transforms: FxHashMap::default(),
            rules: Vec::new(),
        };
        registry.register(Arc::new(JsonTransform));
        registry.register(Arc::new(TextTransform));
        registry
    }

    /// Register a transform under its name. Later registrations replace
    /// earlier ones.
    pub fn register(&mut self, transform: Arc<dyn Transform>) {
        self.transforms
            .insert(transform.name().to_string(), transform);
    }

    /// Append a rule. `transforms` are names of registered transforms.
    pub fn add_rule(
        &mut self,
        name: &str,
        pattern: &str,
        exclude: Option<&str>,
        transforms: &[String],
    ) -> Result<(), TransformError> {
        let pattern = Regex::new(pattern).map_err(|e| TransformError::Pattern {
            rule: name.to_string(),
            cause: e.to_string(),
        })?;
        let exclude = match exclude {
            Some(src) => Some(Regex::new(src).map_err(|e| TransformError::Pattern {
                rule: name.to_string(),
                cause: e.to_string(),
            })?),
            None => None,
        };
        let mut chain = Vec::with_capacity(transforms.len());
        for transform_name in transforms {
            let transform = self.transforms.get(transform_name).cloned().ok_or_else(|| {
                TransformError::Unknown {
                    rule: name.to_string(),
                    transform: transform_name.clone(),
                }
            })?;
            chain.push(transform);
        }
        self.rules.push(Rule {
            name: name.to_string(),
            pattern,
            exclude,
            chain,
        });
        Ok(())
    }

    /// Run every matching rule's chain over `content`.
    pub fn apply(&self, path: &Path, content: &str) -> Result<String, TransformError> {
        let subject = normalize_path(path);
        let mut current = content.to_string();
        for rule in &self.rules {
            if !rule.pattern.is_match(&subject) {
                continue;
            }
            if let Some(exclude) = &rule.exclude {
                if exclude.is_match(&subject) {
                    continue;
                }
            }
            for (position, step) in rule.chain.iter().enumerate() {
                current = step
                    .apply(path, &current)
                    .map_err(|cause| TransformError::Chain {
                        rule: rule.name.clone(),
                        path: path.to_path_buf(),
                        position,
                        cause,
                    })?;
            }
        }
        Ok(current)
    }

    /// Number of registered rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Slash-normalize a path for pattern matching.
fn normalize_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
