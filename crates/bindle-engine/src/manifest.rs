//! Build manifest parsing (bindle.toml)
//!
//! Provides structures and parsing for bundler build manifests.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during manifest loading
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Failed to read manifest file
    #[error("Failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid manifest: {0}")]
    Validation(String),
}

/// Build manifest (bindle.toml)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// Named entry points, in chunk order
    #[serde(rename = "entry")]
    pub entries: Vec<EntryConfig>,

    /// Output location
    pub output: OutputConfig,

    /// Resolver settings
    #[serde(default)]
    pub resolve: ResolveConfig,

    /// Transform rules, in match order
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleConfig>,

    /// Plugins, in registration order
    #[serde(default, rename = "plugin")]
    pub plugins: Vec<PluginConfig>,
}

/// One named entry; seeds one output chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryConfig {
    /// Chunk name, substituted for `[name]` in the output filename
    pub name: String,
    /// Seed module specifiers, resolved against the project root
    pub modules: Vec<String>,
}

/// Output directory and filename pattern
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Directory artifacts are written to, relative to the project root
    pub dir: PathBuf,
    /// Filename pattern; `[name]` expands to the chunk name
    #[serde(default = "default_filename")]
    pub filename: String,
}

fn default_filename() -> String {
    "[name].js".to_string()
}

/// Resolver settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolveConfig {
    /// Extension priority order for extensionless specifiers
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    vec!["js".to_string(), "json".to_string()]
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
        }
    }
}

/// One transform rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleConfig {
    /// Rule name, reported in transform errors
    pub name: String,
    /// Regex matched against the slash-normalized path
    pub pattern: String,
    /// Optional regex exempting matching paths from this rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
    /// Names of registered transforms, run in order
    pub transforms: Vec<String>,
}

/// Built-in plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PluginConfig {
    /// Copy a static asset directory into the output directory
    CopyAssets {
        /// Source directory, relative to the project root
        from: PathBuf,
        /// Destination inside the output directory (defaults to its root)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PathBuf>,
    },
    /// Collect stylesheet content into a single CSS artifact
    ExtractCss {
        /// Output filename, relative to the output directory
        filename: String,
    },
}

impl Manifest {
    /// Load and validate a manifest from a file.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a manifest from TOML text.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.entries.is_empty() {
            return Err(ManifestError::Validation(
                "at least one [[entry]] is required".into(),
            ));
        }
        for entry in &self.entries {
            if entry.modules.is_empty() {
                return Err(ManifestError::Validation(format!(
                    "entry '{}' lists no modules",
                    entry.name
                )));
            }
        }
        let mut names: Vec<&str> = self.entries.iter().map(|e| e.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.entries.len() {
            return Err(ManifestError::Validation("entry names must be unique".into()));
        }
        if self.entries.len() > 1 && !self.output.filename.contains("[name]") {
            return Err(ManifestError::Validation(
                "output.filename must contain [name] when there is more than one entry".into(),
            ));
        }
        if Path::new(&self.output.filename).is_absolute() {
            return Err(ManifestError::Validation(
                "output.filename must be relative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[[entry]]
name = "app"
modules = ["./web/static/js/app.js", "./web/static/js/boot.js"]

[output]
dir = "priv/static"
filename = "js/[name].js"

[resolve]
extensions = ["js", "json"]

[[rule]]
name = "json"
pattern = '\.json$'
exclude = "node_modules"
transforms = ["json"]

[[plugin]]
kind = "copy-assets"
from = "web/static/assets"

[[plugin]]
kind = "extract-css"
filename = "css/app.css"
"#;

    #[test]
    fn test_parse_full_manifest() {
        let manifest = Manifest::parse(FULL).unwrap();

        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].name, "app");
        assert_eq!(manifest.entries[0].modules.len(), 2);
        assert_eq!(manifest.output.dir, PathBuf::from("priv/static"));
        assert_eq!(manifest.output.filename, "js/[name].js");
        assert_eq!(manifest.rules.len(), 1);
        assert_eq!(manifest.rules[0].exclude.as_deref(), Some("node_modules"));
        assert_eq!(manifest.plugins.len(), 2);
        assert_eq!(
            manifest.plugins[0],
            PluginConfig::CopyAssets {
                from: PathBuf::from("web/static/assets"),
                to: None,
            }
        );
        assert_eq!(
            manifest.plugins[1],
            PluginConfig::ExtractCss {
                filename: "css/app.css".to_string(),
            }
        );
    }

    #[test]
    fn test_defaults() {
        let manifest = Manifest::parse(
            r#"
[[entry]]
name = "app"
modules = ["./src/main.js"]

[output]
dir = "dist"
"#,
        )
        .unwrap();

        assert_eq!(manifest.output.filename, "[name].js");
        assert_eq!(manifest.resolve.extensions, vec!["js", "json"]);
        assert!(manifest.rules.is_empty());
        assert!(manifest.plugins.is_empty());
    }

    #[test]
    fn test_no_entries_is_invalid() {
        let result = Manifest::parse(
            r#"
[output]
dir = "dist"
"#,
        );
        // missing [[entry]] fails at deserialization or validation
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_entry_modules_is_invalid() {
        let result = Manifest::parse(
            r#"
[[entry]]
name = "app"
modules = []

[output]
dir = "dist"
"#,
        );
        assert!(matches!(result, Err(ManifestError::Validation(_))));
    }

    #[test]
    fn test_duplicate_entry_names_are_invalid() {
        let result = Manifest::parse(
            r#"
[[entry]]
name = "app"
modules = ["./a.js"]

[[entry]]
name = "app"
modules = ["./b.js"]

[output]
dir = "dist"
filename = "[name].js"
"#,
        );
        assert!(matches!(result, Err(ManifestError::Validation(_))));
    }

    #[test]
    fn test_multi_entry_requires_name_placeholder() {
        let result = Manifest::parse(
            r#"
[[entry]]
name = "app"
modules = ["./a.js"]

[[entry]]
name = "admin"
modules = ["./b.js"]

[output]
dir = "dist"
filename = "bundle.js"
"#,
        );
        assert!(matches!(result, Err(ManifestError::Validation(_))));
    }

    #[test]
    fn test_roundtrip() {
        let manifest = Manifest::parse(FULL).unwrap();
        let serialized = toml::to_string(&manifest).unwrap();
        let reparsed = Manifest::parse(&serialized).unwrap();
        assert_eq!(manifest, reparsed);
    }
}
