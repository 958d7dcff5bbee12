//! Plugin hook extension points
//!
//! A fixed set of lifecycle hooks invoked around resolution,
//! transformation, and emission. Hooks run in registration order and
//! thread the value they return into the next plugin; they never touch
//! the build graph directly.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::emit::Artifact;

/// A plugin hook failure, attributed to the plugin and hook that raised it
#[derive(Debug, Error, Clone)]
#[error("Plugin '{plugin}' failed in {hook} hook: {cause}")]
pub struct PluginError {
    /// Identity of the failing plugin
    pub plugin: String,
    /// Hook name ("before-resolve", "after-transform", "after-emit")
    pub hook: &'static str,
    /// Underlying cause
    pub cause: String,
}

/// A plugin registers for any subset of the lifecycle hooks.
///
/// Returning `Ok(None)` leaves the value unchanged; `Ok(Some(v))`
/// replaces it for the rest of the chain and the build.
pub trait Plugin: Send + Sync {
    /// Identity used in error attribution.
    fn name(&self) -> &str;

    /// Rewrite a specifier before resolution. `from` is the requesting
    /// file, or `None` for entry specifiers.
    fn before_resolve(
        &self,
        _specifier: &str,
        _from: Option<&Path>,
    ) -> Result<Option<String>, String> {
        Ok(None)
    }

    /// Rewrite transformed content before it enters the module table.
    fn after_transform(&self, _path: &Path, _content: &str) -> Result<Option<String>, String> {
        Ok(None)
    }

    /// Observe or replace an artifact before it is written.
    fn after_emit(&self, _artifact: &Artifact) -> Result<Option<Artifact>, String> {
        Ok(None)
    }
}

/// Ordered set of registered plugins
#[derive(Default, Clone)]
pub struct PluginSet {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginSet {
    /// Create an empty plugin set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Hooks run in registration order.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Run `before-resolve` over all plugins, threading the specifier.
    pub fn before_resolve(
        &self,
        specifier: &str,
        from: Option<&Path>,
    ) -> Result<String, PluginError> {
        let mut current = specifier.to_string();
        for plugin in &self.plugins {
            if let Some(replaced) =
                plugin
                    .before_resolve(&current, from)
                    .map_err(|cause| PluginError {
                        plugin: plugin.name().to_string(),
                        hook: "before-resolve",
                        cause,
                    })?
            {
                current = replaced;
            }
        }
        Ok(current)
    }

    /// Run `after-transform` over all plugins, threading the content.
    pub fn after_transform(&self, path: &Path, content: String) -> Result<String, PluginError> {
        let mut current = content;
        for plugin in &self.plugins {
            if let Some(replaced) =
                plugin
                    .after_transform(path, &current)
                    .map_err(|cause| PluginError {
                        plugin: plugin.name().to_string(),
                        hook: "after-transform",
                        cause,
                    })?
            {
                current = replaced;
            }
        }
        Ok(current)
    }

    /// Run `after-emit` over all plugins, threading the artifact.
    pub fn after_emit(&self, artifact: Artifact) -> Result<Artifact, PluginError> {
        let mut current = artifact;
        for plugin in &self.plugins {
            if let Some(replaced) = plugin.after_emit(&current).map_err(|cause| PluginError {
                plugin: plugin.name().to_string(),
                hook: "after-emit",
                cause,
            })? {
                current = replaced;
            }
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Suffixer {
        name: String,
        suffix: String,
    }

    impl Plugin for Suffixer {
        fn name(&self) -> &str {
            &self.name
        }

        fn after_transform(&self, _path: &Path, content: &str) -> Result<Option<String>, String> {
            Ok(Some(format!("{}{}", content, self.suffix)))
        }
    }

    struct Failing;

    impl Plugin for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn before_resolve(
            &self,
            _specifier: &str,
            _from: Option<&Path>,
        ) -> Result<Option<String>, String> {
            Err("refused".to_string())
        }
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let mut set = PluginSet::new();
        set.register(Arc::new(Suffixer {
            name: "a".into(),
            suffix: "-a".into(),
        }));
        set.register(Arc::new(Suffixer {
            name: "b".into(),
            suffix: "-b".into(),
        }));

        let out = set
            .after_transform(Path::new("/x.js"), "base".to_string())
            .unwrap();
        assert_eq!(out, "base-a-b");
    }

    #[test]
    fn test_unregistered_hooks_leave_value_unchanged() {
        let set = PluginSet::new();
        let spec = set.before_resolve("./utils", None).unwrap();
        assert_eq!(spec, "./utils");

        let artifact = Artifact {
            chunk: "app".to_string(),
            filename: PathBuf::from("app.js"),
            content: "x".to_string(),
        };
        let out = set.after_emit(artifact.clone()).unwrap();
        assert_eq!(out, artifact);
    }

    #[test]
    fn test_failure_is_attributed_to_plugin_and_hook() {
        let mut set = PluginSet::new();
        set.register(Arc::new(Failing));

        let err = set.before_resolve("./x", None).unwrap_err();
        assert_eq!(err.plugin, "failing");
        assert_eq!(err.hook, "before-resolve");
        assert_eq!(err.cause, "refused");
    }

    #[test]
    fn test_specifier_rewrite_threads_through() {
        struct Redirect;
        impl Plugin for Redirect {
            fn name(&self) -> &str {
                "redirect"
            }
            fn before_resolve(
                &self,
                specifier: &str,
                _from: Option<&Path>,
            ) -> Result<Option<String>, String> {
                if specifier == "./old" {
                    Ok(Some("./new".to_string()))
                } else {
                    Ok(None)
                }
            }
        }

        let mut set = PluginSet::new();
        set.register(Arc::new(Redirect));
        assert_eq!(set.before_resolve("./old", None).unwrap(), "./new");
        assert_eq!(set.before_resolve("./other", None).unwrap(), "./other");
    }
}
