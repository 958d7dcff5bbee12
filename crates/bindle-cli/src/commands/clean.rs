//! `bindle clean` — remove the output directory.

use std::path::PathBuf;

use anyhow::Context;
use bindle_engine::Manifest;

use crate::output::StyledOutput;

pub fn execute(config: PathBuf, out: &mut StyledOutput) -> anyhow::Result<()> {
    let config = config
        .canonicalize()
        .with_context(|| format!("cannot find {}", config.display()))?;
    let project_root = config
        .parent()
        .context("manifest has no parent directory")?;
    let manifest = Manifest::from_file(&config)?;

    let out_dir = project_root.join(&manifest.output.dir);
    if out_dir.exists() {
        std::fs::remove_dir_all(&out_dir)
            .with_context(|| format!("failed to remove {}", out_dir.display()))?;
        out.status("Removed", &out_dir.display().to_string());
    } else {
        out.line("nothing to clean");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use termcolor::ColorChoice;

    #[test]
    fn test_clean_removes_only_the_output_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("bindle.toml"),
            r#"
[[entry]]
name = "app"
modules = ["./src/main.js"]

[output]
dir = "dist"
"#,
        )
        .unwrap();
        std::fs::create_dir_all(temp_dir.path().join("dist/js")).unwrap();
        std::fs::create_dir_all(temp_dir.path().join("src")).unwrap();
        std::fs::write(temp_dir.path().join("src/main.js"), "x").unwrap();

        let mut out = StyledOutput::new(ColorChoice::Never);
        execute(temp_dir.path().join("bindle.toml"), &mut out).unwrap();

        assert!(!temp_dir.path().join("dist").exists());
        assert!(temp_dir.path().join("src/main.js").is_file());
    }
}
