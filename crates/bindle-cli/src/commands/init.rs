//! `bindle init` — scaffold a starter build manifest.

use std::path::PathBuf;

use crate::output::StyledOutput;

const MANIFEST_TEMPLATE: &str = r#"[[entry]]
name = "app"
modules = ["./src/main.js"]

[output]
dir = "dist"
filename = "js/[name].js"

[resolve]
extensions = ["js", "json"]
"#;

const MAIN_TEMPLATE: &str = "export const hello = \"bindle\";\n";

pub fn execute(path: PathBuf, out: &mut StyledOutput) -> anyhow::Result<()> {
    let manifest_path = path.join("bindle.toml");
    if manifest_path.exists() {
        anyhow::bail!("{} already exists", manifest_path.display());
    }
    std::fs::create_dir_all(&path)?;
    std::fs::write(&manifest_path, MANIFEST_TEMPLATE)?;

    let src = path.join("src");
    if !src.join("main.js").exists() {
        std::fs::create_dir_all(&src)?;
        std::fs::write(src.join("main.js"), MAIN_TEMPLATE)?;
    }

    out.status("Created", &manifest_path.display().to_string());
    Ok(())
}
