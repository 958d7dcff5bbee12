//! `bindle graph` — build and print the module graph without emitting.

use std::path::PathBuf;

use bindle_engine::emit::module_id;

use crate::output::StyledOutput;

pub fn execute(config: PathBuf, out: &mut StyledOutput) -> anyhow::Result<()> {
    let mut session = super::build::open_session(&config, None)?;
    let graph = session.build_graph()?;
    let root = session.project_root().to_path_buf();

    out.status("Graph", &format!("{} modules", graph.len()));

    // Deterministic first-visit order
    let mut modules: Vec<_> = graph.modules().collect();
    modules.sort_by_key(|m| graph.rank_of(&m.path).unwrap_or(usize::MAX));

    for module in modules {
        out.line(&module_id(&root, &module.path));
        for (specifier, target) in &module.deps {
            out.line(&format!("  {} -> {}", specifier, module_id(&root, target)));
        }
    }
    Ok(())
}
