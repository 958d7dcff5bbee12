//! `bindle build` — run a build pass, optionally watching for changes.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use bindle_engine::{BuildOptions, BuildReport, BuildResult, BuildSession, Manifest};
use notify::{recommended_watcher, EventKind, RecursiveMode, Watcher};

use crate::output::StyledOutput;

pub fn execute(
    config: PathBuf,
    watch: bool,
    workers: Option<usize>,
    out: &mut StyledOutput,
) -> anyhow::Result<()> {
    let mut session = open_session(&config, workers)?;

    if watch {
        if let Err(err) = run_once(&mut session, out) {
            out.error(&err.to_string());
        }
        watch_loop(&mut session, out)
    } else {
        run_once(&mut session, out)?;
        Ok(())
    }
}

/// Load the manifest and construct a session rooted at its directory.
pub fn open_session(config: &Path, workers: Option<usize>) -> anyhow::Result<BuildSession> {
    let config = config
        .canonicalize()
        .with_context(|| format!("cannot find {}", config.display()))?;
    let project_root = config
        .parent()
        .context("manifest has no parent directory")?
        .to_path_buf();
    let manifest = Manifest::from_file(&config)?;

    let mut session = BuildSession::new(manifest, project_root)?;
    if let Some(workers) = workers {
        session.set_options(BuildOptions { workers });
    }
    Ok(session)
}

fn run_once(session: &mut BuildSession, out: &mut StyledOutput) -> BuildResult<BuildReport> {
    let started = Instant::now();
    let report = session.run()?;
    out.status(
        "Built",
        &format!(
            "{} modules, {} chunks in {:.1?}",
            report.module_count,
            report.chunks.len(),
            started.elapsed()
        ),
    );
    for artifact in &report.artifacts {
        out.line(&format!(
            "  {} ({} bytes)",
            artifact.filename.display(),
            artifact.content.len()
        ));
    }
    Ok(report)
}

/// Rebuild whenever a source file changes. Events under the output
/// directory are ignored so emission cannot retrigger the build.
fn watch_loop(session: &mut BuildSession, out: &mut StyledOutput) -> anyhow::Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = recommended_watcher(tx)?;
    watcher.watch(session.project_root(), RecursiveMode::Recursive)?;
    out.status("Watching", &session.project_root().display().to_string());

    loop {
        let event = match rx.recv()? {
            Ok(event) => event,
            Err(_) => continue,
        };
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            continue;
        }
        if event.paths.iter().all(|p| p.starts_with(session.out_dir())) {
            continue;
        }

        // Let a burst of events settle before rebuilding
        while rx.recv_timeout(Duration::from_millis(50)).is_ok() {}

        if let Err(err) = run_once(session, out) {
            out.error(&err.to_string());
        }
    }
}
