//! Bindle unified CLI tool
//!
//! Command-line interface for the bundler: builds, graph inspection,
//! project scaffolding, and output cleanup.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "bindle")]
#[command(about = "Dependency-graph asset bundler", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a build pass
    Build {
        /// Path to the build manifest
        #[arg(short, long, default_value = "bindle.toml")]
        config: PathBuf,
        /// Rebuild when source files change
        #[arg(short, long)]
        watch: bool,
        /// Worker threads for the traversal
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Build and print the module graph without emitting
    Graph {
        /// Path to the build manifest
        #[arg(short, long, default_value = "bindle.toml")]
        config: PathBuf,
    },

    /// Initialize a starter manifest
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Remove the output directory
    Clean {
        /// Path to the build manifest
        #[arg(short, long, default_value = "bindle.toml")]
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut out = output::StyledOutput::new(output::color_choice());

    match cli.command {
        Commands::Build {
            config,
            watch,
            workers,
        } => commands::build::execute(config, watch, workers, &mut out),
        Commands::Graph { config } => commands::graph::execute(config, &mut out),
        Commands::Init { path } => commands::init::execute(path, &mut out),
        Commands::Clean { config } => commands::clean::execute(config, &mut out),
    }
}
