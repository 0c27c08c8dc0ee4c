//! Sedflow CLI
//!
//! Declares experiments from JSON documents and turns them into scripts:
//! - `compile`: print or write the experiment script
//! - `ids`: list registered entities by kind
//! - `stage`: write the script and model files into an archive directory

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sedflow_experiment::EntityKind;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod document;

use document::ExperimentDocument;

#[derive(Parser)]
#[command(name = "sedflow")]
#[command(author, version, about = "Sedflow: declare, compile and stage simulation experiments")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an experiment document into script text.
    Compile {
        /// Experiment document (JSON)
        document: PathBuf,

        /// Write the script here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Emit model sources as bare file names
        #[arg(long)]
        basename: bool,
    },

    /// List the entities an experiment document registers.
    Ids {
        /// Experiment document (JSON)
        document: PathBuf,
    },

    /// Write the script and every model file into a directory, ready for
    /// packaging.
    Stage {
        /// Experiment document (JSON)
        document: PathBuf,

        /// Target directory (created if missing)
        #[arg(short, long)]
        dir: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_compile(document: &Path, out: Option<&Path>, basename: bool) -> Result<()> {
    let mut doc = ExperimentDocument::from_file(document)?;
    doc.config.basename_sources |= basename;
    let exp = doc.build()?;
    let script = exp.script()?;
    match out {
        Some(path) => {
            std::fs::write(path, format!("{script}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "script written");
        }
        None => println!("{script}"),
    }
    Ok(())
}

fn cmd_ids(document: &Path) -> Result<()> {
    let exp = ExperimentDocument::from_file(document)?.build()?;
    for kind in EntityKind::ALL {
        let ids = exp.registry().ids(kind);
        if !ids.is_empty() {
            println!("{kind}: {}", ids.join(", "));
        }
    }
    Ok(())
}

fn cmd_stage(document: &Path, dir: &Path) -> Result<()> {
    let exp = ExperimentDocument::from_file(document)?.build()?;
    let staged = exp
        .stage_archive(dir)
        .with_context(|| format!("failed to stage into {}", dir.display()))?;
    println!("{}", staged.script_path.display());
    for path in &staged.model_paths {
        println!("{}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Compile {
            document,
            out,
            basename,
        } => cmd_compile(&document, out.as_deref(), basename),
        Commands::Ids { document } => cmd_ids(&document),
        Commands::Stage { document, dir } => cmd_stage(&document, &dir),
    }
}
