//! Root CLI parser with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Resumable downloads of model files.
#[derive(Parser)]
#[command(name = "modelfetch")]
#[command(about = "Download model files with resume, verification and bounded concurrency")]
#[command(version)]
pub struct Cli {
    /// Override the data directory (downloads and models live beneath it)
    #[arg(long = "base-dir", env = "MODELFETCH_HOME", global = true)]
    pub base_dir: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
