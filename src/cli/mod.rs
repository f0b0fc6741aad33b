//! CLI definitions and entry point.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Merge Chrome browsing history between profiles
#[derive(Parser, Debug)]
#[command(name = "chromemate", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/chromemate/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// History file name looked up inside profile directories
    #[arg(long, global = true)]
    pub store_file: Option<String>,

    /// `SQLite` busy timeout in ms
    #[arg(long, global = true)]
    pub lock_timeout: Option<u64>,

    /// Directory for temporary working copies (default: system temp dir)
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    /// Skip `PRAGMA quick_check` on the working copies
    #[arg(long, global = true)]
    pub no_integrity_check: bool,

    /// Also write JSON log lines to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge the source history into the target history
    Merge(MergeArgs),

    /// Show what a merge would change, without changing anything
    Preview(PreviewArgs),
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    /// Source profile directory or history file
    pub source: PathBuf,

    /// Target profile directory or history file
    pub target: PathBuf,

    /// Run the merge on a working copy only; the target is not modified
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PreviewArgs {
    /// Source profile directory or history file
    pub source: PathBuf,

    /// Target profile directory or history file
    pub target: PathBuf,
}
