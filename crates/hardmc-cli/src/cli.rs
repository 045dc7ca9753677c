use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "hardmc",
    about = "Hard-particle Monte Carlo job runner",
    version
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Silence all log output.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Equilibrate a system with trial moves and scheduled updaters.
    Sample(SampleArgs),
    /// Compress a system to a target box with QuickCompress.
    Compress(CompressArgs),
}

#[derive(Debug, clap::Args)]
pub struct SampleArgs {
    /// TOML job file describing the system and move parameters.
    #[arg(short, long)]
    pub config: PathBuf,
}

#[derive(Debug, clap::Args)]
pub struct CompressArgs {
    /// TOML job file; must contain a [compress] section.
    #[arg(short, long)]
    pub config: PathBuf,
}
