mod cli;
mod commands;
mod config;
mod error;
mod logging;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use clap::Parser;
use tracing::{debug, error, info};

fn main() {
    if let Err(e) = run_app() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, &cli.log_file)?;

    info!("hardmc v{} starting up", env!("CARGO_PKG_VERSION"));
    debug!("parsed arguments: {:?}", &cli);

    let result = match cli.command {
        Commands::Sample(args) => {
            info!("dispatching to 'sample'");
            commands::sample::run(args)
        }
        Commands::Compress(args) => {
            info!("dispatching to 'compress'");
            commands::compress::run(args)
        }
    };

    match &result {
        Ok(_) => info!("command completed successfully"),
        Err(e) => error!("command failed: {e}"),
    }
    result
}
