mod cli;
mod commands;
mod config;
mod planner;
mod triggers;
mod watermark;

use std::process::ExitCode;

use clap::Parser;
use flickrdown_logging::{flickrdown_error, LogDestination};

use crate::cli::{Cli, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let destination = match cli.log_file.clone() {
        Some(path) => LogDestination::Both(path),
        None => LogDestination::Terminal,
    };
    flickrdown_logging::initialize(cli.log_level, destination);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            flickrdown_error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(&cli.config)?;
    match &cli.command {
        Command::Run(args) => commands::run_once(&config, args).await,
        Command::Watch(args) => commands::watch(&config, args).await,
    }
}
