mod cli;
mod commands;
mod env_loader;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use archive_logging::{archive_error, LogDestination, DEFAULT_LOG_FILE};
use clap::Parser;

use cli::{Cli, Command};

fn main() -> ExitCode {
    env_loader::load_dotenv();
    let cli = Cli::parse();

    let destination = if cli.no_log_file {
        LogDestination::Terminal
    } else {
        LogDestination::Both(PathBuf::from(DEFAULT_LOG_FILE))
    };
    archive_logging::initialize(destination, cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            archive_error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let data_dir = commands::data_dir(cli.data_dir);
    match cli.command {
        Command::Resolve {
            downloads,
            legacy,
            output,
        } => commands::resolve(&data_dir, &downloads, legacy.as_deref(), output),
        Command::Fetch { paths, no_retry } => {
            let config = commands::load_config(data_dir)?;
            runtime()?.block_on(commands::fetch(&config, paths, no_retry))
        }
        Command::Probe { no_retry } => {
            let config = commands::load_config(data_dir)?;
            runtime()?.block_on(commands::probe(&config, no_retry))
        }
        Command::Publish { output, site_url } => {
            commands::publish(&data_dir, &data_dir.join(output), site_url)
        }
        Command::Stats { types } => {
            print!("{}", commands::stats(&data_dir, &types)?);
            Ok(())
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")
}
