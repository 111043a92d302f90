//! panverify command-line application.
//!
//! Thin shell over the pipeline crates: it merges configuration from file,
//! environment and flags, sets up logging, dispatches a subcommand and maps
//! the result to an exit code. The verification logic lives in `crates/`.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;

use anyhow::{Context, Result};
use panverify_core::AppConfig;
use std::process::ExitCode;
use tracing::info;

pub use cli::{Cli, Command, RunArgs};
pub use error::Exit;

/// Resolve the effective configuration: file, then environment, then flags.
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config =
        AppConfig::load_with_env(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply_to(&mut config);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Execute the parsed command line.
pub async fn execute(cli: &Cli) -> Result<Exit> {
    let config = load_config(cli)?;
    match &cli.command {
        Command::Run(_) => commands::run::execute(&config).await,
        Command::Status => commands::status::execute(&config).await,
        Command::Check => commands::check::execute(&config).await,
        Command::Config => commands::config::execute(&config),
    }
}

/// Application entry point.
pub async fn run(cli: Cli) -> ExitCode {
    logging::init(&cli.log_level);

    info!("Starting panverify v{}", env!("CARGO_PKG_VERSION"));

    let exit = match execute(&cli).await {
        Ok(exit) => exit,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Error: {e:#}");
            Exit::from_error(&e)
        }
    };
    exit.into()
}
