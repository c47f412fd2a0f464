//! Command implementations.

pub mod services;

use std::process::ExitCode;

use anyhow::Result;

use crate::cli::types::{Cli, Commands};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};

/// Load configuration, start logging and run the chosen command.
pub async fn execute(cli: Cli) -> Result<ExitCode> {
    let config = ConfigLoader::load(cli.config.as_deref())?;
    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging))?;

    match cli.command {
        Commands::Test(args) => test::execute(args, &config, cli.json).await,
        Commands::Services => {
            services::execute(&config, cli.json);
            Ok(ExitCode::SUCCESS)
        }
    }
}
