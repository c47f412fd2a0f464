//! cmsdev CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use cmsdev::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.json;

    match cmsdev::cli::commands::execute(cli).await {
        Ok(code) => code,
        Err(err) => cmsdev::cli::handle_error(err, json),
    }
}
