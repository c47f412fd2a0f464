//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::errors::DispatchError;
use crate::domain::models::ServiceKey;

#[derive(Parser, Debug)]
#[command(name = "cmsdev")]
#[command(about = "cmsdev - health checks for cluster management services", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Extra config file, merged over cmsdev.yaml
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check one or more services
    Test(TestArgs),

    /// List the services that can be checked
    Services,
}

#[derive(Args, Debug)]
pub struct TestArgs {
    /// Services to check, in order (bos cfs conman crus gitea ims ipxe tftp vcs)
    #[arg(required = true, value_parser = parse_service_key)]
    pub services: Vec<ServiceKey>,

    /// Also exercise the service CLI where a check has one (cfs, ims)
    #[arg(long)]
    pub include_cli: bool,

    /// Run each check once instead of retrying until the timeout
    #[arg(long)]
    pub no_retry: bool,

    /// Retry timeout in seconds, replacing every configured timeout
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
}

fn parse_service_key(s: &str) -> Result<ServiceKey, DispatchError> {
    s.parse()
}
