//! cmsdev - health checks for cluster management services
//!
//! Checks that services such as bos, cfs, conman, crus, ims, vcs and the
//! ipxe/tftp boot artifact pipeline are up, retrying each check on a
//! back-off schedule until it passes or its deadline runs out.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): retry scheduling, transfer verification
//!   and the per-service checks
//! - **Infrastructure Layer** (`infrastructure`): kubectl, curl, API gateway, process,
//!   configuration and logging adapters
//! - **CLI Layer** (`cli`): command-line interface

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{HarnessError, HarnessResult};
pub use domain::models::{Config, RunReport, ServiceKey, ServiceOutcome};
pub use infrastructure::config::ConfigLoader;
pub use services::{CheckSet, ClusterPorts, RetryScheduler, RunOptions, TestDispatcher};
