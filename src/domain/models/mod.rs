//! Domain models for the cmsdev harness.

pub mod check;
pub mod cluster;
pub mod config;
pub mod recipe;
pub mod report;
pub mod service;
pub mod transfer;

pub use check::CheckTask;
pub use cluster::{ContainerEnv, PodPhase, PodSummary};
pub use config::{
    ApiConfig, Config, ConmanConfig, ImsConfig, LoggingConfig, TimeoutConfig, ToolsConfig,
    TransferConfig,
};
pub use recipe::ImsRecipe;
pub use report::{RunReport, ServiceOutcome};
pub use service::{ServiceCheck, ServiceKey};
pub use transfer::{ArtifactDigest, Coverage, ResolvedEndpoint, ServiceEndpoint, TransferMode};
