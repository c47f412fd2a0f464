//! Infrastructure layer module
//!
//! Adapters that satisfy the domain ports against real tools:
//! - Clock backed by the system clock and tokio timers
//! - Command execution on this host or through `kubectl exec`
//! - Cluster queries through `kubectl get`
//! - Service API gateway requests through reqwest
//! - TFTP transfers through curl
//! - Configuration loading and logging setup

pub mod clock;
pub mod config;
pub mod gateway;
pub mod kubectl;
pub mod logging;
pub mod process;
pub mod tftp;

pub use clock::SystemClock;
pub use gateway::GatewayClient;
pub use kubectl::KubectlClient;
pub use process::ProcessExecutor;
pub use tftp::CurlTransferConnector;
