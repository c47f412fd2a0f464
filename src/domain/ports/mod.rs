//! Port trait definitions (Hexagonal Architecture)
//!
//! The checks only reach the outside world through these traits:
//! - ApiClient: GET requests against the service API gateway
//! - Clock: wall-clock reads and sleeps
//! - CommandExecutor: commands on this host or inside a pod container
//! - ServiceResolver: network service addresses and ports
//! - ClusterInspector: pods, PVCs and config maps
//! - HealthCheck: one attempt of one service check
//! - TransferConnector / TransferSession: the legacy TFTP client
//!
//! Infrastructure adapters implement them against real tools; tests
//! implement them in memory.

pub mod api_client;
pub mod clock;
pub mod cluster_inspector;
pub mod command_executor;
pub mod health_check;
pub mod service_resolver;
pub mod transfer_client;

pub use api_client::ApiClient;
pub use clock::Clock;
pub use cluster_inspector::ClusterInspector;
pub use command_executor::{CommandExecutor, ExecTarget};
pub use health_check::HealthCheck;
pub use service_resolver::ServiceResolver;
pub use transfer_client::{ByteStream, TransferConnector, TransferSession};
