//! Check logic: retry scheduling, transfer verification and the per-service
//! health checks. Everything here reaches the cluster through the domain
//! ports only.

pub mod api_checks;
pub mod digest_probe;
pub mod dispatcher;
pub mod endpoint_resolver;
pub mod ipxe_tftp;
pub mod pod_checks;
pub mod retry_scheduler;
pub mod service_checks;
pub mod transfer_verifier;

pub use api_checks::{default_recipe_present, first_id, parse_paged, ApiSurface};
pub use digest_probe::{parse_digest_output, ArtifactDigestProbe};
pub use dispatcher::{CheckSet, ClusterPorts, RunOptions, TestDispatcher};
pub use endpoint_resolver::{classify, EndpointResolver};
pub use ipxe_tftp::{IpxeSettings, IpxeTftpCheck};
pub use pod_checks::{PodChecker, PodCount};
pub use retry_scheduler::{sleep_seconds, RetryScheduler};
pub use service_checks::{
    recipe_from_pod, CfsCheck, CliSurface, ConmanCheck, EtcdBackedCheck, ImsCheck, VcsCheck,
};
pub use transfer_verifier::{RemoteArtifact, TransferAttempt, TransferConsistencyVerifier};
