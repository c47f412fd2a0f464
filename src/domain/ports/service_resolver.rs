use async_trait::async_trait;

use crate::domain::errors::LookupError;
use crate::domain::models::ServiceEndpoint;

/// Port for looking up a cluster network service.
///
/// Returns whatever the cluster reports, including empty addresses and
/// invalid ports; judging the result is left to the caller. Fails only if
/// the service itself cannot be found.
#[async_trait]
pub trait ServiceResolver: Send + Sync {
    async fn resolve(&self, namespace: &str, service: &str)
        -> Result<ServiceEndpoint, LookupError>;
}
