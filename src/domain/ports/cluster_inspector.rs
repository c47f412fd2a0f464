use async_trait::async_trait;

use crate::domain::errors::LookupError;
use crate::domain::models::PodSummary;

/// Port for read-only queries against cluster objects.
#[async_trait]
pub trait ClusterInspector: Send + Sync {
    /// Pods in `namespace` whose names start with `prefix`, sorted by name.
    async fn list_pods(&self, namespace: &str, prefix: &str) -> Result<Vec<PodSummary>, LookupError>;

    /// Status phase of a persistent volume claim, e.g. `Bound`.
    async fn pvc_phase(&self, namespace: &str, name: &str) -> Result<String, LookupError>;

    /// One data field of a config map; `None` if the map exists without it.
    async fn config_map_field(
        &self,
        namespace: &str,
        name: &str,
        field: &str,
    ) -> Result<Option<String>, LookupError>;
}
