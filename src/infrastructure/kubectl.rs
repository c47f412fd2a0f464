//! Cluster queries answered by `kubectl get ... -o json`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::domain::errors::{ExecError, LookupError};
use crate::domain::models::{ContainerEnv, PodPhase, PodSummary, ServiceEndpoint};
use crate::domain::ports::{ClusterInspector, CommandExecutor, ExecTarget, ServiceResolver};

#[derive(Debug, Deserialize)]
struct List<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Pod {
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    spec: PodSpec,
    #[serde(default)]
    status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
struct PodSpec {
    #[serde(default)]
    containers: Vec<Container>,
}

#[derive(Debug, Deserialize)]
struct Container {
    name: String,
    #[serde(default)]
    env: Vec<EnvVar>,
}

#[derive(Debug, Deserialize)]
struct EnvVar {
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatus {
    #[serde(default)]
    phase: String,
    #[serde(default)]
    container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Deserialize)]
struct ContainerStatus {
    name: String,
    #[serde(default)]
    state: ContainerState,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerState {
    waiting: Option<Waiting>,
}

#[derive(Debug, Deserialize)]
struct Waiting {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct Pvc {
    #[serde(default)]
    status: PvcStatus,
}

#[derive(Debug, Default, Deserialize)]
struct PvcStatus {
    #[serde(default)]
    phase: String,
}

#[derive(Debug, Deserialize)]
struct ConfigMap {
    #[serde(default)]
    data: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Service {
    #[serde(default)]
    spec: ServiceSpec,
    #[serde(default)]
    status: ServiceStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceSpec {
    #[serde(rename = "clusterIP")]
    cluster_ip: Option<String>,
    #[serde(rename = "loadBalancerIP")]
    load_balancer_ip: Option<String>,
    #[serde(default)]
    ports: Vec<ServicePort>,
}

#[derive(Debug, Deserialize)]
struct ServicePort {
    #[serde(default)]
    port: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceStatus {
    #[serde(default)]
    load_balancer: LoadBalancerStatus,
}

#[derive(Debug, Default, Deserialize)]
struct LoadBalancerStatus {
    #[serde(default)]
    ingress: Vec<Ingress>,
}

#[derive(Debug, Deserialize)]
struct Ingress {
    ip: Option<String>,
}

fn decode<T: DeserializeOwned>(json: &str, what: &str) -> Result<T, LookupError> {
    serde_json::from_str(json)
        .map_err(|e| LookupError::QueryFailed(format!("Unable to decode {what}: {e}")))
}

/// Pods whose names start with `prefix`, sorted by name.
pub fn pods_from_json(json: &str, prefix: &str) -> Result<Vec<PodSummary>, LookupError> {
    let list: List<Pod> = decode(json, "pod list")?;
    let mut pods: Vec<PodSummary> = list
        .items
        .into_iter()
        .filter(|pod| pod.metadata.name.starts_with(prefix))
        .map(|pod| PodSummary {
            name: pod.metadata.name,
            phase: PodPhase::parse(&pod.status.phase),
            waiting_containers: pod
                .status
                .container_statuses
                .into_iter()
                .filter_map(|c| c.state.waiting.map(|w| (c.name, w.reason)))
                .collect(),
            containers: pod
                .spec
                .containers
                .into_iter()
                .map(|c| ContainerEnv {
                    name: c.name,
                    env: c.env.into_iter().map(|v| (v.name, v.value)).collect(),
                })
                .collect(),
        })
        .collect();
    pods.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(pods)
}

/// Addresses and ports of a service object.
///
/// Headless services report a cluster IP of `None`, which counts as no
/// address. The external address is the requested load balancer IP, or the
/// first ingress IP when none was requested.
pub fn endpoint_from_json(json: &str) -> Result<ServiceEndpoint, LookupError> {
    let service: Service = decode(json, "service")?;
    let cluster_ip = service
        .spec
        .cluster_ip
        .filter(|ip| !ip.is_empty() && ip != "None");
    let external_ip = service
        .spec
        .load_balancer_ip
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            service
                .status
                .load_balancer
                .ingress
                .into_iter()
                .find_map(|ingress| ingress.ip.filter(|ip| !ip.is_empty()))
        });

    let mut ports = service.spec.ports.into_iter().map(|p| p.port);
    let port = ports.next().unwrap_or(0);
    Ok(ServiceEndpoint {
        cluster_ip,
        external_ip,
        port,
        extra_ports: ports.collect(),
    })
}

/// `ClusterInspector` and `ServiceResolver` backed by the kubectl binary.
#[derive(Clone)]
pub struct KubectlClient {
    executor: Arc<dyn CommandExecutor>,
    kubectl: String,
}

impl KubectlClient {
    pub fn new(executor: Arc<dyn CommandExecutor>, kubectl: impl Into<String>) -> Self {
        Self {
            executor,
            kubectl: kubectl.into(),
        }
    }

    async fn get_json(&self, namespace: &str, args: &[&str]) -> Result<String, ExecError> {
        let mut full = vec!["get"];
        full.extend_from_slice(args);
        full.extend_from_slice(&["-n", namespace, "-o", "json"]);
        debug!(args = ?full, "Querying cluster");
        self.executor.run(&ExecTarget::Local, &self.kubectl, &full).await
    }
}

#[async_trait]
impl ClusterInspector for KubectlClient {
    async fn list_pods(&self, namespace: &str, prefix: &str) -> Result<Vec<PodSummary>, LookupError> {
        let json = self
            .get_json(namespace, &["pods"])
            .await
            .map_err(|e| LookupError::QueryFailed(e.to_string()))?;
        pods_from_json(&json, prefix)
    }

    async fn pvc_phase(&self, namespace: &str, name: &str) -> Result<String, LookupError> {
        let json = self
            .get_json(namespace, &["pvc", name])
            .await
            .map_err(|e| LookupError::QueryFailed(e.to_string()))?;
        let pvc: Pvc = decode(&json, "pvc")?;
        Ok(pvc.status.phase)
    }

    async fn config_map_field(
        &self,
        namespace: &str,
        name: &str,
        field: &str,
    ) -> Result<Option<String>, LookupError> {
        let json = self
            .get_json(namespace, &["configmap", name])
            .await
            .map_err(|e| LookupError::QueryFailed(e.to_string()))?;
        let mut map: ConfigMap = decode(&json, "config map")?;
        Ok(map.data.remove(field))
    }
}

#[async_trait]
impl ServiceResolver for KubectlClient {
    async fn resolve(&self, namespace: &str, service: &str) -> Result<ServiceEndpoint, LookupError> {
        let json = self
            .get_json(namespace, &["service", service])
            .await
            .map_err(|e| LookupError::ServiceNotFound {
                namespace: namespace.to_string(),
                service: service.to_string(),
                reason: e.to_string(),
            })?;
        endpoint_from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PODS: &str = r#"{
      "items": [
        {"metadata": {"name": "cray-tftp-6d7f-2"}, "status": {"phase": "Running",
          "containerStatuses": [{"name": "cray-tftp", "state": {"running": {}}}]}},
        {"metadata": {"name": "cray-ipxe-x86-64-abc"}, "status": {"phase": "Running"}},
        {"metadata": {"name": "cray-tftp-6d7f-1"}, "status": {"phase": "Pending",
          "containerStatuses": [{"name": "cray-tftp", "state": {"waiting": {"reason": "ContainerCreating"}}}]}}
      ]
    }"#;

    #[test]
    fn test_pods_filtered_sorted_with_waiting_reasons() {
        let pods = pods_from_json(PODS, "cray-tftp").unwrap();
        assert_eq!(pods.len(), 2);
        assert_eq!(pods[0].name, "cray-tftp-6d7f-1");
        assert_eq!(pods[0].phase, PodPhase::Pending);
        assert_eq!(
            pods[0].waiting_containers,
            vec![("cray-tftp".to_string(), "ContainerCreating".to_string())]
        );
        assert!(pods[1].waiting_containers.is_empty());
    }

    #[test]
    fn test_pod_spec_container_env() {
        let json = r#"{"items": [{"metadata": {"name": "cray-init-recipe-base-x1"},
            "spec": {"containers": [{"name": "init-ims", "env": [
                {"name": "RECIPE_NAME", "value": "base"},
                {"name": "TOKEN", "valueFrom": {"secretKeyRef": {"name": "s", "key": "k"}}}]}]},
            "status": {"phase": "Failed"}}]}"#;
        let pods = pods_from_json(json, "cray-init-recipe").unwrap();
        assert_eq!(pods[0].containers.len(), 1);
        assert_eq!(pods[0].containers[0].name, "init-ims");
        assert_eq!(
            pods[0].containers[0].env,
            vec![
                ("RECIPE_NAME".to_string(), "base".to_string()),
                ("TOKEN".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_service_with_load_balancer_ip() {
        let json = r#"{"spec": {"clusterIP": "10.26.1.2", "loadBalancerIP": "10.92.100.60",
            "ports": [{"port": 69}, {"port": 6969}]}}"#;
        let ep = endpoint_from_json(json).unwrap();
        assert_eq!(ep.cluster_ip.as_deref(), Some("10.26.1.2"));
        assert_eq!(ep.external_ip.as_deref(), Some("10.92.100.60"));
        assert_eq!(ep.port, 69);
        assert_eq!(ep.extra_ports, vec![6969]);
    }

    #[test]
    fn test_service_external_ip_from_ingress() {
        let json = r#"{"spec": {"clusterIP": "10.26.1.2", "ports": [{"port": 69}]},
            "status": {"loadBalancer": {"ingress": [{"ip": "10.94.100.60"}]}}}"#;
        let ep = endpoint_from_json(json).unwrap();
        assert_eq!(ep.external_ip.as_deref(), Some("10.94.100.60"));
    }

    #[test]
    fn test_headless_service_without_ports() {
        let json = r#"{"spec": {"clusterIP": "None"}}"#;
        let ep = endpoint_from_json(json).unwrap();
        assert!(ep.cluster_ip.is_none());
        assert!(ep.external_ip.is_none());
        assert_eq!(ep.port, 0);
        assert!(ep.extra_ports.is_empty());
    }

    #[test]
    fn test_bad_json_is_query_failure() {
        assert!(matches!(
            pods_from_json("not json", "x").unwrap_err(),
            LookupError::QueryFailed(_)
        ));
    }
}
