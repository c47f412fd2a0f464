//! Resolution of transfer endpoints, graded by how much of them is usable.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::errors::LookupError;
use crate::domain::models::{Coverage, ResolvedEndpoint, ServiceEndpoint};
use crate::domain::ports::ServiceResolver;

/// Grade an endpoint as reported by the cluster.
///
/// `None` when there is no usable port or no address at all; `Partial` when
/// one address is missing or an extra port is invalid; `Full` otherwise.
pub fn classify(service: &str, endpoint: ServiceEndpoint) -> ResolvedEndpoint {
    let invalid_extra_ports: Vec<i32> = endpoint
        .extra_ports
        .iter()
        .copied()
        .filter(|port| *port <= 0)
        .collect();

    let has_cluster = endpoint.cluster_ip.as_deref().is_some_and(|ip| !ip.is_empty());
    let has_external = endpoint.external_ip.as_deref().is_some_and(|ip| !ip.is_empty());

    let coverage = if endpoint.port <= 0 || !(has_cluster || has_external) {
        Coverage::None
    } else if has_cluster && has_external && invalid_extra_ports.is_empty() {
        Coverage::Full
    } else {
        Coverage::Partial
    };

    ResolvedEndpoint {
        service: service.to_string(),
        endpoint,
        coverage,
        invalid_extra_ports,
    }
}

/// Looks up a service and logs everything wrong with what comes back.
#[derive(Clone)]
pub struct EndpointResolver {
    resolver: Arc<dyn ServiceResolver>,
    namespace: String,
}

impl EndpointResolver {
    pub fn new(resolver: Arc<dyn ServiceResolver>, namespace: impl Into<String>) -> Self {
        Self {
            resolver,
            namespace: namespace.into(),
        }
    }

    /// Resolve `service`. Fails only when the service cannot be looked up or
    /// its first port is unusable; missing addresses show up in the coverage.
    pub async fn resolve(&self, service: &str) -> Result<ResolvedEndpoint, LookupError> {
        let namespace = self.namespace.as_str();
        info!(service, namespace, "Looking up service");
        let endpoint = self
            .resolver
            .resolve(namespace, service)
            .await
            .inspect_err(|e| error!(service, namespace, error = %e, "Service lookup failed"))?;

        if endpoint.port <= 0 {
            let err = LookupError::InvalidPort {
                service: service.to_string(),
                port: endpoint.port,
            };
            error!(service, namespace, error = %err, "Cannot run file transfer test without valid port number");
            return Err(err);
        }

        let resolved = classify(service, endpoint);
        let ep = &resolved.endpoint;
        match ep.cluster_ip.as_deref().filter(|ip| !ip.is_empty()) {
            Some(ip) => info!(service, namespace, cluster_ip = ip, "Cluster IP resolved"),
            None => error!(service, namespace, "Unable to determine cluster IP"),
        }
        match ep.external_ip.as_deref().filter(|ip| !ip.is_empty()) {
            Some(ip) => info!(service, namespace, external_ip = ip, "External IP resolved"),
            None => error!(service, namespace, "Unable to determine external IP"),
        }
        info!(service, namespace, port = ep.port, "Port resolved");

        if !ep.extra_ports.is_empty() {
            warn!(
                service,
                namespace,
                count = ep.extra_ports.len() + 1,
                "More than one port defined for service"
            );
            for port in &ep.extra_ports {
                if *port > 0 {
                    warn!(service, namespace, port, "Extra port");
                } else {
                    error!(service, namespace, port, "Invalid extra port");
                }
            }
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(cluster: &str, external: &str, port: i32, extra: Vec<i32>) -> ServiceEndpoint {
        ServiceEndpoint {
            cluster_ip: Some(cluster.to_string()).filter(|s| !s.is_empty()),
            external_ip: Some(external.to_string()).filter(|s| !s.is_empty()),
            port,
            extra_ports: extra,
        }
    }

    #[test]
    fn test_full_coverage() {
        let resolved = classify("cray-tftp", endpoint("10.0.0.1", "10.92.100.60", 69, vec![]));
        assert_eq!(resolved.coverage, Coverage::Full);
        assert!(resolved.invalid_extra_ports.is_empty());
    }

    #[test]
    fn test_one_address_is_partial() {
        let resolved = classify("cray-tftp", endpoint("10.0.0.1", "", 69, vec![]));
        assert_eq!(resolved.coverage, Coverage::Partial);
    }

    #[test]
    fn test_no_address_is_none() {
        let resolved = classify("cray-tftp", endpoint("", "", 69, vec![]));
        assert_eq!(resolved.coverage, Coverage::None);
    }

    #[test]
    fn test_bad_port_is_none() {
        let resolved = classify("cray-tftp", endpoint("10.0.0.1", "10.92.100.60", 0, vec![]));
        assert_eq!(resolved.coverage, Coverage::None);
    }

    #[test]
    fn test_invalid_extra_port_is_partial() {
        let resolved = classify(
            "cray-tftp",
            endpoint("10.0.0.1", "10.92.100.60", 69, vec![6969, -1]),
        );
        assert_eq!(resolved.coverage, Coverage::Partial);
        assert_eq!(resolved.invalid_extra_ports, vec![-1]);
    }

    #[test]
    fn test_valid_extra_port_keeps_full() {
        let resolved = classify("cray-tftp", endpoint("10.0.0.1", "10.92.100.60", 69, vec![6969]));
        assert_eq!(resolved.coverage, Coverage::Full);
    }
}
