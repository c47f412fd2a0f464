//! Pod and PVC assertions shared by the service profiles.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::models::{PodPhase, PodSummary};
use crate::domain::ports::ClusterInspector;

/// Bounds on how many pods a name prefix should match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PodCount {
    pub min: usize,
    pub max: Option<usize>,
}

impl PodCount {
    pub const fn exactly(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    pub const fn at_least(n: usize) -> Self {
        Self { min: n, max: None }
    }

    pub fn admits(self, found: usize) -> bool {
        found >= self.min && self.max.is_none_or(|max| found <= max)
    }
}

/// Read-only pod and PVC checks within one namespace.
///
/// Every method logs what it finds and returns whether the check passed.
#[derive(Clone)]
pub struct PodChecker {
    inspector: Arc<dyn ClusterInspector>,
    namespace: String,
}

impl PodChecker {
    pub fn new(inspector: Arc<dyn ClusterInspector>, namespace: impl Into<String>) -> Self {
        Self {
            inspector,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Pods whose names start with `prefix`, and whether their count is
    /// within `count`. The pods are returned even when the count is wrong.
    pub async fn pods_by_prefix(&self, prefix: &str, count: PodCount) -> (Vec<PodSummary>, bool) {
        let pods = match self.inspector.list_pods(&self.namespace, prefix).await {
            Ok(pods) => pods,
            Err(e) => {
                error!(prefix, namespace = %self.namespace, error = %e, "Unable to list pods");
                return (Vec::new(), false);
            }
        };

        let names: Vec<&str> = pods.iter().map(|p| p.name.as_str()).collect();
        info!(prefix, found = pods.len(), pods = ?names, "Found pods");
        let ok = count.admits(pods.len());
        if !ok {
            match count.max {
                Some(max) if max == count.min => {
                    error!(prefix, expected = max, found = pods.len(), "Expected exactly {} pods", max);
                }
                Some(max) if pods.len() > max => {
                    error!(prefix, expected = max, found = pods.len(), "Expected at most {} pods", max);
                }
                _ => {
                    error!(prefix, expected = count.min, found = pods.len(), "Expected at least {} pods", count.min);
                }
            }
        }
        (pods, ok)
    }

    /// Pod is Running or Succeeded and none of its containers is waiting,
    /// except `expected_waiting` which must be waiting with exactly that reason.
    pub fn pod_healthy(&self, pod: &PodSummary, expected_waiting: Option<(&str, &str)>) -> bool {
        info!(pod = %pod.name, phase = %pod.phase, "Checking pod status");
        if !matches!(pod.phase, PodPhase::Running | PodPhase::Succeeded) {
            error!(pod = %pod.name, phase = %pod.phase, "Pod phase is neither Running nor Succeeded");
            return false;
        }

        let mut passed = true;
        if let Some((container, reason)) = expected_waiting {
            match pod.waiting_containers.iter().find(|(name, _)| name == container) {
                Some((_, actual)) if actual == reason => {
                    info!(pod = %pod.name, container, reason, "Container has expected waiting reason");
                }
                Some((_, actual)) => {
                    error!(pod = %pod.name, container, actual = %actual, expected = reason, "Unexpected container waiting reason");
                    passed = false;
                }
                None => {
                    error!(pod = %pod.name, container, expected = reason, "Container is not waiting");
                    passed = false;
                }
            }
        }

        for (container, reason) in &pod.waiting_containers {
            if expected_waiting.is_some_and(|(name, _)| name == container) {
                continue;
            }
            error!(pod = %pod.name, container = %container, reason = %reason, "Container is waiting");
            passed = false;
        }
        passed
    }

    /// `pod_healthy` over every pod, without stopping at the first failure.
    pub fn pods_healthy(&self, pods: &[PodSummary]) -> bool {
        pods.iter()
            .map(|pod| self.pod_healthy(pod, None))
            .fold(true, |acc, ok| acc && ok)
    }

    /// Pod phase is one of `allowed`.
    pub fn phase_in(&self, pod: &PodSummary, allowed: &[PodPhase]) -> bool {
        if allowed.contains(&pod.phase) {
            return true;
        }
        let allowed: Vec<String> = allowed.iter().map(ToString::to_string).collect();
        error!(
            pod = %pod.name,
            phase = %pod.phase,
            allowed = %allowed.join(", "),
            "Pod has unexpected phase"
        );
        false
    }

    /// PVC status is Bound.
    pub async fn pvc_bound(&self, name: &str) -> bool {
        info!(pvc = name, "Checking pvc status, expecting Bound");
        match self.inspector.pvc_phase(&self.namespace, name).await {
            Ok(phase) if phase == "Bound" => true,
            Ok(phase) if phase.is_empty() => {
                error!(pvc = name, "PVC has no status");
                false
            }
            Ok(phase) => {
                error!(pvc = name, phase = %phase, "Expected Bound status for pvc");
                false
            }
            Err(e) => {
                error!(pvc = name, error = %e, "Unable to get pvc status");
                false
            }
        }
    }

    /// Log a non-fatal phase observation.
    pub fn note_phase(&self, pod: &PodSummary, what: &str) {
        warn!(pod = %pod.name, phase = %pod.phase, "{}", what);
    }
}
