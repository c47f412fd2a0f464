use std::fmt;

use serde::{Deserialize, Serialize};

/// Kubernetes pod phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown(String),
}

impl PodPhase {
    pub fn parse(phase: &str) -> Self {
        match phase {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
            Self::Unknown(other) => write!(f, "{other}"),
        }
    }
}

/// A container from a pod spec with its literal environment variables.
///
/// Variables set through `valueFrom` have an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEnv {
    pub name: String,
    pub env: Vec<(String, String)>,
}

/// Name and phase of a pod, the waiting reason of any container that is
/// not running, and the containers of its pod spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSummary {
    pub name: String,
    pub phase: PodPhase,
    pub waiting_containers: Vec<(String, String)>,
    pub containers: Vec<ContainerEnv>,
}

impl PodSummary {
    pub fn new(name: impl Into<String>, phase: PodPhase) -> Self {
        Self {
            name: name.into(),
            phase,
            waiting_containers: Vec::new(),
            containers: Vec::new(),
        }
    }

    /// Record a container as waiting with `reason`.
    #[must_use]
    pub fn waiting(mut self, container: &str, reason: &str) -> Self {
        self.waiting_containers
            .push((container.to_string(), reason.to_string()));
        self
    }

    /// Add a spec container with the given environment.
    #[must_use]
    pub fn with_container(mut self, name: &str, env: &[(&str, &str)]) -> Self {
        self.containers.push(ContainerEnv {
            name: name.to_string(),
            env: env
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        });
        self
    }
}
