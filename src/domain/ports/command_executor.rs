use std::fmt;

use async_trait::async_trait;

use crate::domain::errors::ExecError;

/// Where a command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecTarget {
    /// The host the harness runs on
    Local,
    /// A container inside a pod
    Container {
        namespace: String,
        pod: String,
        container: String,
    },
}

impl ExecTarget {
    pub fn container(
        namespace: impl Into<String>,
        pod: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self::Container {
            namespace: namespace.into(),
            pod: pod.into(),
            container: container.into(),
        }
    }
}

impl fmt::Display for ExecTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local host"),
            Self::Container {
                namespace,
                pod,
                container,
            } => write!(f, "{namespace}/{pod}/{container}"),
        }
    }
}

/// Port for running a command and capturing its standard output.
///
/// Used the same way for liveness probes, digest probes and CLI surface
/// checks. A non-zero exit status is an error.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, target: &ExecTarget, command: &str, args: &[&str])
        -> Result<String, ExecError>;
}
