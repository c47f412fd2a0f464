//! Health checks for the services that are judged by their pods, their
//! REST API and optionally their CLI surface.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::domain::models::{ContainerEnv, ImsRecipe, PodPhase, PodSummary};
use crate::domain::ports::{CommandExecutor, ExecTarget, HealthCheck};
use crate::services::api_checks::ApiSurface;
use crate::services::pod_checks::{PodChecker, PodCount};

const RUNNING: &[PodPhase] = &[PodPhase::Running];
const SUCCEEDED: &[PodPhase] = &[PodPhase::Succeeded];
const JOB_IN_PROGRESS_OR_DONE: &[PodPhase] =
    &[PodPhase::Succeeded, PodPhase::Running, PodPhase::Pending];

/// Matches `<stem><digits>-...`, the naming of one-shot "wait-for" job pods.
fn is_job_pod(name: &str, stem: &str) -> bool {
    name.strip_prefix(stem).is_some_and(|rest| {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        digits > 0 && rest.as_bytes().get(digits) == Some(&b'-')
    })
}

/// Runs `cray <service> <resource> list --format json` and requires a JSON array.
#[derive(Clone)]
pub struct CliSurface {
    executor: Arc<dyn CommandExecutor>,
    cray: String,
}

impl CliSurface {
    pub fn new(executor: Arc<dyn CommandExecutor>, cray: impl Into<String>) -> Self {
        Self {
            executor,
            cray: cray.into(),
        }
    }

    pub async fn list_is_array(&self, service: &str, resource: &str) -> bool {
        let args = [service, resource, "list", "--format", "json"];
        info!(service, resource, "Running CLI list command");
        let output = match self.executor.run(&ExecTarget::Local, &self.cray, &args).await {
            Ok(output) => output,
            Err(e) => {
                error!(service, resource, error = %e, "CLI command failed");
                return false;
            }
        };

        match serde_json::from_str::<serde_json::Value>(&output) {
            Ok(serde_json::Value::Array(items)) => {
                info!(service, resource, count = items.len(), "CLI list returned");
                true
            }
            Ok(_) => {
                error!(service, resource, "CLI list output is not a JSON list");
                false
            }
            Err(e) => {
                error!(service, resource, error = %e, "CLI list output is not valid JSON");
                false
            }
        }
    }

    /// `list_is_array` for every resource, without stopping at the first failure.
    pub async fn lists_are_arrays(&self, service: &str, resources: &[&str]) -> bool {
        let mut passed = true;
        for resource in resources {
            if !self.list_is_array(service, resource).await {
                passed = false;
            }
        }
        passed
    }
}

/// Services backed by a three-member etcd cluster: bos and crus.
///
/// Every `<prefix>-etcd-` pod needs a Bound PVC of the same name, and
/// `<prefix>-wait-for-etcd-<n>-` job pods must have Succeeded. bos also
/// has its REST API checked.
pub struct EtcdBackedCheck {
    pods: PodChecker,
    prefix: &'static str,
    min_pods: usize,
    api: Option<ApiSurface>,
}

impl EtcdBackedCheck {
    const ETCD_MEMBERS: usize = 3;

    pub fn bos(pods: PodChecker, api: ApiSurface) -> Self {
        Self {
            pods,
            prefix: "cray-bos",
            min_pods: 3,
            api: Some(api),
        }
    }

    pub fn crus(pods: PodChecker) -> Self {
        Self {
            pods,
            prefix: "cray-crus",
            min_pods: 4,
            api: None,
        }
    }
}

#[async_trait]
impl HealthCheck for EtcdBackedCheck {
    async fn run(&self, _include_cli: bool) -> bool {
        let (pods, mut passed) = self
            .pods
            .pods_by_prefix(self.prefix, PodCount::at_least(self.min_pods))
            .await;

        let etcd_prefix = format!("{}-etcd-", self.prefix);
        let wait_stem = format!("{}-wait-for-etcd-", self.prefix);
        let mut etcd_pods = 0;
        for pod in &pods {
            let allowed = if is_job_pod(&pod.name, &wait_stem) {
                SUCCEEDED
            } else {
                RUNNING
            };
            if pod.name.starts_with(&etcd_prefix) {
                etcd_pods += 1;
                if !self.pods.pvc_bound(&pod.name).await {
                    passed = false;
                }
            }
            if !self.pods.phase_in(pod, allowed) {
                passed = false;
            }
        }

        if etcd_pods != Self::ETCD_MEMBERS {
            error!(
                prefix = %etcd_prefix,
                found = etcd_pods,
                expected = Self::ETCD_MEMBERS,
                "Unexpected number of etcd pods"
            );
            passed = false;
        }

        if let Some(api) = &self.api {
            if !api.bos().await {
                passed = false;
            }
        }
        passed
    }
}

/// cfs: an api pod and an operator pod must be Running; other cfs pods
/// (jobs, database) are not judged. Then the REST API.
pub struct CfsCheck {
    pods: PodChecker,
    cli: CliSurface,
    api: ApiSurface,
}

impl CfsCheck {
    pub const fn new(pods: PodChecker, cli: CliSurface, api: ApiSurface) -> Self {
        Self { pods, cli, api }
    }
}

#[async_trait]
impl HealthCheck for CfsCheck {
    async fn run(&self, include_cli: bool) -> bool {
        let (pods, mut passed) = self.pods.pods_by_prefix("cray-cfs", PodCount::at_least(2)).await;

        let mut api: Option<&PodSummary> = None;
        let mut operator: Option<&PodSummary> = None;
        for pod in &pods {
            if pod.name.starts_with("cray-cfs-api") {
                api = Some(pod);
            } else if pod.name.starts_with("cray-cfs-operator") {
                operator = Some(pod);
            } else {
                continue;
            }
            match pod.phase {
                PodPhase::Running => {}
                PodPhase::Succeeded => self.pods.note_phase(pod, "cfs service pod has Succeeded"),
                _ => {
                    self.pods.phase_in(pod, RUNNING);
                    passed = false;
                }
            }
        }

        for (role, pod) in [("api", api), ("operator", operator)] {
            match pod {
                Some(pod) => info!(role, pod = %pod.name, "Found cfs pod"),
                None => {
                    error!(role, "No cfs pod found");
                    passed = false;
                }
            }
        }

        if !self.api.cfs().await {
            passed = false;
        }

        if include_cli && !self.cli.lists_are_arrays("cfs", &["configurations", "sources"]).await {
            passed = false;
        }
        passed
    }
}

/// conman: exactly one pod and its data PVC.
///
/// Every container must be running, except that `expected_waiting` names a
/// `(container, reason)` that must instead be waiting with that reason.
pub struct ConmanCheck {
    pods: PodChecker,
    expected_waiting: Option<(String, String)>,
}

impl ConmanCheck {
    pub const fn new(pods: PodChecker, expected_waiting: Option<(String, String)>) -> Self {
        Self {
            pods,
            expected_waiting,
        }
    }
}

#[async_trait]
impl HealthCheck for ConmanCheck {
    async fn run(&self, _include_cli: bool) -> bool {
        let (pods, mut passed) = self.pods.pods_by_prefix("cray-conman", PodCount::exactly(1)).await;
        let expected = self
            .expected_waiting
            .as_ref()
            .map(|(container, reason)| (container.as_str(), reason.as_str()));
        for pod in &pods {
            if !self.pods.pod_healthy(pod, expected) {
                passed = false;
            }
        }
        if !self.pods.pvc_bound("cray-conman-data-claim").await {
            passed = false;
        }
        passed
    }
}

const INIT_IMS_CONTAINER: &str = "init-ims";

/// The one value of `var` in the container's environment; blank, repeated
/// and missing variables are logged and yield `None`.
fn single_env_value(pod: &str, container: &ContainerEnv, var: &str) -> Option<String> {
    let mut values = container
        .env
        .iter()
        .filter(|(name, _)| name == var)
        .map(|(_, value)| value.as_str());
    let Some(value) = values.next() else {
        error!(pod, var, "Variable not found in init-ims container");
        return None;
    };
    if value.is_empty() {
        error!(pod, var, "Variable in init-ims container exists but is blank");
        return None;
    }
    if let Some(other) = values.next() {
        error!(pod, var, first = value, second = other, "Variable in init-ims container is set multiple times");
        return None;
    }
    Some(value.to_string())
}

/// The recipe an init-recipe pod builds, from its init-ims container's
/// `RECIPE_NAME` and `RECIPE_LINUX_DISTRIBUTION`.
pub fn recipe_from_pod(pod: &PodSummary) -> Option<ImsRecipe> {
    let mut containers = pod.containers.iter().filter(|c| c.name == INIT_IMS_CONTAINER);
    let Some(container) = containers.next() else {
        error!(pod = %pod.name, "No init-ims container found in pod");
        return None;
    };
    if containers.next().is_some() {
        error!(pod = %pod.name, "Multiple init-ims containers found in pod");
        return None;
    }
    let name = single_env_value(&pod.name, container, "RECIPE_NAME");
    let distro = single_env_value(&pod.name, container, "RECIPE_LINUX_DISTRIBUTION");
    Some(ImsRecipe::new(name?, distro?))
}

/// ims: exactly one service pod and its data PVC, the init-recipe pods,
/// then the REST API.
///
/// An init-recipe pod that has not Succeeded only fails the check when it
/// builds `recipe`; any other such pod is a warning.
pub struct ImsCheck {
    pods: PodChecker,
    cli: CliSurface,
    api: ApiSurface,
    recipe: Option<ImsRecipe>,
}

impl ImsCheck {
    pub const fn new(
        pods: PodChecker,
        cli: CliSurface,
        api: ApiSurface,
        recipe: Option<ImsRecipe>,
    ) -> Self {
        Self {
            pods,
            cli,
            api,
            recipe,
        }
    }

    async fn init_recipe_pods_ok(&self) -> bool {
        let (pods, listed) = self
            .pods
            .pods_by_prefix("cray-init-recipe", PodCount::at_least(0))
            .await;
        if !listed {
            return false;
        }
        if pods.is_empty() {
            warn!("No cray-init-recipe pods found");
            return true;
        }

        let mut passed = true;
        for pod in pods.iter().filter(|p| p.phase != PodPhase::Succeeded) {
            let Some(expected) = self.recipe.as_ref().filter(|r| r.owns_init_pod(&pod.name)) else {
                warn!(pod = %pod.name, phase = %pod.phase, "Pod has not Succeeded, but it is not for the default recipe");
                continue;
            };
            let Some(built) = recipe_from_pod(pod) else {
                passed = false;
                continue;
            };
            if built == *expected {
                error!(pod = %pod.name, phase = %pod.phase, recipe = %built, "Default recipe pod should have phase Succeeded");
                passed = false;
                continue;
            }
            if built.name == expected.name {
                warn!(pod = %pod.name, pod_distro = %built.distro, expected_distro = %expected.distro, "Pod recipe matches the default recipe name with a different distro");
            }
            warn!(pod = %pod.name, phase = %pod.phase, recipe = %built, "Pod is not for the default recipe, so its phase is only a warning");
        }
        passed
    }
}

#[async_trait]
impl HealthCheck for ImsCheck {
    async fn run(&self, include_cli: bool) -> bool {
        let (pods, mut passed) = self.pods.pods_by_prefix("cray-ims", PodCount::exactly(1)).await;
        if !self.pods.pods_healthy(&pods) {
            passed = false;
        }
        if !self.pods.pvc_bound("cray-ims-data-claim").await {
            passed = false;
        }

        match &self.recipe {
            Some(recipe) => info!(recipe = %recipe, "Checking default IMS recipe"),
            None => info!("No default IMS recipe configured; skipping default recipe checks"),
        }
        if !self.init_recipe_pods_ok().await {
            passed = false;
        }
        if !self.api.ims(self.recipe.as_ref()).await {
            passed = false;
        }
        if include_cli
            && !self
                .cli
                .lists_are_arrays("ims", &["images", "recipes", "public-keys"])
                .await
        {
            passed = false;
        }
        passed
    }
}

/// vcs (gitea): the main pod, at least one postgres pod with its `pgdata-`
/// PVC, and any backup or wait-for-postgres job pods.
pub struct VcsCheck {
    pods: PodChecker,
}

impl VcsCheck {
    pub const fn new(pods: PodChecker) -> Self {
        Self { pods }
    }
}

#[async_trait]
impl HealthCheck for VcsCheck {
    async fn run(&self, _include_cli: bool) -> bool {
        let (pods, mut passed) = self.pods.pods_by_prefix("gitea-vcs", PodCount::at_least(2)).await;
        if !self.pods.pvc_bound("gitea-vcs-data-claim").await {
            passed = false;
        }

        let mut postgres_pods = 0;
        let mut backups = 0;
        for pod in &pods {
            let allowed = if is_job_pod(&pod.name, "gitea-vcs-wait-for-postgres-") {
                SUCCEEDED
            } else if pod.name.starts_with("gitea-vcs-postgresql-db-backup-") {
                backups += 1;
                JOB_IN_PROGRESS_OR_DONE
            } else if pod.name.starts_with("gitea-vcs-postgres-") {
                postgres_pods += 1;
                if !self.pods.pvc_bound(&format!("pgdata-{}", pod.name)).await {
                    passed = false;
                }
                RUNNING
            } else {
                RUNNING
            };
            if !self.pods.phase_in(pod, allowed) {
                passed = false;
            }
        }

        if postgres_pods < 1 {
            error!(found = postgres_pods, "Expected at least 1 gitea-vcs-postgres pod");
            passed = false;
        }
        if backups == 0 {
            warn!("No gitea-vcs-postgresql-db-backup pods found; db has not yet been backed up");
        }
        passed
    }
}
