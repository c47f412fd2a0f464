//! ipxe / tftp health check: the ipxe build pods, the tftp pods and shared
//! PVC, then verified transfers of every built boot binary from every tftp
//! service.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};

use crate::domain::errors::ConfigurationError;
use crate::domain::models::TransferConfig;
use crate::domain::ports::{ClusterInspector, CommandExecutor, ExecTarget, HealthCheck};
use crate::services::digest_probe::ArtifactDigestProbe;
use crate::services::pod_checks::{PodChecker, PodCount};
use crate::services::transfer_verifier::{RemoteArtifact, TransferConsistencyVerifier};

/// Architecture keys used in `TransferConfig::ipxe_pod_prefixes`.
pub const ARCH_X86_64: &str = "x86-64";
pub const ARCH_AARCH64: &str = "aarch64";

/// The `settings.yaml` document of the ipxe settings config map.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IpxeSettings {
    #[serde(default = "default_true")]
    pub cray_ipxe_build_x86: bool,
    #[serde(default)]
    pub cray_ipxe_build_aarch64: bool,
    pub cray_ipxe_binary_name: Option<String>,
    pub cray_ipxe_debug_binary_name: Option<String>,
    pub cray_ipxe_aarch64_binary_name: Option<String>,
    pub cray_ipxe_aarch64_debug_binary_name: Option<String>,
}

const fn default_true() -> bool {
    true
}

impl IpxeSettings {
    pub fn parse(yaml: &str, source_name: &str) -> Result<Self, ConfigurationError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigurationError::Malformed {
            source_name: source_name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Binaries each enabled architecture is expected to serve.
    ///
    /// A built architecture must name its main binary; debug binaries are
    /// optional.
    pub fn binaries_by_arch(
        &self,
        config_map: &str,
    ) -> Result<BTreeMap<&'static str, Vec<String>>, ConfigurationError> {
        let mut by_arch = BTreeMap::new();
        let archs = [
            (
                ARCH_X86_64,
                self.cray_ipxe_build_x86,
                "cray_ipxe_binary_name",
                &self.cray_ipxe_binary_name,
                &self.cray_ipxe_debug_binary_name,
            ),
            (
                ARCH_AARCH64,
                self.cray_ipxe_build_aarch64,
                "cray_ipxe_aarch64_binary_name",
                &self.cray_ipxe_aarch64_binary_name,
                &self.cray_ipxe_aarch64_debug_binary_name,
            ),
        ];
        for (arch, built, field, binary, debug) in archs {
            if !built {
                info!(arch, "ipxe binaries not built for architecture");
                continue;
            }
            let binary = binary
                .as_deref()
                .filter(|name| !name.trim().is_empty())
                .ok_or_else(|| ConfigurationError::MissingConfigMapField {
                    config_map: config_map.to_string(),
                    field: field.to_string(),
                })?;
            let mut names = vec![binary.to_string()];
            names.extend(debug.iter().filter(|name| !name.trim().is_empty()).cloned());
            by_arch.insert(arch, names);
        }
        Ok(by_arch)
    }
}

/// Architectures built when the settings cannot be read, with no known binaries.
fn default_build() -> BTreeMap<&'static str, Vec<String>> {
    BTreeMap::from([(ARCH_X86_64, Vec::new())])
}

/// Everything the ipxe/tftp check needs from its surroundings.
pub struct IpxeTftpCheck {
    pods: PodChecker,
    inspector: Arc<dyn ClusterInspector>,
    executor: Arc<dyn CommandExecutor>,
    probe: ArtifactDigestProbe,
    verifier: TransferConsistencyVerifier,
    settings: TransferConfig,
}

impl IpxeTftpCheck {
    pub fn new(
        pods: PodChecker,
        inspector: Arc<dyn ClusterInspector>,
        executor: Arc<dyn CommandExecutor>,
        probe: ArtifactDigestProbe,
        verifier: TransferConsistencyVerifier,
        settings: TransferConfig,
    ) -> Self {
        Self {
            pods,
            inspector,
            executor,
            probe,
            verifier,
            settings,
        }
    }

    /// Read and decode the ipxe settings config map.
    pub async fn load_settings(&self) -> Result<IpxeSettings, ConfigurationError> {
        let map = &self.settings.settings_config_map;
        let key = &self.settings.settings_key;
        let yaml = self
            .inspector
            .config_map_field(self.pods.namespace(), map, key)
            .await
            .map_err(|e| ConfigurationError::Malformed {
                source_name: map.clone(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| ConfigurationError::MissingConfigMapField {
                config_map: map.clone(),
                field: key.clone(),
            })?;
        IpxeSettings::parse(&yaml, &format!("{map}/{key}"))
    }

    fn container(&self, pod: &str) -> ExecTarget {
        ExecTarget::container(self.pods.namespace(), pod, &self.settings.ipxe_container)
    }

    fn artifact_path(&self, name: &str) -> String {
        format!("{}/{name}", self.settings.artifact_dir.trim_end_matches('/'))
    }

    /// The ipxe container answers commands, can list each binary and can
    /// digest it.
    pub async fn container_ready(&self, pod: &str, binaries: &[String]) -> bool {
        let target = self.container(pod);
        info!(%target, "Trying to run test command in ipxe container");
        if let Err(e) = self.executor.run(&target, "date", &[]).await {
            error!(%target, error = %e, "Unable to run even basic command in ipxe container");
            return false;
        }

        let mut passed = true;
        for name in binaries {
            let path = self.artifact_path(name);
            if let Err(e) = self.executor.run(&target, "ls", &["-al", path.as_str()]).await {
                error!(%target, path, error = %e, "File does not appear to exist in the ipxe container");
                passed = false;
                continue;
            }
            if self.probe.probe(&target, &path).await.is_err() {
                passed = false;
            }
        }
        passed
    }

    /// Master nodes cannot reach the tftp services. `None` if the hostname
    /// could not be read.
    async fn on_master(&self) -> Option<bool> {
        match self.executor.run(&ExecTarget::Local, "hostname", &[]).await {
            Ok(hostname) => Some(hostname.trim().starts_with("ncn-m")),
            Err(e) => {
                error!(error = %e, "Error checking node hostname");
                None
            }
        }
    }
}

#[async_trait]
impl HealthCheck for IpxeTftpCheck {
    async fn run(&self, _include_cli: bool) -> bool {
        // A bad settings map fails the check, but the pods and PVC are still
        // examined, assuming the default x86-64 build with unknown binaries.
        let expected = self
            .load_settings()
            .await
            .and_then(|settings| settings.binaries_by_arch(&self.settings.settings_config_map));
        let (binaries, mut passed) = match expected {
            Ok(binaries) if binaries.is_empty() => {
                error!("ipxe settings do not enable any architecture");
                (default_build(), false)
            }
            Ok(binaries) => (binaries, true),
            Err(e) => {
                error!(error = %e, "Unable to determine which ipxe binaries to expect");
                (default_build(), false)
            }
        };

        let mut ipxe_pods: Vec<(String, &[String])> = Vec::new();
        for (arch, names) in &binaries {
            let Some(prefix) = self.settings.ipxe_pod_prefixes.get(*arch) else {
                error!(arch, "No ipxe pod prefix configured for architecture");
                passed = false;
                continue;
            };
            let (pods, ok) = self.pods.pods_by_prefix(prefix, PodCount::exactly(1)).await;
            if !self.pods.pods_healthy(&pods) {
                passed = false;
            }
            match pods.first() {
                Some(pod) if ok => {
                    info!(arch, pod = %pod.name, "Found iPXE pod");
                    if !self.container_ready(&pod.name, names).await {
                        passed = false;
                    }
                    ipxe_pods.push((pod.name.clone(), names.as_slice()));
                }
                _ => passed = false,
            }
        }

        let (tftp_pods, ok) = self.pods.pods_by_prefix("cray-tftp", PodCount::at_least(1)).await;
        if !ok || !self.pods.pods_healthy(&tftp_pods) {
            passed = false;
        }
        if !self.pods.pvc_bound(&self.settings.shared_pvc).await {
            passed = false;
        }

        if !passed {
            info!("Because of previous failures, skipping remaining tftp checks");
            return false;
        }

        if self.settings.skip_on_master {
            match self.on_master().await {
                Some(true) => {
                    info!("tftp file transfer test cannot run on master NCNs; skipping");
                    return true;
                }
                Some(false) => {}
                None => return false,
            }
        }

        for service in &self.settings.tftp_services {
            for (pod, names) in &ipxe_pods {
                for name in *names {
                    let artifact = RemoteArtifact::new(
                        name.as_str(),
                        &self.settings.artifact_dir,
                        self.container(pod),
                    );
                    if !self.verifier.verify_service(service, &artifact).await {
                        passed = false;
                    }
                }
            }
        }
        passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults_to_x86_only() {
        let settings = IpxeSettings::parse("cray_ipxe_binary_name: ipxe.efi\n", "settings").unwrap();
        let by_arch = settings.binaries_by_arch("cray-ipxe-settings").unwrap();
        assert_eq!(by_arch.len(), 1);
        assert_eq!(by_arch[ARCH_X86_64], vec!["ipxe.efi".to_string()]);
    }

    #[test]
    fn test_settings_both_archs_with_debug() {
        let yaml = r"
cray_ipxe_build_x86: true
cray_ipxe_build_aarch64: true
cray_ipxe_binary_name: ipxe.efi
cray_ipxe_debug_binary_name: debug-ipxe.efi
cray_ipxe_aarch64_binary_name: ipxe.arm64.efi
";
        let settings = IpxeSettings::parse(yaml, "settings").unwrap();
        let by_arch = settings.binaries_by_arch("cray-ipxe-settings").unwrap();
        assert_eq!(
            by_arch[ARCH_X86_64],
            vec!["ipxe.efi".to_string(), "debug-ipxe.efi".to_string()]
        );
        assert_eq!(by_arch[ARCH_AARCH64], vec!["ipxe.arm64.efi".to_string()]);
    }

    #[test]
    fn test_built_arch_without_binary_name_is_configuration_error() {
        let yaml = "cray_ipxe_build_aarch64: true\ncray_ipxe_binary_name: ipxe.efi\n";
        let settings = IpxeSettings::parse(yaml, "s").unwrap();
        let err = settings.binaries_by_arch("cray-ipxe-settings").unwrap_err();
        match err {
            ConfigurationError::MissingConfigMapField { field, .. } => {
                assert_eq!(field, "cray_ipxe_aarch64_binary_name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_yaml_is_configuration_error() {
        let err = IpxeSettings::parse("cray_ipxe_build_x86: [not, a, bool]\n", "s").unwrap_err();
        assert!(matches!(err, ConfigurationError::Malformed { .. }));
    }
}
