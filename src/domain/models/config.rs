use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::recipe::ImsRecipe;
use super::service::ServiceKey;

/// Main configuration structure for cmsdev
///
/// Built once at startup and handed by reference to everything that needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Kubernetes namespace the services live in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Retry deadlines
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Artifact transfer verification settings
    #[serde(default)]
    pub transfer: TransferConfig,

    /// External binaries the adapters shell out to
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Service API gateway access
    #[serde(default)]
    pub api: ApiConfig,

    /// Default IMS recipe expectations
    #[serde(default)]
    pub ims: ImsConfig,

    /// Expected conman container state
    #[serde(default)]
    pub conman: ConmanConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_namespace() -> String {
    "services".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            timeouts: TimeoutConfig::default(),
            transfer: TransferConfig::default(),
            tools: ToolsConfig::default(),
            api: ApiConfig::default(),
            ims: ImsConfig::default(),
            conman: ConmanConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Retry timeout for a service, falling back to the default.
    pub fn timeout_for(&self, key: ServiceKey) -> u64 {
        self.timeouts.for_service(key)
    }
}

/// Retry deadline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Timeout used for services without an entry in `per_service`
    #[serde(default = "default_timeout_secs")]
    pub default_secs: u64,

    /// Seconds tolerated past the stop deadline before giving up without sleeping
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,

    /// Per-service timeout overrides, keyed by service name
    #[serde(default = "default_per_service")]
    pub per_service: BTreeMap<String, u64>,
}

const fn default_timeout_secs() -> u64 {
    60
}

const fn default_grace_secs() -> u64 {
    30
}

// These services are the ones most often still starting up when checked, so
// they get longer retry windows.
fn default_per_service() -> BTreeMap<String, u64> {
    ServiceKey::ALL
        .iter()
        .filter(|key| **key != ServiceKey::Ims)
        .map(|key| (key.as_str().to_string(), 300))
        .collect()
}

impl TimeoutConfig {
    pub fn for_service(&self, key: ServiceKey) -> u64 {
        self.per_service
            .get(key.as_str())
            .copied()
            .unwrap_or(self.default_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_secs: default_timeout_secs(),
            grace_secs: default_grace_secs(),
            per_service: default_per_service(),
        }
    }
}

/// TFTP transfer verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransferConfig {
    /// Kubernetes services fronting the TFTP server
    #[serde(default = "default_tftp_services")]
    pub tftp_services: Vec<String>,

    /// Directory holding served artifacts inside the ipxe container
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,

    /// Container in the ipxe pods that can see the artifacts
    #[serde(default = "default_ipxe_container")]
    pub ipxe_container: String,

    /// ipxe pod name prefix for each build architecture
    #[serde(default = "default_ipxe_pod_prefixes")]
    pub ipxe_pod_prefixes: BTreeMap<String, String>,

    /// Config map describing which ipxe binaries are built
    #[serde(default = "default_settings_config_map")]
    pub settings_config_map: String,

    /// Key within the settings config map holding the YAML document
    #[serde(default = "default_settings_key")]
    pub settings_key: String,

    /// PVC shared between the ipxe and tftp pods
    #[serde(default = "default_shared_pvc")]
    pub shared_pvc: String,

    /// Local directory for transfer scratch files
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Upper bound on transfers redone because the remote artifact changed
    #[serde(default = "default_max_consistency_redos")]
    pub max_consistency_redos: u32,

    /// Skip the transfer itself when running on a master node
    #[serde(default = "default_true")]
    pub skip_on_master: bool,

    /// TFTP transfer mode
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_tftp_services() -> Vec<String> {
    vec!["cray-tftp".to_string(), "cray-tftp-hmn".to_string()]
}

fn default_artifact_dir() -> String {
    "/shared_tftp".to_string()
}

fn default_ipxe_container() -> String {
    "cray-ipxe".to_string()
}

fn default_ipxe_pod_prefixes() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("x86-64".to_string(), "cray-ipxe-x86-64".to_string()),
        ("aarch64".to_string(), "cray-ipxe-aarch64".to_string()),
    ])
}

fn default_settings_config_map() -> String {
    "cray-ipxe-settings".to_string()
}

fn default_settings_key() -> String {
    "settings.yaml".to_string()
}

fn default_shared_pvc() -> String {
    "cray-tftp-shared-pvc".to_string()
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
}

const fn default_max_consistency_redos() -> u32 {
    10
}

const fn default_true() -> bool {
    true
}

fn default_mode() -> String {
    "octet".to_string()
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            tftp_services: default_tftp_services(),
            artifact_dir: default_artifact_dir(),
            ipxe_container: default_ipxe_container(),
            ipxe_pod_prefixes: default_ipxe_pod_prefixes(),
            settings_config_map: default_settings_config_map(),
            settings_key: default_settings_key(),
            shared_pvc: default_shared_pvc(),
            temp_dir: default_temp_dir(),
            max_consistency_redos: default_max_consistency_redos(),
            skip_on_master: default_true(),
            mode: default_mode(),
        }
    }
}

/// Paths of the external binaries used by the adapters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ToolsConfig {
    #[serde(default = "default_kubectl")]
    pub kubectl: String,

    #[serde(default = "default_curl")]
    pub curl: String,

    #[serde(default = "default_md5sum")]
    pub md5sum: String,

    /// Service CLI used for the optional CLI surface checks
    #[serde(default = "default_cray")]
    pub cray: String,
}

fn default_kubectl() -> String {
    "kubectl".to_string()
}

fn default_curl() -> String {
    "curl".to_string()
}

fn default_md5sum() -> String {
    "md5sum".to_string()
}

fn default_cray() -> String {
    "cray".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            kubectl: default_kubectl(),
            curl: default_curl(),
            md5sum: default_md5sum(),
            cray: default_cray(),
        }
    }
}

/// Service API gateway access
///
/// The client secret is read from a Kubernetes secret and exchanged for a
/// bearer token at `token_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// OAuth token endpoint, relative to `base_url`
    #[serde(default = "default_token_path")]
    pub token_path: String,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Secret holding the base64 encoded client secret
    #[serde(default = "default_secret_name")]
    pub secret_name: String,

    #[serde(default = "default_secret_namespace")]
    pub secret_namespace: String,

    /// Data key of the client secret within `secret_name`
    #[serde(default = "default_secret_key")]
    pub secret_key: String,

    /// The gateway serves a self-signed certificate on most systems
    #[serde(default)]
    pub verify_tls: bool,

    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://api-gw-service-nmn.local".to_string()
}

fn default_token_path() -> String {
    "/keycloak/realms/shasta/protocol/openid-connect/token".to_string()
}

fn default_client_id() -> String {
    "admin-client".to_string()
}

fn default_secret_name() -> String {
    "admin-client-auth".to_string()
}

fn default_secret_namespace() -> String {
    "default".to_string()
}

fn default_secret_key() -> String {
    "client-secret".to_string()
}

const fn default_api_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            token_path: default_token_path(),
            client_id: default_client_id(),
            secret_name: default_secret_name(),
            secret_namespace: default_secret_namespace(),
            secret_key: default_secret_key(),
            verify_tls: false,
            timeout_secs: default_api_timeout_secs(),
        }
    }
}

/// Default IMS recipe expectations
///
/// Also read from the plain `IMS_RECIPE_NAME` and `IMS_RECIPE_DISTRO`
/// environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ImsConfig {
    /// Recipe that must exist in IMS; recipe checks are skipped when unset
    #[serde(default)]
    pub recipe_name: Option<String>,

    #[serde(default = "default_recipe_distro")]
    pub recipe_distro: String,
}

fn default_recipe_distro() -> String {
    "sles15".to_string()
}

impl Default for ImsConfig {
    fn default() -> Self {
        Self {
            recipe_name: None,
            recipe_distro: default_recipe_distro(),
        }
    }
}

impl ImsConfig {
    /// The configured recipe, if a non-blank name is set.
    pub fn expected_recipe(&self) -> Option<ImsRecipe> {
        let name = self.recipe_name.as_deref()?.trim();
        if name.is_empty() {
            return None;
        }
        let distro = match self.recipe_distro.trim() {
            "" => default_recipe_distro(),
            distro => distro.to_string(),
        };
        Some(ImsRecipe::new(name, distro))
    }
}

/// Expected conman container state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConmanConfig {
    #[serde(default = "default_conman_container")]
    pub container: String,

    /// Waiting reason `container` must report, e.g. `CrashLoopBackOff` on
    /// systems where conman is deliberately not yet configured. When unset,
    /// every container must be running.
    #[serde(default)]
    pub expected_waiting_reason: Option<String>,
}

fn default_conman_container() -> String {
    "cray-conman".to_string()
}

impl Default for ConmanConfig {
    fn default() -> Self {
        Self {
            container: default_conman_container(),
            expected_waiting_reason: None,
        }
    }
}

impl ConmanConfig {
    /// `(container, reason)` when a waiting state is expected.
    pub fn expected_waiting(&self) -> Option<(String, String)> {
        self.expected_waiting_reason
            .as_ref()
            .filter(|reason| !reason.trim().is_empty())
            .map(|reason| (self.container.clone(), reason.clone()))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
