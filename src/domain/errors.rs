//! Domain errors for the cmsdev harness.
//!
//! Every failure is logged where it happens and then folded into a boolean
//! check result, so these types mostly travel a short distance: from an
//! adapter or parser up to the check that decides pass/fail.

use thiserror::Error;

/// Settings needed to decide which artifacts or services to expect are
/// malformed or missing.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Unknown service key in timeouts.per_service: {0}")]
    UnknownServiceKey(String),

    #[error("Invalid default timeout: {0}. Must be at least 1 second")]
    InvalidDefaultTimeout(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Namespace cannot be empty")]
    EmptyNamespace,

    #[error("Artifact directory must be an absolute path, got {0:?}")]
    InvalidArtifactDir(String),

    #[error("Invalid max_consistency_redos: {0}. Cannot be 0")]
    InvalidMaxRedos(u32),

    #[error("Invalid transfer mode: {0}. Must be one of: octet, netascii")]
    InvalidTransferMode(String),

    #[error("API base URL must start with http:// or https://, got {0:?}")]
    InvalidApiUrl(String),

    #[error("Field {field} missing from config map {config_map}")]
    MissingConfigMapField { config_map: String, field: String },

    #[error("Unable to decode {source_name}: {reason}")]
    Malformed { source_name: String, reason: String },
}

/// A service endpoint could not be resolved or is unusable.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Service {service} not found in namespace {namespace}: {reason}")]
    ServiceNotFound {
        namespace: String,
        service: String,
        reason: String,
    },

    #[error("Invalid port ({port}) for service {service}")]
    InvalidPort { service: String, port: i32 },

    #[error("Cluster query failed: {0}")]
    QueryFailed(String),
}

/// The legacy transfer protocol failed to deliver an artifact.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Unable to initialize transfer client for {remote}: {reason}")]
    Connect { remote: String, reason: String },

    #[error("Error receiving {artifact} from {remote}: {reason}")]
    Receive {
        remote: String,
        artifact: String,
        reason: String,
    },

    #[error("Transfer mode {0:?} is not supported by this client")]
    UnsupportedMode(String),

    #[error("Local file error for {path}: {source}")]
    LocalFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote {artifact} kept changing: {redos} consistency redos without a stable digest")]
    ContentUnstable { artifact: String, redos: u32 },
}

/// Digest command output did not have the exact expected shape.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestFormatError {
    #[error("Blank output from digest command for {0}")]
    Empty(String),

    #[error("Digest command output for {path} does not match the expected format: {output:?}")]
    Mismatch { path: String, output: String },
}

/// A service key reached dispatch without being one of the known services.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Invalid service ({0}); supported services are: {1}")]
    UnknownService(String, String),
}

/// A call to the service API gateway failed or returned an unusable body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unable to obtain access token: {0}")]
    Token(String),

    #[error("GET {path} failed: {reason}")]
    Request { path: String, reason: String },

    #[error("GET {path} returned status {status}")]
    Status { path: String, status: u16 },

    #[error("Unable to decode response from {path}: {reason}")]
    Decode { path: String, reason: String },
}

/// Errors raised while running a command locally or inside a container.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Failed to launch {command}: {reason}")]
    Launch { command: String, reason: String },

    #[error("{command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Top-level error taxonomy for the harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    DigestFormat(#[from] DigestFormatError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
