//! Verified artifact transfers over TFTP.
//!
//! TFTP has no transactional guarantees and the served artifacts are
//! regenerated in place, so a single digest read tells us nothing about the
//! bytes we received. Each transfer is bracketed by two remote digest reads
//! and repeated until both reads agree; only then is the local copy compared
//! against the remote digest.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument, warn};

use crate::domain::errors::{HarnessResult, TransferError};
use crate::domain::models::{ArtifactDigest, Coverage, TransferMode};
use crate::domain::ports::{ExecTarget, TransferConnector, TransferSession};
use crate::services::digest_probe::ArtifactDigestProbe;
use crate::services::endpoint_resolver::EndpointResolver;

/// An artifact as served over TFTP, plus where its digest can be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArtifact {
    /// Name requested from the TFTP server
    pub name: String,
    /// Full path of the artifact on `host`
    pub path: String,
    /// Where the digest command runs
    pub host: ExecTarget,
}

impl RemoteArtifact {
    pub fn new(name: impl Into<String>, dir: &str, host: ExecTarget) -> Self {
        let name = name.into();
        let path = format!("{}/{name}", dir.trim_end_matches('/'));
        Self { name, path, host }
    }
}

/// Last path component of an artifact name, safe to embed in a file name.
fn file_stem(artifact: &str) -> &str {
    artifact
        .rsplit('/')
        .find(|part| !part.is_empty())
        .unwrap_or("artifact")
}

/// One physical transfer into a fresh local file.
///
/// The file is removed when the attempt is dropped, whichever way the
/// verification ends.
#[derive(Debug)]
pub struct TransferAttempt {
    pub remote: String,
    pub artifact: String,
    pub digest_before: ArtifactDigest,
    pub digest_after: Option<ArtifactDigest>,
    local: NamedTempFile,
}

impl TransferAttempt {
    pub fn create(
        remote: &str,
        artifact: &str,
        temp_dir: &Path,
        digest_before: ArtifactDigest,
    ) -> Result<Self, TransferError> {
        let local = tempfile::Builder::new()
            .prefix("cmsdev-ipxetftp-")
            .suffix(&format!("-{}.tmp", file_stem(artifact)))
            .rand_bytes(6)
            .tempfile_in(temp_dir)
            .map_err(|source| TransferError::LocalFile {
                path: temp_dir.display().to_string(),
                source,
            })?;
        info!(path = %local.path().display(), "Created local file for transfer test");

        Ok(Self {
            remote: remote.to_string(),
            artifact: artifact.to_string(),
            digest_before,
            digest_after: None,
            local,
        })
    }

    pub fn local_path(&self) -> &Path {
        self.local.path()
    }

    /// Receive the artifact into the local file, then sync it to disk.
    ///
    /// Write errors can surface at sync time, so the sync result is checked
    /// before the handle is closed.
    pub async fn fetch(
        &self,
        session: &dyn TransferSession,
        mode: TransferMode,
    ) -> Result<u64, TransferError> {
        let local_err = |source| TransferError::LocalFile {
            path: self.local.path().display().to_string(),
            source,
        };

        info!(artifact = %self.artifact, remote = %self.remote, "Opening tftp receive");
        let mut stream = session.receive(&self.artifact, mode).await?;

        let mut file = tokio::fs::File::from_std(self.local.reopen().map_err(local_err)?);
        let bytes = tokio::io::copy(&mut stream, &mut file)
            .await
            .map_err(|e| TransferError::Receive {
                remote: self.remote.clone(),
                artifact: self.artifact.clone(),
                reason: e.to_string(),
            })?;
        file.flush().await.map_err(local_err)?;
        file.sync_all().await.map_err(local_err)?;
        drop(file);

        info!(
            artifact = %self.artifact,
            remote = %self.remote,
            path = %self.local.path().display(),
            bytes,
            "tftp transfer completed"
        );
        Ok(bytes)
    }

    /// True once both remote digests are known and agree.
    pub fn is_stable(&self) -> bool {
        self.digest_after.as_ref() == Some(&self.digest_before)
    }
}

/// Fetches artifacts from TFTP services and proves the received bytes match
/// what the server held during the transfer.
pub struct TransferConsistencyVerifier {
    resolver: EndpointResolver,
    connector: Arc<dyn TransferConnector>,
    probe: ArtifactDigestProbe,
    temp_dir: PathBuf,
    max_redos: u32,
    mode: TransferMode,
}

impl TransferConsistencyVerifier {
    pub fn new(
        resolver: EndpointResolver,
        connector: Arc<dyn TransferConnector>,
        probe: ArtifactDigestProbe,
        temp_dir: impl Into<PathBuf>,
        max_redos: u32,
        mode: TransferMode,
    ) -> Self {
        Self {
            resolver,
            connector,
            probe,
            temp_dir: temp_dir.into(),
            max_redos,
            mode,
        }
    }

    /// Transfer `artifact` from every resolvable address of `service`.
    ///
    /// Fails without transferring anything if the service has no usable
    /// port or address. A missing address on its own is skipped; an invalid
    /// extra port fails the check but the transfers still run.
    #[instrument(skip(self, artifact), fields(artifact = %artifact.name))]
    pub async fn verify_service(&self, service: &str, artifact: &RemoteArtifact) -> bool {
        let Ok(resolved) = self.resolver.resolve(service).await else {
            return false;
        };

        let mut passed = true;
        match resolved.coverage {
            Coverage::None => {
                error!(service, "Cannot run file transfer test without valid IP address");
                return false;
            }
            Coverage::Partial => {
                if !resolved.invalid_extra_ports.is_empty() {
                    passed = false;
                }
                info!(service, "Will run as much of the file transfer test as we can");
            }
            Coverage::Full => {}
        }

        for (label, remote) in resolved.endpoint.targets() {
            info!(service, address = label, %remote, "Testing tftp file transfer");
            if !self.verify_endpoint(&remote, artifact).await {
                passed = false;
            }
        }
        passed
    }

    /// Transfer from one `ip:port` and compare digests; every error is
    /// logged and reported as a failure.
    pub async fn verify_endpoint(&self, remote: &str, artifact: &RemoteArtifact) -> bool {
        match self.transfer_and_compare(remote, artifact).await {
            Ok(true) => {
                info!(%remote, artifact = %artifact.name, "tftp receive test succeeded");
                true
            }
            Ok(false) => false,
            Err(e) => {
                error!(%remote, artifact = %artifact.name, error = %e, "tftp receive test failed");
                false
            }
        }
    }

    async fn transfer_and_compare(
        &self,
        remote: &str,
        artifact: &RemoteArtifact,
    ) -> HarnessResult<bool> {
        info!(%remote, "Initializing tftp client");
        let session = self.connector.connect(remote).await?;

        let mut digest_before = self.probe.probe(&artifact.host, &artifact.path).await?;
        let mut redos = 0;
        let attempt = loop {
            let mut attempt =
                TransferAttempt::create(remote, &artifact.name, &self.temp_dir, digest_before)?;
            attempt.fetch(session.as_ref(), self.mode).await?;

            let digest_after = self.probe.probe(&artifact.host, &artifact.path).await?;
            attempt.digest_after = Some(digest_after.clone());
            if attempt.is_stable() {
                break attempt;
            }

            if redos >= self.max_redos {
                return Err(TransferError::ContentUnstable {
                    artifact: artifact.name.clone(),
                    redos,
                }
                .into());
            }
            redos += 1;
            warn!(
                %remote,
                artifact = %artifact.name,
                redo = redos,
                "Remote file changed around the time of our transfer. Must redo transfer"
            );
            digest_before = digest_after;
        };
        info!(%remote, redos, "Remote file did not change around the time of our transfer");

        let local_path = attempt.local_path().to_string_lossy().into_owned();
        let local = self.probe.local_digest(&local_path).await?;
        let remote_digest = &attempt.digest_before;
        if &local != remote_digest {
            error!(
                %remote,
                remote_digest = %remote_digest,
                local_digest = %local,
                "Digest of remote file does not match that of received file"
            );
            return Ok(false);
        }
        info!(%remote, digest = %local, "Digest of received file matches that of remote file");
        Ok(true)
    }
}
