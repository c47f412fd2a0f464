//! Content digests of artifacts, read through the digest command.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, error, info};

use crate::domain::errors::{DigestFormatError, HarnessResult};
use crate::domain::models::ArtifactDigest;
use crate::domain::ports::{CommandExecutor, ExecTarget};

/// Extract the digest from one line of digest command output.
///
/// The output must be exactly 32 lowercase hex characters, two spaces, the
/// exact `path`, and a newline. Anything else is rejected.
pub fn parse_digest_output(output: &str, path: &str) -> Result<ArtifactDigest, DigestFormatError> {
    if output.trim().is_empty() {
        return Err(DigestFormatError::Empty(path.to_string()));
    }

    let mismatch = || DigestFormatError::Mismatch {
        path: path.to_string(),
        output: output.to_string(),
    };

    let pattern = format!("^[0-9a-f]{{32}}  {}\n$", regex::escape(path));
    let re = Regex::new(&pattern).map_err(|_| mismatch())?;
    if !re.is_match(output) {
        return Err(mismatch());
    }

    output
        .get(..ArtifactDigest::LEN)
        .and_then(ArtifactDigest::parse)
        .ok_or_else(mismatch)
}

/// Runs the digest command remotely or locally and validates its output.
#[derive(Clone)]
pub struct ArtifactDigestProbe {
    executor: Arc<dyn CommandExecutor>,
    command: String,
}

impl ArtifactDigestProbe {
    pub fn new(executor: Arc<dyn CommandExecutor>, command: impl Into<String>) -> Self {
        Self {
            executor,
            command: command.into(),
        }
    }

    /// Digest of the file at `path` as seen from `target`.
    pub async fn probe(&self, target: &ExecTarget, path: &str) -> HarnessResult<ArtifactDigest> {
        debug!(%target, path, "Generating digest");
        let output = self
            .executor
            .run(target, &self.command, &[path])
            .await
            .inspect_err(|e| error!(%target, path, error = %e, "Unable to generate digest"))?;

        let digest = parse_digest_output(&output, path)
            .inspect_err(|e| error!(%target, path, error = %e, "Invalid digest output"))?;
        info!(%target, path, digest = %digest, "Digest read");
        Ok(digest)
    }

    /// Digest of a file on the host the harness runs on.
    pub async fn local_digest(&self, path: &str) -> HarnessResult<ArtifactDigest> {
        self.probe(&ExecTarget::Local, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "/shared_tftp/ipxe.efi";
    const SUM: &str = "d41d8cd98f00b204e9800998ecf8427e";

    #[test]
    fn test_parse_accepts_exact_format() {
        let digest = parse_digest_output(&format!("{SUM}  {PATH}\n"), PATH).unwrap();
        assert_eq!(digest.as_str(), SUM);
    }

    #[test]
    fn test_parse_rejects_single_space() {
        let err = parse_digest_output(&format!("{SUM} {PATH}\n"), PATH).unwrap_err();
        assert!(matches!(err, DigestFormatError::Mismatch { .. }));
    }

    #[test]
    fn test_parse_rejects_missing_newline_and_trailing_output() {
        assert!(parse_digest_output(&format!("{SUM}  {PATH}"), PATH).is_err());
        assert!(parse_digest_output(&format!("{SUM}  {PATH}\nextra\n"), PATH).is_err());
        assert!(parse_digest_output(&format!("{SUM}  {PATH}\n\n"), PATH).is_err());
    }

    #[test]
    fn test_parse_rejects_uppercase_and_short_digests() {
        let upper = SUM.to_uppercase();
        assert!(parse_digest_output(&format!("{upper}  {PATH}\n"), PATH).is_err());
        assert!(parse_digest_output(&format!("{}  {PATH}\n", &SUM[1..]), PATH).is_err());
    }

    #[test]
    fn test_parse_rejects_other_path() {
        let err =
            parse_digest_output(&format!("{SUM}  /shared_tftp/ipxe.efi.bak\n"), PATH).unwrap_err();
        assert!(matches!(err, DigestFormatError::Mismatch { .. }));
    }

    #[test]
    fn test_parse_treats_path_literally() {
        // '.' must not match an arbitrary character
        assert!(parse_digest_output(&format!("{SUM}  /shared_tftp/ipxeXefi\n"), PATH).is_err());
    }

    #[test]
    fn test_parse_blank_output_is_empty_error() {
        assert_eq!(
            parse_digest_output("  \n", PATH).unwrap_err(),
            DigestFormatError::Empty(PATH.to_string())
        );
    }
}
