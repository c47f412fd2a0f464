//! TFTP client adapter that drives the curl binary.
//!
//! curl speaks TFTP in octet mode only, so netascii requests are refused.

use std::io::Cursor;
use std::net::SocketAddr;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::domain::errors::TransferError;
use crate::domain::models::TransferMode;
use crate::domain::ports::{ByteStream, TransferConnector, TransferSession};

#[derive(Debug, Clone)]
pub struct CurlTransferConnector {
    curl: String,
}

impl CurlTransferConnector {
    pub fn new(curl: impl Into<String>) -> Self {
        Self { curl: curl.into() }
    }
}

#[async_trait]
impl TransferConnector for CurlTransferConnector {
    async fn connect(&self, remote: &str) -> Result<Box<dyn TransferSession>, TransferError> {
        let addr: SocketAddr = remote.parse().map_err(|e| TransferError::Connect {
            remote: remote.to_string(),
            reason: format!("not an address:port pair ({e})"),
        })?;
        Ok(Box::new(CurlSession {
            curl: self.curl.clone(),
            remote: addr,
        }))
    }
}

struct CurlSession {
    curl: String,
    remote: SocketAddr,
}

impl CurlSession {
    fn url(&self, artifact: &str) -> String {
        format!("tftp://{}/{}", self.remote, artifact.trim_start_matches('/'))
    }
}

#[async_trait]
impl TransferSession for CurlSession {
    async fn receive(&self, artifact: &str, mode: TransferMode) -> Result<ByteStream, TransferError> {
        if mode != TransferMode::Octet {
            return Err(TransferError::UnsupportedMode(mode.as_str().to_string()));
        }

        let url = self.url(artifact);
        debug!(%url, "Receiving over TFTP");
        let receive_error = |reason: String| TransferError::Receive {
            remote: self.remote.to_string(),
            artifact: artifact.to_string(),
            reason,
        };

        let output = Command::new(&self.curl)
            .args(["--silent", "--show-error", &url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| receive_error(format!("failed to launch {}: {e}", self.curl)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(receive_error(format!("{} ({stderr})", output.status)));
        }

        Ok(Box::new(Cursor::new(output.stdout)))
    }
}
