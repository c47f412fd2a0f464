use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::domain::errors::TransferError;
use crate::domain::models::TransferMode;

/// Bytes of a received artifact.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Port for opening a client against a TFTP endpoint.
#[async_trait]
pub trait TransferConnector: Send + Sync {
    /// `remote` is an `address:port` pair.
    async fn connect(&self, remote: &str) -> Result<Box<dyn TransferSession>, TransferError>;
}

/// A client bound to one endpoint.
#[async_trait]
pub trait TransferSession: Send + Sync {
    async fn receive(&self, artifact: &str, mode: TransferMode) -> Result<ByteStream, TransferError>;
}
