use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::ApiError;

/// Port for authenticated, read-only calls to the service API gateway.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// GET `path` (e.g. `/apis/bos/v2`) and decode the body as JSON.
    async fn get_json(&self, path: &str) -> Result<Value, ApiError>;
}
