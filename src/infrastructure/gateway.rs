//! Authenticated GET requests against the service API gateway.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client as ReqwestClient;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::domain::errors::ApiError;
use crate::domain::models::ApiConfig;
use crate::domain::ports::{ApiClient, CommandExecutor, ExecTarget};

/// Client secret from `kubectl get secret -o json` output.
pub fn secret_from_json(json: &str, key: &str) -> Result<String, ApiError> {
    let secret: Value = serde_json::from_str(json)
        .map_err(|e| ApiError::Token(format!("Unable to decode secret: {e}")))?;
    let encoded = secret["data"][key]
        .as_str()
        .ok_or_else(|| ApiError::Token(format!("Secret has no data field {key:?}")))?;
    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|e| ApiError::Token(format!("Secret field {key:?} is not base64: {e}")))?;
    let secret = String::from_utf8(decoded)
        .map_err(|e| ApiError::Token(format!("Secret field {key:?} is not UTF-8: {e}")))?;
    let secret = secret.trim();
    if secret.is_empty() {
        return Err(ApiError::Token(format!("Secret field {key:?} is blank")));
    }
    Ok(secret.to_string())
}

/// `access_token` from a token endpoint response.
pub fn token_from_json(body: &str) -> Result<String, ApiError> {
    let response: Value = serde_json::from_str(body)
        .map_err(|e| ApiError::Token(format!("Unable to decode token response: {e}")))?;
    response["access_token"]
        .as_str()
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Token("Token response has no access_token".to_string()))
}

/// `ApiClient` over HTTPS with a client-credentials bearer token.
///
/// The token is fetched on first use and reused for the rest of the run.
pub struct GatewayClient {
    http_client: ReqwestClient,
    executor: Arc<dyn CommandExecutor>,
    kubectl: String,
    config: ApiConfig,
    token: OnceCell<String>,
}

impl GatewayClient {
    pub fn new(
        config: ApiConfig,
        executor: Arc<dyn CommandExecutor>,
        kubectl: impl Into<String>,
    ) -> Result<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            executor,
            kubectl: kubectl.into(),
            config,
            token: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn client_secret(&self) -> Result<String, ApiError> {
        let args = [
            "get",
            "secret",
            self.config.secret_name.as_str(),
            "-n",
            self.config.secret_namespace.as_str(),
            "-o",
            "json",
        ];
        let json = self
            .executor
            .run(&ExecTarget::Local, &self.kubectl, &args)
            .await
            .map_err(|e| ApiError::Token(e.to_string()))?;
        secret_from_json(&json, &self.config.secret_key)
    }

    async fn fetch_token(&self) -> Result<String, ApiError> {
        let secret = self.client_secret().await?;
        let url = self.url(&self.config.token_path);
        info!(url = %url, client_id = %self.config.client_id, "Requesting access token");

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", secret.as_str()),
        ];
        let response = self
            .http_client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::Token(format!("POST {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Token(format!("POST {url} returned status {status}")));
        }
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Token(format!("Unable to read token response: {e}")))?;
        token_from_json(&body)
    }

    async fn token(&self) -> Result<&str, ApiError> {
        self.token
            .get_or_try_init(|| self.fetch_token())
            .await
            .map(String::as_str)
    }
}

#[async_trait]
impl ApiClient for GatewayClient {
    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let token = self.token().await?;
        let url = self.url(path);
        info!(url = %url, "GET");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::Request {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| ApiError::Request {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        debug!(url = %url, bytes = body.len(), "Response received");
        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}
