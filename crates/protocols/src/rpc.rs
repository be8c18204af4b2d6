//! Minimal Ethereum JSON-RPC client for read-only `eth_call`s.

use anyhow::{Context, Result};
use oolong_domain::FetchError;
use serde::Deserialize;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the RPC client.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL.
    pub url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl RpcConfig {
    /// Creates a config for the given endpoint with the default timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Reads `RPC_URL` and the optional `RPC_TIMEOUT_MS`.
    ///
    /// # Errors
    /// Returns an error if `RPC_URL` is unset or the timeout is not a number.
    pub fn from_env() -> Result<Self> {
        let url = env::var("RPC_URL").context("RPC_URL must be set in .env or environment")?;
        let mut config = Self::new(url);
        if let Ok(ms) = env::var("RPC_TIMEOUT_MS") {
            let ms: u64 = ms.parse().context("RPC_TIMEOUT_MS must be an integer")?;
            config.request_timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC client.
pub struct RpcProvider {
    client: reqwest::Client,
    config: RpcConfig,
    next_id: AtomicU64,
}

impl RpcProvider {
    /// Creates a new client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: RpcConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    /// Returns the endpoint URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Executes `eth_call` and returns the hex-encoded return data.
    pub async fn eth_call(&self, to: &str, data: &str, block_tag: &str) -> Result<String, FetchError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "eth_call",
            "params": [{ "to": to, "data": data }, block_tag],
        });
        debug!(id, to, "eth_call");

        let response = self
            .client
            .post(&self.config.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(FetchError::network(format!("HTTP status {}", response.status())));
        }

        let body: RpcResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.config.request_timeout)
            } else {
                FetchError::malformed(format!("invalid JSON-RPC response: {e}"))
            }
        })?;
        parse_response(body)
    }

    fn transport_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.config.request_timeout)
        } else {
            FetchError::network(e.to_string())
        }
    }
}

fn parse_response(body: RpcResponse) -> Result<String, FetchError> {
    match (body.result, body.error) {
        (_, Some(err)) => Err(FetchError::network(format!(
            "rpc error {}: {}",
            err.code, err.message
        ))),
        (Some(result), None) => Ok(result),
        (None, None) => Err(FetchError::malformed("response has neither result nor error")),
    }
}
