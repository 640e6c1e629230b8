//! HTTP JSON-RPC client backed by `reqwest`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chainwatch_core::eth;
use chainwatch_core::request::{JsonRpcRequest, JsonRpcResponse};
use chainwatch_core::transport::{Dialer, HealthStatus, RpcTransport};
use chainwatch_core::TransportError;

/// Configuration for `HttpRpcClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP JSON-RPC client. Each request is one POST; there is no connection
/// state beyond reqwest's pool.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    request_timeout: Duration,
    closed: AtomicBool,
}

impl HttpRpcClient {
    /// Create a new client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            request_timeout: config.request_timeout,
            closed: AtomicBool::new(false),
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, HttpClientConfig::default())
    }

    fn map_reqwest(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed(format!("{} is closed", self.url)));
        }

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        let body = resp.bytes().await.map_err(|e| self.map_reqwest(e))?;
        Ok(serde_json::from_slice::<JsonRpcResponse>(&body)?)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn health(&self) -> HealthStatus {
        if self.closed.load(Ordering::SeqCst) {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Unknown
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Dials `http://` / `https://` endpoints.
///
/// HTTP has no handshake, so a dial is an `eth_chainId` probe: an endpoint
/// that does not answer counts as a failed dial.
#[derive(Debug, Clone, Default)]
pub struct HttpDialer {
    pub config: HttpClientConfig,
}

impl HttpDialer {
    pub fn new(config: HttpClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Dialer for HttpDialer {
    async fn dial(&self, endpoint: &str) -> Result<Arc<dyn RpcTransport>, TransportError> {
        let client = HttpRpcClient::new(endpoint, self.config.clone())?;
        let chain_id: String = eth::request(&client, "eth_chainId", vec![]).await?;
        tracing::debug!(endpoint, chain_id = %chain_id, "HTTP endpoint answered probe");
        Ok(Arc::new(client))
    }
}
