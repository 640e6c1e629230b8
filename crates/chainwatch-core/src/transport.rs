//! The chain RPC collaborator: `RpcTransport` connections and the `Dialer`
//! that establishes them.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use serde_json::Value;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// Connection health as seen by the transport itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Connection is open and responding.
    Healthy,
    /// Connection has been closed or has broken.
    Unhealthy,
    /// Health status is unknown (stateless transports).
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Raw `eth_subscription` payloads for one subscription.
///
/// The stream yields one terminal `Err` when the transport breaks and then ends.
pub type Notifications = Pin<Box<dyn Stream<Item = Result<Value, TransportError>> + Send>>;

/// One established connection to a chain node.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and is stored as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the response.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Open an `eth_subscribe` stream of the given kind (`"newHeads"`, `"logs"`).
    ///
    /// Request/response transports do not support push subscriptions.
    async fn subscribe(&self, kind: &str, params: Vec<Value>) -> Result<Notifications, TransportError> {
        let _ = params;
        Err(TransportError::Unsupported {
            url: self.url().to_string(),
            what: format!("eth_subscribe({kind})"),
        })
    }

    /// Release the connection. Further requests fail with `Closed`.
    async fn close(&self) {}

    /// Return the current health status of this connection.
    fn health(&self) -> HealthStatus {
        HealthStatus::Unknown
    }

    /// Return the endpoint this connection was dialed with.
    fn url(&self) -> &str;
}

/// Establishes connections to endpoints.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    async fn dial(&self, endpoint: &str) -> Result<Arc<dyn RpcTransport>, TransportError>;
}
