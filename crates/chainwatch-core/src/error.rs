//! Transport and pool error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur during an RPC transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, timeout, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node (e.g. a revert).
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The connection was closed locally or by the peer.
    #[error("Connection closed: {0}")]
    Closed(String),

    /// The transport cannot serve this kind of request (e.g. subscriptions over HTTP).
    #[error("Unsupported by transport {url}: {what}")]
    Unsupported { url: String, what: String },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error means the node itself is unreachable.
    ///
    /// Only these outcomes flip a pool node to dead; node-side execution
    /// errors and decoding problems leave liveness untouched.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::WebSocket(_) | Self::Timeout { .. } | Self::Closed(_)
        )
    }

    /// Returns `true` if this is a node-side execution error (revert etc.).
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}

/// Errors surfaced by [`NodePool`](crate::pool::NodePool) selection.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Construction failed: not a single endpoint could be dialed.
    #[error("no nodes available: every configured endpoint failed to dial")]
    NoNodesAvailable,

    /// Selection failed: every node in the pool is currently marked dead.
    #[error("no live node in pool")]
    NoLiveNode,

    /// The endpoint is not part of the pool.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// The pool has been closed; no connection is installed any more.
    #[error("node pool is closed")]
    Closed,

    /// The selected node answered with an error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_is_not_a_transport_failure() {
        let err = TransportError::Rpc(JsonRpcError {
            code: 3,
            message: "execution reverted".into(),
            data: None,
        });
        assert!(err.is_execution_error());
        assert!(!err.is_transport_failure());
    }

    #[test]
    fn socket_errors_are_transport_failures() {
        assert!(TransportError::WebSocket("reset".into()).is_transport_failure());
        assert!(TransportError::Timeout { ms: 10 }.is_transport_failure());
        assert!(TransportError::Closed("eof".into()).is_transport_failure());
        assert!(!TransportError::Other("x".into()).is_transport_failure());
    }
}
