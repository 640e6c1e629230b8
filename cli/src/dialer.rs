//! Picks the transport from the endpoint's URL scheme.

use std::sync::Arc;

use async_trait::async_trait;
use chainwatch_core::{Dialer, RpcTransport, TransportError};
use chainwatch_http::HttpDialer;
use chainwatch_ws::WsDialer;

/// `ws://` / `wss://` go over WebSocket, `http://` / `https://` over HTTP.
#[derive(Debug, Clone, Default)]
pub struct SchemeDialer {
    pub ws: WsDialer,
    pub http: HttpDialer,
}

#[async_trait]
impl Dialer for SchemeDialer {
    async fn dial(&self, endpoint: &str) -> Result<Arc<dyn RpcTransport>, TransportError> {
        let scheme = endpoint.split_once("://").map(|(scheme, _)| scheme.to_ascii_lowercase());
        match scheme.as_deref() {
            Some("ws" | "wss") => self.ws.dial(endpoint).await,
            Some("http" | "https") => self.http.dial(endpoint).await,
            _ => Err(TransportError::Unsupported {
                url: endpoint.to_string(),
                what: "URL scheme (expected ws, wss, http or https)".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_scheme_is_rejected_without_dialing() {
        let err = SchemeDialer::default().dial("ipc:///tmp/geth.ipc").await.err().unwrap();
        assert!(matches!(err, TransportError::Unsupported { .. }));

        let err = SchemeDialer::default().dial("localhost:8545").await.err().unwrap();
        assert!(matches!(err, TransportError::Unsupported { .. }));
    }
}
