//! Node pool behaviour against a scripted dialer.

use std::sync::Arc;

use async_trait::async_trait;
use chainwatch_core::{
    Dialer, JsonRpcRequest, JsonRpcResponse, NodePool, PoolError, RpcId, RpcTransport, TransportError,
};

struct Node {
    url: String,
}

#[async_trait]
impl RpcTransport for Node {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        Ok(JsonRpcResponse {
            jsonrpc: "2.0".into(),
            id: req.id,
            result: Some(serde_json::json!("0x1")),
            error: None,
        })
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// `A` refuses every dial, everything else connects.
struct ADown;

#[async_trait]
impl Dialer for ADown {
    async fn dial(&self, endpoint: &str) -> Result<Arc<dyn RpcTransport>, TransportError> {
        if endpoint == "A" {
            return Err(TransportError::WebSocket("connection refused".into()));
        }
        Ok(Arc::new(Node { url: endpoint.to_string() }))
    }
}

#[tokio::test]
async fn a_fails_b_serves_everything_until_it_dies() {
    let pool = NodePool::connect(&ADown, &["A", "B"]).await.unwrap();
    assert_eq!(pool.len(), 2);

    for _ in 0..5 {
        assert_eq!(pool.pick_read_node().unwrap().endpoint, "B");
    }
    assert_eq!(pool.pick_primary_node().unwrap().endpoint, "B");
    assert_eq!(pool.block_number().await.unwrap(), 1);

    pool.mark_dead("B", &"stream reset");
    assert!(matches!(pool.pick_read_node(), Err(PoolError::NoLiveNode)));
    assert!(matches!(pool.pick_primary_node(), Err(PoolError::NoLiveNode)));
    assert!(matches!(pool.block_number().await, Err(PoolError::NoLiveNode)));
}

#[tokio::test]
async fn statuses_report_primary_and_liveness() {
    let pool = NodePool::connect(&ADown, &["A", "B", "C"]).await.unwrap();
    pool.pick_primary_node().unwrap();

    let statuses = pool.statuses();
    let summary: Vec<_> = statuses
        .iter()
        .map(|s| (s.endpoint.as_str(), s.alive, s.primary))
        .collect();
    assert_eq!(summary, [("A", false, false), ("B", true, true), ("C", true, false)]);
}
