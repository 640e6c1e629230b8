//! HTTP transport against an in-process JSON-RPC endpoint.

use std::time::Duration;

use axum::{routing::post, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use chainwatch_core::{eth, Dialer, RpcTransport, TransportError};
use chainwatch_http::{HttpClientConfig, HttpDialer, HttpRpcClient};

async fn rpc(Json(req): Json<Value>) -> Json<Value> {
    let id = req["id"].clone();
    let body = match req["method"].as_str() {
        Some("eth_chainId") => json!({ "jsonrpc": "2.0", "id": id, "result": "0x1" }),
        Some("eth_blockNumber") => json!({ "jsonrpc": "2.0", "id": id, "result": "0x10" }),
        Some("eth_call") => json!({
            "jsonrpc": "2.0", "id": id,
            "error": { "code": 3, "message": "execution reverted" }
        }),
        _ => json!({
            "jsonrpc": "2.0", "id": id,
            "error": { "code": -32601, "message": "method not found" }
        }),
    };
    Json(body)
}

async fn spawn_node() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().route("/", post(rpc))).await.unwrap();
    });
    format!("http://{addr}/")
}

#[tokio::test]
async fn dial_probes_and_reads_block_number() {
    let url = spawn_node().await;
    let conn = HttpDialer::default().dial(&url).await.unwrap();
    assert_eq!(conn.url(), url);
    assert_eq!(eth::block_number(conn.as_ref()).await.unwrap(), 16);
}

#[tokio::test]
async fn revert_is_rpc_error_not_transport_failure() {
    let url = spawn_node().await;
    let client = HttpRpcClient::default_for(url).unwrap();
    let err = eth::call(&client, Default::default(), &Default::default()).await.unwrap_err();
    assert!(matches!(err, TransportError::Rpc(_)));
    assert!(!err.is_transport_failure());
}

#[tokio::test]
async fn unreachable_endpoint_fails_dial() {
    let dialer = HttpDialer::new(HttpClientConfig {
        request_timeout: Duration::from_secs(2),
    });
    let err = dialer.dial("http://127.0.0.1:1/").await.err().unwrap();
    assert!(err.is_transport_failure(), "{err}");
}

#[tokio::test]
async fn closed_client_refuses_requests() {
    let url = spawn_node().await;
    let client = HttpRpcClient::default_for(url).unwrap();
    client.close().await;
    let err = eth::block_number(&client).await.unwrap_err();
    assert!(matches!(err, TransportError::Closed(_)));
}
