//! Typed Ethereum JSON-RPC calls on top of any [`RpcTransport`].

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::{Address, Bytes, B256};
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::TransportError;
use crate::request::JsonRpcRequest;
use crate::transport::RpcTransport;
use crate::types::{quantity, BlockHeader, LogFilter, RawLog, TransactionReceipt};

/// Stream of raw logs from one `eth_subscribe("logs")` subscription.
pub type LogStream = Pin<Box<dyn Stream<Item = Result<RawLog, TransportError>> + Send>>;

/// Stream of headers from one `eth_subscribe("newHeads")` subscription.
pub type HeaderStream = Pin<Box<dyn Stream<Item = Result<BlockHeader, TransportError>> + Send>>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide request id; persistent transports match responses by id.
pub fn next_request_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Call a method and deserialize the result.
pub async fn request<T: DeserializeOwned>(
    conn: &dyn RpcTransport,
    method: &str,
    params: Vec<Value>,
) -> Result<T, TransportError> {
    let req = JsonRpcRequest::new(next_request_id(), method, params);
    let resp = conn.send(req).await?;
    let result = resp.into_result().map_err(TransportError::Rpc)?;
    serde_json::from_value(result).map_err(TransportError::Deserialization)
}

/// `eth_blockNumber`.
pub async fn block_number(conn: &dyn RpcTransport) -> Result<u64, TransportError> {
    let hex: String = request(conn, "eth_blockNumber", vec![]).await?;
    quantity::parse(&hex).map_err(|e| TransportError::Other(format!("bad block number {hex}: {e}")))
}

/// `eth_call` against the latest block (read-only contract call).
pub async fn call(conn: &dyn RpcTransport, to: Address, input: &Bytes) -> Result<Bytes, TransportError> {
    request(conn, "eth_call", vec![json!({ "to": to, "data": input }), json!("latest")]).await
}

/// `eth_sendRawTransaction` with an already signed payload.
pub async fn send_raw_transaction(conn: &dyn RpcTransport, raw: &Bytes) -> Result<B256, TransportError> {
    request(conn, "eth_sendRawTransaction", vec![json!(raw)]).await
}

/// `eth_getTransactionReceipt`; `None` while the transaction is pending.
pub async fn transaction_receipt(
    conn: &dyn RpcTransport,
    hash: B256,
) -> Result<Option<TransactionReceipt>, TransportError> {
    request(conn, "eth_getTransactionReceipt", vec![json!(hash)]).await
}

/// `eth_subscribe("logs", filter)`.
pub async fn subscribe_logs(conn: &dyn RpcTransport, filter: &LogFilter) -> Result<LogStream, TransportError> {
    let notifications = conn.subscribe("logs", vec![filter.to_params()]).await?;
    Ok(Box::pin(notifications.map(|item| {
        item.and_then(|value| serde_json::from_value::<RawLog>(value).map_err(TransportError::from))
    })))
}

/// `eth_subscribe("newHeads")`.
pub async fn subscribe_headers(conn: &dyn RpcTransport) -> Result<HeaderStream, TransportError> {
    let notifications = conn.subscribe("newHeads", vec![]).await?;
    Ok(Box::pin(notifications.map(|item| {
        item.and_then(|value| serde_json::from_value::<BlockHeader>(value).map_err(TransportError::from))
    })))
}
