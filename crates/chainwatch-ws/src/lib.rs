//! chainwatch-ws — WebSocket JSON-RPC transport.
//!
//! # Features
//! - Request multiplexing over a single connection
//! - `eth_subscribe` notification routing per subscription id
//! - Fail-fast on disconnect: subscription streams end with one terminal
//!   error so callers can drive their own reconnect policy

pub mod client;
pub mod subscriptions;

pub use client::{WsClientConfig, WsDialer, WsRpcClient};
pub use subscriptions::{SubscriptionId, SubscriptionManager};
