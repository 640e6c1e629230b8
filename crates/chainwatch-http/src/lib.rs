//! chainwatch-http — HTTP JSON-RPC transport backed by `reqwest`.
//!
//! Request/response only: subscriptions need a persistent transport.

pub mod client;

pub use client::{HttpClientConfig, HttpDialer, HttpRpcClient};
