//! chainwatch-core — collaborator traits, the multi-node pool and the
//! reconnect policy shared by every ChainWatch crate.
//!
//! # Modules
//! - `transport` — `RpcTransport` connection trait and the `Dialer` that creates them
//! - `request`   — JSON-RPC 2.0 request/response/notification types
//! - `error`     — `TransportError` and `PoolError`
//! - `types`     — raw logs, block headers, receipts and log filters
//! - `eth`       — typed `eth_*` calls over any transport
//! - `pool`      — `NodePool` with round-robin reads and a sticky write primary
//! - `backoff`   — exponential reconnect delay

pub mod backoff;
pub mod error;
pub mod eth;
pub mod pool;
pub mod request;
pub mod transport;
pub mod types;

pub use backoff::{Backoff, BackoffConfig};
pub use error::{PoolError, TransportError};
pub use pool::{NodeHandle, NodePool, NodeStatus};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use transport::{Dialer, HealthStatus, Notifications, RpcTransport};
pub use types::{BlockHeader, LogFilter, RawLog, TransactionReceipt};
