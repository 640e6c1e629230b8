//! Subsystem start-up errors.

use std::net::SocketAddr;

use chainwatch_core::PoolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No configured node could be dialed.
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("failed to bind query surface on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
