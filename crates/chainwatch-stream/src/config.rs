//! Subsystem configuration.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::time::Duration;

use alloy_primitives::Address;
use chainwatch_core::BackoffConfig;
use serde::{Deserialize, Serialize};

use crate::error::StartError;

/// Everything [`Subsystem::start`](crate::Subsystem::start) needs besides
/// the interface and the dialer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemConfig {
    /// Node endpoints in failover order, e.g. `"wss://node-a.example/ws"`.
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Maximum number of decoded events kept for the query surface.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Address the HTTP query surface binds to.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Contracts to watch (empty = any contract emitting a declared event).
    #[serde(default)]
    pub contracts: Vec<Address>,
    /// Also subscribe to new block headers.
    #[serde(default = "bool_true")]
    pub headers: bool,
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// How long shutdown waits for tasks before aborting them.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_capacity() -> usize { 100 }
fn default_listen() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 8080)) }
fn bool_true() -> bool { true }
fn default_shutdown_grace_ms() -> u64 { 5_000 }

impl Default for SubsystemConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            capacity: default_capacity(),
            listen: default_listen(),
            contracts: Vec::new(),
            headers: true,
            backoff: BackoffConfig::default(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl SubsystemConfig {
    /// Single-endpoint config with defaults for everything else.
    pub fn single(endpoint: impl Into<String>) -> Self {
        Self {
            endpoints: vec![endpoint.into()],
            ..Self::default()
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Non-zero store capacity, or a config error.
    pub fn store_capacity(&self) -> Result<NonZeroUsize, StartError> {
        NonZeroUsize::new(self.capacity)
            .ok_or_else(|| StartError::Config("capacity must be greater than zero".into()))
    }

    /// Capacity and every backoff parameter must be non-zero.
    pub fn validate(&self) -> Result<(), StartError> {
        self.store_capacity()?;
        let backoff = &self.backoff;
        for (field, value) in [
            ("unit_ms", backoff.unit_ms),
            ("base", u64::from(backoff.base)),
            ("max_delay_ms", backoff.max_delay_ms),
        ] {
            if value == 0 {
                return Err(StartError::Config(format!("backoff.{field} must be greater than zero")));
            }
        }
        Ok(())
    }
}
