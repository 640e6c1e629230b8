//! `chainwatch run` configuration: YAML file, then environment / flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use anyhow::{Context, Result};
use chainwatch_abi::Interface;
use chainwatch_stream::SubsystemConfig;
use serde::{Deserialize, Serialize};

use crate::logging::LogConfig;

/// On-disk configuration.
///
/// ```yaml
/// endpoints:
///   - wss://node-a.example/ws
///   - wss://node-b.example/ws
/// capacity: 500
/// listen: 127.0.0.1:8080
/// contracts: ["0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"]
/// abi: ./abi/usdc.json
/// backoff: { unit_ms: 500, base: 2, max_delay_ms: 30000 }
/// log: { level: info, json: true, components: { chainwatch-ws: debug } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(flatten)]
    pub subsystem: SubsystemConfig,
    /// Contract ABI JSON; the built-in ERC-20 interface when absent.
    #[serde(default)]
    pub abi: Option<PathBuf>,
    #[serde(default)]
    pub log: LogConfig,
}

/// Values given on the command line (or through their environment
/// variables). Anything set here replaces the file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoints: Vec<String>,
    pub listen: Option<SocketAddr>,
    pub capacity: Option<usize>,
    pub contracts: Vec<Address>,
    pub abi: Option<PathBuf>,
    pub no_headers: bool,
    pub log_level: Option<String>,
    pub log_json: bool,
}

impl FileConfig {
    /// Read `path`, or start from defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read config file {}", path.display()))?;
                Self::from_yaml(&text).with_context(|| format!("invalid config file {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if !overrides.endpoints.is_empty() {
            self.subsystem.endpoints = overrides.endpoints;
        }
        if let Some(listen) = overrides.listen {
            self.subsystem.listen = listen;
        }
        if let Some(capacity) = overrides.capacity {
            self.subsystem.capacity = capacity;
        }
        if !overrides.contracts.is_empty() {
            self.subsystem.contracts = overrides.contracts;
        }
        if overrides.abi.is_some() {
            self.abi = overrides.abi;
        }
        if overrides.no_headers {
            self.subsystem.headers = false;
        }
        if let Some(level) = overrides.log_level {
            self.log.level = level;
        }
        if overrides.log_json {
            self.log.json = true;
        }
    }

    /// The interface to decode with.
    pub fn interface(&self) -> Result<Interface> {
        load_interface(self.abi.as_deref())
    }
}

/// Parse an ABI JSON file, or fall back to the built-in ERC-20 interface.
pub fn load_interface(path: Option<&Path>) -> Result<Interface> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read ABI file {}", path.display()))?;
            Interface::parse(&json).with_context(|| format!("invalid ABI file {}", path.display()))
        }
        None => Ok(chainwatch_abi::erc20::erc20()?),
    }
}
