//! chainwatch-stream: everything that runs once the nodes are connected.
//!
//! # Modules
//! - `subscription`: `ReconnectingSubscription` and its state machine
//! - `pipeline`: decodes streamed logs into the store
//! - `store`: bounded `EventStore`
//! - `api`: axum query surface (`/events`, `/health`, `/nodes`)
//! - `subsystem`: start-up and graceful shutdown of all of the above
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use chainwatch_stream::{Subsystem, SubsystemConfig};
//!
//! # async fn demo(dialer: Arc<dyn chainwatch_core::Dialer>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = SubsystemConfig::single("wss://node.example/ws");
//! let interface = chainwatch_abi::erc20::erc20()?;
//! let grace = config.shutdown_grace();
//! let subsystem = Subsystem::start(config, interface, dialer).await?;
//! println!("query surface on {}", subsystem.local_addr());
//! subsystem.shutdown(grace).await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod shutdown;
pub mod store;
pub mod subscription;
pub mod subsystem;

pub use config::SubsystemConfig;
pub use error::StartError;
pub use pipeline::{Pipeline, PipelineStats};
pub use shutdown::Shutdown;
pub use store::EventStore;
pub use subscription::{ReconnectingSubscription, StreamConsumer, StreamItem, SubscriptionKind, SubscriptionState};
pub use subsystem::Subsystem;
