//! `ReconnectingSubscription`: keeps one `eth_subscribe` stream alive
//! across transport failures.
//!
//! ```text
//!   Disconnected ──dial+subscribe ok──▶ Streaming ──error / end──┐
//!        ▲  │                              │                     │
//!        │  └──dial or subscribe failed──┐ └──shutdown──▶ Terminated
//!        │                               ▼                     ▲
//!        └────────── delay elapsed ──── Backoff ───shutdown────┘
//! ```
//!
//! Each pass through Disconnected is one connect attempt. The attempt
//! counter only ever grows, so the wait after a failure keeps growing
//! toward the cap for the lifetime of the subscription.
//!
//! An endpoint whose transport cannot subscribe at all (plain HTTP) is
//! skipped for the rest of the run, and the next endpoint is tried right
//! away instead of after a backoff.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chainwatch_core::{eth, Backoff, BlockHeader, Dialer, LogFilter, NodePool, RawLog, RpcTransport, TransportError};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::watch;

use crate::shutdown::Shutdown;

/// What to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// `eth_subscribe("newHeads")`
    Headers,
    /// `eth_subscribe("logs", filter)`
    Logs(LogFilter),
}

impl SubscriptionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Headers => "newHeads",
            Self::Logs(_) => "logs",
        }
    }
}

/// One delivered item.
#[derive(Debug, Clone)]
pub enum StreamItem {
    Header(BlockHeader),
    Log(RawLog),
}

/// Observable driver state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SubscriptionState {
    Disconnected,
    Streaming { endpoint: String },
    #[serde(rename_all = "camelCase")]
    Backoff { attempt: u32, delay_ms: u64 },
    Terminated,
}

/// Receives every streamed item, in order, as soon as it arrives.
pub trait StreamConsumer: Send + Sync {
    fn on_item(&self, item: StreamItem);
}

impl<F> StreamConsumer for F
where
    F: Fn(StreamItem) + Send + Sync,
{
    fn on_item(&self, item: StreamItem) {
        self(item)
    }
}

type ItemStream = Pin<Box<dyn Stream<Item = Result<StreamItem, TransportError>> + Send>>;

enum StreamEnd {
    Shutdown,
    Failed(String),
}

/// Drives one subscription through connect, stream and backoff until shutdown.
///
/// Each connection is dedicated to this subscription and dialed through
/// the pool's endpoint order; streaming failures do not touch pool liveness.
pub struct ReconnectingSubscription {
    kind: SubscriptionKind,
    pool: Arc<NodePool>,
    dialer: Arc<dyn Dialer>,
    backoff: Backoff,
    attempt: u32,
    state_tx: watch::Sender<SubscriptionState>,
}

impl ReconnectingSubscription {
    pub fn new(kind: SubscriptionKind, pool: Arc<NodePool>, dialer: Arc<dyn Dialer>, backoff: Backoff) -> Self {
        let (state_tx, _) = watch::channel(SubscriptionState::Disconnected);
        Self {
            kind,
            pool,
            dialer,
            backoff,
            attempt: 0,
            state_tx,
        }
    }

    pub fn kind(&self) -> &SubscriptionKind {
        &self.kind
    }

    /// Watch state transitions.
    pub fn state(&self) -> watch::Receiver<SubscriptionState> {
        self.state_tx.subscribe()
    }

    /// Connect attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    fn set_state(&self, state: SubscriptionState) {
        tracing::debug!(kind = self.kind.name(), ?state, "subscription state");
        self.state_tx.send_replace(state);
    }

    /// Run until `shutdown` fires. Returns once the current connection,
    /// if any, has been closed.
    pub async fn run(&mut self, consumer: &dyn StreamConsumer, shutdown: Shutdown) {
        let kind = self.kind.name();
        let mut rotation = 0usize;
        let mut cannot_stream = HashSet::new();

        while !shutdown.is_triggered() {
            self.set_state(SubscriptionState::Disconnected);
            self.attempt = self.attempt.saturating_add(1);

            let Some(endpoint) = self.pool.stream_endpoint(rotation, &cannot_stream) else {
                tracing::error!(kind, "no endpoints configured for subscription");
                break;
            };
            rotation = rotation.wrapping_add(1);

            let connected = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                result = self.connect(&endpoint) => result,
            };

            match connected {
                Ok((conn, stream)) => {
                    tracing::info!(kind, endpoint = %endpoint, attempt = self.attempt, "subscription streaming");
                    self.set_state(SubscriptionState::Streaming {
                        endpoint: endpoint.clone(),
                    });
                    let end = Self::stream(stream, consumer, &shutdown).await;
                    conn.close().await;
                    match end {
                        StreamEnd::Shutdown => break,
                        StreamEnd::Failed(reason) => {
                            tracing::warn!(kind, endpoint = %endpoint, reason = %reason, "subscription stream lost");
                        }
                    }
                }
                Err(e @ TransportError::Unsupported { .. }) => {
                    tracing::warn!(kind, endpoint = %endpoint, error = %e, "endpoint cannot stream; skipping it");
                    cannot_stream.insert(endpoint);
                    if cannot_stream.len() < self.pool.len() {
                        continue;
                    }
                }
                Err(e) => {
                    tracing::warn!(kind, endpoint = %endpoint, attempt = self.attempt, error = %e, "subscription connect failed");
                }
            }

            let delay = self.backoff.delay(self.attempt);
            self.set_state(SubscriptionState::Backoff {
                attempt: self.attempt,
                delay_ms: delay.as_millis() as u64,
            });
            tracing::info!(kind, attempt = self.attempt, delay_ms = delay.as_millis() as u64, "reconnecting after backoff");
            if !Self::wait(delay, &shutdown).await {
                break;
            }
        }

        self.set_state(SubscriptionState::Terminated);
        tracing::info!(kind, attempts = self.attempt, "subscription terminated");
    }

    /// `false` if shutdown cut the wait short.
    async fn wait(delay: Duration, shutdown: &Shutdown) -> bool {
        tokio::select! {
            biased;
            _ = shutdown.wait() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn connect(&self, endpoint: &str) -> Result<(Arc<dyn RpcTransport>, ItemStream), TransportError> {
        let conn = self.dialer.dial(endpoint).await?;
        let subscribed: Result<ItemStream, TransportError> = match &self.kind {
            SubscriptionKind::Headers => eth::subscribe_headers(conn.as_ref())
                .await
                .map(|s| Box::pin(s.map(|r| r.map(StreamItem::Header))) as ItemStream),
            SubscriptionKind::Logs(filter) => eth::subscribe_logs(conn.as_ref(), filter)
                .await
                .map(|s| Box::pin(s.map(|r| r.map(StreamItem::Log))) as ItemStream),
        };
        match subscribed {
            Ok(stream) => Ok((conn, stream)),
            Err(e) => {
                conn.close().await;
                Err(e)
            }
        }
    }

    async fn stream(mut stream: ItemStream, consumer: &dyn StreamConsumer, shutdown: &Shutdown) -> StreamEnd {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => return StreamEnd::Shutdown,
                item = stream.next() => match item {
                    None => return StreamEnd::Failed("stream ended".into()),
                    Some(Ok(item)) => consumer.on_item(item),
                    Some(Err(e)) if e.is_transport_failure() => return StreamEnd::Failed(e.to_string()),
                    Some(Err(e)) => tracing::warn!(error = %e, "skipping malformed notification"),
                },
            }
        }
    }
}
