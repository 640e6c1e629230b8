//! Lifecycle owner: pool, subscriptions, pipeline and query surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chainwatch_abi::{Interface, LogDecoder};
use chainwatch_core::{Backoff, Dialer, LogFilter, NodePool};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::{self, ApiState};
use crate::config::SubsystemConfig;
use crate::error::StartError;
use crate::pipeline::{Pipeline, PipelineStats};
use crate::shutdown::Shutdown;
use crate::store::EventStore;
use crate::subscription::{ReconnectingSubscription, SubscriptionKind, SubscriptionState};

/// A running ChainWatch instance.
///
/// Dropping it without calling [`shutdown`](Self::shutdown) leaves the
/// background tasks running until the runtime stops.
pub struct Subsystem {
    shutdown: Shutdown,
    pool: Arc<NodePool>,
    pipeline: Pipeline,
    local_addr: SocketAddr,
    subscriptions: Vec<(String, watch::Receiver<SubscriptionState>)>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Subsystem {
    /// Connect to the configured nodes, start streaming and bind the
    /// query surface.
    ///
    /// Fails with [`PoolError::NoNodesAvailable`](chainwatch_core::PoolError::NoNodesAvailable)
    /// when no endpoint could be dialed. Nothing is left running on error.
    pub async fn start(
        config: SubsystemConfig,
        interface: Interface,
        dialer: Arc<dyn Dialer>,
    ) -> Result<Self, StartError> {
        config.validate()?;
        let capacity = config.store_capacity()?;

        let pool = Arc::new(NodePool::connect(dialer.as_ref(), &config.endpoints).await?);

        let listener = match TcpListener::bind(config.listen).await {
            Ok(listener) => listener,
            Err(source) => {
                pool.close().await;
                return Err(StartError::Bind { addr: config.listen, source });
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(source) => {
                pool.close().await;
                return Err(StartError::Bind { addr: config.listen, source });
            }
        };

        let interface = Arc::new(interface);
        let filter = LogFilter::new()
            .with_addresses(config.contracts.iter().copied())
            .with_event_signatures(interface.event_signatures());
        let store = Arc::new(EventStore::new(capacity));
        let pipeline = Pipeline::new(LogDecoder::new(interface), store);
        let shutdown = Shutdown::new();

        let mut kinds = vec![SubscriptionKind::Logs(filter)];
        if config.headers {
            kinds.push(SubscriptionKind::Headers);
        }

        let mut subscriptions = Vec::new();
        let mut tasks = Vec::new();
        for kind in kinds {
            let name = kind.name();
            let mut sub = ReconnectingSubscription::new(
                kind,
                Arc::clone(&pool),
                Arc::clone(&dialer),
                Backoff::new(config.backoff.clone()),
            );
            subscriptions.push((name.to_string(), sub.state()));
            let consumer = pipeline.clone();
            let shutdown = shutdown.clone();
            tasks.push((
                name,
                tokio::spawn(async move { sub.run(&consumer, shutdown).await }),
            ));
        }

        let state = ApiState {
            pipeline: pipeline.clone(),
            pool: Arc::clone(&pool),
            subscriptions: subscriptions.clone(),
        };
        let server_shutdown = shutdown.clone();
        tasks.push((
            "query-surface",
            tokio::spawn(async move {
                if let Err(e) = api::serve(listener, state, server_shutdown).await {
                    tracing::error!(error = %e, "query surface failed");
                }
            }),
        ));

        tracing::info!(
            nodes = pool.len(),
            live = pool.live_count(),
            %local_addr,
            capacity = capacity.get(),
            "chainwatch started"
        );

        Ok(Self {
            shutdown,
            pool,
            pipeline,
            local_addr,
            subscriptions,
            tasks,
        })
    }

    /// Address the query surface is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn store(&self) -> &Arc<EventStore> {
        self.pipeline.store()
    }

    pub fn pool(&self) -> &Arc<NodePool> {
        &self.pool
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    /// Current state of every subscription, keyed by subscription name.
    pub fn subscription_states(&self) -> Vec<(String, SubscriptionState)> {
        self.subscriptions
            .iter()
            .map(|(name, rx)| (name.clone(), rx.borrow().clone()))
            .collect()
    }

    /// A handle that stops the subsystem when triggered. [`shutdown`](Self::shutdown)
    /// still has to be called to wait for the tasks and release connections.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Stop streaming, stop the query surface and close every connection.
    ///
    /// Tasks still running after `grace` are aborted.
    pub async fn shutdown(self, grace: Duration) {
        tracing::info!("chainwatch shutting down");
        self.shutdown.trigger();

        let deadline = tokio::time::Instant::now() + grace;
        for (name, mut task) in self.tasks {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => tracing::debug!(task = name, "task stopped"),
                Ok(Err(e)) => tracing::warn!(task = name, error = %e, "task ended abnormally"),
                Err(_) => {
                    tracing::warn!(task = name, "task did not stop within grace period; aborting");
                    task.abort();
                }
            }
        }

        self.pool.close().await;
        tracing::info!("chainwatch stopped");
    }
}

impl std::fmt::Debug for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subsystem")
            .field("local_addr", &self.local_addr)
            .field("pool", &self.pool)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}
