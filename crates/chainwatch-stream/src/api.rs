//! HTTP query surface.
//!
//! - `GET /events`: buffered decoded events, oldest first
//! - `GET /health`: store, pipeline and node summary
//! - `GET /nodes`: per-node liveness and connection health
//!
//! Handlers only read local state, so they keep answering while every
//! node is down.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chainwatch_abi::DecodedEvent;
use chainwatch_core::{NodePool, NodeStatus};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::pipeline::{Pipeline, PipelineStats};
use crate::shutdown::Shutdown;
use crate::subscription::SubscriptionState;

/// Shared state behind every route.
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Pipeline,
    pub pool: Arc<NodePool>,
    pub subscriptions: Vec<(String, watch::Receiver<SubscriptionState>)>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub buffered: usize,
    pub capacity: usize,
    pub latest_block: u64,
    pub live_nodes: usize,
    pub total_nodes: usize,
    pub pipeline: PipelineStats,
    pub subscriptions: Vec<SubscriptionReport>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionReport {
    pub kind: String,
    #[serde(flatten)]
    pub state: SubscriptionState,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/events", get(events))
        .route("/health", get(health))
        .route("/nodes", get(nodes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn events(State(state): State<ApiState>) -> Json<Vec<DecodedEvent>> {
    Json(state.pipeline.store().snapshot())
}

async fn health(State(state): State<ApiState>) -> Json<HealthReport> {
    let store = state.pipeline.store();
    let statuses = state.pool.statuses();
    let live_nodes = statuses.iter().filter(|s| s.alive).count();
    let subscriptions: Vec<SubscriptionReport> = state
        .subscriptions
        .iter()
        .map(|(kind, rx)| SubscriptionReport {
            kind: kind.clone(),
            state: rx.borrow().clone(),
        })
        .collect();
    let streaming = subscriptions
        .iter()
        .all(|s| matches!(s.state, SubscriptionState::Streaming { .. }));

    Json(HealthReport {
        status: if streaming && live_nodes > 0 { "ok" } else { "degraded" },
        buffered: store.len(),
        capacity: store.capacity(),
        latest_block: store.latest_block(),
        live_nodes,
        total_nodes: statuses.len(),
        pipeline: state.pipeline.stats(),
        subscriptions,
    })
}

async fn nodes(State(state): State<ApiState>) -> Json<Vec<NodeStatus>> {
    Json(state.pool.statuses())
}

/// Serve until `shutdown` fires, then finish in-flight requests.
pub async fn serve(listener: TcpListener, state: ApiState, shutdown: Shutdown) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "query surface listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;
    tracing::info!(%addr, "query surface stopped");
    Ok(())
}
