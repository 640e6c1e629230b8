//! WebSocket JSON-RPC client with request multiplexing and subscription routing.
//!
//! One background task owns the socket. The client does not reconnect:
//! when the socket breaks, pending requests fail, every subscription stream
//! yields one terminal error and ends, and later requests fail with
//! `Closed`. Reconnecting is the caller's job.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use chainwatch_core::eth::next_request_id;
use chainwatch_core::request::{IncomingMessage, JsonRpcRequest, JsonRpcResponse};
use chainwatch_core::transport::{Dialer, HealthStatus, Notifications, RpcTransport};
use chainwatch_core::TransportError;

use crate::subscriptions::{SubscriptionId, SubscriptionManager};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Responder = oneshot::Sender<Result<JsonRpcResponse, TransportError>>;

#[derive(Clone, Default)]
struct PendingMap(Arc<Mutex<HashMap<u64, Responder>>>);

impl PendingMap {
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Responder>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail_all(&self, reason: &str) {
        for (_, tx) in self.lock().drain() {
            let _ = tx.send(Err(TransportError::Closed(reason.to_string())));
        }
    }
}

/// Configuration for the WebSocket client.
#[derive(Debug, Clone)]
pub struct WsClientConfig {
    /// Maximum time to wait for the opening handshake.
    pub connect_timeout: Duration,
    /// Maximum time to wait for a response to one request.
    pub request_timeout: Duration,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Command sent from callers to the background WS task.
enum WsCommand {
    Send { req: JsonRpcRequest, tx: Responder },
    Close { done: oneshot::Sender<()> },
}

/// WebSocket JSON-RPC client over one socket.
pub struct WsRpcClient {
    url: String,
    config: WsClientConfig,
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    pending: PendingMap,
    subscriptions: SubscriptionManager,
    open: Arc<AtomicBool>,
}

impl WsRpcClient {
    /// Perform the handshake with `url` and start the background task.
    pub async fn connect(url: impl Into<String>, config: WsClientConfig) -> Result<Self, TransportError> {
        let url = url.into();
        tracing::debug!(url = %url, "connecting via WebSocket");

        let handshake = tokio_tungstenite::connect_async(url.as_str());
        let (socket, _) = tokio::time::timeout(config.connect_timeout, handshake)
            .await
            .map_err(|_| TransportError::Timeout {
                ms: config.connect_timeout.as_millis() as u64,
            })?
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<WsCommand>();
        let pending = PendingMap::default();
        let subscriptions = SubscriptionManager::new();
        let open = Arc::new(AtomicBool::new(true));

        tokio::spawn(ws_task(
            url.clone(),
            socket,
            cmd_rx,
            pending.clone(),
            subscriptions.clone(),
            Arc::clone(&open),
        ));

        Ok(Self {
            url,
            config,
            cmd_tx,
            pending,
            subscriptions,
            open,
        })
    }
}

impl Drop for WsRpcClient {
    fn drop(&mut self) {
        let (done, _) = oneshot::channel();
        let _ = self.cmd_tx.send(WsCommand::Close { done });
    }
}

#[async_trait]
impl RpcTransport for WsRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let id = req.id.as_u64();
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Send { req, tx })
            .map_err(|_| TransportError::Closed(format!("{} is closed", self.url)))?;
        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, rx).await {
            Ok(response) => response.map_err(|_| TransportError::Closed("WS response dropped".into()))?,
            Err(_) => {
                if let Some(id) = id {
                    self.pending.lock().remove(&id);
                }
                Err(TransportError::Timeout {
                    ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// `eth_subscribe(kind, ...params)`; the returned stream ends after the
    /// terminal error that follows a socket break.
    async fn subscribe(&self, kind: &str, params: Vec<Value>) -> Result<Notifications, TransportError> {
        let params = std::iter::once(Value::String(kind.to_string())).chain(params).collect();
        let req = JsonRpcRequest::new(next_request_id(), "eth_subscribe", params);
        let result = self.send(req).await?.into_result().map_err(TransportError::Rpc)?;
        let id: String = serde_json::from_value(result)?;
        tracing::debug!(url = %self.url, kind, subscription = %id, "subscribed");

        let rx = self.subscriptions.register(SubscriptionId(id));
        Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }

    async fn close(&self) {
        let (done, finished) = oneshot::channel();
        if self.cmd_tx.send(WsCommand::Close { done }).is_ok() {
            let _ = finished.await;
        }
    }

    fn health(&self) -> HealthStatus {
        if self.open.load(Ordering::SeqCst) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Background task that owns the WebSocket connection until it breaks or is closed.
async fn ws_task(
    url: String,
    socket: Socket,
    mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
    pending: PendingMap,
    subscriptions: SubscriptionManager,
    open: Arc<AtomicBool>,
) {
    let (mut sink, mut stream) = socket.split();

    let (reason, done) = dispatch_loop(&mut sink, &mut stream, &mut cmd_rx, &pending, &subscriptions).await;

    open.store(false, Ordering::SeqCst);
    if done.is_some() {
        tracing::debug!(url = %url, "WS connection closed");
        let _ = sink.send(Message::Close(None)).await;
    } else {
        tracing::warn!(url = %url, reason = %reason, "WS connection lost");
    }
    cmd_rx.close();
    pending.fail_all(&reason);
    subscriptions.fail_all(&reason);
    // requests queued after the break
    while let Ok(cmd) = cmd_rx.try_recv() {
        match cmd {
            WsCommand::Send { tx, .. } => {
                let _ = tx.send(Err(TransportError::Closed(reason.clone())));
            }
            WsCommand::Close { done } => {
                let _ = done.send(());
            }
        }
    }
    if let Some(done) = done {
        let _ = done.send(());
    }
}

/// Returns why the loop ended, plus the close acknowledgement if the
/// caller asked for it.
async fn dispatch_loop(
    sink: &mut SplitSink<Socket, Message>,
    stream: &mut SplitStream<Socket>,
    cmd_rx: &mut mpsc::UnboundedReceiver<WsCommand>,
    pending: &PendingMap,
    subscriptions: &SubscriptionManager,
) -> (String, Option<oneshot::Sender<()>>) {
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                None => return ("client dropped".into(), None),
                Some(WsCommand::Close { done }) => return ("closed locally".into(), Some(done)),
                Some(WsCommand::Send { req, tx }) => {
                    let Some(id) = req.id.as_u64() else {
                        let _ = tx.send(Err(TransportError::Other("WS requests need a numeric id".into())));
                        continue;
                    };
                    let text = match serde_json::to_string(&req) {
                        Ok(text) => text,
                        Err(e) => {
                            let _ = tx.send(Err(e.into()));
                            continue;
                        }
                    };
                    // the caller already timed out
                    if tx.is_closed() {
                        continue;
                    }
                    pending.lock().insert(id, tx);
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        return (format!("send failed: {e}"), None);
                    }
                }
            },
            msg = stream.next() => match msg {
                None => return ("stream ended".into(), None),
                Some(Err(e)) => return (format!("receive failed: {e}"), None),
                Some(Ok(Message::Text(text))) => handle_message(text.as_str(), pending, subscriptions),
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                    return (format!("closed by peer {reason}").trim_end().to_string(), None);
                }
                Some(Ok(_)) => {}
            },
        }
    }
}

fn handle_message(text: &str, pending: &PendingMap, subscriptions: &SubscriptionManager) {
    match IncomingMessage::parse(text) {
        Some(IncomingMessage::Notification(n)) => {
            subscriptions.dispatch(SubscriptionId(n.params.subscription), n.params.result);
        }
        Some(IncomingMessage::Response(resp)) => {
            let Some(id) = resp.id.as_u64() else {
                return;
            };
            if let Some(tx) = pending.lock().remove(&id) {
                let _ = tx.send(Ok(resp));
            }
        }
        None => tracing::debug!("ignoring unrecognised WS frame"),
    }
}

/// Dials `ws://` / `wss://` endpoints into [`WsRpcClient`]s.
#[derive(Debug, Clone, Default)]
pub struct WsDialer {
    pub config: WsClientConfig,
}

impl WsDialer {
    pub fn new(config: WsClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Dialer for WsDialer {
    async fn dial(&self, endpoint: &str) -> Result<Arc<dyn RpcTransport>, TransportError> {
        let client = WsRpcClient::connect(endpoint, self.config.clone()).await?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainwatch_core::RpcId;

    #[test]
    fn response_resolves_pending_request() {
        let pending = PendingMap::default();
        let subs = SubscriptionManager::new();
        let (tx, mut rx) = oneshot::channel();
        pending.lock().insert(5, tx);

        handle_message(r#"{"jsonrpc":"2.0","id":5,"result":"0x10"}"#, &pending, &subs);

        let resp = rx.try_recv().unwrap().unwrap();
        assert_eq!(resp.id, RpcId::Number(5));
        assert!(pending.lock().is_empty());
    }

    #[test]
    fn notification_reaches_subscriber() {
        let pending = PendingMap::default();
        let subs = SubscriptionManager::new();
        let mut rx = subs.register(SubscriptionId("0xcd0c".into()));

        handle_message(
            r#"{"jsonrpc":"2.0","method":"eth_subscription","params":{"subscription":"0xcd0c","result":{"number":"0x1b4"}}}"#,
            &pending,
            &subs,
        );

        let value = rx.try_recv().unwrap().unwrap();
        assert_eq!(value["number"], "0x1b4");
    }

    #[test]
    fn fail_all_rejects_outstanding_requests() {
        let pending = PendingMap::default();
        let (tx, mut rx) = oneshot::channel();
        pending.lock().insert(1, tx);
        pending.fail_all("stream ended");
        assert!(matches!(rx.try_recv().unwrap(), Err(TransportError::Closed(_))));
    }

    #[tokio::test]
    async fn timed_out_request_leaves_nothing_pending() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // accepts and reads, never answers
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let config = WsClientConfig {
            request_timeout: Duration::from_millis(50),
            ..WsClientConfig::default()
        };
        let client = WsRpcClient::connect(format!("ws://{addr}"), config).await.unwrap();
        for _ in 0..3 {
            let req = JsonRpcRequest::new(next_request_id(), "eth_blockNumber", vec![]);
            let err = client.send(req).await.unwrap_err();
            assert!(matches!(err, TransportError::Timeout { ms: 50 }), "{err}");
        }
        assert!(client.pending.lock().is_empty());
        assert_eq!(client.health(), HealthStatus::Healthy);

        client.close().await;
        server.abort();
    }

    #[tokio::test]
    async fn dial_refused_is_websocket_error() {
        let dialer = WsDialer::default();
        let err = dialer.dial("ws://127.0.0.1:1").await.err().unwrap();
        assert!(err.is_transport_failure(), "{err}");
    }
}
