//! WebSocket subscription routing.
//!
//! Maps `eth_subscribe` ids to the channel of the caller that opened them.
//! Notifications that arrive before the caller has registered are parked
//! and handed over on registration.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chainwatch_core::TransportError;
use serde_json::Value;
use tokio::sync::mpsc;

/// Upper bound on notifications parked for one not-yet-registered id.
const MAX_PARKED: usize = 256;

/// A unique subscription ID returned by `eth_subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type NotificationSender = mpsc::UnboundedSender<Result<Value, TransportError>>;
pub type NotificationReceiver = mpsc::UnboundedReceiver<Result<Value, TransportError>>;

#[derive(Default)]
struct Routes {
    senders: HashMap<SubscriptionId, NotificationSender>,
    parked: HashMap<SubscriptionId, Vec<Value>>,
    closed: Option<String>,
}

/// Routes notifications of one connection to their subscribers.
#[derive(Clone, Default)]
pub struct SubscriptionManager {
    routes: Arc<Mutex<Routes>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Routes> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a subscription and receive its notifications.
    ///
    /// If the connection already broke, the receiver yields the terminal
    /// error straight away.
    pub fn register(&self, id: SubscriptionId) -> NotificationReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut guard = self.lock();
        let routes = &mut *guard;
        for value in routes.parked.remove(&id).unwrap_or_default() {
            let _ = tx.send(Ok(value));
        }
        match &routes.closed {
            Some(reason) => {
                let _ = tx.send(Err(TransportError::Closed(reason.clone())));
            }
            None => {
                routes.senders.insert(id, tx);
            }
        }
        rx
    }

    /// Forward an incoming notification to its subscriber.
    pub fn dispatch(&self, id: SubscriptionId, message: Value) {
        let mut guard = self.lock();
        let routes = &mut *guard;
        match routes.senders.get(&id) {
            Some(sender) => {
                if sender.send(Ok(message)).is_err() {
                    // subscriber dropped its stream
                    routes.senders.remove(&id);
                }
            }
            None => {
                let parked = routes.parked.entry(id).or_default();
                if parked.len() < MAX_PARKED {
                    parked.push(message);
                }
            }
        }
    }

    /// Deliver a terminal error to every subscriber and refuse new ones.
    pub fn fail_all(&self, reason: &str) {
        let mut routes = self.lock();
        routes.closed = Some(reason.to_string());
        routes.parked.clear();
        for (_, sender) in routes.senders.drain() {
            let _ = sender.send(Err(TransportError::Closed(reason.to_string())));
        }
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.lock().senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
