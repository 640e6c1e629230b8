//! Process-wide cancellation signal.

use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable shutdown signal. Triggering it is sticky: tasks that start
/// waiting after the trigger still observe it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called on any clone.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // the sender lives as long as `self`, so this only returns on trigger
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
