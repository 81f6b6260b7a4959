//! In-process message bus between workers.
//!
//! Publishing is non-blocking: messages land on an unbounded channel and
//! the router task drains it. Delivery is FIFO regardless of priority;
//! URGENT/CRITICAL messages additionally produce an escalation log entry
//! whether or not a subscriber exists. At most one subscriber per
//! recipient name, last registration wins.

use anyhow::Result;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use crate::types::{Message, MessageKind};

/// Queue depth above which the router logs a backlog warning.
const QUEUE_WARN_THRESHOLD: usize = 100;
/// Maximum messages retained in history before the oldest are dropped.
const HISTORY_CAP: usize = 1000;
/// Bounded wait per poll so the router stays responsive to shutdown.
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Async message handler registered by a worker.
pub type Handler =
    Arc<dyn Fn(Message) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

pub struct MessageBus {
    tx: mpsc::UnboundedSender<Message>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
    subscribers: Mutex<HashMap<String, Handler>>,
    history: Mutex<Vec<Message>>,
    pending: AtomicUsize,
    escalations: AtomicUsize,
}

impl MessageBus {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            subscribers: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
            pending: AtomicUsize::new(0),
            escalations: AtomicUsize::new(0),
        }
    }

    /// Enqueue a message and return immediately. The message is recorded
    /// in history whether or not anyone ever consumes it.
    pub fn publish(&self, message: Message) -> Result<()> {
        {
            let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
            history.push(message.clone());
            if history.len() > HISTORY_CAP {
                let excess = history.len() - HISTORY_CAP;
                history.drain(..excess);
            }
        }

        let depth = self.pending.fetch_add(1, Ordering::Relaxed) + 1;
        if depth > QUEUE_WARN_THRESHOLD {
            warn!(depth, "Message queue backlog growing");
        }

        self.tx
            .send(message)
            .map_err(|_| anyhow::anyhow!("Message bus channel closed"))
    }

    /// Register a handler for a recipient name. Re-registering the same
    /// name replaces the previous handler.
    pub fn subscribe(&self, recipient: &str, handler: Handler) {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        if subs.insert(recipient.to_string(), handler).is_some() {
            debug!(recipient, "Subscriber replaced");
        }
    }

    /// Drain the queue until `stop` flips to true. Polls with a bounded
    /// wait; an empty queue is never a reason to exit. Handler errors are
    /// caught and logged so one bad subscriber cannot kill routing.
    pub async fn run_router(&self, mut stop: watch::Receiver<bool>) {
        let rx = self.rx.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(mut rx) = rx else {
            warn!("Router already running, refusing second instance");
            return;
        };

        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        debug!("Message router stopping");
                        return;
                    }
                }
                polled = tokio::time::timeout(POLL_TIMEOUT, rx.recv()) => {
                    match polled {
                        Err(_) => continue, // empty poll window
                        Ok(None) => {
                            debug!("Message channel closed, router exiting");
                            return;
                        }
                        Ok(Some(message)) => {
                            self.pending.fetch_sub(1, Ordering::Relaxed);
                            self.dispatch(message).await;
                        }
                    }
                }
            }
        }
    }

    async fn dispatch(&self, message: Message) {
        if message.priority.escalates() {
            self.escalations.fetch_add(1, Ordering::Relaxed);
            warn!(
                priority = %message.priority,
                sender = %message.sender,
                recipient = %message.recipient,
                kind = %message.kind,
                "Escalated message"
            );
        }

        let handler = {
            let subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            subs.get(&message.recipient).cloned()
        };

        match handler {
            Some(handler) => {
                let label = format!("{message}");
                if let Err(e) = handler(message).await {
                    error!(message = %label, error = %e, "Subscriber handler failed");
                }
            }
            None => {
                warn!(recipient = %message.recipient, "No subscriber for recipient");
            }
        }
    }

    /// Last `n` messages in publication order.
    pub fn recent(&self, n: usize) -> Vec<Message> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let start = history.len().saturating_sub(n);
        history[start..].to_vec()
    }

    /// All recorded messages of one kind, in publication order.
    pub fn by_kind(&self, kind: MessageKind) -> Vec<Message> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.iter().filter(|m| m.kind == kind).cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of URGENT/CRITICAL messages dispatched so far.
    pub fn escalation_count(&self) -> usize {
        self.escalations.load(Ordering::Relaxed)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
