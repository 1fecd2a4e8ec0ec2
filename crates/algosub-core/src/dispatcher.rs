//! The named async event bus.
//!
//! Topics are runtime-named strings: `transaction:<filter>` and
//! `batch:<filter>` per named filter, plus the lifecycle topics
//! [`BEFORE_POLL`], [`POLL`], and [`ERROR`]. Emissions are best-effort
//! asynchronous — each registered handler owns a queue drained by its own
//! task, so emissions within one handler are FIFO in the order they were
//! issued while handlers run concurrently with each other and with the
//! subscriber loop.
//!
//! A failing handler never blocks the others: the failure is logged and
//! reported on the [`ERROR`] topic. Failures of handlers registered on
//! [`ERROR`] itself are only logged, so an error handler cannot observe its
//! own failures.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::error::SubscriberError;
use crate::poll::{MatchedRecord, PollResult};

/// Lifecycle topic emitted at the start of every poll cycle.
pub const BEFORE_POLL: &str = "before_poll";
/// Lifecycle topic emitted after every successful poll.
pub const POLL: &str = "poll";
/// Topic carrying poll failures and handler failures.
pub const ERROR: &str = "error";

/// The topic carrying single matched records for a named filter.
pub fn transaction_topic(filter_name: &str) -> String {
    format!("transaction:{filter_name}")
}

/// The topic carrying the per-poll batch for a named filter.
pub fn batch_topic(filter_name: &str) -> String {
    format!("batch:{filter_name}")
}

/// An error surfaced on the [`ERROR`] topic.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// An emission on the bus. Payloads are shared, so cloning is cheap.
#[derive(Debug, Clone)]
pub enum BusEvent {
    BeforePoll { watermark: u64, tip: u64 },
    Poll(Arc<PollResult>),
    Transaction {
        filter_name: String,
        record: Arc<MatchedRecord>,
    },
    Batch {
        filter_name: String,
        records: Arc<Vec<MatchedRecord>>,
    },
    Error(Arc<ErrorEvent>),
}

/// A registered listener.
#[async_trait]
pub trait BusHandler: Send + Sync {
    async fn handle(&self, event: BusEvent) -> Result<(), SubscriberError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> BusHandler for FnHandler<F>
where
    F: Fn(BusEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), SubscriberError>> + Send,
{
    async fn handle(&self, event: BusEvent) -> Result<(), SubscriberError> {
        (self.0)(event).await
    }
}

struct Inner {
    listeners: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<BusEvent>>>>,
    failure_tx: mpsc::UnboundedSender<SubscriberError>,
}

impl Inner {
    fn send_to_topic(&self, topic: &str, event: &BusEvent) {
        let senders = {
            let listeners = self.listeners.lock().unwrap();
            listeners.get(topic).cloned()
        };
        if let Some(senders) = senders {
            for tx in senders {
                // A closed queue just means the handler task is gone.
                let _ = tx.send(event.clone());
            }
        }
    }
}

/// Thread-safe router from topics to registered handlers.
///
/// Must be created inside a tokio runtime — registration and failure
/// reporting spawn background tasks.
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (failure_tx, mut failure_rx) = mpsc::unbounded_channel::<SubscriberError>();
        let inner = Arc::new(Inner {
            listeners: Mutex::new(HashMap::new()),
            failure_tx,
        });

        // Failure pump: report handler failures on the error topic, except
        // failures of error handlers themselves, which would feed back.
        let pump = Arc::clone(&inner);
        tokio::spawn(async move {
            while let Some(failure) = failure_rx.recv().await {
                let SubscriberError::Handler { topic, reason } = &failure else {
                    continue;
                };
                tracing::error!(topic = %topic, reason = %reason, "handler failed");
                if topic.as_str() != ERROR {
                    let event =
                        BusEvent::Error(Arc::new(ErrorEvent::new(failure.to_string())));
                    pump.send_to_topic(ERROR, &event);
                }
            }
        });

        Self { inner }
    }

    /// Register a handler for a topic. Handlers for the same topic receive
    /// every emission in registration order; each handler processes its own
    /// queue in FIFO order on a dedicated task.
    pub fn on(&self, topic: impl Into<String>, handler: Arc<dyn BusHandler>) {
        let topic = topic.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<BusEvent>();
        self.inner
            .listeners
            .lock()
            .unwrap()
            .entry(topic.clone())
            .or_default()
            .push(tx);

        let failure_tx = self.inner.failure_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = handler.handle(event).await {
                    let _ = failure_tx.send(SubscriberError::Handler {
                        topic: topic.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        });
    }

    /// Register a closure handler.
    pub fn on_fn<F, Fut>(&self, topic: impl Into<String>, f: F)
    where
        F: Fn(BusEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SubscriberError>> + Send + 'static,
    {
        self.on(topic, Arc::new(FnHandler(f)));
    }

    /// Emit an event to every handler registered for `topic`. Returns
    /// immediately; handlers run on their own tasks.
    pub fn emit(&self, topic: &str, event: BusEvent) {
        self.inner.send_to_topic(topic, &event);
    }

    /// Convenience: emit an [`ErrorEvent`] on the [`ERROR`] topic.
    pub fn emit_error(&self, message: impl Into<String>) {
        self.emit(ERROR, BusEvent::Error(Arc::new(ErrorEvent::new(message))));
    }

    /// Number of handlers currently registered for a topic.
    pub fn listener_count(&self, topic: &str) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap()
            .get(topic)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
