use async_trait::async_trait;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::metrics::Metrics;
use crate::models::OrderId;
use crate::utils::CircuitState;

// ============================================================================
// Event Publisher - best-effort notification emission
// ============================================================================
//
// Order persistence and event bus availability are separate failure domains.
// `EventPublisher::publish` hands the payload to a detached task and returns
// at once; the task makes exactly one attempt, then logs and counts the
// outcome. A failed attempt is never raised to the caller.
//
// ============================================================================

/// Plain-text payloads. Consumers treat them as unstructured strings.
pub mod messages {
    use super::OrderId;

    /// Engine bus payload, emitted after a successful create
    pub fn order_placed(order_id: OrderId, customer_id: i64) -> String {
        format!("Order Placed: {order_id} for Customer: {customer_id}")
    }

    /// Boundary bus payload, emitted by the HTTP layer after a create
    pub fn order_created(order_id: OrderId) -> String {
        format!("New Order Created: {order_id}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("Circuit breaker open for event bus")]
    CircuitOpen,

    #[error("Delivery to {topic} failed: {reason}")]
    Delivery { topic: String, reason: String },

    #[error("Event bus disabled by configuration")]
    Disabled,

    #[error("Event sink panicked")]
    Panicked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered,
    Dropped(PublishError),
}

impl PublishOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, PublishOutcome::Delivered)
    }
}

/// Transport under the publisher: hands one payload to one topic
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, topic: &str, payload: &str) -> Result<(), PublishError>;

    async fn circuit_state(&self) -> Option<CircuitState> {
        None
    }
}

/// Sink used when `kafka.enabled = false`
pub struct DisabledSink;

#[async_trait]
impl EventSink for DisabledSink {
    async fn send(&self, _topic: &str, _payload: &str) -> Result<(), PublishError> {
        Err(PublishError::Disabled)
    }
}

/// Count of spawned deliveries that have not finished yet
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn enter(in_flight: &Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::AcqRel);
        Self(in_flight.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct EventPublisher {
    sink: Arc<dyn EventSink>,
    topic: Arc<str>,
    metrics: Option<Arc<Metrics>>,
    in_flight: Arc<InFlight>,
}

impl EventPublisher {
    pub fn new(sink: Arc<dyn EventSink>, topic: impl Into<String>) -> Self {
        Self {
            sink,
            topic: Arc::from(topic.into()),
            metrics: None,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn circuit_state(&self) -> Option<CircuitState> {
        self.sink.circuit_state().await
    }

    /// Start one delivery attempt in the background and return immediately.
    ///
    /// Callers normally drop the handle; awaiting it yields the outcome.
    /// Must be called from within a tokio runtime.
    pub fn publish(&self, text: impl Into<String>) -> JoinHandle<PublishOutcome> {
        let guard = InFlightGuard::enter(&self.in_flight);
        let publisher = self.clone();
        let text = text.into();

        tokio::spawn(async move {
            let outcome = publisher.deliver(&text).await;
            drop(guard);
            outcome
        })
    }

    /// Wait until every delivery started by this publisher (or its clones)
    /// has finished. Used on shutdown so queued events are not cut off.
    pub async fn flush(&self) {
        loop {
            let idle = self.in_flight.idle.notified();
            if self.in_flight.count.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }

    async fn deliver(&self, text: &str) -> PublishOutcome {
        let attempt = AssertUnwindSafe(self.sink.send(&self.topic, text))
            .catch_unwind()
            .await
            .unwrap_or(Err(PublishError::Panicked));

        let outcome = match attempt {
            Ok(()) => {
                tracing::info!(topic = %self.topic, message = %text, "📨 Event published");
                PublishOutcome::Delivered
            }
            Err(e) => {
                tracing::warn!(
                    topic = %self.topic,
                    error = %e,
                    message = %text,
                    "Event bus unavailable, message not sent"
                );
                PublishOutcome::Dropped(e)
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_publish(&self.topic, outcome.is_delivered());
            if let Some(state) = self.sink.circuit_state().await {
                metrics.record_circuit_state(state);
            }
        }

        outcome
    }
}
