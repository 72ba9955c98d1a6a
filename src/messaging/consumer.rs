use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use rdkafka::{
    config::ClientConfig,
    consumer::{Consumer, StreamConsumer},
    error::KafkaResult,
    message::Message,
};
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::KafkaConfig;

// ============================================================================
// Notification Consumer
// ============================================================================
//
// Downstream side of the engine bus. Payloads are unstructured text and
// delivery is at-most-once, so handlers must not assume every order shows up.
//
// ============================================================================

#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, message: &str);
}

/// Writes each notification to the log. Stand-in for email/push delivery.
pub struct LoggingNotifier;

#[async_trait]
impl NotificationHandler for LoggingNotifier {
    async fn handle(&self, message: &str) {
        tracing::info!(message = %message, "Notification Receiver: {}", message);
    }
}

/// Decode a raw payload; invalid UTF-8 is replaced rather than rejected
pub fn payload_text(payload: Option<&[u8]>) -> Option<String> {
    payload.map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}

pub struct NotificationConsumer {
    consumer: StreamConsumer,
    topic: String,
}

impl NotificationConsumer {
    pub fn new(config: &KafkaConfig) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.consumer_group)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true")
            .create()
            .map_err(|e| anyhow::anyhow!("Failed to create Kafka consumer: {}", e))?;

        tracing::info!(
            brokers = %config.brokers,
            group_id = %config.consumer_group,
            "Kafka consumer initialised"
        );

        Ok(Self {
            consumer,
            topic: config.order_events_topic.clone(),
        })
    }

    /// Consume until `shutdown` flips to true
    pub async fn run(
        self,
        handler: Arc<dyn NotificationHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        self.consumer.subscribe(&[self.topic.as_str()])?;
        tracing::info!(topic = %self.topic, "📬 Notification consumer subscribed");

        pump(self.consumer.stream(), handler.as_ref(), &mut shutdown).await;
        Ok(())
    }
}

/// Hand each message payload to `handler` until the stream ends or
/// `shutdown` flips to true. Receive errors are logged and skipped.
async fn pump<S, M>(
    messages: S,
    handler: &dyn NotificationHandler,
    shutdown: &mut watch::Receiver<bool>,
) where
    S: Stream<Item = KafkaResult<M>>,
    M: Message,
{
    tokio::pin!(messages);

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("Shutdown signal received, stopping consumer");
                    break;
                }
            }

            next = messages.next() => {
                let Some(next) = next else {
                    tracing::warn!("Kafka stream ended unexpectedly");
                    break;
                };

                match next {
                    Ok(msg) => match payload_text(msg.payload()) {
                        Some(text) => handler.handle(&text).await,
                        None => tracing::debug!(
                            partition = msg.partition(),
                            offset = msg.offset(),
                            "Skipping message without payload"
                        ),
                    },
                    Err(e) => tracing::error!(error = %e, "Error receiving Kafka message"),
                }
            }
        }
    }
}
