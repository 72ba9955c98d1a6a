// ============================================================================
// Messaging - event bus producer and consumer
// ============================================================================

mod consumer;
mod kafka;
mod publisher;

pub use consumer::{payload_text, LoggingNotifier, NotificationConsumer, NotificationHandler};
pub use kafka::KafkaSink;
pub use publisher::{messages, DisabledSink, EventPublisher, EventSink, PublishError, PublishOutcome};

#[cfg(test)]
pub(crate) use publisher::testing;
