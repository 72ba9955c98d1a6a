use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};
use std::time::Duration;

use super::publisher::{EventSink, PublishError};
use crate::config::KafkaConfig;
use crate::utils::{CircuitBreaker, CircuitBreakerError, CircuitState};

/// Kafka-backed event sink guarded by a circuit breaker.
///
/// Payloads go out without a key, as plain UTF-8 text.
pub struct KafkaSink {
    producer: FutureProducer,
    circuit_breaker: CircuitBreaker,
    send_timeout: Duration,
}

impl KafkaSink {
    pub fn new(config: &KafkaConfig) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", config.send_timeout_ms.to_string())
            .create()
            .map_err(|e| anyhow::anyhow!("Failed to create Kafka producer: {}", e))?;

        tracing::info!(brokers = %config.brokers, "Kafka producer initialised");

        Ok(Self {
            producer,
            circuit_breaker: CircuitBreaker::new(config.circuit_breaker()),
            send_timeout: config.send_timeout(),
        })
    }
}

#[async_trait]
impl EventSink for KafkaSink {
    async fn send(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::<(), str>::to(topic).payload(payload);

                self.producer
                    .send(record, Timeout::After(self.send_timeout))
                    .await
                    .map(|_| ())
                    .map_err(|(e, _)| e)
            })
            .await;

        match result {
            Ok(()) => {
                tracing::debug!(topic = %topic, "Delivered to Kafka");
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::error!(topic = %topic, "Circuit breaker open - Kafka unavailable");
                Err(PublishError::CircuitOpen)
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(error = %e, topic = %topic, "Failed to deliver to Kafka");
                Err(PublishError::Delivery {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn circuit_state(&self) -> Option<CircuitState> {
        Some(self.circuit_breaker.state().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_starts_with_closed_circuit() {
        // Producer creation does not contact the broker
        let sink = KafkaSink::new(&KafkaConfig::default()).unwrap();
        assert_eq!(sink.circuit_state().await, Some(CircuitState::Closed));
    }

    // Needs a reachable broker on localhost:9092
    #[tokio::test]
    #[ignore]
    async fn test_delivers_to_local_broker() {
        let sink = KafkaSink::new(&KafkaConfig::default()).unwrap();
        sink.send("order-events", "Order Placed: 1 for Customer: 1")
            .await
            .unwrap();
    }
}
