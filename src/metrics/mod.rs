mod server;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::utils::CircuitState;

pub use server::{health_handler, metrics_handler};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// - Engine operations (count by outcome, latency)
// - Event publishing (delivered vs dropped, per topic)
// - Event bus circuit breaker state
//
// Scraped via GET /metrics on the main HTTP server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub order_operations: IntCounterVec,
    pub order_operation_duration: HistogramVec,

    pub events_published: IntCounterVec,

    pub circuit_breaker_state: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let order_operations = IntCounterVec::new(
            Opts::new("order_operations_total", "Order engine operations by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(order_operations.clone()))?;

        let order_operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "order_operation_duration_seconds",
                "Order engine operation duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(order_operation_duration.clone()))?;

        let events_published = IntCounterVec::new(
            Opts::new("events_published_total", "Event publish attempts by outcome"),
            &["topic", "outcome"],
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "circuit_breaker_state",
            "Event bus circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            order_operations,
            order_operation_duration,
            events_published,
            circuit_breaker_state,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_operation(&self, operation: &str, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.order_operations
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn record_publish(&self, topic: &str, delivered: bool) {
        let outcome = if delivered { "delivered" } else { "dropped" };
        self.events_published
            .with_label_values(&[topic, outcome])
            .inc();
    }

    pub fn record_circuit_state(&self, state: CircuitState) {
        self.circuit_breaker_state.set(state.as_gauge());
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_counters_by_outcome() {
        let metrics = Metrics::new().unwrap();
        metrics.record_operation("create", true);
        metrics.record_operation("create", true);
        metrics.record_operation("create", false);

        let ok = metrics.order_operations.with_label_values(&["create", "ok"]).get();
        let err = metrics.order_operations.with_label_values(&["create", "error"]).get();
        assert_eq!(ok, 2);
        assert_eq!(err, 1);
    }

    #[test]
    fn test_render_contains_registered_families() {
        let metrics = Metrics::new().unwrap();
        metrics.record_publish("order-events", false);
        metrics.record_circuit_state(CircuitState::Open);

        let text = String::from_utf8(metrics.render().unwrap()).unwrap();
        assert!(text.contains("events_published_total"));
        assert!(text.contains("circuit_breaker_state 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_operation("delete", true);

        assert_eq!(b.order_operations.with_label_values(&["delete", "ok"]).get(), 0);
    }
}
