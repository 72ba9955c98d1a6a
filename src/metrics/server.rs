use actix_web::{http::StatusCode, web, HttpResponse};
use serde_json::json;

use crate::api::AppState;

/// Prometheus scrape endpoint
pub async fn metrics_handler(state: web::Data<AppState>) -> HttpResponse {
    match state.metrics.render() {
        Ok(buffer) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buffer),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Store reachability decides the status code; the event bus is reported
/// but never fails the check, since orders still go through without it.
pub async fn health_handler(state: web::Data<AppState>) -> HttpResponse {
    let store = state.engine.check_store().await;
    let event_bus = state.order_bus.circuit_state().await;

    let (status, label) = match &store {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(e) => {
            tracing::warn!(error = %e, "Health check: store unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };

    HttpResponse::build(status).json(json!({
        "status": label,
        "service": "order-service",
        "store": if store.is_ok() { "up" } else { "down" },
        "event_bus": event_bus.map(|state| state.to_string()),
        "write_mode": state.engine.write_mode(),
    }))
}
