// ============================================================================
// HTTP Boundary
// ============================================================================
//
// Maps verbs to engine operations and decides what absence means (404).
// On create it also emits the boundary-level "New Order Created" event,
// independently of the engine's own event.
//
// ============================================================================

mod error;
mod handlers;

use actix_web::web;
use std::sync::Arc;

use crate::domain::order::OrderEngine;
use crate::messaging::EventPublisher;
use crate::metrics::{self, Metrics};

pub use error::ApiError;
pub use handlers::OrderRequest;

/// Shared per-worker state; cloning is cheap
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<OrderEngine>,
    /// Boundary bus publisher
    pub order_bus: EventPublisher,
    pub metrics: Arc<Metrics>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .service(
        web::resource("/orders")
            .route(web::post().to(handlers::create_order))
            .route(web::get().to(handlers::list_orders)),
    )
    .service(
        web::resource("/orders/history/{customer_id}")
            .route(web::get().to(handlers::order_history)),
    )
    .service(
        web::resource("/orders/{order_id}")
            .route(web::get().to(handlers::get_order))
            .route(web::put().to(handlers::update_order))
            .route(web::delete().to(handlers::delete_order)),
    )
    .route("/health", web::get().to(metrics::health_handler))
    .route("/metrics", web::get().to(metrics::metrics_handler));
}
