use actix_web::{web, App, HttpServer};
use std::sync::Arc;

use order_service::api::{self, AppState};
use order_service::config::{Settings, StoreBackend};
use order_service::domain::order::OrderEngine;
use order_service::messaging::{DisabledSink, EventPublisher, EventSink, KafkaSink};
use order_service::metrics::Metrics;
use order_service::store::{InMemoryOrderStore, OrderStore, PgOrderStore};
use order_service::telemetry;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;

    // Default to INFO level, can be overridden with RUST_LOG env var
    telemetry::init_tracing(settings.logging.format, "info,order_service=debug");

    tracing::info!("🚀 Starting order service");

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!(
        "📊 Metrics registry created with {} metrics",
        metrics.registry().gather().len()
    );

    // === 2. Order store ===
    let store: Arc<dyn OrderStore> = match settings.database.backend {
        StoreBackend::Postgres => {
            tracing::info!("Connecting to Postgres...");
            Arc::new(PgOrderStore::connect(&settings.database).await?)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory order store, data is lost on restart");
            Arc::new(InMemoryOrderStore::new())
        }
    };

    // === 3. Event bus (one producer, two topics) ===
    let sink: Arc<dyn EventSink> = if settings.kafka.enabled {
        Arc::new(KafkaSink::new(&settings.kafka)?)
    } else {
        tracing::warn!("Kafka disabled, order events will be dropped");
        Arc::new(DisabledSink)
    };

    let engine_bus = EventPublisher::new(sink.clone(), &settings.kafka.order_events_topic)
        .with_metrics(metrics.clone());
    let order_bus =
        EventPublisher::new(sink, &settings.kafka.orders_topic).with_metrics(metrics.clone());

    // === 4. Engine ===
    let engine = OrderEngine::new(store, engine_bus, metrics.clone())
        .with_write_mode(settings.engine.write_mode);
    tracing::info!(write_mode = ?engine.write_mode(), "Order engine ready");

    let state = AppState {
        engine: Arc::new(engine),
        order_bus,
        metrics,
    };

    // === 5. HTTP server ===
    let (host, port) = settings.server_addr();
    tracing::info!("🌐 Listening on http://{}:{}", host, port);

    let server_state = state.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(server_state.clone()))
            .configure(api::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    // === 6. Drain events still in flight ===
    state.engine.flush_events().await;
    state.order_bus.flush().await;

    tracing::info!("👋 Order service stopped");
    Ok(())
}
