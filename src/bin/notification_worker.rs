use std::sync::Arc;
use tokio::sync::watch;

use order_service::config::Settings;
use order_service::messaging::{LoggingNotifier, NotificationConsumer};
use order_service::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    telemetry::init_tracing(settings.logging.format, "info,order_service=debug");

    tracing::info!("🚀 Starting notification worker");

    let consumer = NotificationConsumer::new(&settings.kafka)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl-C received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
        let _ = shutdown_tx.send(true);
    });

    consumer.run(Arc::new(LoggingNotifier), shutdown_rx).await?;

    tracing::info!("👋 Notification worker stopped");
    Ok(())
}
