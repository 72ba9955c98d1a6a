use serde::Deserialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies.
/// Example: RUST_LOG=debug cargo run
pub fn init_tracing(format: LogFormat, default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (pretty, json) = match format {
        LogFormat::Pretty => (Some(fmt::layer().with_target(true).with_thread_ids(true)), None),
        LogFormat::Json => (
            None,
            Some(fmt::layer().json().with_target(true).with_thread_ids(true)),
        ),
    };

    tracing_subscriber::registry()
        .with(pretty)
        .with(json)
        .with(filter)
        .init();
}
