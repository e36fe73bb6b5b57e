//! For setting up logging.

use super::config::LoggingConfig;
use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace, Resource};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_error::ErrorLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Flushes logs upon being dropped.
#[derive(Debug)]
pub struct LogGuard {
    _guards: Vec<WorkerGuard>,
    tracer_provider: Option<trace::TracerProvider>,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            for result in provider.force_flush() {
                if let Err(e) = result {
                    eprintln!("Failed to flush traces: {e}");
                }
            }
        }
    }
}

/// Initializes logging.
///
/// `RUST_LOG` takes precedence over the configured filter.
pub fn init_logging(config: &LoggingConfig) -> color_eyre::Result<LogGuard> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.filter.clone());
    let mut guards = Vec::new();

    let (non_blocking_stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(stdout_guard);
    let stdout = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_stdout)
        .with_filter(EnvFilter::new(&log_level));

    let file = match &config.directory {
        Some(directory) => {
            let file_appender = tracing_appender::rolling::hourly(directory, "log.");
            let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
            guards.push(file_guard);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking_file)
                .json()
                .with_filter(EnvFilter::new(&log_level));
            Some(layer)
        }
        None => None,
    };

    let (opentelemetry, tracer_provider) = match &config.otlp_endpoint {
        Some(endpoint) => {
            let provider = init_tracer_provider(endpoint)?;
            let tracer = provider.tracer(env!("CARGO_PKG_NAME"));
            let layer = tracing_opentelemetry::layer()
                .with_tracer(tracer)
                .with_filter(EnvFilter::new(&log_level));
            (Some(layer), Some(provider))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout)
        .with(file)
        .with(opentelemetry)
        .with(ErrorLayer::default())
        .try_init()?;

    Ok(LogGuard {
        _guards: guards,
        tracer_provider,
    })
}

/// Exports spans to an OTLP collector over gRPC.
fn init_tracer_provider(endpoint: &str) -> color_eyre::Result<trace::TracerProvider> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()?;
    let resource = Resource::new(vec![KeyValue::new(
        "service.name",
        env!("CARGO_PKG_NAME"),
    )]);
    let provider = trace::TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_config(trace::config().with_resource(resource))
        .build();
    Ok(provider)
}
