//! Tracing subscriber with an optional OTLP exporter.

use anyhow::Result;
use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime::Tokio, trace::TracerProvider, Resource};
use std::{env::var, time::Duration};
use tracing::Level;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

fn otlp_endpoint() -> Option<String> {
    var(OTLP_ENDPOINT_ENV)
        .ok()
        .map(|endpoint| endpoint.trim().to_string())
        .filter(|endpoint| !endpoint.is_empty())
}

fn tracer_provider(endpoint: String) -> Result<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(3))
        .build()?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_resource(Resource::new(vec![
            KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ]))
        .build())
}

/// Install the global subscriber. `RUST_LOG` overrides `level`.
///
/// # Errors
/// Returns error if the exporter cannot be built or a subscriber is already set.
pub fn init(level: Level) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false);

    // RUST_LOG=
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let telemetry = match otlp_endpoint() {
        Some(endpoint) => {
            let provider = tracer_provider(endpoint)?;
            let tracer = provider.tracer(env!("CARGO_PKG_NAME"));
            opentelemetry::global::set_tracer_provider(provider);
            Some(OpenTelemetryLayer::new(tracer))
        }
        None => None,
    };

    let subscriber = Registry::default()
        .with(fmt_layer)
        .with(telemetry)
        .with(env_filter);

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_endpoint_disables_export() {
        temp_env::with_var(OTLP_ENDPOINT_ENV, Some("  "), || {
            assert_eq!(otlp_endpoint(), None);
        });
        temp_env::with_var(OTLP_ENDPOINT_ENV, Some("http://collector:4317"), || {
            assert_eq!(otlp_endpoint().as_deref(), Some("http://collector:4317"));
        });
    }
}
