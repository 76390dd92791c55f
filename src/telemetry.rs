//! Logging and trace export setup

use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt, registry};

use crate::config::LoggingConfig;

const SERVICE_NAME: &str = "weatherai";

/// Flushes exported spans when dropped
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to flush traces: {e}");
        }
    }
}

fn tracer_provider(endpoint: &str) -> Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .context("Failed to build OTLP span exporter")?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(Resource::builder().with_service_name(SERVICE_NAME).build())
        .build())
}

/// Build the env filter; `RUST_LOG` wins over the configured level
pub fn env_filter(level: &str, verbose: bool) -> EnvFilter {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    filter_from(directives.as_deref(), level, verbose)
}

fn filter_from(directives: Option<&str>, level: &str, verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { level };
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_new(format!("{fallback},hyper=warn,reqwest=warn")).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install the global subscriber: pretty or JSON output plus optional OTLP export
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<TelemetryGuard> {
    let output = match config.format.as_str() {
        "json" => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        _ => fmt::layer().with_writer(std::io::stderr).boxed(),
    };

    let provider = config
        .otlp_endpoint
        .as_deref()
        .map(tracer_provider)
        .transpose()?;
    let otel = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(SERVICE_NAME)));

    registry()
        .with(output)
        .with(otel)
        .with(env_filter(&config.level, verbose))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(TelemetryGuard { provider })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_uses_level_without_override() {
        let filter = filter_from(None, "warn", false);
        assert!(filter.to_string().contains("warn"));

        let filter = filter_from(None, "warn", true);
        assert!(filter.to_string().contains("debug"));
    }

    #[test]
    fn test_filter_prefers_override() {
        let filter = filter_from(Some("weatherai=trace"), "warn", false);
        assert!(filter.to_string().contains("weatherai=trace"));

        let filter = filter_from(Some("  "), "error", false);
        assert!(filter.to_string().contains("error"));
    }
}
