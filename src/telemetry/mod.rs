//! Logging and OTLP export for the dispatch client.
//!
//! Log lines always go to stderr so stdout stays free for job results.
//! With an OTLP endpoint, request spans, dispatch metrics and log events
//! are exported over gRPC as well.

pub mod dispatch;
pub mod metrics;

use crate::error::{Error, Result};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Instrumentation scope and default `service.name`.
pub const SERVICE_NAME: &str = "workq-dispatch";

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// OTLP gRPC collector, e.g. `http://localhost:4317`. `None` keeps
    /// everything on stderr.
    pub endpoint: Option<String>,
    /// `service.name` resource attribute on exported signals.
    pub service_name: String,
    /// Directive used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            service_name: SERVICE_NAME.to_string(),
            default_filter: "info".to_string(),
        }
    }
}

/// The three OTLP pipelines, only built when an endpoint is set.
struct Exporters {
    traces: SdkTracerProvider,
    metrics: SdkMeterProvider,
    logs: SdkLoggerProvider,
}

impl Exporters {
    fn build(endpoint: &str, service_name: String) -> Result<Self> {
        use opentelemetry_otlp::{LogExporter, MetricExporter, SpanExporter, WithExportConfig as _};

        let resource = Resource::builder().with_service_name(service_name).build();

        let spans = SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_error("span", endpoint, e))?;
        let measurements = MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_error("metric", endpoint, e))?;
        let events = LogExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_error("log", endpoint, e))?;

        Ok(Self {
            traces: SdkTracerProvider::builder()
                .with_batch_exporter(spans)
                .with_resource(resource.clone())
                .build(),
            metrics: SdkMeterProvider::builder()
                .with_periodic_exporter(measurements)
                .with_resource(resource.clone())
                .build(),
            logs: SdkLoggerProvider::builder()
                .with_batch_exporter(events)
                .with_resource(resource)
                .build(),
        })
    }

    fn force_flush(&self) {
        let _ = self.traces.force_flush();
        let _ = self.metrics.force_flush();
        let _ = self.logs.force_flush();
    }

    fn shutdown(&self) {
        let _ = self.logs.shutdown();
        let _ = self.metrics.shutdown();
        let _ = self.traces.shutdown();
    }
}

fn exporter_error(signal: &str, endpoint: &str, e: impl std::fmt::Display) -> Error {
    Error::Other(format!("cannot build OTLP {signal} exporter for {endpoint}: {e}"))
}

/// Keeps the exporters alive. Dropping it shuts them down.
pub struct TelemetryGuard {
    exporters: Option<Exporters>,
}

impl TelemetryGuard {
    /// Export whatever is buffered. The CLI calls this right before exit
    /// so the counts of the last run reach the collector.
    pub fn force_flush(&self) {
        if let Some(exporters) = &self.exporters {
            exporters.force_flush();
        }
    }

    pub fn is_exporting(&self) -> bool {
        self.exporters.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(exporters) = self.exporters.take() {
            exporters.shutdown();
        }
    }
}

/// Install the global subscriber: env filter, compact stderr output, and
/// the OTLP bridge layers when `config.endpoint` is set.
///
/// Fails if an exporter cannot be built or a global subscriber is already
/// installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));
    let stderr = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr);

    let exporters = config
        .endpoint
        .as_deref()
        .map(|endpoint| Exporters::build(endpoint, config.service_name.clone()))
        .transpose()?;

    let (span_layer, log_layer) = match &exporters {
        Some(exporters) => {
            use opentelemetry::trace::TracerProvider as _;
            opentelemetry::global::set_meter_provider(exporters.metrics.clone());
            let tracer = exporters.traces.tracer(SERVICE_NAME);
            (
                Some(tracing_opentelemetry::layer().with_tracer(tracer)),
                Some(OpenTelemetryTracingBridge::new(&exporters.logs)),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(span_layer)
        .with(log_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("cannot install tracing subscriber: {e}")))?;

    Ok(TelemetryGuard { exporters })
}
