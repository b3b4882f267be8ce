use std::fmt;

use opentelemetry_otlp::{LogExporter, MetricExporter, SpanExporter, WithExportConfig};
use tonic::transport::Endpoint;
use tracing::debug;

use crate::telemetry::config::TelemetryConfig;
use crate::telemetry::error::TelemetryError;

/// Telemetry signal kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Trace,
    Metric,
    Log,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Metric => "metric",
            Self::Log => "log",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where every signal is exported for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExporterTarget {
    /// Pretty-printed records on stdout
    Stdout,
    /// OTLP/gRPC to a collector
    Otlp { endpoint: String },
}

impl ExporterTarget {
    /// Empty or missing endpoint selects stdout
    pub fn from_endpoint(endpoint: Option<&str>) -> Self {
        match endpoint.map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => Self::Otlp {
                endpoint: endpoint.to_string(),
            },
            _ => Self::Stdout,
        }
    }

    pub fn for_config(config: &TelemetryConfig) -> Self {
        Self::from_endpoint(config.otlp_endpoint.as_deref())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Stdout)
    }
}

/// Reject endpoints that could never connect.
///
/// The channel itself connects lazily, so a well-formed but unreachable
/// address passes here. Batches it fails to deliver are counted by
/// [`ExportHealth`](crate::telemetry::delivery::ExportHealth) and reported
/// when the provider shuts down.
pub fn validate_endpoint(endpoint: &str) -> Result<(), TelemetryError> {
    let invalid = |reason: String| TelemetryError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let parsed = Endpoint::from_shared(endpoint.to_string()).map_err(|e| invalid(e.to_string()))?;

    match parsed.uri().scheme_str() {
        Some("http") | Some("https") => {}
        Some(other) => return Err(invalid(format!("unsupported scheme `{}`", other))),
        None => return Err(invalid("missing http:// or https:// scheme".to_string())),
    }

    if parsed.uri().host().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    Ok(())
}

fn exporter_error(signal: Signal) -> impl FnOnce(opentelemetry_otlp::ExporterBuildError) -> TelemetryError {
    move |e| TelemetryError::Exporter {
        signal,
        message: e.to_string(),
    }
}

pub fn otlp_span_exporter(endpoint: &str) -> Result<SpanExporter, TelemetryError> {
    validate_endpoint(endpoint)?;
    debug!(endpoint, signal = "trace", "building OTLP exporter");
    SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(exporter_error(Signal::Trace))
}

pub fn otlp_metric_exporter(endpoint: &str) -> Result<MetricExporter, TelemetryError> {
    validate_endpoint(endpoint)?;
    debug!(endpoint, signal = "metric", "building OTLP exporter");
    MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(exporter_error(Signal::Metric))
}

pub fn otlp_log_exporter(endpoint: &str) -> Result<LogExporter, TelemetryError> {
    validate_endpoint(endpoint)?;
    debug!(endpoint, signal = "log", "building OTLP exporter");
    LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(exporter_error(Signal::Log))
}
