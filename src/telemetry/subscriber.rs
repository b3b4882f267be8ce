use opentelemetry::trace::TracerProvider as _;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::telemetry::config::{LogFormat, TelemetryConfig};
use crate::telemetry::error::TelemetryError;

/// Exporter transports log through `tracing` themselves; bridging those
/// events back into the logger provider would loop.
const BRIDGE_EXCLUDED_TARGETS: &[&str] = &["opentelemetry", "tonic", "h2", "hyper", "tower"];

/// Build the OpenTelemetry tracing layer (spans -> tracer provider)
pub fn build_otel_layer<S>(
    provider: &SdkTracerProvider,
    service_name: &str,
) -> OpenTelemetryLayer<S, SdkTracer>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let tracer = provider.tracer(service_name.to_string());
    tracing_opentelemetry::layer().with_tracer(tracer)
}

fn is_bridged(target: &str) -> bool {
    !BRIDGE_EXCLUDED_TARGETS
        .iter()
        .any(|excluded| target.starts_with(excluded))
}

/// Build the log bridge layer (events -> logger provider)
pub fn build_log_bridge<S>(provider: &SdkLoggerProvider) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    OpenTelemetryTracingBridge::new(provider).with_filter(filter_fn(|meta| is_bridged(meta.target())))
}

/// JSON line with `severity` and `timestamp` at the root
struct JsonFormat;

impl<S, N> FormatEvent<S, N> for JsonFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let severity = match *event.metadata().level() {
            tracing::Level::ERROR => "ERROR",
            tracing::Level::WARN => "WARNING",
            tracing::Level::INFO => "INFO",
            tracing::Level::DEBUG | tracing::Level::TRACE => "DEBUG",
        };

        let mut root = serde_json::Map::new();
        root.insert("severity".into(), severity.into());
        root.insert(
            "timestamp".into(),
            chrono::Utc::now()
                .to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
                .into(),
        );
        root.insert("target".into(), event.metadata().target().into());

        if let Some(span) = ctx.lookup_current() {
            root.insert("span".into(), span.name().into());
        }

        let mut fields = serde_json::Map::new();
        event.record(&mut JsonVisitor(&mut fields));
        root.extend(fields);

        let line = serde_json::to_string(&root).map_err(|_| std::fmt::Error)?;
        writeln!(writer, "{}", line)
    }
}

/// Collects event fields into a JSON map
struct JsonVisitor<'a>(&'a mut serde_json::Map<String, serde_json::Value>);

impl tracing::field::Visit for JsonVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0
            .insert(field.name().to_string(), format!("{:?}", value).into());
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), value.into());
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), value.into());
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), value.into());
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), value.into());
    }
}

pub fn build_json_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_subscriber::fmt::layer()
        .event_format(JsonFormat)
        .with_ansi(false)
}

pub fn build_pretty_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_subscriber::fmt::layer()
        .pretty()
        .with_ansi(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
}

/// `RUST_LOG` wins over the configured level
pub fn build_filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Install the process subscriber: filter, span export (if a tracer provider
/// is registered), log bridge and console output.
pub fn init_subscriber(
    config: &TelemetryConfig,
    tracer_provider: Option<&SdkTracerProvider>,
    logger_provider: &SdkLoggerProvider,
) -> Result<(), TelemetryError> {
    let otel_layer = tracer_provider.map(|p| build_otel_layer(p, &config.service_name));
    let log_bridge = build_log_bridge(logger_provider);
    let filter = build_filter(config);

    match config.log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(otel_layer)
            .with(log_bridge)
            .with(build_pretty_layer())
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(otel_layer)
            .with(log_bridge)
            .with(build_json_layer())
            .try_init()?,
    }

    Ok(())
}
