use std::time::Duration;

use opentelemetry_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, SdkTracerProvider, SpanExporter,
};

use crate::telemetry::config::TelemetryConfig;
use crate::telemetry::delivery::{ExportHealth, Monitored, Tracked};
use crate::telemetry::error::TelemetryError;
use crate::telemetry::exporter::{otlp_span_exporter, ExporterTarget, Signal};
use crate::telemetry::providers::{discard, SignalPipeline};
use crate::telemetry::registry::TelemetryRegistry;
use crate::telemetry::resource::build_resource;
use crate::telemetry::shutdown::ShutdownHook;

/// SDK default is 5s; spans should show up quickly while debugging.
pub const TRACE_BATCH_TIMEOUT: Duration = Duration::from_secs(1);

fn batch_processor<E>(exporter: E) -> BatchSpanProcessor
where
    E: SpanExporter + 'static,
{
    let batch_config = BatchConfigBuilder::default()
        .with_scheduled_delay(TRACE_BATCH_TIMEOUT)
        .build();

    BatchSpanProcessor::builder(exporter)
        .with_batch_config(batch_config)
        .build()
}

/// Build the tracer provider for the configured exporter target.
///
/// Failed exports are counted in `health`.
pub fn build_tracer_provider(
    config: &TelemetryConfig,
    health: &ExportHealth,
) -> Result<SdkTracerProvider, TelemetryError> {
    let processor = match ExporterTarget::for_config(config) {
        ExporterTarget::Stdout => batch_processor(Tracked::new(
            opentelemetry_stdout::SpanExporter::default(),
            health,
        )),
        ExporterTarget::Otlp { endpoint } => {
            batch_processor(Tracked::new(otlp_span_exporter(&endpoint)?, health))
        }
    };

    Ok(SdkTracerProvider::builder()
        .with_span_processor(processor)
        .with_resource(build_resource(config))
        .build())
}

pub struct TracePipeline;

impl SignalPipeline for TracePipeline {
    fn signal(&self) -> Signal {
        Signal::Trace
    }

    fn install(
        &self,
        config: &TelemetryConfig,
        registry: &TelemetryRegistry,
    ) -> Result<Box<dyn ShutdownHook>, TelemetryError> {
        let health = ExportHealth::new();
        let provider = build_tracer_provider(config, &health)?;
        if let Err(e) = registry.register_tracer_provider(provider.clone()) {
            discard(provider, config.shutdown_timeout);
            return Err(e);
        }
        Ok(Box::new(Monitored::new(provider, health)))
    }
}
