use std::time::Duration;

use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};

use crate::telemetry::config::TelemetryConfig;
use crate::telemetry::delivery::{ExportHealth, Monitored, Tracked};
use crate::telemetry::error::TelemetryError;
use crate::telemetry::exporter::{otlp_metric_exporter, ExporterTarget, Signal};
use crate::telemetry::providers::{discard, SignalPipeline};
use crate::telemetry::registry::TelemetryRegistry;
use crate::telemetry::resource::build_resource;
use crate::telemetry::shutdown::ShutdownHook;

/// Metric streams are cumulative, so a coarse interval only delays data.
pub const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(10);

pub fn build_meter_provider(
    config: &TelemetryConfig,
    health: &ExportHealth,
) -> Result<SdkMeterProvider, TelemetryError> {
    let builder = SdkMeterProvider::builder().with_resource(build_resource(config));

    let builder = match ExporterTarget::for_config(config) {
        ExporterTarget::Stdout => {
            let exporter = Tracked::new(opentelemetry_stdout::MetricExporter::default(), health);
            builder.with_reader(
                PeriodicReader::builder(exporter)
                    .with_interval(METRIC_EXPORT_INTERVAL)
                    .build(),
            )
        }
        ExporterTarget::Otlp { endpoint } => builder.with_reader(
            PeriodicReader::builder(Tracked::new(otlp_metric_exporter(&endpoint)?, health))
                .with_interval(METRIC_EXPORT_INTERVAL)
                .build(),
        ),
    };

    Ok(builder.build())
}

pub struct MetricPipeline;

impl SignalPipeline for MetricPipeline {
    fn signal(&self) -> Signal {
        Signal::Metric
    }

    fn install(
        &self,
        config: &TelemetryConfig,
        registry: &TelemetryRegistry,
    ) -> Result<Box<dyn ShutdownHook>, TelemetryError> {
        let health = ExportHealth::new();
        let provider = build_meter_provider(config, &health)?;
        if let Err(e) = registry.register_meter_provider(provider.clone()) {
            discard(provider, config.shutdown_timeout);
            return Err(e);
        }
        Ok(Box::new(Monitored::new(provider, health)))
    }
}
