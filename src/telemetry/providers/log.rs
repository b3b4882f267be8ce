use opentelemetry_sdk::logs::SdkLoggerProvider;

use crate::telemetry::config::TelemetryConfig;
use crate::telemetry::delivery::{ExportHealth, Monitored, Tracked};
use crate::telemetry::error::TelemetryError;
use crate::telemetry::exporter::{otlp_log_exporter, ExporterTarget, Signal};
use crate::telemetry::providers::{discard, SignalPipeline};
use crate::telemetry::registry::TelemetryRegistry;
use crate::telemetry::resource::build_resource;
use crate::telemetry::shutdown::ShutdownHook;
use crate::telemetry::subscriber::init_subscriber;

/// Build the logger provider with the SDK's default batch cadence
pub fn build_logger_provider(
    config: &TelemetryConfig,
    health: &ExportHealth,
) -> Result<SdkLoggerProvider, TelemetryError> {
    let builder = SdkLoggerProvider::builder().with_resource(build_resource(config));

    let builder = match ExporterTarget::for_config(config) {
        ExporterTarget::Stdout => builder.with_batch_exporter(Tracked::new(
            opentelemetry_stdout::LogExporter::default(),
            health,
        )),
        ExporterTarget::Otlp { endpoint } => {
            builder.with_batch_exporter(Tracked::new(otlp_log_exporter(&endpoint)?, health))
        }
    };

    Ok(builder.build())
}

/// Registers the logger provider and, when configured, installs the
/// process `tracing` subscriber that feeds it.
///
/// The subscriber cannot be uninstalled, so it is only installed once the
/// provider is registered.
pub struct LogPipeline;

impl SignalPipeline for LogPipeline {
    fn signal(&self) -> Signal {
        Signal::Log
    }

    fn install(
        &self,
        config: &TelemetryConfig,
        registry: &TelemetryRegistry,
    ) -> Result<Box<dyn ShutdownHook>, TelemetryError> {
        let health = ExportHealth::new();
        let provider = build_logger_provider(config, &health)?;

        if let Err(e) = registry.register_logger_provider(provider.clone()) {
            discard(provider, config.shutdown_timeout);
            return Err(e);
        }

        if config.install_subscriber {
            let tracer_provider = registry.tracer_provider();
            if let Err(e) = init_subscriber(config, tracer_provider.as_ref(), &provider) {
                registry.unregister(Signal::Log);
                discard(provider, config.shutdown_timeout);
                return Err(e);
            }
        }

        Ok(Box::new(Monitored::new(provider, health)))
    }
}
