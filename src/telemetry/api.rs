use crate::telemetry::bootstrap::bootstrap;
use crate::telemetry::config::TelemetryConfig;
use crate::telemetry::error::BootstrapError;
use crate::telemetry::providers::default_pipelines;
use crate::telemetry::registry::TelemetryRegistry;
use crate::telemetry::shutdown::ShutdownCoordinator;

/// Initialize telemetry into a caller-owned registry
///
/// Must run inside a Tokio runtime when an OTLP endpoint is configured:
/// the gRPC channels are created on it.
pub async fn init_with_registry(
    config: &TelemetryConfig,
    registry: &TelemetryRegistry,
) -> Result<ShutdownCoordinator, BootstrapError> {
    bootstrap(config, registry, &default_pipelines(config))
}

/// Initialize telemetry into the process-wide registry
pub async fn init_with_config(config: &TelemetryConfig) -> Result<ShutdownCoordinator, BootstrapError> {
    init_with_registry(config, TelemetryRegistry::global()).await
}

/// Initialize telemetry from environment
pub async fn init() -> Result<ShutdownCoordinator, BootstrapError> {
    let config = TelemetryConfig::from_env();
    init_with_config(&config).await
}
