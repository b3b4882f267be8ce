//! Provider factories, one per signal.
//!
//! Each factory asks the exporter selector for the process-wide target,
//! wraps the exporter in the signal's batching component and returns the
//! SDK provider. The matching [`SignalPipeline`] registers the provider and
//! hands its shutdown hook to the bootstrap orchestrator.
//!
//! | Signal | Batching | Cadence |
//! |--------|----------|---------|
//! | trace  | `BatchSpanProcessor` | 1 s scheduled delay |
//! | metric | `PeriodicReader` | 10 s interval |
//! | log    | `BatchLogProcessor` | SDK defaults |

pub mod log;
#[cfg(feature = "metrics")]
pub mod metric;
pub mod trace;

use std::time::Duration;

use tracing::warn;

use crate::telemetry::config::TelemetryConfig;
use crate::telemetry::error::TelemetryError;
use crate::telemetry::exporter::Signal;
use crate::telemetry::registry::TelemetryRegistry;
use crate::telemetry::shutdown::ShutdownHook;

pub use log::{build_logger_provider, LogPipeline};
#[cfg(feature = "metrics")]
pub use metric::{build_meter_provider, MetricPipeline, METRIC_EXPORT_INTERVAL};
pub use trace::{build_tracer_provider, TracePipeline, TRACE_BATCH_TIMEOUT};

/// One bootstrap step: build the provider for a signal and register it.
///
/// On success the returned hook owns the provider's teardown and fails if
/// any batch was lost. On failure nothing may be left registered.
pub trait SignalPipeline: Send + Sync {
    fn signal(&self) -> Signal;

    fn install(
        &self,
        config: &TelemetryConfig,
        registry: &TelemetryRegistry,
    ) -> Result<Box<dyn ShutdownHook>, TelemetryError>;
}

/// Shut down a provider that never made it into the registry.
pub(crate) fn discard(mut provider: impl ShutdownHook, timeout: Duration) {
    let signal = provider.signal();
    if let Err(e) = provider.run(timeout) {
        warn!(%signal, error = %e, "failed to shut down unregistered provider");
    }
}

/// Trace, metric (when enabled) and log pipelines, in bootstrap order.
pub fn default_pipelines(config: &TelemetryConfig) -> Vec<Box<dyn SignalPipeline>> {
    #[cfg(feature = "metrics")]
    let metric = config
        .metrics_active()
        .then(|| Box::new(MetricPipeline) as Box<dyn SignalPipeline>);
    #[cfg(not(feature = "metrics"))]
    let metric: Option<Box<dyn SignalPipeline>> = {
        let _ = config;
        None
    };

    let mut pipelines: Vec<Box<dyn SignalPipeline>> = vec![Box::new(TracePipeline)];
    pipelines.extend(metric);
    pipelines.push(Box::new(LogPipeline));
    pipelines
}
