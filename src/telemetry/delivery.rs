//! Export failure tracking.
//!
//! Batch processors export on their own threads and drop the result of
//! timer-driven exports. [`Tracked`] wraps an exporter and counts the
//! batches it failed to deliver; [`Monitored`] reports that count when the
//! provider is shut down, so lost data always ends in an error.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::logs::{LogBatch, LogExporter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics::{data::ResourceMetrics, exporter::PushMetricExporter, Temporality};
use opentelemetry_sdk::trace::{SpanData, SpanExporter};
use opentelemetry_sdk::Resource;

use crate::telemetry::exporter::Signal;
use crate::telemetry::shutdown::ShutdownHook;

/// Shared failure count for one provider's exporter.
#[derive(Debug, Clone, Default)]
pub struct ExportHealth {
    failed: Arc<AtomicUsize>,
    last_error: Arc<Mutex<Option<String>>>,
}

impl ExportHealth {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, error: &OTelSdkError) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error.to_string());
    }

    pub fn failed_batches(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `Err` once any batch has failed to export.
    pub fn check(&self) -> OTelSdkResult {
        match self.failed_batches() {
            0 => Ok(()),
            failed => Err(OTelSdkError::InternalFailure(format!(
                "{} batch(es) failed to export, last error: {}",
                failed,
                self.last_error().unwrap_or_default()
            ))),
        }
    }
}

/// Exporter wrapper that records failed exports into an [`ExportHealth`].
#[derive(Debug)]
pub struct Tracked<E> {
    inner: E,
    health: ExportHealth,
}

impl<E> Tracked<E> {
    pub fn new(inner: E, health: &ExportHealth) -> Self {
        Self {
            inner,
            health: health.clone(),
        }
    }

    fn observe(&self, result: OTelSdkResult) -> OTelSdkResult {
        if let Err(e) = &result {
            self.health.record(e);
        }
        result
    }
}

impl<E: SpanExporter> SpanExporter for Tracked<E> {
    async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
        let result = self.inner.export(batch).await;
        self.observe(result)
    }

    fn shutdown_with_timeout(&mut self, timeout: Duration) -> OTelSdkResult {
        self.inner.shutdown_with_timeout(timeout)
    }

    fn force_flush(&mut self) -> OTelSdkResult {
        self.inner.force_flush()
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.inner.set_resource(resource);
    }
}

impl<E: LogExporter> LogExporter for Tracked<E> {
    async fn export(&self, batch: LogBatch<'_>) -> OTelSdkResult {
        let result = self.inner.export(batch).await;
        self.observe(result)
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> OTelSdkResult {
        self.inner.shutdown_with_timeout(timeout)
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.inner.set_resource(resource);
    }
}

#[cfg(feature = "metrics")]
impl<E: PushMetricExporter> PushMetricExporter for Tracked<E> {
    async fn export(&self, metrics: &ResourceMetrics) -> OTelSdkResult {
        let result = self.inner.export(metrics).await;
        self.observe(result)
    }

    fn force_flush(&self) -> OTelSdkResult {
        self.inner.force_flush()
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> OTelSdkResult {
        self.inner.shutdown_with_timeout(timeout)
    }

    fn temporality(&self) -> Temporality {
        self.inner.temporality()
    }
}

/// Shutdown hook that fails when the provider lost batches before or during
/// its final flush. Lost batches take precedence over the provider's own
/// shutdown error.
pub struct Monitored<P> {
    provider: P,
    health: ExportHealth,
}

impl<P: ShutdownHook> Monitored<P> {
    pub fn new(provider: P, health: ExportHealth) -> Self {
        Self { provider, health }
    }
}

impl<P: ShutdownHook> ShutdownHook for Monitored<P> {
    fn signal(&self) -> Signal {
        self.provider.signal()
    }

    fn run(&mut self, timeout: Duration) -> OTelSdkResult {
        let result = self.provider.run(timeout);
        self.health.check().and(result)
    }
}
