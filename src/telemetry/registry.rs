//! Provider slots for the process telemetry signals.
//!
//! Instrumentation obtains tracers, meters and the propagator from a
//! [`TelemetryRegistry`] handed to it at startup. The process-wide instance
//! returned by [`TelemetryRegistry::global`] also mirrors every registration
//! into `opentelemetry::global`, so code that only knows the OpenTelemetry
//! globals keeps working.
//!
//! A provider slot is written once per bootstrap and cleared when that
//! provider's shutdown hook runs, either on rollback or on shutdown.

use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::Duration;

use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::noop::NoopTracerProvider;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use tracing::debug;

use crate::telemetry::error::TelemetryError;
use crate::telemetry::exporter::Signal;
use crate::telemetry::shutdown::ShutdownHook;

static GLOBAL: OnceLock<TelemetryRegistry> = OnceLock::new();

/// Cheap handle; clones share the same slots.
#[derive(Clone, Default)]
pub struct TelemetryRegistry {
    inner: Arc<Slots>,
}

#[derive(Default)]
struct Slots {
    propagator: OnceLock<TextMapCompositePropagator>,
    tracer_provider: RwLock<Option<SdkTracerProvider>>,
    meter_provider: RwLock<Option<SdkMeterProvider>>,
    logger_provider: RwLock<Option<SdkLoggerProvider>>,
    mirror_globals: bool,
}

fn set_once<T: Clone>(slot: &RwLock<Option<T>>, value: &T, signal: Signal) -> Result<(), TelemetryError> {
    let mut slot = slot.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(TelemetryError::AlreadyRegistered(signal));
    }
    *slot = Some(value.clone());
    Ok(())
}

fn current<T: Clone>(slot: &RwLock<Option<T>>) -> Option<T> {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn take<T>(slot: &RwLock<Option<T>>) -> Option<T> {
    slot.write().unwrap_or_else(PoisonError::into_inner).take()
}

impl TelemetryRegistry {
    /// An isolated registry that never touches `opentelemetry::global`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static TelemetryRegistry {
        GLOBAL.get_or_init(|| Self {
            inner: Arc::new(Slots {
                mirror_globals: true,
                ..Slots::default()
            }),
        })
    }

    pub fn mirrors_globals(&self) -> bool {
        self.inner.mirror_globals
    }

    /// Keeps the first propagator installed; later calls are no-ops.
    ///
    /// The global registry calls `make` a second time for
    /// `opentelemetry::global`, so both hold the same composition.
    pub fn install_propagator<F>(&self, make: F)
    where
        F: Fn() -> TextMapCompositePropagator,
    {
        if self.inner.propagator.set(make()).is_err() {
            debug!("propagator already installed, keeping existing one");
            return;
        }
        if self.inner.mirror_globals {
            opentelemetry::global::set_text_map_propagator(make());
        }
    }

    pub fn propagator(&self) -> Option<&TextMapCompositePropagator> {
        self.inner.propagator.get()
    }

    pub fn register_tracer_provider(&self, provider: SdkTracerProvider) -> Result<(), TelemetryError> {
        set_once(&self.inner.tracer_provider, &provider, Signal::Trace)?;
        if self.inner.mirror_globals {
            opentelemetry::global::set_tracer_provider(provider);
        }
        Ok(())
    }

    pub fn tracer_provider(&self) -> Option<SdkTracerProvider> {
        current(&self.inner.tracer_provider)
    }

    pub fn tracer(&self, name: &'static str) -> Option<SdkTracer> {
        self.tracer_provider().map(|p| p.tracer(name))
    }

    pub fn register_meter_provider(&self, provider: SdkMeterProvider) -> Result<(), TelemetryError> {
        set_once(&self.inner.meter_provider, &provider, Signal::Metric)?;
        if self.inner.mirror_globals {
            opentelemetry::global::set_meter_provider(provider);
        }
        Ok(())
    }

    pub fn meter_provider(&self) -> Option<SdkMeterProvider> {
        current(&self.inner.meter_provider)
    }

    pub fn meter(&self, name: &'static str) -> Option<opentelemetry::metrics::Meter> {
        self.meter_provider().map(|p| p.meter(name))
    }

    /// OpenTelemetry has no global logger slot; log records reach this
    /// provider through the `tracing` bridge installed by the log pipeline.
    pub fn register_logger_provider(&self, provider: SdkLoggerProvider) -> Result<(), TelemetryError> {
        set_once(&self.inner.logger_provider, &provider, Signal::Log)
    }

    pub fn logger_provider(&self) -> Option<SdkLoggerProvider> {
        current(&self.inner.logger_provider)
    }

    pub fn is_registered(&self, signal: Signal) -> bool {
        match signal {
            Signal::Trace => self.tracer_provider().is_some(),
            Signal::Metric => self.meter_provider().is_some(),
            Signal::Log => self.logger_provider().is_some(),
        }
    }

    /// Empty the signal's slot. The OpenTelemetry globals fall back to
    /// providers that record nothing. Returns whether anything was removed.
    pub fn unregister(&self, signal: Signal) -> bool {
        let cleared = match signal {
            Signal::Trace => take(&self.inner.tracer_provider).is_some(),
            Signal::Metric => take(&self.inner.meter_provider).is_some(),
            Signal::Log => take(&self.inner.logger_provider).is_some(),
        };
        if !cleared {
            return false;
        }

        if self.inner.mirror_globals {
            match signal {
                Signal::Trace => opentelemetry::global::set_tracer_provider(NoopTracerProvider::new()),
                Signal::Metric => opentelemetry::global::set_meter_provider(SdkMeterProvider::default()),
                Signal::Log => {}
            }
        }
        debug!(%signal, "provider unregistered");
        true
    }

    /// Wrap `hook` so the signal's slot is emptied before the provider
    /// shuts down.
    pub fn release_on_shutdown(&self, hook: Box<dyn ShutdownHook>) -> Box<dyn ShutdownHook> {
        Box::new(Release {
            hook,
            registry: self.clone(),
        })
    }
}

struct Release {
    hook: Box<dyn ShutdownHook>,
    registry: TelemetryRegistry,
}

impl ShutdownHook for Release {
    fn signal(&self) -> Signal {
        self.hook.signal()
    }

    fn run(&mut self, timeout: Duration) -> OTelSdkResult {
        self.registry.unregister(self.hook.signal());
        self.hook.run(timeout)
    }
}
