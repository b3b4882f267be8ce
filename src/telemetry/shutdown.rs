use std::fmt;
use std::time::{Duration, Instant};

use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::{debug, warn};

use crate::telemetry::config::DEFAULT_SHUTDOWN_TIMEOUT;
use crate::telemetry::error::{ShutdownError, ShutdownFailure};
use crate::telemetry::exporter::Signal;

/// Cleanup for one started provider.
pub trait ShutdownHook: Send {
    fn signal(&self) -> Signal;

    /// Flush and stop, giving up once `timeout` has elapsed.
    fn run(&mut self, timeout: Duration) -> OTelSdkResult;
}

impl ShutdownHook for SdkTracerProvider {
    fn signal(&self) -> Signal {
        Signal::Trace
    }

    fn run(&mut self, timeout: Duration) -> OTelSdkResult {
        self.shutdown_with_timeout(timeout)
    }
}

impl ShutdownHook for SdkMeterProvider {
    fn signal(&self) -> Signal {
        Signal::Metric
    }

    fn run(&mut self, timeout: Duration) -> OTelSdkResult {
        self.shutdown_with_timeout(timeout)
    }
}

impl ShutdownHook for SdkLoggerProvider {
    fn signal(&self) -> Signal {
        Signal::Log
    }

    fn run(&mut self, timeout: Duration) -> OTelSdkResult {
        self.shutdown_with_timeout(timeout)
    }
}

/// Ordered cleanup for every provider started during bootstrap.
///
/// The first [`shutdown`](ShutdownCoordinator::shutdown) drains the hooks;
/// any later call finds nothing to do and returns `Ok(())`. Not meant to be
/// shared between threads: it has a single owner, usually `main`.
#[derive(Default)]
pub struct ShutdownCoordinator {
    hooks: Vec<Box<dyn ShutdownHook>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Box<dyn ShutdownHook>) {
        debug!(signal = %hook.signal(), "registered shutdown hook");
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Signals still awaiting shutdown, in registration order.
    pub fn signals(&self) -> Vec<Signal> {
        self.hooks.iter().map(|h| h.signal()).collect()
    }

    /// Run every hook in registration order within one overall `timeout`.
    ///
    /// A failing hook never stops the remaining ones; all failures are
    /// returned together.
    pub fn shutdown(&mut self, timeout: Duration) -> Result<(), ShutdownError> {
        let hooks = std::mem::take(&mut self.hooks);
        if hooks.is_empty() {
            return Ok(());
        }

        let deadline = Instant::now() + timeout;
        let mut failures = Vec::new();

        for mut hook in hooks {
            let signal = hook.signal();
            let remaining = deadline.saturating_duration_since(Instant::now());
            match hook.run(remaining) {
                Ok(()) => debug!(%signal, "provider shut down"),
                Err(source) => {
                    warn!(%signal, error = %source, "provider shutdown failed");
                    failures.push(ShutdownFailure { signal, source });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ShutdownError::new(failures))
        }
    }
}

impl fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("pending", &self.signals())
            .finish()
    }
}

impl Drop for ShutdownCoordinator {
    fn drop(&mut self) {
        if self.hooks.is_empty() {
            return;
        }
        if let Err(e) = self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT) {
            eprintln!("Error shutting down telemetry providers: {e}");
        }
    }
}
