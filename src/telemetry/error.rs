use std::fmt;

use opentelemetry_sdk::error::OTelSdkError;
use thiserror::Error;

use crate::telemetry::bootstrap::BootstrapStage;
use crate::telemetry::exporter::Signal;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid OTLP endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("Exporter error ({signal}): {message}")]
    Exporter { signal: Signal, message: String },
    #[error("A {0} provider is already registered")]
    AlreadyRegistered(Signal),
    #[error("Subscriber error: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// One provider that did not shut down cleanly.
#[derive(Debug, Error)]
#[error("{signal} provider shutdown failed: {source}")]
pub struct ShutdownFailure {
    pub signal: Signal,
    #[source]
    pub source: OTelSdkError,
}

/// Every failure collected during a single shutdown pass.
#[derive(Debug)]
pub struct ShutdownError {
    failures: Vec<ShutdownFailure>,
}

impl ShutdownError {
    pub(crate) fn new(failures: Vec<ShutdownFailure>) -> Self {
        Self { failures }
    }

    pub fn failures(&self) -> &[ShutdownFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<ShutdownFailure> {
        self.failures
    }

    /// Signals whose provider failed, in shutdown order.
    pub fn signals(&self) -> Vec<Signal> {
        self.failures.iter().map(|f| f.signal).collect()
    }
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} provider(s) failed to shut down", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}", sep, failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for ShutdownError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| f as &(dyn std::error::Error + 'static))
    }
}

/// Bootstrap was aborted. Providers started before the failing step have
/// already been shut down; their teardown failures, if any, are kept here
/// alongside the triggering cause.
#[derive(Debug)]
pub struct BootstrapError {
    /// 1-based step number; step 1 is the propagator.
    pub step: usize,
    pub signal: Signal,
    /// Last stage reached before the failure.
    pub reached: BootstrapStage,
    pub cause: TelemetryError,
    pub teardown: Option<ShutdownError>,
}

impl BootstrapError {
    /// The triggering cause followed by every teardown failure.
    pub fn errors(&self) -> Vec<&(dyn std::error::Error + 'static)> {
        let mut errors: Vec<&(dyn std::error::Error + 'static)> = vec![&self.cause];
        if let Some(teardown) = &self.teardown {
            errors.extend(
                teardown
                    .failures()
                    .iter()
                    .map(|f| f as &(dyn std::error::Error + 'static)),
            );
        }
        errors
    }
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Telemetry bootstrap aborted at step {} ({} provider, after {}): {}",
            self.step, self.signal, self.reached, self.cause
        )?;
        if let Some(teardown) = &self.teardown {
            write!(f, "; rollback: {}", teardown)?;
        }
        Ok(())
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}
