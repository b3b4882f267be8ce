//! Process telemetry bootstrap: traces, metrics and logs.
//!
//! One call builds a provider per signal, registers each one, installs the
//! W3C trace-context + baggage propagator and returns a
//! [`ShutdownCoordinator`] that tears everything down exactly once.
//!
//! # Features
//!
//! - `metrics` (default): enable the metric pipeline. Without it, bootstrap
//!   completes with traces and logs only.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! let mut telemetry = otel_bootstrap::telemetry::init().await?;
//! // ... run the application ...
//! telemetry.shutdown(Duration::from_secs(5))?;
//! ```
//!
//! # Exporters
//!
//! The exporter target is chosen once for all signals:
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT` unset or empty: pretty-printed records on stdout
//! - otherwise: OTLP/gRPC to that collector. A malformed address fails
//!   bootstrap immediately. A well-formed one is connected lazily, and any
//!   batch that could not be delivered makes `shutdown` return an error.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `OTEL_SERVICE_NAME` | Service name | `CARGO_PKG_NAME` |
//! | `OTEL_SERVICE_VERSION` | Service version | `CARGO_PKG_VERSION` |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP collector endpoint | stdout |
//! | `OTEL_METRICS_EXPORTER` | `none` disables metrics | - |
//! | `RUST_LOG` | Log level filter | `info` |
//! | `LOG_FORMAT` | `pretty` or `json` | `pretty` |
//!
//! # Module Structure
//!
//! - [`api`]: async entry points
//! - [`bootstrap`]: orchestration and rollback
//! - [`config`]: configuration types
//! - [`delivery`]: export failure tracking
//! - [`exporter`]: exporter selection per signal
//! - [`providers`]: trace/metric/log provider factories
//! - [`registry`]: provider slots, cleared on shutdown
//! - [`shutdown`]: aggregate teardown

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod delivery;
pub mod error;
pub mod exporter;
pub mod propagation;
pub mod providers;
pub mod registry;
pub mod resource;
pub mod shutdown;
pub mod subscriber;

pub use api::{init, init_with_config, init_with_registry};
pub use bootstrap::{bootstrap, BootstrapStage};
pub use config::{LogFormat, TelemetryConfig, TelemetryConfigBuilder};
pub use delivery::ExportHealth;
pub use error::{BootstrapError, ShutdownError, ShutdownFailure, TelemetryError};
pub use exporter::{ExporterTarget, Signal};
pub use providers::SignalPipeline;
pub use registry::TelemetryRegistry;
pub use shutdown::{ShutdownCoordinator, ShutdownHook};
