pub mod telemetry;

pub use telemetry::{
    init, init_with_config, BootstrapError, ShutdownCoordinator, TelemetryConfig,
    TelemetryRegistry,
};
