use std::fmt;

use tracing::{debug, info, warn};

use crate::telemetry::config::TelemetryConfig;
use crate::telemetry::error::BootstrapError;
use crate::telemetry::exporter::{ExporterTarget, Signal};
use crate::telemetry::propagation::new_propagator;
use crate::telemetry::providers::SignalPipeline;
use crate::telemetry::registry::TelemetryRegistry;
use crate::telemetry::shutdown::ShutdownCoordinator;

/// Progress of a bootstrap run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStage {
    NotStarted,
    PropagatorInstalled,
    TraceReady,
    MetricReady,
    LogReady,
    Complete,
}

impl BootstrapStage {
    fn ready(signal: Signal) -> Self {
        match signal {
            Signal::Trace => Self::TraceReady,
            Signal::Metric => Self::MetricReady,
            Signal::Log => Self::LogReady,
        }
    }
}

/// Step number reported when a signal's provider fails. Step 1 is the
/// propagator, so a log failure is step 4 whether or not metrics run.
pub fn step_of(signal: Signal) -> usize {
    match signal {
        Signal::Trace => 2,
        Signal::Metric => 3,
        Signal::Log => 4,
    }
}

impl fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::PropagatorInstalled => "propagator installed",
            Self::TraceReady => "trace ready",
            Self::MetricReady => "metric ready",
            Self::LogReady => "log ready",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Install the propagator, then run each pipeline in order.
///
/// Every provider that gets registered has its hook in the returned
/// coordinator, and running that hook also empties its registry slot. If a
/// pipeline fails, the providers already started are unregistered and shut
/// down before returning, so nothing is left half-registered for use.
pub fn bootstrap(
    config: &TelemetryConfig,
    registry: &TelemetryRegistry,
    pipelines: &[Box<dyn SignalPipeline>],
) -> Result<ShutdownCoordinator, BootstrapError> {
    let mut stage = BootstrapStage::NotStarted;
    let mut coordinator = ShutdownCoordinator::new();

    registry.install_propagator(new_propagator);
    stage = transition(stage, BootstrapStage::PropagatorInstalled);

    for pipeline in pipelines {
        let signal = pipeline.signal();
        match pipeline.install(config, registry) {
            Ok(hook) => {
                coordinator.register(registry.release_on_shutdown(hook));
                stage = transition(stage, BootstrapStage::ready(signal));
            }
            Err(cause) => {
                warn!(%signal, error = %cause, "provider setup failed, rolling back");
                let teardown = coordinator.shutdown(config.shutdown_timeout).err();
                return Err(BootstrapError {
                    step: step_of(signal),
                    signal,
                    reached: stage,
                    cause,
                    teardown,
                });
            }
        }
    }

    transition(stage, BootstrapStage::Complete);
    info!(
        service = %config.service_name,
        local = ExporterTarget::for_config(config).is_local(),
        signals = ?coordinator.signals(),
        "telemetry initialized"
    );
    Ok(coordinator)
}

fn transition(from: BootstrapStage, to: BootstrapStage) -> BootstrapStage {
    debug!(%from, %to, "bootstrap transition");
    to
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::error::TelemetryError;
    use crate::telemetry::providers::default_pipelines;
    use crate::telemetry::shutdown::tests::CountingHook;
    use crate::telemetry::shutdown::ShutdownHook;
    use opentelemetry::propagation::TextMapPropagator;
    use opentelemetry::trace::{Tracer, TracerProvider as _};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct FakePipeline {
        signal: Signal,
        fail_install: bool,
        fail_shutdown: bool,
        installs: Arc<AtomicUsize>,
        shutdowns: Arc<AtomicUsize>,
    }

    impl FakePipeline {
        fn ok(signal: Signal) -> Self {
            Self {
                signal,
                fail_install: false,
                fail_shutdown: false,
                installs: Arc::new(AtomicUsize::new(0)),
                shutdowns: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing_install(signal: Signal) -> Self {
            Self {
                fail_install: true,
                ..Self::ok(signal)
            }
        }

        fn failing_shutdown(signal: Signal) -> Self {
            Self {
                fail_shutdown: true,
                ..Self::ok(signal)
            }
        }
    }

    impl SignalPipeline for FakePipeline {
        fn signal(&self) -> Signal {
            self.signal
        }

        fn install(
            &self,
            _config: &TelemetryConfig,
            _registry: &TelemetryRegistry,
        ) -> Result<Box<dyn ShutdownHook>, TelemetryError> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            if self.fail_install {
                return Err(TelemetryError::Exporter {
                    signal: self.signal,
                    message: "collector rejected exporter".to_string(),
                });
            }
            Ok(Box::new(CountingHook::new(
                self.signal,
                self.shutdowns.clone(),
                self.fail_shutdown,
            )))
        }
    }

    /// Boxes fakes while keeping handles to their counters.
    fn boxed(fakes: Vec<FakePipeline>) -> (Vec<Box<dyn SignalPipeline>>, Vec<Counters>) {
        let counters = fakes
            .iter()
            .map(|f| Counters {
                installs: f.installs.clone(),
                shutdowns: f.shutdowns.clone(),
            })
            .collect();
        let pipelines = fakes
            .into_iter()
            .map(|f| Box::new(f) as Box<dyn SignalPipeline>)
            .collect();
        (pipelines, counters)
    }

    struct Counters {
        installs: Arc<AtomicUsize>,
        shutdowns: Arc<AtomicUsize>,
    }

    impl Counters {
        fn installs(&self) -> usize {
            self.installs.load(Ordering::SeqCst)
        }

        fn shutdowns(&self) -> usize {
            self.shutdowns.load(Ordering::SeqCst)
        }
    }

    fn test_config() -> TelemetryConfig {
        TelemetryConfig::new("test-service", "1.0.0").with_shutdown_timeout(Duration::from_secs(5))
    }

    #[test]
    fn successful_bootstrap_installs_propagator_and_all_hooks() {
        let registry = TelemetryRegistry::new();
        let (pipelines, counters) = boxed(vec![
            FakePipeline::ok(Signal::Trace),
            FakePipeline::ok(Signal::Metric),
            FakePipeline::ok(Signal::Log),
        ]);

        let mut coordinator = bootstrap(&test_config(), &registry, &pipelines).unwrap();

        let propagator = registry.propagator().expect("propagator installed");
        assert!(propagator.fields().any(|f| f == "traceparent"));
        assert_eq!(coordinator.signals(), vec![Signal::Trace, Signal::Metric, Signal::Log]);
        assert!(counters.iter().all(|c| c.installs() == 1 && c.shutdowns() == 0));

        coordinator.shutdown(Duration::from_secs(1)).unwrap();
        assert!(counters.iter().all(|c| c.shutdowns() == 1));
    }

    #[test]
    fn bootstrap_without_metrics_still_completes() {
        let registry = TelemetryRegistry::new();
        let (pipelines, _counters) = boxed(vec![
            FakePipeline::ok(Signal::Trace),
            FakePipeline::ok(Signal::Log),
        ]);

        let mut coordinator = bootstrap(&test_config(), &registry, &pipelines).unwrap();

        assert_eq!(coordinator.signals(), vec![Signal::Trace, Signal::Log]);
        coordinator.shutdown(Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn log_failure_rolls_back_trace_and_metric_exactly_once() {
        let registry = TelemetryRegistry::new();
        let (pipelines, counters) = boxed(vec![
            FakePipeline::ok(Signal::Trace),
            FakePipeline::ok(Signal::Metric),
            FakePipeline::failing_install(Signal::Log),
        ]);

        let err = bootstrap(&test_config(), &registry, &pipelines).unwrap_err();

        assert_eq!(err.step, 4);
        assert_eq!(err.signal, Signal::Log);
        assert_eq!(err.reached, BootstrapStage::MetricReady);
        assert!(err.teardown.is_none());
        assert!(matches!(err.cause, TelemetryError::Exporter { signal: Signal::Log, .. }));
        assert_eq!(counters[0].shutdowns(), 1);
        assert_eq!(counters[1].shutdowns(), 1);
        assert_eq!(counters[2].shutdowns(), 0);
    }

    #[test]
    fn trace_failure_stops_before_later_pipelines() {
        let registry = TelemetryRegistry::new();
        let (pipelines, counters) = boxed(vec![
            FakePipeline::failing_install(Signal::Trace),
            FakePipeline::ok(Signal::Metric),
            FakePipeline::ok(Signal::Log),
        ]);

        let err = bootstrap(&test_config(), &registry, &pipelines).unwrap_err();

        assert_eq!(err.step, 2);
        assert_eq!(err.reached, BootstrapStage::PropagatorInstalled);
        assert_eq!(err.errors().len(), 1);
        assert_eq!(counters[1].installs(), 0);
        assert_eq!(counters[2].installs(), 0);
        // The propagator stays installed; it owns no resources.
        assert!(registry.propagator().is_some());
    }

    #[test]
    fn rollback_failures_are_joined_with_the_cause() {
        let registry = TelemetryRegistry::new();
        let trace = FakePipeline::failing_shutdown(Signal::Trace);
        let metric = FakePipeline::failing_shutdown(Signal::Metric);
        let log = FakePipeline::failing_install(Signal::Log);
        let (pipelines, counters) = boxed(vec![trace, metric, log]);

        let err = bootstrap(&test_config(), &registry, &pipelines).unwrap_err();

        let teardown = err.teardown.as_ref().expect("teardown failures kept");
        assert_eq!(teardown.signals(), vec![Signal::Trace, Signal::Metric]);
        assert_eq!(err.errors().len(), 3);
        assert!(err.to_string().contains("rollback"));
        assert_eq!(counters[0].shutdowns(), 1);
        assert_eq!(counters[1].shutdowns(), 1);
    }

    #[test]
    fn shutdown_twice_returns_ok_the_second_time() {
        let registry = TelemetryRegistry::new();
        let fake = FakePipeline::ok(Signal::Trace);
        let shutdowns = fake.shutdowns.clone();
        let pipelines: Vec<Box<dyn SignalPipeline>> = vec![Box::new(fake)];

        let mut coordinator = bootstrap(&test_config(), &registry, &pipelines).unwrap();

        assert!(coordinator.shutdown(Duration::from_secs(1)).is_ok());
        assert!(coordinator.shutdown(Duration::from_secs(1)).is_ok());
        drop(coordinator);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn two_of_three_shutdown_failures_are_both_reported() {
        let registry = TelemetryRegistry::new();
        let (pipelines, _counters) = boxed(vec![
            FakePipeline::failing_shutdown(Signal::Trace),
            FakePipeline::ok(Signal::Metric),
            FakePipeline::failing_shutdown(Signal::Log),
        ]);
        let mut coordinator = bootstrap(&test_config(), &registry, &pipelines).unwrap();

        let err = coordinator.shutdown(Duration::from_secs(1)).unwrap_err();

        assert_eq!(err.failures().len(), 2);
        assert_eq!(err.signals(), vec![Signal::Trace, Signal::Log]);
    }

    #[test]
    fn local_bootstrap_with_sdk_pipelines_exports_to_stdout() {
        let config = test_config();
        let registry = TelemetryRegistry::new();
        let pipelines = default_pipelines(&config);

        let mut coordinator = bootstrap(&config, &registry, &pipelines).unwrap();

        assert!(registry.is_registered(Signal::Trace));
        assert!(registry.is_registered(Signal::Log));
        assert_eq!(
            registry.is_registered(Signal::Metric),
            cfg!(feature = "metrics")
        );

        let provider = registry.tracer_provider().unwrap();
        provider.tracer("bootstrap-test").in_span("checkout", |_cx| {});
        assert!(provider.force_flush().is_ok());

        assert!(coordinator.shutdown(config.shutdown_timeout).is_ok());
        assert!(!registry.is_registered(Signal::Trace));
        assert!(!registry.is_registered(Signal::Metric));
        assert!(!registry.is_registered(Signal::Log));
        assert!(coordinator.shutdown(config.shutdown_timeout).is_ok());
    }

    #[test]
    fn log_abort_leaves_no_provider_registered() {
        let config = test_config();
        let registry = TelemetryRegistry::new();
        registry
            .register_logger_provider(opentelemetry_sdk::logs::SdkLoggerProvider::builder().build())
            .unwrap();
        let pipelines = default_pipelines(&config);

        let err = bootstrap(&config, &registry, &pipelines).unwrap_err();

        assert_eq!(err.step, 4);
        assert_eq!(err.signal, Signal::Log);
        assert!(matches!(err.cause, TelemetryError::AlreadyRegistered(Signal::Log)));
        assert!(err.teardown.is_none());
        assert!(!registry.is_registered(Signal::Trace));
        assert!(!registry.is_registered(Signal::Metric));
        assert!(registry.tracer("after-abort").is_none());
        assert!(registry.meter("after-abort").is_none());

        // The slot that was already taken belongs to someone else.
        assert!(registry.is_registered(Signal::Log));
        registry.unregister(Signal::Log);

        let mut coordinator = bootstrap(&config, &registry, &pipelines).unwrap();
        assert!(registry.is_registered(Signal::Trace));
        assert!(coordinator.shutdown(config.shutdown_timeout).is_ok());
    }

    #[test]
    fn log_failure_without_metrics_still_reports_step_four() {
        let registry = TelemetryRegistry::new();
        let (pipelines, counters) = boxed(vec![
            FakePipeline::ok(Signal::Trace),
            FakePipeline::failing_install(Signal::Log),
        ]);

        let err = bootstrap(&test_config(), &registry, &pipelines).unwrap_err();

        assert_eq!(err.step, 4);
        assert_eq!(err.reached, BootstrapStage::TraceReady);
        assert_eq!(counters[0].shutdowns(), 1);
    }

    #[test]
    fn malformed_endpoint_aborts_at_trace_step() {
        let config = test_config().with_otlp_endpoint("collector:4317:bad");
        let registry = TelemetryRegistry::new();
        let pipelines = default_pipelines(&config);

        let err = bootstrap(&config, &registry, &pipelines).unwrap_err();

        assert_eq!(err.signal, Signal::Trace);
        assert!(matches!(err.cause, TelemetryError::InvalidEndpoint { .. }));
        assert!(!registry.is_registered(Signal::Trace));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_endpoint_bootstraps_lazily_and_reports_lost_spans() {
        let config = test_config()
            .with_otlp_endpoint("http://127.0.0.1:1")
            .with_metrics(false);
        let registry = TelemetryRegistry::new();
        let pipelines = default_pipelines(&config);

        let mut coordinator = bootstrap(&config, &registry, &pipelines).unwrap();
        assert_eq!(coordinator.signals(), vec![Signal::Trace, Signal::Log]);

        registry
            .tracer("bootstrap-test")
            .expect("tracer registered")
            .in_span("undeliverable", |_cx| {});

        let err = tokio::task::spawn_blocking(move || {
            let result = coordinator.shutdown(Duration::from_secs(5));
            assert!(coordinator.is_empty());
            result
        })
        .await
        .unwrap()
        .unwrap_err();

        assert_eq!(err.signals().first(), Some(&Signal::Trace));
        assert!(err.failures()[0].source.to_string().contains("failed to export"));
        assert!(!registry.is_registered(Signal::Trace));
    }

    #[test]
    fn stage_display_is_readable() {
        assert_eq!(BootstrapStage::PropagatorInstalled.to_string(), "propagator installed");
        assert_eq!(BootstrapStage::ready(Signal::Metric), BootstrapStage::MetricReady);
    }
}
