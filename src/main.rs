use std::time::Duration;

use opentelemetry::KeyValue;
use otel_bootstrap::telemetry;
use tracing::info;

#[tracing::instrument]
fn handle_order(order_id: u64) {
    info!(order_id, "order processed");
}

#[tokio::main]
async fn main() {
    // Stdout exporters unless OTEL_EXPORTER_OTLP_ENDPOINT is set
    let mut coordinator = telemetry::init()
        .await
        .expect("Failed to initialize telemetry");

    if let Some(meter) = telemetry::TelemetryRegistry::global().meter("otel-bootstrap") {
        let orders = meter.u64_counter("orders.processed").build();
        orders.add(1, &[KeyValue::new("channel", "demo")]);
    }

    handle_order(42);

    // Provider shutdown blocks while exporters flush
    let result = tokio::task::spawn_blocking(move || coordinator.shutdown(Duration::from_secs(5)))
        .await
        .expect("shutdown task panicked");

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
