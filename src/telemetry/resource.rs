use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;

use crate::telemetry::config::TelemetryConfig;

/// Resource shared by every signal: service identity on top of the SDK
/// detectors (`OTEL_RESOURCE_ATTRIBUTES`, telemetry.sdk.*).
pub fn build_resource(config: &TelemetryConfig) -> Resource {
    Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attribute(KeyValue::new(SERVICE_VERSION, config.service_version.clone()))
        .build()
}
