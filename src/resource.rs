use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;

use crate::env::ResolvedConfig;

pub(crate) const SERVICE_NAME: &str = "service.name";
pub(crate) const SERVICE_NAMESPACE: &str = "service.namespace";
pub(crate) const SERVICE_INSTANCE_ID: &str = "service.instance.id";

/// The identity attributes taken from configuration: service name, namespace and instance id.
pub(crate) fn resource_attributes(config: &ResolvedConfig) -> Vec<KeyValue> {
    vec![
        KeyValue::new(SERVICE_NAME, config.service_name.clone()),
        KeyValue::new(SERVICE_NAMESPACE, config.service_namespace.clone()),
        KeyValue::new(SERVICE_INSTANCE_ID, config.service_instance_id.clone()),
    ]
}

/// Build an OpenTelemetry [`Resource`] shared by every provider of one bootstrap call.
pub(crate) fn build_resource(config: &ResolvedConfig) -> Resource {
    Resource::builder()
        .with_attributes(resource_attributes(config))
        .build()
}
