use anyhow::Context;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::Resource;

use crate::env::ResolvedConfig;
use crate::exporter::ExporterFactory;

/// Build a [`SdkMeterProvider`] with a periodic reader.
///
/// # Errors
///
/// Returns an error if the exporter or provider fails to initialize.
pub(crate) fn build_meter_provider<F: ExporterFactory>(
    resource: Resource,
    config: &ResolvedConfig,
    factory: &F,
) -> anyhow::Result<SdkMeterProvider> {
    let exporter = factory
        .metric_exporter(&config.exporter_options)
        .context("Failed to build metric exporter")?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(config.metrics_export_interval)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build();

    Ok(provider)
}

pub(crate) fn install_global(provider: &SdkMeterProvider) {
    opentelemetry::global::set_meter_provider(provider.clone());
}
