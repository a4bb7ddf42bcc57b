use anyhow::Context;
use opentelemetry_sdk::logs::{BatchConfig, BatchConfigBuilder, BatchLogProcessor, SdkLoggerProvider};
use opentelemetry_sdk::Resource;

use crate::env::ResolvedConfig;
use crate::exporter::ExporterFactory;

/// Batch settings for the log processor: the export interval becomes the scheduled delay.
pub(crate) fn batch_config(config: &ResolvedConfig) -> BatchConfig {
    BatchConfigBuilder::default()
        .with_scheduled_delay(config.logging_export_interval)
        .build()
}

/// Build a [`SdkLoggerProvider`] with a batch processor in front of the factory's exporter.
///
/// The provider is wired into the root logging facility by the subscriber, not here.
///
/// # Errors
///
/// Returns an error if the exporter or provider fails to initialize.
pub(crate) fn build_logger_provider<F: ExporterFactory>(
    resource: Resource,
    config: &ResolvedConfig,
    factory: &F,
) -> anyhow::Result<SdkLoggerProvider> {
    let exporter = factory
        .log_exporter(&config.exporter_options)
        .context("Failed to build log exporter")?;

    let log_processor = BatchLogProcessor::builder(exporter)
        .with_batch_config(batch_config(config))
        .build();

    let provider = SdkLoggerProvider::builder()
        .with_resource(resource)
        .with_log_processor(log_processor)
        .build();

    tracing::debug!(
        level = ?config.logging_level,
        export_interval_ms = config.logging_export_interval.as_millis() as u64,
        "logging pipeline ready"
    );

    Ok(provider)
}
