use anyhow::{ensure, Context};
use opentelemetry_sdk::trace::{
    BatchConfig, BatchConfigBuilder, BatchSpanProcessor, Sampler, SdkTracerProvider,
};
use opentelemetry_sdk::Resource;

use crate::env::ResolvedConfig;
use crate::exporter::ExporterFactory;

/// Ratio sampler recording `ratio` of all traces.
///
/// # Errors
///
/// Returns an error if `ratio` is outside `(0, 1]`.
pub(crate) fn build_sampler(ratio: f64) -> anyhow::Result<Sampler> {
    ensure!(
        ratio > 0.0 && ratio <= 1.0,
        "sampling ratio must be in (0, 1], got {ratio}"
    );
    Ok(Sampler::TraceIdRatioBased(ratio))
}

/// Batch settings for the span processor: the export interval becomes the scheduled delay.
pub(crate) fn batch_config(config: &ResolvedConfig) -> BatchConfig {
    BatchConfigBuilder::default()
        .with_scheduled_delay(config.tracing_export_interval)
        .build()
}

/// Build a [`SdkTracerProvider`]. Nothing global is touched; see [`install_global`].
///
/// # Errors
///
/// Returns an error if the sampler, exporter, or provider fails to initialize.
pub(crate) fn build_tracer_provider<F: ExporterFactory>(
    resource: Resource,
    config: &ResolvedConfig,
    factory: &F,
) -> anyhow::Result<SdkTracerProvider> {
    let sampler = build_sampler(config.sampling_ratio)?;

    let exporter = factory
        .span_exporter(&config.exporter_options)
        .context("Failed to build span exporter")?;

    let span_processor = BatchSpanProcessor::builder(exporter)
        .with_batch_config(batch_config(config))
        .build();

    let provider = SdkTracerProvider::builder()
        .with_sampler(sampler)
        .with_resource(resource)
        .with_span_processor(span_processor)
        .build();

    tracing::debug!(
        sampling_ratio = config.sampling_ratio,
        export_interval_ms = config.tracing_export_interval.as_millis() as u64,
        "tracing pipeline ready"
    );

    Ok(provider)
}

/// Register `provider` and the W3C trace-context propagator as process-wide globals.
pub(crate) fn install_global(provider: &SdkTracerProvider) {
    opentelemetry::global::set_tracer_provider(provider.clone());
    opentelemetry::global::set_text_map_propagator(
        opentelemetry_sdk::propagation::TraceContextPropagator::new(),
    );
}
