use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_core::{LevelFilter, Subscriber};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::options::LoggingLevel;

// The exporters' own transport stack; exporting its events would feed back into itself.
const EXPORT_PIPELINE_TARGETS: &[&str] = &["hyper", "h2", "tonic", "tower", "reqwest", "opentelemetry"];

const INSTRUMENTATION_SCOPE: &str = env!("CARGO_PKG_NAME");

/// Filter for the OTel layers: `default` everywhere except the export pipeline, which is off.
pub(crate) fn otel_layer_filter(default: LevelFilter) -> Targets {
    Targets::new()
        .with_default(default)
        .with_targets(EXPORT_PIPELINE_TARGETS.iter().map(|t| (*t, LevelFilter::OFF)))
}

/// Compose and globally register a tracing subscriber with OTel layers.
///
/// The facility filter comes from `RUST_LOG` (defaults to `info`). See [`build_subscriber`].
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set.
pub(crate) fn compose_subscriber(
    tracer_provider: Option<&SdkTracerProvider>,
    logger_provider: Option<&SdkLoggerProvider>,
    logging_level: LoggingLevel,
) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = build_subscriber(tracer_provider, logger_provider, logging_level, env_filter);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global subscriber: {e}"))?;

    Ok(())
}

/// Registry with the facility filter applied to every layer.
///
/// Layers added:
/// - `fmt`: formatted output to stdout
/// - `OpenTelemetryLayer`: bridges tracing spans to OTel traces (if tracer provider given)
/// - `OpenTelemetryTracingBridge`: bridges tracing events to OTel logs (if logger provider
///   given). `logging_level` is a threshold on top of `env_filter`; `Unset` adds none.
pub(crate) fn build_subscriber(
    tracer_provider: Option<&SdkTracerProvider>,
    logger_provider: Option<&SdkLoggerProvider>,
    logging_level: LoggingLevel,
    env_filter: EnvFilter,
) -> impl Subscriber + Send + Sync + 'static {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    let otel_trace_layer = tracer_provider.map(|tp| {
        use opentelemetry::trace::TracerProvider as _;
        tracing_opentelemetry::layer()
            .with_tracer(tp.tracer(INSTRUMENTATION_SCOPE))
            .with_filter(otel_layer_filter(LevelFilter::TRACE))
    });

    let otel_log_layer = logger_provider.map(|lp| {
        opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(lp)
            .with_filter(otel_layer_filter(logging_level.as_level_filter()))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_trace_layer)
        .with(otel_log_layer)
}

#[cfg(test)]
mod tests {
    use opentelemetry::logs::Severity;
    use opentelemetry_sdk::logs::InMemoryLogExporter;
    use tracing::Level;

    use super::*;

    fn exported_severities(logging_level: LoggingLevel, emit: impl FnOnce()) -> Vec<Severity> {
        let exporter = InMemoryLogExporter::default();
        let provider = SdkLoggerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let subscriber =
            build_subscriber(None, Some(&provider), logging_level, EnvFilter::new("info"));

        tracing::subscriber::with_default(subscriber, emit);
        provider.force_flush().unwrap();

        exporter
            .get_emitted_logs()
            .unwrap()
            .iter()
            .filter_map(|log| log.record.severity_number())
            .collect()
    }

    #[test]
    fn unset_level_defers_to_the_facility_filter() {
        let severities = exported_severities(LoggingLevel::Unset, || {
            tracing::trace!(target: "some_dependency::internals", "trace detail");
            tracing::debug!(target: "some_dependency::internals", "debug detail");
            tracing::info!(target: "my_app", "request handled");
        });

        assert_eq!(severities, vec![Severity::Info]);
    }

    #[test]
    fn explicit_level_applies_on_top_of_the_facility_filter() {
        let severities = exported_severities(LoggingLevel::Warn, || {
            tracing::debug!(target: "my_app", "debug detail");
            tracing::info!(target: "my_app", "request handled");
            tracing::warn!(target: "my_app", "slow request");
            tracing::warn!(target: "hyper::proto", "connection reset");
        });

        assert_eq!(severities, vec![Severity::Warn]);
    }

    #[test]
    fn export_pipeline_targets_are_silenced() {
        let filter = otel_layer_filter(LevelFilter::TRACE);

        assert!(!filter.would_enable("hyper_util::client", &Level::ERROR));
        assert!(!filter.would_enable("opentelemetry_sdk::trace", &Level::WARN));
        assert!(filter.would_enable("my_app::handlers", &Level::TRACE));
    }

    #[test]
    fn logging_level_sets_the_bridge_threshold() {
        let filter = otel_layer_filter(LoggingLevel::Warn.as_level_filter());

        assert!(filter.would_enable("my_app", &Level::WARN));
        assert!(!filter.would_enable("my_app", &Level::INFO));

        let unset = otel_layer_filter(LoggingLevel::Unset.as_level_filter());
        assert!(unset.would_enable("my_app", &Level::TRACE));
    }
}
