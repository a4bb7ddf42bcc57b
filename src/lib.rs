//! # azure-monitor-otel-distro
//!
//! One-call OpenTelemetry distribution for Azure Monitor.
//!
//! A single function resolves configuration, builds the resource, wires up the tracing and
//! logging pipelines (and metrics, with the `metrics` feature), and activates instrumentation
//! for the libraries you name. Existing `#[instrument]`, `tracing::info!()`, and span macros
//! work unchanged.
//!
//! ## Quick Start
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! let _guard = azure_monitor_otel_distro::configure_azure_monitor(None)?;
//!
//! tracing::info!("This goes to stdout AND the telemetry backend");
//! # Ok(())
//! # }
//! ```
//!
//! ## Configured Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use azure_monitor_otel_distro::{DistroOptions, LoggingLevel};
//!
//! # fn main() -> anyhow::Result<()> {
//! let _guard = azure_monitor_otel_distro::configure_azure_monitor(Some(
//!     DistroOptions::builder()
//!         .connection_string("InstrumentationKey=00000000-0000-0000-0000-000000000000")
//!         .service_name("checkout")
//!         .service_namespace("shop")
//!         .sampling_ratio(0.25)
//!         .tracing_export_interval(Duration::from_secs(15))
//!         .logging_level(LoggingLevel::Info)
//!         .instrumentations(["log", "panic"])
//!         .build()
//! ))?;
//! # Ok(())
//! # }
//! ```

mod env;
mod exporter;
mod guard;
mod instrumentation;
mod options;
mod providers;
mod resource;
mod subscriber;
#[cfg(test)]
mod testing;

pub mod re_exports;

pub use exporter::{ConnectionString, ExporterFactory, ExporterOptions, OtlpExporterFactory};
pub use guard::DistroGuard;
#[cfg(feature = "log")]
pub use instrumentation::LogInstrumentor;
pub use instrumentation::{
    supported_libraries, InstrumentationOutcome, InstrumentationRegistry, InstrumentationReport,
    Instrumentor, PanicInstrumentor, SkipReason,
};
pub use options::{DistroOptions, DistroOptionsBuilder, LoggingLevel, OptionValue, Protocol};

use anyhow::Context;

use crate::env::ResolvedConfig;
use crate::guard::Pipelines;

/// Configure OpenTelemetry for Azure Monitor, exporting over OTLP.
///
/// Builds the pipelines that are not disabled, installs them as process-wide globals (unless
/// `install_global(false)`), composes a global tracing subscriber with OTel layers, activates
/// the requested instrumentations, and returns a [`DistroGuard`] that manages provider
/// lifecycles.
///
/// The guard **must** be held for the duration of the application. Dropping it
/// triggers a graceful flush and shutdown of all providers.
///
/// # Configuration Priority
///
/// 1. **Programmatic**: values set in [`DistroOptions`]
/// 2. **Environment variables**: `OTEL_SERVICE_NAME`, `OTEL_TRACES_SAMPLER_ARG`,
///    `APPLICATIONINSIGHTS_CONNECTION_STRING`, etc.
/// 3. **Defaults**: ratio 1.0, 30s export intervals, no log level threshold
///
/// # Errors
///
/// Returns an error if:
/// - A required transport feature is not enabled (e.g. `grpc` or `http`)
/// - The sampling ratio is outside `(0, 1]`
/// - Provider or exporter initialization fails
/// - The global tracing subscriber has already been set
///
/// Instrumentation problems are never errors; see [`DistroGuard::instrumentations`].
pub fn configure_azure_monitor(options: Option<DistroOptions>) -> anyhow::Result<DistroGuard> {
    configure_with_exporters(options, &OtlpExporterFactory::new())
}

/// Same as [`configure_azure_monitor`], with exporters built by `factory`.
///
/// # Errors
///
/// See [`configure_azure_monitor`].
pub fn configure_with_exporters<F: ExporterFactory>(
    options: Option<DistroOptions>,
    factory: &F,
) -> anyhow::Result<DistroGuard> {
    let opts = options.unwrap_or_default();
    let resolved = env::resolve_config(&opts);
    bootstrap(&resolved, factory, &InstrumentationRegistry::builtin())
}

fn bootstrap<F: ExporterFactory>(
    config: &ResolvedConfig,
    factory: &F,
    registry: &InstrumentationRegistry,
) -> anyhow::Result<DistroGuard> {
    let pipelines = build_pipelines(config, factory)?;

    // Globals change only once every fallible step has succeeded
    if config.install_global {
        if pipelines.tracer_provider.is_some() || pipelines.logger_provider.is_some() {
            subscriber::compose_subscriber(
                pipelines.tracer_provider.as_ref(),
                pipelines.logger_provider.as_ref(),
                config.logging_level,
            )
            .context("Failed to compose and set global subscriber")?;
        }
        install_global_providers(&pipelines);
    }

    // Instrumentations go last so they see the providers installed above
    let instrumentations = registry.activate(&config.instrumentations);

    Ok(DistroGuard::new(pipelines, instrumentations))
}

fn install_global_providers(pipelines: &Pipelines) {
    if let Some(ref tp) = pipelines.tracer_provider {
        providers::tracer::install_global(tp);
    }
    #[cfg(feature = "metrics")]
    if let Some(ref mp) = pipelines.meter_provider {
        providers::meter::install_global(mp);
    }
}

fn build_pipelines<F: ExporterFactory>(
    config: &ResolvedConfig,
    factory: &F,
) -> anyhow::Result<Pipelines> {
    let mut pipelines = Pipelines::default();
    if !config.any_pipeline_enabled() {
        tracing::debug!("every pipeline is disabled; no resource or provider built");
        return Ok(pipelines);
    }

    let resource = resource::build_resource(config);

    if config.tracing_enabled() {
        pipelines.tracer_provider = Some(
            providers::tracer::build_tracer_provider(resource.clone(), config, factory)
                .context("Failed to initialize tracer provider")?,
        );
    }

    if config.logging_enabled() {
        pipelines.logger_provider = Some(
            providers::logger::build_logger_provider(resource.clone(), config, factory)
                .context("Failed to initialize logger provider")?,
        );
    }

    #[cfg(feature = "metrics")]
    if config.metrics_enabled() {
        pipelines.meter_provider = Some(
            providers::meter::build_meter_provider(resource.clone(), config, factory)
                .context("Failed to initialize meter provider")?,
        );
    }

    pipelines.resource = Some(resource);
    Ok(pipelines)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use opentelemetry::trace::{Span, Tracer};
    use opentelemetry::{Key, Value};

    use super::*;
    use crate::env::resolve_config_with;
    use crate::env::tests::no_env;
    use crate::testing::RecordingFactory;

    fn resolved(builder: DistroOptionsBuilder) -> ResolvedConfig {
        resolve_config_with(&builder.install_global(false).build(), &no_env)
    }

    fn run(builder: DistroOptionsBuilder, factory: &RecordingFactory) -> anyhow::Result<DistroGuard> {
        bootstrap(&resolved(builder), factory, &InstrumentationRegistry::builtin())
    }

    #[test]
    fn full_configuration_builds_both_pipelines() {
        let factory = RecordingFactory::default();
        let builder = DistroOptions::builder()
            .service_name("test_service_name")
            .service_namespace("test_namespace")
            .service_instance_id("test_id")
            .sampling_ratio(0.5)
            .tracing_export_interval(Duration::from_millis(15000));

        let config = resolved(builder.clone());
        assert_eq!(config.sampling_ratio, 0.5);
        let batch = format!("{:?}", providers::tracer::batch_config(&config));
        assert!(batch.contains("scheduled_delay: 15s"), "{batch}");

        let guard = run(builder, &factory).unwrap();

        let resource = guard.resource().expect("resource is built");
        assert_eq!(
            resource.get(&Key::from_static_str("service.name")),
            Some(Value::from("test_service_name"))
        );
        assert!(guard.tracer_provider().is_some());
        assert!(guard.logger_provider().is_some());
        assert_eq!(factory.span_calls().len(), 1);
        assert_eq!(factory.log_calls().len(), 1);
    }

    #[test]
    fn disable_tracing_builds_nothing_for_tracing() {
        let factory = RecordingFactory::default();

        let guard = run(DistroOptions::builder().disable_tracing(true), &factory).unwrap();

        assert!(guard.tracer_provider().is_none());
        assert!(guard.tracer("test").is_none());
        assert!(factory.span_calls().is_empty());
        // logging still runs and gets the resource
        assert!(guard.logger_provider().is_some());
        assert!(guard.resource().is_some());
    }

    #[test]
    fn disabling_every_pipeline_skips_the_resource() {
        let factory = RecordingFactory::default();

        let guard = run(
            DistroOptions::builder()
                .disable_tracing(true)
                .disable_logging(true)
                .disable_metrics(true),
            &factory,
        )
        .unwrap();

        assert!(guard.resource().is_none());
        assert!(guard.tracer_provider().is_none());
        assert!(guard.logger_provider().is_none());
        assert!(factory.span_calls().is_empty());
        assert!(factory.log_calls().is_empty());
    }

    #[test]
    fn pass_through_options_reach_every_exporter_unchanged() {
        let factory = RecordingFactory::default();
        let builder = DistroOptions::builder()
            .connection_string("test_cs")
            .exporter_option("api_version", "1.0")
            .exporter_option("disable_offline_storage", true)
            .exporter_option("storage_maintenance_period", 50_i64)
            .exporter_option("storage_max_size", 1024_i64)
            .exporter_option("storage_min_retry_interval", 30_i64)
            .exporter_option("storage_directory", "/tmp")
            .exporter_option("storage_retention_period", 60_i64)
            .exporter_option("timeout", 30_i64);

        let _guard = run(builder, &factory).unwrap();

        let expected: ExporterOptions = [
            ("connection_string", OptionValue::from("test_cs")),
            ("api_version", OptionValue::from("1.0")),
            ("disable_offline_storage", OptionValue::from(true)),
            ("storage_maintenance_period", OptionValue::Int(50)),
            ("storage_max_size", OptionValue::Int(1024)),
            ("storage_min_retry_interval", OptionValue::Int(30)),
            ("storage_directory", OptionValue::from("/tmp")),
            ("storage_retention_period", OptionValue::Int(60)),
            ("timeout", OptionValue::Int(30)),
        ]
        .into_iter()
        .collect();
        assert_eq!(factory.span_calls(), vec![expected.clone()]);
        assert_eq!(factory.log_calls(), vec![expected]);
    }

    #[test]
    fn exporter_failure_is_fatal_to_bootstrap() {
        let factory = RecordingFactory::failing();

        let result = run(DistroOptions::builder(), &factory);

        let err = result.err().expect("bootstrap fails");
        assert!(format!("{err:#}").contains("tracer provider"));
    }

    #[test]
    fn late_failure_leaves_the_global_tracer_provider_untouched() {
        let factory = RecordingFactory::failing_logs();
        let config = resolve_config_with(&DistroOptions::builder().build(), &no_env);
        assert!(config.install_global);

        let result = bootstrap(&config, &factory, &InstrumentationRegistry::builtin());

        assert!(result.is_err());
        assert_eq!(factory.span_calls().len(), 1);
        let span = opentelemetry::global::tracer("check").start("after-failure");
        assert!(!span.span_context().is_valid());
    }

    #[test]
    fn instrumentation_problems_never_fail_bootstrap() {
        let factory = RecordingFactory::default();

        let guard = run(
            DistroOptions::builder()
                .disable_tracing(true)
                .disable_logging(true)
                .instrumentations(["unsupported_lib", "panic"]),
            &factory,
        )
        .unwrap();

        let report = guard.instrumentations();
        assert_eq!(
            report.outcome("unsupported_lib"),
            Some(&InstrumentationOutcome::Skipped(SkipReason::Unsupported))
        );
        assert_eq!(report.outcome("panic"), Some(&InstrumentationOutcome::Activated));
    }

    #[test]
    fn guard_tracer_exports_through_the_configured_chain() {
        let factory = RecordingFactory::default();
        let mut guard = run(DistroOptions::builder().disable_logging(true), &factory).unwrap();

        guard.tracer("test").unwrap().in_span("request", |_cx| {});
        guard.tracer_provider().unwrap().force_flush().unwrap();

        let spans = factory.spans.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "request");

        guard.shutdown();
        guard.shutdown();
    }
}
