use std::time::Duration;

use crate::exporter::ExporterOptions;
use crate::options::{keys, DistroOptions, LoggingLevel};

const DEFAULT_SAMPLING_RATIO: f64 = 1.0;
const DEFAULT_TRACING_EXPORT_INTERVAL: Duration = Duration::from_millis(30_000);
const DEFAULT_LOGGING_EXPORT_INTERVAL: Duration = Duration::from_millis(30_000);
const DEFAULT_METRICS_EXPORT_INTERVAL: Duration = Duration::from_millis(60_000);

/// Source of environment values. Returns `None` for unset or empty variables.
pub(crate) type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Fully resolved configuration after merging programmatic options, env vars, and defaults.
///
/// Priority (highest to lowest):
/// 1. Programmatic: values set in [`DistroOptions`]
/// 2. Environment variables: `OTEL_*`, `APPLICATIONINSIGHTS_CONNECTION_STRING`
/// 3. Defaults
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub disable_tracing: bool,
    pub disable_logging: bool,
    pub disable_metrics: bool,
    pub service_name: String,
    pub service_namespace: String,
    pub service_instance_id: String,
    pub sampling_ratio: f64,
    pub tracing_export_interval: Duration,
    pub logging_export_interval: Duration,
    pub metrics_export_interval: Duration,
    pub logging_level: LoggingLevel,
    pub instrumentations: Vec<String>,
    pub install_global: bool,
    pub exporter_options: ExporterOptions,
}

impl ResolvedConfig {
    /// Whether any signal pipeline will be built, and therefore whether a resource is needed.
    pub fn any_pipeline_enabled(&self) -> bool {
        self.tracing_enabled() || self.logging_enabled() || self.metrics_enabled()
    }

    pub fn tracing_enabled(&self) -> bool {
        cfg!(feature = "traces") && !self.disable_tracing
    }

    pub fn logging_enabled(&self) -> bool {
        cfg!(feature = "logs") && !self.disable_logging
    }

    pub fn metrics_enabled(&self) -> bool {
        cfg!(feature = "metrics") && !self.disable_metrics
    }
}

/// Resolve configuration by merging programmatic options, env vars, and defaults.
pub(crate) fn resolve_config(opts: &DistroOptions) -> ResolvedConfig {
    resolve_config_with(opts, &env_var_non_empty)
}

pub(crate) fn resolve_config_with(opts: &DistroOptions, env: EnvLookup<'_>) -> ResolvedConfig {
    let sdk_disabled = parse_bool(env("OTEL_SDK_DISABLED")).unwrap_or(false);
    let exporter_is_none = |key: &str| {
        env(key)
            .map(|v| v.trim().eq_ignore_ascii_case("none"))
            .unwrap_or(false)
    };

    let disable_tracing = opts
        .disable_tracing
        .unwrap_or_else(|| sdk_disabled || exporter_is_none("OTEL_TRACES_EXPORTER"));
    let disable_logging = opts
        .disable_logging
        .unwrap_or_else(|| sdk_disabled || exporter_is_none("OTEL_LOGS_EXPORTER"));
    let disable_metrics = opts
        .disable_metrics
        .unwrap_or_else(|| sdk_disabled || exporter_is_none("OTEL_METRICS_EXPORTER"));

    let service_name = opts
        .service_name
        .clone()
        .or_else(|| env("OTEL_SERVICE_NAME"))
        .unwrap_or_default();

    let sampling_ratio = opts
        .sampling_ratio
        .or_else(|| env("OTEL_TRACES_SAMPLER_ARG").and_then(|v| v.trim().parse::<f64>().ok()))
        .unwrap_or(DEFAULT_SAMPLING_RATIO);

    let tracing_export_interval = opts
        .tracing_export_interval
        .or_else(|| parse_millis(env("OTEL_BSP_SCHEDULE_DELAY")))
        .unwrap_or(DEFAULT_TRACING_EXPORT_INTERVAL);
    let logging_export_interval = opts
        .logging_export_interval
        .or_else(|| parse_millis(env("OTEL_BLRP_SCHEDULE_DELAY")))
        .unwrap_or(DEFAULT_LOGGING_EXPORT_INTERVAL);
    let metrics_export_interval = opts
        .metrics_export_interval
        .or_else(|| parse_millis(env("OTEL_METRIC_EXPORT_INTERVAL")))
        .unwrap_or(DEFAULT_METRICS_EXPORT_INTERVAL);

    let mut exporter_options = opts.exporter_options.clone();
    if !exporter_options.contains_key(keys::CONNECTION_STRING) {
        if let Some(cs) = env("APPLICATIONINSIGHTS_CONNECTION_STRING") {
            exporter_options.insert(keys::CONNECTION_STRING, cs);
        }
    }

    ResolvedConfig {
        disable_tracing,
        disable_logging,
        disable_metrics,
        service_name,
        service_namespace: opts.service_namespace.clone().unwrap_or_default(),
        service_instance_id: opts.service_instance_id.clone().unwrap_or_default(),
        sampling_ratio,
        tracing_export_interval,
        logging_export_interval,
        metrics_export_interval,
        logging_level: opts.logging_level.unwrap_or_default(),
        instrumentations: opts.instrumentations.clone(),
        install_global: opts.install_global.unwrap_or(true),
        exporter_options,
    }
}

pub(crate) fn env_var_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn parse_bool(value: Option<String>) -> Option<bool> {
    value.and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    })
}

fn parse_millis(value: Option<String>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}
