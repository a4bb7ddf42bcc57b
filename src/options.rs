use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use anyhow::bail;
use tracing_core::LevelFilter;

use crate::exporter::ExporterOptions;

/// OTLP transport protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// gRPC transport (port 4317).
    Grpc,
    /// HTTP with Protobuf encoding (default, port 4318).
    HttpProtobuf,
    /// HTTP with JSON encoding (port 4318).
    HttpJson,
}

impl Protocol {
    /// The `OTEL_EXPORTER_OTLP_PROTOCOL` spelling of this protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Grpc => "grpc",
            Protocol::HttpProtobuf => "http/protobuf",
            Protocol::HttpJson => "http/json",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Protocol> {
        match value {
            "grpc" => Some(Protocol::Grpc),
            "http/protobuf" => Some(Protocol::HttpProtobuf),
            "http/json" => Some(Protocol::HttpJson),
            _ => None,
        }
    }
}

/// Minimum severity captured by the log bridge.
///
/// Applied on top of the subscriber's `RUST_LOG` filter. `Unset` adds no threshold of its own,
/// so the bridge exports whatever that filter lets through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoggingLevel {
    #[default]
    Unset,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LoggingLevel {
    /// Parse a level name. Accepts the usual Rust names plus `notset`, `warning` and `critical`.
    pub fn parse(value: &str) -> Option<LoggingLevel> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unset" | "notset" => Some(LoggingLevel::Unset),
            "trace" => Some(LoggingLevel::Trace),
            "debug" => Some(LoggingLevel::Debug),
            "info" => Some(LoggingLevel::Info),
            "warn" | "warning" => Some(LoggingLevel::Warn),
            "error" | "critical" | "fatal" => Some(LoggingLevel::Error),
            _ => None,
        }
    }

    /// Map a numeric severity (0 = unset, 10 = debug, 20 = info, 30 = warn, 40+ = error).
    pub fn from_numeric(value: i64) -> LoggingLevel {
        match value {
            i64::MIN..=0 => LoggingLevel::Unset,
            1..=9 => LoggingLevel::Trace,
            10..=19 => LoggingLevel::Debug,
            20..=29 => LoggingLevel::Info,
            30..=39 => LoggingLevel::Warn,
            _ => LoggingLevel::Error,
        }
    }

    pub(crate) fn as_level_filter(&self) -> LevelFilter {
        match self {
            LoggingLevel::Unset | LoggingLevel::Trace => LevelFilter::TRACE,
            LoggingLevel::Debug => LevelFilter::DEBUG,
            LoggingLevel::Info => LevelFilter::INFO,
            LoggingLevel::Warn => LevelFilter::WARN,
            LoggingLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// A single configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl OptionValue {
    fn kind(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "bool",
            OptionValue::Int(_) => "integer",
            OptionValue::Float(_) => "float",
            OptionValue::Str(_) => "string",
            OptionValue::List(_) => "list",
            OptionValue::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integers are returned as-is; floats only when they carry no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OptionValue::Int(i) => Some(*i),
            OptionValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Int(i) => Some(*i as f64),
            OptionValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{b}"),
            OptionValue::Int(i) => write!(f, "{i}"),
            OptionValue::Float(x) => write!(f, "{x}"),
            OptionValue::Str(s) => f.write_str(s),
            OptionValue::List(items) => f.write_str(&items.join(",")),
            OptionValue::Map(map) => {
                let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
                f.write_str(&pairs.join(","))
            }
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Int(value.into())
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        OptionValue::Int(value.into())
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        OptionValue::List(value)
    }
}

impl From<Vec<&str>> for OptionValue {
    fn from(value: Vec<&str>) -> Self {
        OptionValue::List(value.into_iter().map(str::to_owned).collect())
    }
}

impl From<BTreeMap<String, String>> for OptionValue {
    fn from(value: BTreeMap<String, String>) -> Self {
        OptionValue::Map(value)
    }
}

/// Pass-through keys understood by the bundled OTLP exporter factory.
pub(crate) mod keys {
    pub const CONNECTION_STRING: &str = "connection_string";
    pub const ENDPOINT: &str = "endpoint";
    pub const PROTOCOL: &str = "protocol";
    pub const HEADERS: &str = "headers";
    pub const TIMEOUT: &str = "timeout";
}

/// Configuration options for the distribution.
///
/// Use [`DistroOptions::builder()`] for typed construction, or [`DistroOptions::from_pairs`]
/// for an open-ended set of named options. Unset values fall back to environment variables,
/// then defaults. Keys the distribution does not recognise are forwarded untouched to the
/// exporter factory.
#[derive(Debug, Clone, Default)]
pub struct DistroOptions {
    pub(crate) disable_tracing: Option<bool>,
    pub(crate) disable_logging: Option<bool>,
    pub(crate) disable_metrics: Option<bool>,
    pub(crate) service_name: Option<String>,
    pub(crate) service_namespace: Option<String>,
    pub(crate) service_instance_id: Option<String>,
    pub(crate) sampling_ratio: Option<f64>,
    pub(crate) tracing_export_interval: Option<Duration>,
    pub(crate) logging_export_interval: Option<Duration>,
    pub(crate) metrics_export_interval: Option<Duration>,
    pub(crate) logging_level: Option<LoggingLevel>,
    pub(crate) instrumentations: Vec<String>,
    pub(crate) install_global: Option<bool>,
    pub(crate) exporter_options: ExporterOptions,
}

impl DistroOptions {
    /// Create a new builder for `DistroOptions`.
    pub fn builder() -> DistroOptionsBuilder {
        DistroOptionsBuilder::default()
    }

    /// Build options from `(key, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if a recognised key carries a value of the wrong type.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> anyhow::Result<Self>
    where
        K: Into<String>,
        V: Into<OptionValue>,
    {
        pairs
            .into_iter()
            .try_fold(DistroOptions::default(), |opts, (key, value)| {
                opts.set(key, value)
            })
    }

    /// Set a single named option.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is recognised and `value` has the wrong type.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> anyhow::Result<Self> {
        let key = key.into();
        let value = value.into();

        match key.as_str() {
            "disable_tracing" => self.disable_tracing = Some(expect_bool(&key, &value)?),
            "disable_logging" => self.disable_logging = Some(expect_bool(&key, &value)?),
            "disable_metrics" => self.disable_metrics = Some(expect_bool(&key, &value)?),
            "service_name" => self.service_name = Some(expect_str(&key, &value)?),
            "service_namespace" => self.service_namespace = Some(expect_str(&key, &value)?),
            "service_instance_id" => self.service_instance_id = Some(expect_str(&key, &value)?),
            "sampling_ratio" => {
                self.sampling_ratio = Some(value.as_f64().ok_or_else(|| mismatch(&key, "number", &value))?)
            }
            "tracing_export_interval_millis" => {
                self.tracing_export_interval = Some(expect_millis(&key, &value)?)
            }
            "logging_export_interval_millis" => {
                self.logging_export_interval = Some(expect_millis(&key, &value)?)
            }
            "metrics_export_interval_millis" => {
                self.metrics_export_interval = Some(expect_millis(&key, &value)?)
            }
            "logging_level" => {
                let level = match &value {
                    OptionValue::Int(i) => Some(LoggingLevel::from_numeric(*i)),
                    OptionValue::Str(s) => LoggingLevel::parse(s),
                    _ => None,
                };
                self.logging_level = Some(level.ok_or_else(|| mismatch(&key, "level name or number", &value))?);
            }
            "instrumentations" => {
                self.instrumentations = match value {
                    OptionValue::List(items) => items,
                    OptionValue::Str(s) => s
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_owned)
                        .collect(),
                    other => return Err(mismatch(&key, "list", &other)),
                };
            }
            "install_global" => self.install_global = Some(expect_bool(&key, &value)?),
            _ => self.exporter_options.insert(key, value),
        }

        Ok(self)
    }
}

fn mismatch(key: &str, expected: &str, value: &OptionValue) -> anyhow::Error {
    anyhow::anyhow!(
        "option `{key}` expects a {expected}, got {} `{value}`",
        value.kind()
    )
}

fn expect_bool(key: &str, value: &OptionValue) -> anyhow::Result<bool> {
    value.as_bool().ok_or_else(|| mismatch(key, "bool", value))
}

fn expect_str(key: &str, value: &OptionValue) -> anyhow::Result<String> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| mismatch(key, "string", value))
}

fn expect_millis(key: &str, value: &OptionValue) -> anyhow::Result<Duration> {
    match value.as_i64() {
        Some(ms) if ms >= 0 => Ok(Duration::from_millis(ms as u64)),
        Some(_) => bail!("option `{key}` must not be negative, got `{value}`"),
        None => Err(mismatch(key, "whole number of milliseconds", value)),
    }
}

/// Builder for [`DistroOptions`].
#[derive(Debug, Default, Clone)]
pub struct DistroOptionsBuilder {
    opts: DistroOptions,
}

impl DistroOptionsBuilder {
    /// Skip the tracing pipeline entirely.
    pub fn disable_tracing(mut self, disable: bool) -> Self {
        self.opts.disable_tracing = Some(disable);
        self
    }

    /// Skip the logging pipeline entirely.
    pub fn disable_logging(mut self, disable: bool) -> Self {
        self.opts.disable_logging = Some(disable);
        self
    }

    /// Skip the metrics pipeline entirely. Only meaningful with the `metrics` feature.
    pub fn disable_metrics(mut self, disable: bool) -> Self {
        self.opts.disable_metrics = Some(disable);
        self
    }

    /// Set `service.name` on the resource.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.opts.service_name = Some(name.into());
        self
    }

    /// Set `service.namespace` on the resource.
    pub fn service_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.opts.service_namespace = Some(namespace.into());
        self
    }

    /// Set `service.instance.id` on the resource.
    pub fn service_instance_id(mut self, id: impl Into<String>) -> Self {
        self.opts.service_instance_id = Some(id.into());
        self
    }

    /// Fraction of traces to record, in `(0, 1]`.
    pub fn sampling_ratio(mut self, ratio: f64) -> Self {
        self.opts.sampling_ratio = Some(ratio);
        self
    }

    /// Interval between span batch exports.
    pub fn tracing_export_interval(mut self, interval: Duration) -> Self {
        self.opts.tracing_export_interval = Some(interval);
        self
    }

    /// Interval between log batch exports.
    pub fn logging_export_interval(mut self, interval: Duration) -> Self {
        self.opts.logging_export_interval = Some(interval);
        self
    }

    /// Interval between metric exports.
    pub fn metrics_export_interval(mut self, interval: Duration) -> Self {
        self.opts.metrics_export_interval = Some(interval);
        self
    }

    /// Minimum severity forwarded by the log bridge.
    pub fn logging_level(mut self, level: LoggingLevel) -> Self {
        self.opts.logging_level = Some(level);
        self
    }

    /// Libraries to instrument, in activation order.
    pub fn instrumentations(mut self, libraries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.opts.instrumentations = libraries.into_iter().map(Into::into).collect();
        self
    }

    /// Whether to install providers, propagator and subscriber as process-wide globals.
    /// Defaults to `true`.
    pub fn install_global(mut self, install: bool) -> Self {
        self.opts.install_global = Some(install);
        self
    }

    /// Set the backend connection string
    /// (e.g. `"InstrumentationKey=...;IngestionEndpoint=https://..."`).
    pub fn connection_string(self, connection_string: impl Into<String>) -> Self {
        self.exporter_option(keys::CONNECTION_STRING, connection_string.into())
    }

    /// Set the OTLP endpoint (e.g. `"http://collector:4318"`).
    pub fn endpoint(self, endpoint: impl Into<String>) -> Self {
        self.exporter_option(keys::ENDPOINT, endpoint.into())
    }

    /// Set the OTLP transport protocol.
    pub fn protocol(self, protocol: Protocol) -> Self {
        self.exporter_option(keys::PROTOCOL, protocol.as_str())
    }

    /// Set headers to include in export requests.
    pub fn headers(
        self,
        headers: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let headers: BTreeMap<String, String> = headers
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.exporter_option(keys::HEADERS, headers)
    }

    /// Set the exporter request timeout. Whole seconds are kept.
    pub fn timeout(self, timeout: Duration) -> Self {
        let secs = i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX);
        self.exporter_option(keys::TIMEOUT, secs)
    }

    /// Forward an arbitrary option to the exporter factory unchanged.
    pub fn exporter_option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.opts.exporter_options.insert(key.into(), value.into());
        self
    }

    /// Build the [`DistroOptions`].
    pub fn build(self) -> DistroOptions {
        self.opts
    }
}
