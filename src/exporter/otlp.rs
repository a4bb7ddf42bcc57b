use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;

use super::{ConnectionString, ExporterFactory, ExporterOptions};
use crate::env::{env_var_non_empty, EnvLookup};
use crate::options::{keys, OptionValue, Protocol};

const DEFAULT_GRPC_ENDPOINT: &str = "http://localhost:4317";
const DEFAULT_HTTP_ENDPOINT: &str = "http://localhost:4318";
const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(30);

const UNDERSTOOD_KEYS: &[&str] = &[
    keys::CONNECTION_STRING,
    keys::ENDPOINT,
    keys::PROTOCOL,
    keys::HEADERS,
    keys::TIMEOUT,
];

/// Exports every signal over OTLP.
///
/// Reads `endpoint`, `protocol`, `headers`, `timeout` (seconds) and `connection_string` from the
/// pass-through options. Other keys are accepted and ignored. Only the ingestion endpoint of the
/// connection string is used; the instrumentation key is not sent.
///
/// Endpoint priority (highest to lowest):
/// 1. `endpoint` option
/// 2. `IngestionEndpoint` of the connection string
/// 3. `OTEL_EXPORTER_OTLP_ENDPOINT`
/// 4. `http://localhost:4318` (HTTP) or `http://localhost:4317` (gRPC)
#[derive(Debug, Clone, Copy, Default)]
pub struct OtlpExporterFactory;

impl OtlpExporterFactory {
    pub fn new() -> Self {
        Self
    }
}

/// OTLP settings after merging pass-through options, env vars, and defaults.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OtlpSettings {
    pub endpoint: String,
    pub protocol: Protocol,
    pub headers: HashMap<String, String>,
    pub timeout: Duration,
}

impl OtlpSettings {
    pub(crate) fn resolve(options: &ExporterOptions, env: EnvLookup<'_>) -> anyhow::Result<Self> {
        let protocol = match options.get(keys::PROTOCOL) {
            Some(value) => value
                .as_str()
                .and_then(Protocol::parse)
                .with_context(|| format!("unsupported OTLP protocol `{value}`"))?,
            None => env("OTEL_EXPORTER_OTLP_PROTOCOL")
                .and_then(|v| Protocol::parse(&v))
                .unwrap_or(Protocol::HttpProtobuf),
        };

        let connection_string = options
            .get_str(keys::CONNECTION_STRING)
            .map(ConnectionString::parse)
            .transpose()
            .context("invalid connection string")?;

        let default_endpoint = match protocol {
            Protocol::Grpc => DEFAULT_GRPC_ENDPOINT,
            Protocol::HttpProtobuf | Protocol::HttpJson => DEFAULT_HTTP_ENDPOINT,
        };

        let endpoint = options
            .get_str(keys::ENDPOINT)
            .map(str::to_owned)
            .or_else(|| connection_string.map(|cs| cs.ingestion_endpoint))
            .or_else(|| env("OTEL_EXPORTER_OTLP_ENDPOINT"))
            .unwrap_or_else(|| default_endpoint.to_owned());

        let mut headers = env("OTEL_EXPORTER_OTLP_HEADERS")
            .map(|v| parse_headers(&v))
            .unwrap_or_default();
        // Programmatic headers take precedence over env var headers
        match options.get(keys::HEADERS) {
            Some(OptionValue::Map(map)) => headers.extend(map.clone()),
            Some(OptionValue::Str(raw)) => headers.extend(parse_headers(raw)),
            Some(other) => anyhow::bail!("option `headers` expects a map, got `{other}`"),
            None => {}
        }

        let timeout = match options.get(keys::TIMEOUT) {
            Some(value) => value
                .as_f64()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .with_context(|| format!("option `timeout` expects seconds, got `{value}`"))?,
            None => env("OTEL_EXPORTER_OTLP_TIMEOUT")
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_EXPORT_TIMEOUT),
        };

        Ok(Self {
            endpoint,
            protocol,
            headers,
            timeout,
        })
    }

    /// The endpoint for one signal. HTTP exporters need the full `/v1/<signal>` path.
    pub(crate) fn signal_endpoint(&self, signal_path: &str) -> String {
        match self.protocol {
            Protocol::Grpc => self.endpoint.clone(),
            Protocol::HttpProtobuf | Protocol::HttpJson => {
                format!("{}{signal_path}", self.endpoint.trim_end_matches('/'))
            }
        }
    }
}

fn parse_headers(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_owned(), value.to_owned()))
        })
        .collect()
}

fn resolve_settings(options: &ExporterOptions) -> anyhow::Result<OtlpSettings> {
    let ignored: Vec<&str> = options
        .keys()
        .filter(|key| !UNDERSTOOD_KEYS.contains(key))
        .collect();
    if !ignored.is_empty() {
        tracing::debug!(?ignored, "OTLP exporter ignores options it does not use");
    }

    OtlpSettings::resolve(options, &env_var_non_empty)
}

macro_rules! build_exporter {
    ($settings:expr, $exporter_type:ident, $signal_path:literal) => {{
        let settings = $settings;
        match settings.protocol {
            Protocol::Grpc => {
                #[cfg(feature = "grpc")]
                {
                    if !settings.headers.is_empty() {
                        tracing::warn!(
                            "programmatic headers are not applied to gRPC exports; \
                             use OTEL_EXPORTER_OTLP_HEADERS instead"
                        );
                    }
                    use opentelemetry_otlp::WithExportConfig;
                    opentelemetry_otlp::$exporter_type::builder()
                        .with_tonic()
                        .with_endpoint(settings.signal_endpoint($signal_path))
                        .with_timeout(settings.timeout)
                        .build()
                        .context(concat!("Failed to build gRPC ", stringify!($exporter_type)))
                }
                #[cfg(not(feature = "grpc"))]
                {
                    anyhow::bail!(
                        "gRPC transport requested but the `grpc` feature is not enabled. \
                         Enable it in Cargo.toml: azure-monitor-otel-distro = {{ features = [\"grpc\"] }}"
                    )
                }
            }
            Protocol::HttpProtobuf | Protocol::HttpJson => {
                #[cfg(feature = "http")]
                {
                    use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
                    if settings.protocol == Protocol::HttpJson {
                        tracing::warn!("http/json is not supported; exporting with http/protobuf");
                    }
                    let mut builder = opentelemetry_otlp::$exporter_type::builder()
                        .with_http()
                        .with_endpoint(settings.signal_endpoint($signal_path))
                        .with_timeout(settings.timeout);
                    if !settings.headers.is_empty() {
                        builder = builder.with_headers(settings.headers.clone());
                    }
                    builder
                        .build()
                        .context(concat!("Failed to build HTTP ", stringify!($exporter_type)))
                }
                #[cfg(not(feature = "http"))]
                {
                    anyhow::bail!(
                        "HTTP transport requested but the `http` feature is not enabled. \
                         Enable it in Cargo.toml: azure-monitor-otel-distro = {{ features = [\"http\"] }}"
                    )
                }
            }
        }
    }};
}

impl ExporterFactory for OtlpExporterFactory {
    type SpanExporter = opentelemetry_otlp::SpanExporter;
    type LogExporter = opentelemetry_otlp::LogExporter;
    #[cfg(feature = "metrics")]
    type MetricExporter = opentelemetry_otlp::MetricExporter;

    fn span_exporter(&self, options: &ExporterOptions) -> anyhow::Result<Self::SpanExporter> {
        build_exporter!(&resolve_settings(options)?, SpanExporter, "/v1/traces")
    }

    fn log_exporter(&self, options: &ExporterOptions) -> anyhow::Result<Self::LogExporter> {
        build_exporter!(&resolve_settings(options)?, LogExporter, "/v1/logs")
    }

    #[cfg(feature = "metrics")]
    fn metric_exporter(&self, options: &ExporterOptions) -> anyhow::Result<Self::MetricExporter> {
        build_exporter!(&resolve_settings(options)?, MetricExporter, "/v1/metrics")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn resolve_defaults_with_no_options_or_env() {
        let settings = OtlpSettings::resolve(&ExporterOptions::new(), &env_from(&[])).unwrap();

        assert_eq!(settings.endpoint, "http://localhost:4318");
        assert_eq!(settings.protocol, Protocol::HttpProtobuf);
        assert!(settings.headers.is_empty());
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }

    #[test]
    fn programmatic_options_take_precedence() {
        let env = env_from(&[
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://env:4318"),
            ("OTEL_EXPORTER_OTLP_TIMEOUT", "5000"),
        ]);
        let options: ExporterOptions = [
            ("endpoint", OptionValue::from("http://programmatic:4318")),
            ("timeout", OptionValue::from(60)),
        ]
        .into_iter()
        .collect();

        let settings = OtlpSettings::resolve(&options, &env).unwrap();

        assert_eq!(settings.endpoint, "http://programmatic:4318");
        assert_eq!(settings.timeout, Duration::from_secs(60));
    }

    #[test]
    fn connection_string_endpoint_beats_env_endpoint() {
        let env = env_from(&[("OTEL_EXPORTER_OTLP_ENDPOINT", "http://env:4318")]);
        let options: ExporterOptions = [(
            "connection_string",
            "InstrumentationKey=k;IngestionEndpoint=https://ingest.example.com/",
        )]
        .into_iter()
        .collect();

        let settings = OtlpSettings::resolve(&options, &env).unwrap();

        assert_eq!(settings.endpoint, "https://ingest.example.com");
        assert_eq!(
            settings.signal_endpoint("/v1/traces"),
            "https://ingest.example.com/v1/traces"
        );
    }

    #[test]
    fn invalid_connection_string_fails() {
        let options: ExporterOptions = [("connection_string", "IngestionEndpoint=https://x")]
            .into_iter()
            .collect();

        let err = OtlpSettings::resolve(&options, &env_from(&[])).unwrap_err();
        assert!(format!("{err:#}").contains("InstrumentationKey"));
    }

    #[test]
    fn connection_string_key_is_not_sent_as_a_header() {
        let options: ExporterOptions = [("connection_string", "InstrumentationKey=secret-key")]
            .into_iter()
            .collect();

        let settings = OtlpSettings::resolve(&options, &env_from(&[])).unwrap();

        assert!(settings.headers.is_empty());
        assert_eq!(settings.endpoint, "https://dc.services.visualstudio.com");
    }

    #[test]
    fn unrepresentable_timeouts_are_errors() {
        for bad in [1e20, -1.0, f64::NAN, f64::INFINITY] {
            let options: ExporterOptions = [("timeout", OptionValue::Float(bad))].into_iter().collect();

            let err = OtlpSettings::resolve(&options, &env_from(&[])).unwrap_err();
            assert!(format!("{err:#}").contains("timeout"));
        }
    }

    #[test]
    fn headers_merge_env_then_programmatic() {
        let env = env_from(&[("OTEL_EXPORTER_OTLP_HEADERS", "key1=val1,key2=val2")]);
        let options: ExporterOptions = [("headers", "key2=override, key3 = val3")]
            .into_iter()
            .collect();

        let settings = OtlpSettings::resolve(&options, &env).unwrap();

        assert_eq!(settings.headers.get("key1"), Some(&"val1".to_owned()));
        assert_eq!(settings.headers.get("key2"), Some(&"override".to_owned()));
        assert_eq!(settings.headers.get("key3"), Some(&"val3".to_owned()));
    }

    #[test]
    fn grpc_protocol_uses_port_4317_default_without_signal_path() {
        let env = env_from(&[("OTEL_EXPORTER_OTLP_PROTOCOL", "grpc")]);

        let settings = OtlpSettings::resolve(&ExporterOptions::new(), &env).unwrap();

        assert_eq!(settings.protocol, Protocol::Grpc);
        assert_eq!(settings.signal_endpoint("/v1/logs"), "http://localhost:4317");
    }

    #[test]
    fn unknown_protocol_option_is_rejected() {
        let options: ExporterOptions = [("protocol", "carrier-pigeon")].into_iter().collect();
        assert!(OtlpSettings::resolve(&options, &env_from(&[])).is_err());
    }
}
