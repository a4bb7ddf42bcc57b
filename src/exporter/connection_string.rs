use std::collections::HashMap;

use anyhow::{bail, Context};

const DEFAULT_INGESTION_ENDPOINT: &str = "https://dc.services.visualstudio.com";

/// A parsed `Key=Value;Key=Value` backend connection string.
///
/// Keys are matched case-insensitively. `IngestionEndpoint` wins over a derived
/// `EndpointSuffix` endpoint, which wins over the public default.
///
/// [`OtlpExporterFactory`](crate::OtlpExporterFactory) uses only `ingestion_endpoint`. Custom
/// factories that authenticate with the instrumentation key parse it from the pass-through
/// `connection_string` option themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub instrumentation_key: String,
    pub ingestion_endpoint: String,
}

impl ConnectionString {
    /// # Errors
    ///
    /// Returns an error if a segment is not `key=value` or no instrumentation key is present.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let mut fields: HashMap<String, String> = HashMap::new();

        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment
                .split_once('=')
                .with_context(|| format!("malformed connection string segment `{segment}`"))?;
            fields.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
        }

        if let Some(auth) = fields.get("authorization") {
            if !auth.eq_ignore_ascii_case("ikey") {
                bail!("unsupported connection string authorization `{auth}`");
            }
        }

        let instrumentation_key = match fields.remove("instrumentationkey") {
            Some(key) if !key.is_empty() => key,
            _ => bail!("connection string is missing an InstrumentationKey"),
        };

        let ingestion_endpoint = fields
            .remove("ingestionendpoint")
            .filter(|e| !e.is_empty())
            .or_else(|| {
                fields
                    .get("endpointsuffix")
                    .filter(|s| !s.is_empty())
                    .map(|suffix| endpoint_from_suffix(suffix, fields.get("location")))
            })
            .unwrap_or_else(|| DEFAULT_INGESTION_ENDPOINT.to_owned());

        Ok(Self {
            instrumentation_key,
            ingestion_endpoint: ingestion_endpoint.trim_end_matches('/').to_owned(),
        })
    }
}

fn endpoint_from_suffix(suffix: &str, location: Option<&String>) -> String {
    let suffix = suffix.trim_start_matches('.');
    match location.filter(|l| !l.is_empty()) {
        Some(location) => format!("https://{location}.dc.{suffix}"),
        None => format!("https://dc.{suffix}"),
    }
}
