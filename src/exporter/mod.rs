//! Exporter capability consumed by the bootstrappers.
//!
//! The distribution never interprets exporter settings itself. Everything the caller passes that
//! is not a distribution option lands in [`ExporterOptions`] and is handed, unchanged, to each
//! [`ExporterFactory`] method.

mod connection_string;
mod otlp;

use std::collections::btree_map;
use std::collections::BTreeMap;

use opentelemetry_sdk::logs::LogExporter;
use opentelemetry_sdk::trace::SpanExporter;

use crate::options::OptionValue;

pub use connection_string::ConnectionString;
pub use otlp::OtlpExporterFactory;

/// Opaque pass-through options for exporter construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExporterOptions {
    values: BTreeMap<String, OptionValue>,
}

impl ExporterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    /// The value under `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(OptionValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, OptionValue> {
        self.values.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for ExporterOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = ExporterOptions::new();
        for (key, value) in iter {
            options.insert(key, value);
        }
        options
    }
}

impl<'a> IntoIterator for &'a ExporterOptions {
    type Item = (&'a String, &'a OptionValue);
    type IntoIter = btree_map::Iter<'a, String, OptionValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Builds the exporters a bootstrap call attaches to its providers.
///
/// Each method receives the full set of pass-through options. Construction errors are fatal to
/// the bootstrap call.
pub trait ExporterFactory {
    type SpanExporter: SpanExporter + 'static;
    type LogExporter: LogExporter + 'static;
    #[cfg(feature = "metrics")]
    type MetricExporter: opentelemetry_sdk::metrics::exporter::PushMetricExporter + 'static;

    /// Build the exporter behind the batch span processor.
    ///
    /// # Errors
    ///
    /// Returns an error if the options cannot produce a working exporter.
    fn span_exporter(&self, options: &ExporterOptions) -> anyhow::Result<Self::SpanExporter>;

    /// Build the exporter behind the batch log processor.
    ///
    /// # Errors
    ///
    /// Returns an error if the options cannot produce a working exporter.
    fn log_exporter(&self, options: &ExporterOptions) -> anyhow::Result<Self::LogExporter>;

    /// Build the exporter behind the periodic metric reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the options cannot produce a working exporter.
    #[cfg(feature = "metrics")]
    fn metric_exporter(&self, options: &ExporterOptions) -> anyhow::Result<Self::MetricExporter>;
}
