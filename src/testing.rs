//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use opentelemetry_sdk::logs::InMemoryLogExporter;
use opentelemetry_sdk::trace::InMemorySpanExporter;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::exporter::{ExporterFactory, ExporterOptions};

/// Hands out in-memory exporters and records the options each call received.
#[derive(Debug, Default)]
pub(crate) struct RecordingFactory {
    pub spans: InMemorySpanExporter,
    pub logs: InMemoryLogExporter,
    #[cfg(feature = "metrics")]
    pub metrics: opentelemetry_sdk::metrics::InMemoryMetricExporter,
    fail_spans: bool,
    fail_logs: bool,
    span_calls: Mutex<Vec<ExporterOptions>>,
    log_calls: Mutex<Vec<ExporterOptions>>,
    #[cfg(feature = "metrics")]
    metric_calls: Mutex<Vec<ExporterOptions>>,
}

impl RecordingFactory {
    /// A factory whose every exporter construction fails.
    pub fn failing() -> Self {
        Self {
            fail_spans: true,
            fail_logs: true,
            ..Self::default()
        }
    }

    /// A factory that builds span exporters but fails on log exporters.
    pub fn failing_logs() -> Self {
        Self {
            fail_logs: true,
            ..Self::default()
        }
    }

    pub fn span_calls(&self) -> Vec<ExporterOptions> {
        self.span_calls.lock().unwrap().clone()
    }

    pub fn log_calls(&self) -> Vec<ExporterOptions> {
        self.log_calls.lock().unwrap().clone()
    }

    #[cfg(feature = "metrics")]
    pub fn metric_calls(&self) -> Vec<ExporterOptions> {
        self.metric_calls.lock().unwrap().clone()
    }

    fn record(
        calls: &Mutex<Vec<ExporterOptions>>,
        options: &ExporterOptions,
        fail: bool,
    ) -> anyhow::Result<()> {
        calls.lock().unwrap().push(options.clone());
        if fail {
            anyhow::bail!("exporter rejected its options");
        }
        Ok(())
    }
}

impl ExporterFactory for RecordingFactory {
    type SpanExporter = InMemorySpanExporter;
    type LogExporter = InMemoryLogExporter;
    #[cfg(feature = "metrics")]
    type MetricExporter = opentelemetry_sdk::metrics::InMemoryMetricExporter;

    fn span_exporter(&self, options: &ExporterOptions) -> anyhow::Result<Self::SpanExporter> {
        Self::record(&self.span_calls, options, self.fail_spans)?;
        Ok(self.spans.clone())
    }

    fn log_exporter(&self, options: &ExporterOptions) -> anyhow::Result<Self::LogExporter> {
        Self::record(&self.log_calls, options, self.fail_logs)?;
        Ok(self.logs.clone())
    }

    #[cfg(feature = "metrics")]
    fn metric_exporter(&self, options: &ExporterOptions) -> anyhow::Result<Self::MetricExporter> {
        Self::record(&self.metric_calls, options, self.fail_spans && self.fail_logs)?;
        Ok(self.metrics.clone())
    }
}

/// One event seen by a [`RecordingLayer`].
#[derive(Debug, Clone)]
pub(crate) struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub fields: HashMap<String, String>,
}

/// Captures every event it sees, for use with `tracing::subscriber::with_default`.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl RecordingLayer {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl<S: Subscriber> Layer<S> for RecordingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor(&mut fields));
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_owned(),
            fields,
        });
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

impl Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_owned(), format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_owned(), value.to_owned());
    }
}
