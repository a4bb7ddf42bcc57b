use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::logs::SdkLoggerProvider;
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;

use crate::instrumentation::InstrumentationReport;

/// Handle to everything one bootstrap call created.
///
/// Holds the resource, the providers of every enabled pipeline and the instrumentation report,
/// and ensures the providers are flushed and shut down gracefully when dropped.
/// **Must be held for the duration of the application.**
///
/// Dropping the guard:
/// 1. Flushes all pending spans, logs, and metrics
/// 2. Shuts down all providers gracefully
///
/// # Examples
///
/// ```no_run
/// // Hold the guard in main; dropping it triggers shutdown
/// let _guard = azure_monitor_otel_distro::configure_azure_monitor(None).unwrap();
/// // ... application runs ...
/// // guard dropped here → flush + shutdown
/// ```
#[must_use = "dropping the DistroGuard immediately shuts down all OTel providers; \
              hold it for the lifetime of your application (e.g. `let _guard = ...;`)"]
pub struct DistroGuard {
    resource: Option<Resource>,
    tracer_provider: Option<SdkTracerProvider>,
    logger_provider: Option<SdkLoggerProvider>,
    #[cfg(feature = "metrics")]
    meter_provider: Option<SdkMeterProvider>,
    instrumentations: InstrumentationReport,
    shutdown_called: bool,
}

#[derive(Default)]
pub(crate) struct Pipelines {
    pub resource: Option<Resource>,
    pub tracer_provider: Option<SdkTracerProvider>,
    pub logger_provider: Option<SdkLoggerProvider>,
    #[cfg(feature = "metrics")]
    pub meter_provider: Option<SdkMeterProvider>,
}

impl DistroGuard {
    pub(crate) fn new(pipelines: Pipelines, instrumentations: InstrumentationReport) -> Self {
        Self {
            resource: pipelines.resource,
            tracer_provider: pipelines.tracer_provider,
            logger_provider: pipelines.logger_provider,
            #[cfg(feature = "metrics")]
            meter_provider: pipelines.meter_provider,
            instrumentations,
            shutdown_called: false,
        }
    }

    /// The resource shared by every provider, or `None` if every pipeline is disabled.
    pub fn resource(&self) -> Option<&Resource> {
        self.resource.as_ref()
    }

    pub fn tracer_provider(&self) -> Option<&SdkTracerProvider> {
        self.tracer_provider.as_ref()
    }

    pub fn logger_provider(&self) -> Option<&SdkLoggerProvider> {
        self.logger_provider.as_ref()
    }

    #[cfg(feature = "metrics")]
    pub fn meter_provider(&self) -> Option<&SdkMeterProvider> {
        self.meter_provider.as_ref()
    }

    /// A tracer from this guard's provider, independent of the global one.
    pub fn tracer(&self, name: &'static str) -> Option<SdkTracer> {
        self.tracer_provider.as_ref().map(|tp| tp.tracer(name))
    }

    /// What happened to each requested instrumentation.
    pub fn instrumentations(&self) -> &InstrumentationReport {
        &self.instrumentations
    }

    /// Explicitly flush and shut down all providers.
    ///
    /// Safe to call multiple times; subsequent calls are no-ops.
    /// This is also called automatically when the guard is dropped.
    pub fn shutdown(&mut self) {
        if self.shutdown_called {
            return;
        }
        self.shutdown_called = true;
        self.do_shutdown();
    }

    fn do_shutdown(&self) {
        if let Some(ref tp) = self.tracer_provider {
            if let Err(e) = tp.force_flush() {
                eprintln!("azure-monitor-otel-distro: error flushing tracer provider: {e}");
            }
            if let Err(e) = tp.shutdown() {
                eprintln!("azure-monitor-otel-distro: error shutting down tracer provider: {e}");
            }
        }

        if let Some(ref lp) = self.logger_provider {
            if let Err(e) = lp.force_flush() {
                eprintln!("azure-monitor-otel-distro: error flushing logger provider: {e}");
            }
            if let Err(e) = lp.shutdown() {
                eprintln!("azure-monitor-otel-distro: error shutting down logger provider: {e}");
            }
        }

        #[cfg(feature = "metrics")]
        if let Some(ref mp) = self.meter_provider {
            if let Err(e) = mp.force_flush() {
                eprintln!("azure-monitor-otel-distro: error flushing meter provider: {e}");
            }
            if let Err(e) = mp.shutdown() {
                eprintln!("azure-monitor-otel-distro: error shutting down meter provider: {e}");
            }
        }
    }
}

impl Drop for DistroGuard {
    fn drop(&mut self) {
        self.shutdown();
    }
}
