//! Activation of library instrumentation by name.
//!
//! The set of instrumentable libraries is fixed at compile time. Each requested name runs in
//! isolation: an unknown library, a library missing from this build, a missing instrumentor,
//! or an instrumentor that errors or panics is reported for that name and the remaining names
//! are still processed.

mod builtin;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

#[cfg(feature = "log")]
pub use builtin::LogInstrumentor;
pub use builtin::PanicInstrumentor;

/// Patches or hooks a library so it emits telemetry through the configured pipelines.
pub trait Instrumentor: Send + Sync {
    /// Activate the instrumentation.
    ///
    /// # Errors
    ///
    /// Returns an error if the instrumentation cannot be installed.
    fn instrument(&self) -> anyhow::Result<()>;
}

/// An allowlisted library and how to tell whether it is linked into this build.
#[derive(Clone, Copy)]
pub(crate) struct SupportedLibrary {
    pub name: &'static str,
    pub linked: fn() -> bool,
}

impl fmt::Debug for SupportedLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupportedLibrary")
            .field("name", &self.name)
            .field("linked", &(self.linked)())
            .finish()
    }
}

fn always_linked() -> bool {
    true
}

fn log_linked() -> bool {
    cfg!(feature = "log")
}

const SUPPORTED_LIBRARIES: &[SupportedLibrary] = &[
    SupportedLibrary {
        name: "log",
        linked: log_linked,
    },
    SupportedLibrary {
        name: "panic",
        linked: always_linked,
    },
];

/// Names of every library the distribution knows how to instrument.
pub fn supported_libraries() -> impl Iterator<Item = &'static str> {
    SUPPORTED_LIBRARIES.iter().map(|lib| lib.name)
}

/// Why a requested instrumentation was not activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The name is not on the allowlist.
    Unsupported,
    /// The library is allowlisted but not part of this build.
    LibraryUnavailable,
    /// The library is present but no instrumentor is registered for it.
    InstrumentorUnavailable,
}

/// Result of activating a single instrumentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentationOutcome {
    Activated,
    Skipped(SkipReason),
    Failed(String),
}

impl InstrumentationOutcome {
    pub fn is_activated(&self) -> bool {
        matches!(self, InstrumentationOutcome::Activated)
    }
}

/// Per-library outcomes in the order they were requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentationReport {
    entries: Vec<(String, InstrumentationOutcome)>,
}

impl InstrumentationReport {
    pub fn entries(&self) -> &[(String, InstrumentationOutcome)] {
        &self.entries
    }

    /// Outcome of the first request for `library`, if it was requested.
    pub fn outcome(&self, library: &str) -> Option<&InstrumentationOutcome> {
        self.entries
            .iter()
            .find(|(name, _)| name == library)
            .map(|(_, outcome)| outcome)
    }

    /// Libraries activated successfully, in request order.
    pub fn activated(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, outcome)| outcome.is_activated())
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fixed mapping from library name to instrumentor.
pub struct InstrumentationRegistry {
    supported: &'static [SupportedLibrary],
    instrumentors: HashMap<&'static str, Box<dyn Instrumentor>>,
}

impl fmt::Debug for InstrumentationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut registered: Vec<&str> = self.instrumentors.keys().copied().collect();
        registered.sort_unstable();
        f.debug_struct("InstrumentationRegistry")
            .field("supported", &self.supported)
            .field("registered", &registered)
            .finish()
    }
}

impl InstrumentationRegistry {
    /// The registry compiled into this build.
    pub fn builtin() -> Self {
        let mut instrumentors: Vec<(&'static str, Box<dyn Instrumentor>)> =
            vec![("panic", Box::new(PanicInstrumentor))];
        #[cfg(feature = "log")]
        instrumentors.push(("log", Box::new(LogInstrumentor)));
        Self::new(SUPPORTED_LIBRARIES, instrumentors)
    }

    pub(crate) fn new(
        supported: &'static [SupportedLibrary],
        instrumentors: impl IntoIterator<Item = (&'static str, Box<dyn Instrumentor>)>,
    ) -> Self {
        Self {
            supported,
            instrumentors: instrumentors.into_iter().collect(),
        }
    }

    pub fn is_supported(&self, library: &str) -> bool {
        self.find(library).is_some()
    }

    fn find(&self, library: &str) -> Option<&SupportedLibrary> {
        self.supported.iter().find(|lib| lib.name == library)
    }

    /// Activate each library in order. Repeated names are activated repeatedly.
    ///
    /// Never fails; every per-library problem is logged and recorded in the report.
    pub fn activate<I, S>(&self, libraries: I) -> InstrumentationReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = libraries
            .into_iter()
            .map(|library| {
                let library = library.as_ref();
                (library.to_owned(), self.activate_one(library))
            })
            .collect();
        InstrumentationReport { entries }
    }

    fn activate_one(&self, library: &str) -> InstrumentationOutcome {
        let Some(supported) = self.find(library) else {
            tracing::warn!(library, "Instrumentation not supported for library: {library}.");
            return InstrumentationOutcome::Skipped(SkipReason::Unsupported);
        };

        if !(supported.linked)() {
            tracing::warn!(
                library,
                "Library {library} is not part of this build. Please make sure its feature is enabled."
            );
            return InstrumentationOutcome::Skipped(SkipReason::LibraryUnavailable);
        }

        let Some(instrumentor) = self.instrumentors.get(library) else {
            tracing::warn!(library, "No instrumentor is available for {library}.");
            return InstrumentationOutcome::Skipped(SkipReason::InstrumentorUnavailable);
        };

        match catch_unwind(AssertUnwindSafe(|| instrumentor.instrument())) {
            Ok(Ok(())) => {
                tracing::debug!(library, "Instrumentation activated");
                InstrumentationOutcome::Activated
            }
            Ok(Err(e)) => {
                tracing::warn!(library, error = %format!("{e:#}"), "Exception occurred when instrumenting: {library}.");
                InstrumentationOutcome::Failed(format!("{e:#}"))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(library, panic = %message, "Instrumentor for {library} panicked.");
                InstrumentationOutcome::Failed(format!("instrumentor panicked: {message}"))
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
