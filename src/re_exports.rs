//! The telemetry crates this distribution is built on.
//!
//! Custom [`ExporterFactory`](crate::ExporterFactory) implementations and code that creates
//! spans by hand need the same versions the distribution links against; use these paths instead
//! of adding direct dependencies that could drift.

pub use opentelemetry;
pub use opentelemetry_otlp;
pub use opentelemetry_sdk;
pub use tracing;
pub use tracing_opentelemetry;
