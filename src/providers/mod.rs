pub(crate) mod logger;
#[cfg(feature = "metrics")]
pub(crate) mod meter;
pub(crate) mod tracer;
