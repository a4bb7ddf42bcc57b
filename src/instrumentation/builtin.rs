use std::panic;

use super::{panic_message, Instrumentor};

/// Routes records from the `log` crate into `tracing`, and from there into the OTel log bridge.
#[cfg(feature = "log")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LogInstrumentor;

#[cfg(feature = "log")]
impl Instrumentor for LogInstrumentor {
    fn instrument(&self) -> anyhow::Result<()> {
        use anyhow::Context;

        tracing_log::LogTracer::init().context("a `log` logger is already installed")
    }
}

/// Records every panic as an `error` event before handing it to the previous hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicInstrumentor;

impl Instrumentor for PanicInstrumentor {
    fn instrument(&self) -> anyhow::Result<()> {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let message = panic_message(info.payload());
            let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_default();
            tracing::error!(target: "panic", location = %location, "application panicked: {message}");
            previous(info);
        }));
        Ok(())
    }
}
