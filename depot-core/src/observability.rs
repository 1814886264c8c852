use std::fmt::Display;

/// Fire-and-forget error reporting. Implementations must not fail or block.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, context: &str, error: &dyn Display);
}

/// Reports through `tracing`; the binary layers metrics on top.
#[derive(Debug, Default, Clone)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, context: &str, error: &dyn Display) {
        tracing::error!(context, "{}", error);
    }
}
