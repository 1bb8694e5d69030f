//! Logging capability handed to the worker pool.

/// Sink for the outcome of every refresh cycle.
pub trait Logger: Send + Sync {
    fn error(&self, message: &str);

    fn notice(&self, message: &str);
}

/// Forwards cycle outcomes to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn error(&self, message: &str) {
        tracing::error!(target: "crl_sync::cycle", "{message}");
    }

    fn notice(&self, message: &str) {
        tracing::info!(target: "crl_sync::cycle", "{message}");
    }
}
