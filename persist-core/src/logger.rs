/*!
Logger capability consumed by the engine.

The engine reports the outcome of every save and load to a [`PersistLogger`].
[`NoopLogger`] is the default, so the engine works without any logging
subsystem; [`TracingLogger`] forwards events to `tracing`.
*/

use crate::PersistError;

/// Sink for persistence outcome events.
#[cfg_attr(test, mockall::automock)]
pub trait PersistLogger: Send + Sync {
    fn info(&self, message: &str);

    fn error(&self, error: &PersistError, message: &str);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl PersistLogger for NoopLogger {
    fn info(&self, _message: &str) {}

    fn error(&self, _error: &PersistError, _message: &str) {}
}

/// Forwards events to the `tracing` subscriber installed by the application.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl PersistLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "persist", "{}", message);
    }

    fn error(&self, error: &PersistError, message: &str) {
        tracing::error!(target: "persist", error = %error, "{}", message);
    }
}
