//! Shared configuration for commands built by one [`Executor`](crate::Executor).
//!
//! A [`Config`] starts from [`Config::default`] and is adjusted through the
//! `with_*` options on [`ExecutorBuilder`](crate::ExecutorBuilder). Once built
//! it is read-only and shared by `Arc` between every command.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::process::{OsProcessFactory, ProcessFactory};

/// Default time between asking a process to terminate and killing it.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Sink for best-effort failures that are not returned to the caller, such
/// as a terminate signal that could not be delivered.
pub trait ErrorLogger: Send + Sync {
    fn log(&self, err: &(dyn std::error::Error + 'static));
}

impl<F> ErrorLogger for F
where
    F: Fn(&(dyn std::error::Error + 'static)) + Send + Sync,
{
    fn log(&self, err: &(dyn std::error::Error + 'static)) {
        self(err)
    }
}

/// Drops every error. The default logger.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardLogger;

impl ErrorLogger for DiscardLogger {
    fn log(&self, _err: &(dyn std::error::Error + 'static)) {}
}

/// Forwards errors to `tracing` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl ErrorLogger for TracingLogger {
    fn log(&self, err: &(dyn std::error::Error + 'static)) {
        warn!(error = %err, "graceexec");
    }
}

/// Settings shared by commands.
#[derive(Clone)]
pub struct Config {
    pub(crate) grace_period: Duration,
    pub(crate) process_factory: Arc<dyn ProcessFactory>,
    pub(crate) error_logger: Arc<dyn ErrorLogger>,
}

impl Config {
    /// Time between terminate and kill.
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Factory used to create each command's process.
    pub fn process_factory(&self) -> &Arc<dyn ProcessFactory> {
        &self.process_factory
    }

    /// Logger for best-effort failures.
    pub fn error_logger(&self) -> &Arc<dyn ErrorLogger> {
        &self.error_logger
    }

    pub(crate) fn report(&self, err: &(dyn std::error::Error + 'static)) {
        self.error_logger.log(err);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            process_factory: Arc::new(OsProcessFactory),
            error_logger: Arc::new(DiscardLogger),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("grace_period", &self.grace_period)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.grace_period(), Duration::from_secs(30));
    }

    #[test]
    fn test_closure_logger() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let config = Config {
            error_logger: Arc::new(move |err: &(dyn std::error::Error + 'static)| {
                sink.lock().push(err.to_string())
            }),
            ..Config::default()
        };

        config.report(&crate::error::KillError::NotStarted);
        assert_eq!(*seen.lock(), vec!["process not started".to_string()]);
    }
}
