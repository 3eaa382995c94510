use std::ffi::OsStr;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cmd::Cmd;
use crate::command::CommandSpec;
use crate::config::{Config, ErrorLogger};
use crate::context::Context;
use crate::exit_status::BoxError;
use crate::process::{FakeProcessFactory, ProcessFactory};

/// Builds [`Cmd`]s that share one [`Config`].
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: Arc<Config>,
}

impl Executor {
    /// Executor with the default configuration: a 30 second grace period,
    /// real OS processes, and discarded best-effort errors.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ExecutorBuilder {
        ExecutorBuilder::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Command bound to a context that never finishes.
    pub fn command(&self, program: impl AsRef<OsStr>) -> Cmd {
        self.command_with_context(Context::background(), program)
    }

    /// Command bound to `ctx`. When `ctx` finishes before the process exits,
    /// the process is terminated, then killed after the grace period.
    pub fn command_with_context(&self, ctx: Context, program: impl AsRef<OsStr>) -> Cmd {
        Cmd::new(self.config.clone(), ctx, program)
    }
}

/// Applies options on top of [`Config::default`].
#[derive(Debug, Default)]
pub struct ExecutorBuilder {
    config: Config,
}

impl ExecutorBuilder {
    /// Time between terminate and kill. Zero kills right after terminating.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.config.grace_period = grace_period;
        self
    }

    pub fn with_process_factory(mut self, factory: impl ProcessFactory + 'static) -> Self {
        self.config.process_factory = Arc::new(factory);
        self
    }

    /// Replace real processes with an async body. See
    /// [`FakeProcessFactory`].
    pub fn with_fake_process<F, Fut>(self, run: F) -> Self
    where
        F: Fn(CancellationToken, CommandSpec) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.with_process_factory(FakeProcessFactory::new(run))
    }

    pub fn with_error_logger(mut self, logger: impl ErrorLogger + 'static) -> Self {
        self.config.error_logger = Arc::new(logger);
        self
    }

    pub fn build(self) -> Executor {
        Executor::with_config(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_applies_options() {
        let executor = Executor::builder()
            .with_grace_period(Duration::from_millis(200))
            .build();
        assert_eq!(executor.config().grace_period(), Duration::from_millis(200));
    }

    #[test]
    fn test_commands_share_config() {
        let executor = Executor::builder().with_grace_period(Duration::ZERO).build();
        let cmd = executor.command("ls");
        assert_eq!(cmd.spec().program(), "ls");
        assert!(cmd.context().err().is_none());
    }

    #[tokio::test]
    async fn test_fake_process_output() {
        let executor = Executor::builder()
            .with_fake_process(|_token, spec| async move {
                use std::io::Write;
                let args: Vec<_> = spec.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
                write!(spec.stdout_writer(), "{}", args.join(" "))?;
                Ok::<(), BoxError>(())
            })
            .build();

        let (out, result) = executor.command("echo").args(["a", "b"]).output().await;
        assert!(result.is_ok());
        assert_eq!(out, b"a b");
    }
}
