//! In-process stand-in for a real child process.
//!
//! [`FakeProcessFactory`] runs an async closure as the process "body". The
//! closure receives a [`CancellationToken`] and the [`CommandSpec`] it was
//! created for, and writes output through
//! [`CommandSpec::stdout_writer`]/[`CommandSpec::stderr_writer`].
//!
//! ```no_run
//! use std::io::Write;
//! use graceexec_core::{Executor, FakeProcessFactory};
//!
//! # async fn example() {
//! let executor = Executor::builder()
//!     .with_process_factory(FakeProcessFactory::new(|_token, spec| async move {
//!         writeln!(spec.stdout_writer(), "2")?;
//!         Ok::<(), graceexec_core::BoxError>(())
//!     }))
//!     .build();
//!
//! let (out, result) = executor.command("echo").arg("1").output().await;
//! assert!(result.is_ok());
//! assert_eq!(out, b"2\n");
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{closed_receiver, current_runtime, Process, ProcessFactory, WaitStatus};
use crate::command::CommandSpec;
use crate::error::KillError;
use crate::exit_status::{BoxError, ExitCause};

/// Exit code reported when a fake body returns an error.
pub const FAKE_FAILURE_CODE: i32 = 1;

/// Boxed future returned by a fake body.
pub type RunFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

type RunFn = dyn Fn(CancellationToken, CommandSpec) -> RunFuture + Send + Sync;

/// Factory producing [`FakeProcess`]es that all share one body.
#[derive(Clone)]
pub struct FakeProcessFactory {
    run: Arc<RunFn>,
}

impl FakeProcessFactory {
    pub fn new<F, Fut>(run: F) -> Self
    where
        F: Fn(CancellationToken, CommandSpec) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let run: Arc<RunFn> = Arc::new(move |token, spec| -> RunFuture { Box::pin(run(token, spec)) });
        Self { run }
    }
}

impl fmt::Debug for FakeProcessFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeProcessFactory").finish_non_exhaustive()
    }
}

impl ProcessFactory for FakeProcessFactory {
    fn create(&self, spec: CommandSpec) -> Box<dyn Process> {
        Box::new(FakeProcess::new(self.run.clone(), spec))
    }
}

/// A process whose body is an async closure running on Tokio.
///
/// Terminate and kill both cancel the body's token; the body decides how to
/// react.
pub struct FakeProcess {
    run: Arc<RunFn>,
    spec: Option<CommandSpec>,
    token: CancellationToken,
    exit_rx: Option<oneshot::Receiver<WaitStatus>>,
}

impl FakeProcess {
    fn new(run: Arc<RunFn>, spec: CommandSpec) -> Self {
        Self {
            run,
            spec: Some(spec),
            token: CancellationToken::new(),
            exit_rx: None,
        }
    }

    fn cancel(&self) -> Result<(), KillError> {
        if self.spec.is_some() {
            return Err(KillError::NotStarted);
        }
        self.token.cancel();
        Ok(())
    }
}

impl fmt::Debug for FakeProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeProcess")
            .field("started", &self.spec.is_none())
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Process for FakeProcess {
    fn start(&mut self) -> io::Result<()> {
        let runtime = current_runtime()?;
        let spec = self
            .spec
            .take()
            .ok_or_else(|| io::Error::other("process already started"))?;

        let (exit_tx, exit_rx) = oneshot::channel();
        let body = (self.run)(self.token.clone(), spec);
        let token = self.token.clone();

        runtime.spawn(async move {
            let result = body.await;
            token.cancel();

            let status = match result {
                Ok(()) => WaitStatus::success(),
                Err(e) => {
                    debug!(error = %e, "Fake process body failed");
                    WaitStatus {
                        code: FAKE_FAILURE_CODE,
                        signaled: false,
                        cause: Some(ExitCause::process(e)),
                    }
                }
            };
            let _ = exit_tx.send(status);
        });

        self.exit_rx = Some(exit_rx);
        Ok(())
    }

    fn wait(&mut self) -> oneshot::Receiver<WaitStatus> {
        self.exit_rx.take().unwrap_or_else(closed_receiver)
    }

    fn terminate(&mut self) -> Result<(), KillError> {
        self.cancel()
    }

    fn kill(&mut self) -> Result<(), KillError> {
        self.cancel()
    }
}
