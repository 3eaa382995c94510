//! The command orchestrator.
//!
//! [`Cmd::wait`] races three events until the process has exited:
//!
//! 1. the process's completion notification (the only way out of the loop),
//! 2. the context finishing (deadline or explicit cancel): the process is
//!    asked to terminate and a grace timer is armed,
//! 3. the grace timer expiring: the process is killed.
//!
//! Steps 2 and 3 happen at most once each. A process that exits during the
//! grace window is reported without `killed`.

use std::ffi::OsStr;
use std::fmt;
use std::future::pending;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use tokio::time::{sleep, Sleep};
use tracing::{debug, warn};

use crate::command::{CommandSpec, Input, OutputSink, SharedBuffer};
use crate::config::Config;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::exit_status::ExitStatus;
use crate::process::{Process, WaitStatus};

/// A command bound to a cancellation context and a shared [`Config`].
///
/// Build one with [`command`](crate::command),
/// [`command_with_context`](crate::command_with_context) or an
/// [`Executor`](crate::Executor). `start` and `wait` each succeed at most once.
pub struct Cmd {
    spec: CommandSpec,
    config: Arc<Config>,
    context: Context,
    process: Option<Box<dyn Process>>,
    started: bool,
    waited: bool,
}

impl Cmd {
    pub(crate) fn new(config: Arc<Config>, context: Context, program: impl AsRef<OsStr>) -> Self {
        Self {
            spec: CommandSpec::new(program),
            config,
            context,
            process: None,
            started: false,
            waited: false,
        }
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.spec.arg(arg);
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.spec.args(args);
        self
    }

    pub fn env(&mut self, key: impl AsRef<OsStr>, val: impl AsRef<OsStr>) -> &mut Self {
        self.spec.env(key, val);
        self
    }

    pub fn env_remove(&mut self, key: impl AsRef<OsStr>) -> &mut Self {
        self.spec.env_remove(key);
        self
    }

    pub fn env_clear(&mut self) -> &mut Self {
        self.spec.env_clear();
        self
    }

    pub fn current_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.spec.current_dir(dir);
        self
    }

    pub fn stdin(&mut self, input: Input) -> &mut Self {
        self.spec.stdin(input);
        self
    }

    pub fn stdout(&mut self, sink: OutputSink) -> &mut Self {
        self.spec.stdout(sink);
        self
    }

    pub fn stderr(&mut self, sink: OutputSink) -> &mut Self {
        self.spec.stderr(sink);
        self
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// OS process id once started (never set for fake processes).
    pub fn id(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.id())
    }

    /// Create the process through the configured factory and start it.
    ///
    /// A start failure is reported as an [`ExitStatus`] with a shell-style
    /// code (127 for a missing program, 126 when it cannot be executed, 125
    /// otherwise, including a call from outside a Tokio runtime).
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(Error::AlreadyStarted);
        }
        self.started = true;

        let mut process = self.config.process_factory.create(self.spec.clone());
        if let Err(e) = process.start() {
            debug!(program = ?self.spec.program(), error = %e, "Failed to start process");
            return Err(ExitStatus::from_start_error(e).into());
        }

        self.process = Some(process);
        Ok(())
    }

    /// Wait for the process to exit, terminating and then killing it if the
    /// context finishes first.
    ///
    /// Returns `Ok(())` for a clean exit (code 0), `Err(Error::Exit(_))`
    /// otherwise.
    pub async fn wait(&mut self) -> Result<()> {
        if self.waited {
            return Err(Error::AlreadyWaited);
        }
        let process = match self.process.as_mut() {
            Some(process) => process,
            None => return Err(Error::NotStarted),
        };
        self.waited = true;

        let config = &self.config;
        let context = &self.context;

        let mut status = ExitStatus::default();
        let mut exit_rx = process.wait();
        let mut grace: Option<Pin<Box<Sleep>>> = None;
        let mut cancelled = false;
        let mut escalated = false;

        loop {
            tokio::select! {
                biased;

                exit = &mut exit_rx => {
                    let exit = exit.unwrap_or_else(|_| {
                        WaitStatus::from_wait_error(io::Error::other(
                            "process exited without reporting a status",
                        ))
                    });
                    status.record_exit(exit);

                    debug!(
                        code = status.code,
                        signaled = status.signaled,
                        killed = status.killed,
                        timeout = status.timeout,
                        canceled = status.canceled,
                        "Command finished"
                    );

                    if status.success() {
                        return Ok(());
                    }
                    return Err(status.into());
                }

                () = expired(&mut grace), if grace.is_some() && !escalated => {
                    escalated = true;
                    debug!(grace_period = ?config.grace_period, "Grace period elapsed, killing process");

                    if let Err(e) = process.kill() {
                        warn!(error = %e, "Failed to kill process");
                        config.report(&e);
                    }
                    status.killed = true;
                }

                cause = context.done(), if !cancelled => {
                    cancelled = true;
                    debug!(cause = ?cause, "Context done, terminating process");

                    if let Err(e) = process.terminate() {
                        warn!(error = %e, "Failed to terminate process");
                        config.report(&e);
                    }
                    status.record_cancellation(cause);
                    grace = Some(Box::pin(sleep(config.grace_period)));
                }
            }
        }
    }

    /// Start the command and wait for it.
    pub async fn run(&mut self) -> Result<()> {
        self.start()?;
        self.wait().await
    }

    /// Run the command capturing stdout.
    ///
    /// The captured bytes are returned even when the command fails.
    pub async fn output(&mut self) -> (Vec<u8>, Result<()>) {
        let buf = SharedBuffer::new();
        self.spec.stdout(OutputSink::Buffer(buf.clone()));
        let result = self.run().await;
        (buf.take(), result)
    }

    /// Run the command capturing stdout and stderr interleaved.
    pub async fn combined_output(&mut self) -> (Vec<u8>, Result<()>) {
        let buf = SharedBuffer::new();
        self.spec
            .stdout(OutputSink::Buffer(buf.clone()))
            .stderr(OutputSink::Buffer(buf.clone()));
        let result = self.run().await;
        (buf.take(), result)
    }
}

impl fmt::Debug for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cmd")
            .field("spec", &self.spec)
            .field("context", &self.context)
            .field("started", &self.started)
            .field("waited", &self.waited)
            .finish_non_exhaustive()
    }
}

/// Resolves when the armed grace timer fires; never resolves while unarmed.
async fn expired(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}
