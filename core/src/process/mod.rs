//! Process abstraction driven by [`Cmd`](crate::Cmd).
//!
//! A [`Process`] is one live child: it can be started, awaited through a
//! one-shot completion channel, asked to terminate gracefully, or killed.
//!
//! # Implementations
//!
//! - [`OsProcess`]: a real OS child spawned through `tokio::process`. The
//!   "ask nicely" and "kill now" mechanics live in the platform module:
//!   - Unix: the child leads its own process group. Terminate sends SIGINT
//!     (then SIGCONT) to the group, kill sends SIGKILL to the group and to
//!     the child.
//!   - Windows: the child gets its own console process group. Terminate
//!     sends CTRL_BREAK to it, kill runs `taskkill /F /T /PID`.
//! - [`FakeProcess`]: runs an async closure in place of a program, for tests.

use tokio::sync::oneshot;

use crate::command::CommandSpec;
use crate::error::KillError;
use crate::exit_status::{ExitCause, EXIT_NORMAL, EXIT_SIGNAL_BASE, EXIT_UNKNOWN};

pub mod fake;
mod os;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use self::unix as platform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use self::windows as platform;

#[cfg(not(any(unix, windows)))]
compile_error!("Unsupported platform: only Unix and Windows are supported");

pub use fake::{FakeProcess, FakeProcessFactory};
pub use os::{OsProcess, OsProcessFactory};

/// Raw completion report delivered by a [`Process`].
#[derive(Debug, Clone, PartialEq)]
pub struct WaitStatus {
    /// Exit code, or `128 + signal` for signal deaths.
    pub code: i32,

    /// The process died from a signal.
    pub signaled: bool,

    /// Extra detail from the implementation (a fake body's error, a failed
    /// wait).
    pub cause: Option<ExitCause>,
}

impl WaitStatus {
    /// Clean exit.
    pub fn success() -> Self {
        Self {
            code: EXIT_NORMAL,
            signaled: false,
            cause: None,
        }
    }

    /// Translate an OS exit status into (code, signaled).
    pub fn from_exit_status(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self {
                code,
                signaled: false,
                cause: None,
            };
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self {
                    code: EXIT_SIGNAL_BASE + signal,
                    signaled: true,
                    cause: None,
                };
            }
        }

        Self {
            code: EXIT_UNKNOWN,
            signaled: false,
            cause: None,
        }
    }

    /// Waiting on the process itself failed.
    pub fn from_wait_error(err: std::io::Error) -> Self {
        Self {
            code: EXIT_UNKNOWN,
            signaled: false,
            cause: Some(err.into()),
        }
    }
}

/// One child process.
///
/// Each method is called from the task driving the owning `Cmd`; an
/// implementation is never driven from two places at once.
pub trait Process: Send {
    /// Launch the process.
    fn start(&mut self) -> std::io::Result<()>;

    /// One-shot channel resolving once the process has exited by any means.
    ///
    /// Must not block. Only the first call returns a live receiver; later
    /// calls get a receiver whose sender is already gone.
    fn wait(&mut self) -> oneshot::Receiver<WaitStatus>;

    /// Ask the process and its descendants to exit.
    fn terminate(&mut self) -> Result<(), KillError>;

    /// Forcefully stop the process and its descendants.
    fn kill(&mut self) -> Result<(), KillError>;

    /// OS process identifier, while the process is running.
    fn id(&self) -> Option<u32> {
        None
    }
}

/// Builds a [`Process`] for a command.
pub trait ProcessFactory: Send + Sync {
    fn create(&self, spec: CommandSpec) -> Box<dyn Process>;
}

impl<F> ProcessFactory for F
where
    F: Fn(CommandSpec) -> Box<dyn Process> + Send + Sync,
{
    fn create(&self, spec: CommandSpec) -> Box<dyn Process> {
        self(spec)
    }
}

/// Handle to the Tokio runtime the watcher tasks run on.
///
/// Starting a process outside a runtime is reported as an I/O error.
pub(crate) fn current_runtime() -> std::io::Result<tokio::runtime::Handle> {
    tokio::runtime::Handle::try_current()
        .map_err(|e| std::io::Error::other(format!("process must be started inside a Tokio runtime: {e}")))
}

/// Receiver that reports a closed channel immediately.
pub(crate) fn closed_receiver() -> oneshot::Receiver<WaitStatus> {
    let (_, rx) = oneshot::channel();
    rx
}
