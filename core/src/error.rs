//! Error types for the graceexec-core library.

use thiserror::Error;

use crate::exit_status::ExitStatus;

/// Result type alias for graceexec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`Cmd`](crate::Cmd) lifecycle methods.
#[derive(Error, Debug)]
pub enum Error {
    /// `wait` was called before a successful `start`.
    #[error("command not started")]
    NotStarted,

    /// `start` was called on a command that already started (or failed to).
    #[error("command already started")]
    AlreadyStarted,

    /// `wait` was called a second time.
    #[error("command already waited")]
    AlreadyWaited,

    /// The command did not exit cleanly.
    #[error(transparent)]
    Exit(#[from] ExitStatus),
}

impl Error {
    /// The exit status carried by this error, if it is one.
    pub fn exit_status(&self) -> Option<&ExitStatus> {
        match self {
            Error::Exit(status) => Some(status),
            _ => None,
        }
    }
}

/// Failures while asking a process to stop.
///
/// These never reach the caller of `wait`; they are reported to the
/// configured [`ErrorLogger`](crate::ErrorLogger).
#[derive(Error, Debug)]
pub enum KillError {
    /// The process was never started, so there is nothing to signal.
    #[error("process not started")]
    NotStarted,

    /// Sending a signal to the process group failed.
    #[error("failed to send {signal} to process group {pid}: {reason}")]
    Signal {
        pid: u32,
        signal: &'static str,
        reason: String,
    },

    /// Failed to execute an external kill command.
    #[error("kill command failed: {0}")]
    CommandFailed(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
