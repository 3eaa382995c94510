//! Terminal status of a command run.
//!
//! [`ExitStatus`] doubles as the error value returned by
//! [`Cmd::wait`](crate::Cmd::wait) whenever a command does not exit cleanly.

use std::fmt;
use std::io;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::context::CancelCause;
use crate::process::WaitStatus;

/// Exit code of a clean exit.
pub const EXIT_NORMAL: i32 = 0;

/// Exit code used when the failure cannot be classified.
pub const EXIT_UNKNOWN: i32 = 125;

/// Exit code used when the program exists but could not be invoked.
pub const EXIT_NOT_INVOKED: i32 = 126;

/// Exit code used when the program could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit codes for signal deaths are `EXIT_SIGNAL_BASE + signal number`.
pub const EXIT_SIGNAL_BASE: i32 = 128;

/// Boxed error type returned by fake process bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Underlying reason recorded on an [`ExitStatus`].
#[derive(Debug, Clone, Error)]
pub enum ExitCause {
    /// The context was cancelled explicitly.
    #[error("context canceled")]
    Canceled,

    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The OS refused to start the process, or waiting on it failed.
    #[error("{0}")]
    Io(Arc<io::Error>),

    /// Error reported by the process implementation itself.
    #[error("{0}")]
    Process(Arc<dyn std::error::Error + Send + Sync>),
}

impl ExitCause {
    /// Wrap an arbitrary error reported by a process body.
    pub fn process(err: BoxError) -> Self {
        ExitCause::Process(Arc::from(err))
    }
}

impl From<CancelCause> for ExitCause {
    fn from(cause: CancelCause) -> Self {
        match cause {
            CancelCause::Canceled => ExitCause::Canceled,
            CancelCause::DeadlineExceeded => ExitCause::DeadlineExceeded,
        }
    }
}

impl From<io::Error> for ExitCause {
    fn from(err: io::Error) -> Self {
        ExitCause::Io(Arc::new(err))
    }
}

impl PartialEq for ExitCause {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ExitCause::Canceled, ExitCause::Canceled) => true,
            (ExitCause::DeadlineExceeded, ExitCause::DeadlineExceeded) => true,
            (ExitCause::Io(a), ExitCause::Io(b)) => {
                a.kind() == b.kind() && a.to_string() == b.to_string()
            }
            (ExitCause::Process(a), ExitCause::Process(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

/// How a command run ended.
///
/// `signaled`, `killed`, `timeout` and `canceled` are independent: a command
/// killed after its deadline passed has all of `signaled`, `killed` and
/// `timeout` set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitStatus {
    /// Exit code (`128 + signal` for signal deaths).
    pub code: i32,

    /// The process was terminated by a signal.
    pub signaled: bool,

    /// The process was force-killed after the grace period.
    pub killed: bool,

    /// Termination was caused by the context deadline.
    pub timeout: bool,

    /// Termination was caused by an explicit cancel.
    pub canceled: bool,

    /// Underlying cause, when one is known.
    #[serde(serialize_with = "serialize_cause")]
    pub cause: Option<ExitCause>,
}

impl ExitStatus {
    /// Status carrying only an exit code.
    pub fn from_code(code: i32) -> Self {
        Self {
            code,
            ..Self::default()
        }
    }

    /// Status for a process the OS refused to start.
    ///
    /// The code follows the shell conventions: 127 when the program is
    /// missing, 126 when it cannot be executed, 125 for anything else.
    pub fn from_start_error(err: io::Error) -> Self {
        let code = match err.kind() {
            io::ErrorKind::NotFound => EXIT_NOT_FOUND,
            io::ErrorKind::PermissionDenied => EXIT_NOT_INVOKED,
            _ => EXIT_UNKNOWN,
        };
        Self {
            code,
            cause: Some(ExitCause::from(err)),
            ..Self::default()
        }
    }

    /// Whether this status describes a clean exit.
    pub fn success(&self) -> bool {
        self.code == EXIT_NORMAL && !self.signaled
    }

    pub(crate) fn record_cancellation(&mut self, cause: CancelCause) {
        match cause {
            CancelCause::Canceled => self.canceled = true,
            CancelCause::DeadlineExceeded => self.timeout = true,
        }
        self.cause = Some(cause.into());
    }

    pub(crate) fn record_exit(&mut self, status: WaitStatus) {
        self.code = status.code;
        self.signaled = status.signaled;
        // A cause reported by the process is more specific than the
        // cancellation cause; the flags still record the cancellation.
        if let Some(cause) = status.cause {
            self.cause = Some(cause);
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{cause}"),
            None => write!(f, "exit status {}", self.code),
        }
    }
}

impl std::error::Error for ExitStatus {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

fn serialize_cause<S: Serializer>(cause: &Option<ExitCause>, s: S) -> Result<S::Ok, S::Error> {
    match cause {
        Some(cause) => s.serialize_some(&cause.to_string()),
        None => s.serialize_none(),
    }
}
