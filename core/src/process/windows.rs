//! Windows process termination.
//!
//! Windows has no process-group signals, so:
//! - terminate: CTRL_BREAK to the child's console process group (the child
//!   is spawned with `CREATE_NEW_PROCESS_GROUP`); many console programs
//!   ignore it
//! - kill: `taskkill /F /T /PID xxx`, which kills the whole tree

use std::process::Stdio;

use ::windows::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};
use ::windows::Win32::System::Threading::{CREATE_NEW_PROCESS_GROUP, CREATE_UNICODE_ENVIRONMENT};
use tokio::process::Command;
use tracing::{debug, warn};

use super::os::ChildKiller;
use crate::error::KillError;

pub(super) fn configure(cmd: &mut Command) {
    cmd.creation_flags(CREATE_UNICODE_ENVIRONMENT.0 | CREATE_NEW_PROCESS_GROUP.0);
}

pub(super) fn terminate(pid: u32) -> Result<(), KillError> {
    debug!(pid = pid, "Sending CTRL_BREAK");

    // Reaches every process in the child's console group, not only the child.
    // SAFETY: plain FFI call with value arguments.
    unsafe { GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid) }.map_err(|e| KillError::Signal {
        pid,
        signal: "CTRL_BREAK",
        reason: e.to_string(),
    })
}

/// Kill the tree with `taskkill`.
///
/// taskkill runs in the background; its outcome is only logged.
pub(super) fn kill(pid: u32, _child: &ChildKiller) -> Result<(), KillError> {
    debug!(pid = pid, "Executing taskkill /F /T");

    let mut taskkill = Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| KillError::CommandFailed(format!("taskkill /F /T /PID {pid}: {e}")))?;

    tokio::spawn(async move {
        match taskkill.wait().await {
            Ok(status) if status.success() => debug!(pid = pid, "taskkill succeeded"),
            Ok(status) => warn!(pid = pid, code = ?status.code(), "taskkill failed"),
            Err(e) => warn!(pid = pid, error = %e, "Failed to wait for taskkill"),
        }
    });

    Ok(())
}
