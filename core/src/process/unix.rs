//! Unix process-group signalling.
//!
//! Every child is spawned as the leader of its own process group, so a
//! single `killpg` reaches the child and everything it forked:
//! - terminate: SIGINT to the group, followed by SIGCONT so a stopped
//!   process wakes up and can act on it
//! - kill: SIGKILL to the group, plus a kill of the direct child handle

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tracing::debug;

use super::os::ChildKiller;
use crate::error::KillError;

/// Signal used to ask a process group to exit.
const TERMINATE_SIGNAL: Signal = Signal::SIGINT;

/// Put the child in a new process group whose id is its pid.
pub(super) fn configure(cmd: &mut Command) {
    cmd.process_group(0);
}

pub(super) fn terminate(pid: u32) -> Result<(), KillError> {
    signal_group(pid, TERMINATE_SIGNAL)?;
    signal_group(pid, Signal::SIGCONT)
}

pub(super) fn kill(pid: u32, child: &ChildKiller) -> Result<(), KillError> {
    let result = signal_group(pid, Signal::SIGKILL);
    child.start_kill();
    result
}

/// Send a signal to the process group led by `pid`.
///
/// A group that no longer exists is not an error: everything in it has
/// already exited.
fn signal_group(pid: u32, signal: Signal) -> Result<(), KillError> {
    debug!(pid = pid, signal = signal.as_str(), "Signalling process group");

    let raw = i32::try_from(pid).map_err(|_| KillError::Signal {
        pid,
        signal: signal.as_str(),
        reason: "pid out of range".to_string(),
    })?;

    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => {
            debug!(pid = pid, "Process group already gone");
            Ok(())
        }
        Err(e) => Err(KillError::Signal {
            pid,
            signal: signal.as_str(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_missing_group_is_ok() {
        // A pid this high is not in use on any sane system.
        let fake_pid = 999_999_999;
        assert!(signal_group(fake_pid, Signal::SIGCONT).is_ok());
        assert!(terminate(fake_pid).is_ok());
    }

    #[test]
    fn test_pid_out_of_range() {
        let err = signal_group(u32::MAX, Signal::SIGINT).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
