//! Run command - execute a program under the terminate/kill lifecycle.

use std::ffi::OsString;
use std::time::Duration;

use anyhow::Result;
use graceexec_core::{Context, Error, ExitStatus, Executor, Input, TracingLogger};
use tracing::{debug, info};

use crate::settings::SettingsStore;

/// Exit code when the timeout expired.
pub const EXIT_TIMEOUT: i32 = 124;

/// Exit code when the run was interrupted with Ctrl-C.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Options for one `graceexec run`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub timeout: Option<Duration>,
    pub no_timeout: bool,
    pub grace_period: Option<Duration>,
    pub forward_stdin: bool,
    pub json: bool,
}

/// Run the program and return the exit code for this process.
pub async fn run(opts: RunOptions) -> Result<i32> {
    let settings = SettingsStore::new()?.load().await?;

    let grace_period = opts.grace_period.unwrap_or_else(|| settings.grace_period());
    let timeout = if opts.no_timeout {
        None
    } else {
        opts.timeout.or_else(|| settings.timeout())
    };

    let executor = Executor::builder()
        .with_grace_period(grace_period)
        .with_error_logger(TracingLogger)
        .build();

    let mut ctx = Context::background();
    if let Some(timeout) = timeout {
        ctx = ctx.with_timeout(timeout);
    }

    info!(
        program = ?opts.program,
        timeout = ?timeout,
        grace_period = ?grace_period,
        "Running command"
    );

    let mut cmd = executor.command_with_context(ctx.clone(), &opts.program);
    cmd.args(&opts.args).stdin(stdin_input(opts.forward_stdin));

    let interrupt = ctx.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    let result = cmd.run().await;
    ctrl_c.abort();

    let status = match result {
        Ok(()) => ExitStatus::default(),
        Err(Error::Exit(status)) => status,
        Err(e) => return Err(e.into()),
    };

    if opts.json {
        eprintln!("{}", serde_json::to_string_pretty(&status)?);
    } else if !status.success() {
        eprintln!("graceexec: {}", describe(&status));
    }

    Ok(exit_code(&status))
}

/// Stdin for the child: null unless forwarding was asked for.
///
/// The child leads its own process group, so reading a terminal would stop
/// it with SIGTTIN.
pub fn stdin_input(forward: bool) -> Input {
    if forward {
        Input::Inherit
    } else {
        Input::Null
    }
}

/// Map a status to this process's exit code.
pub fn exit_code(status: &ExitStatus) -> i32 {
    if status.success() {
        0
    } else if status.timeout {
        EXIT_TIMEOUT
    } else if status.canceled {
        EXIT_INTERRUPTED
    } else {
        status.code
    }
}

fn describe(status: &ExitStatus) -> String {
    let mut notes = Vec::new();
    if status.timeout {
        notes.push("timed out");
    }
    if status.canceled {
        notes.push("interrupted");
    }
    if status.signaled {
        notes.push("signaled");
    }
    if status.killed {
        notes.push("killed after grace period");
    }

    if notes.is_empty() {
        status.to_string()
    } else {
        format!("{} ({})", status, notes.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(exit_code(&ExitStatus::default()), 0);
        assert_eq!(exit_code(&ExitStatus::from_code(3)), 3);

        let timed_out = ExitStatus {
            code: 130,
            signaled: true,
            timeout: true,
            ..ExitStatus::default()
        };
        assert_eq!(exit_code(&timed_out), EXIT_TIMEOUT);

        let interrupted = ExitStatus {
            code: 137,
            signaled: true,
            killed: true,
            canceled: true,
            ..ExitStatus::default()
        };
        assert_eq!(exit_code(&interrupted), EXIT_INTERRUPTED);
    }

    #[test]
    fn test_stdin_is_null_unless_forwarded() {
        assert_eq!(stdin_input(false), Input::Null);
        assert_eq!(stdin_input(true), Input::Inherit);
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&ExitStatus::from_code(2)), "exit status 2");

        let killed = ExitStatus {
            code: 137,
            signaled: true,
            killed: true,
            ..ExitStatus::default()
        };
        assert_eq!(describe(&killed), "exit status 137 (signaled, killed after grace period)");
    }
}
