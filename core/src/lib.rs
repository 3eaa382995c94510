//! graceexec-core: run child processes bound to a cancellation context.
//!
//! When the context finishes (deadline or explicit cancel) before the process
//! exits, the process is asked to terminate, given a grace period, then
//! killed. The outcome is reported as an [`ExitStatus`] recording the exit
//! code and whether the process was signaled, killed, timed out or canceled.
//!
//! ```no_run
//! use std::time::Duration;
//! use graceexec_core::{command_with_context, Context};
//!
//! # async fn example() {
//! let ctx = Context::background().with_timeout(Duration::from_secs(5));
//! match command_with_context(ctx, "sleep").arg("60").run().await {
//!     Ok(()) => println!("done"),
//!     Err(e) => eprintln!("{e}: {:?}", e.exit_status()),
//! }
//! # }
//! ```

mod cmd;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
mod executor;
pub mod exit_status;
pub mod process;

use std::ffi::OsStr;

pub use cmd::Cmd;
pub use command::{CommandSpec, Input, OutputSink, SharedBuffer};
pub use config::{Config, DiscardLogger, ErrorLogger, TracingLogger, DEFAULT_GRACE_PERIOD};
pub use context::{CancelCause, Context};
pub use error::{Error, KillError, Result};
pub use executor::{Executor, ExecutorBuilder};
pub use exit_status::{BoxError, ExitCause, ExitStatus};
pub use process::{
    FakeProcess, FakeProcessFactory, OsProcess, OsProcessFactory, Process, ProcessFactory, WaitStatus,
};

/// Command using the default configuration and a background context.
pub fn command(program: impl AsRef<OsStr>) -> Cmd {
    Executor::new().command(program)
}

/// Command using the default configuration, bound to `ctx`.
pub fn command_with_context(ctx: Context, program: impl AsRef<OsStr>) -> Cmd {
    Executor::new().command_with_context(ctx, program)
}
