//! graceexec CLI - run a program with a timeout and graceful shutdown
//!
//! When the timeout expires or Ctrl-C is pressed, the program is asked to
//! terminate, given a grace period, then killed.

use std::ffi::OsString;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use graceexec::commands;
use graceexec::commands::run::RunOptions;
use graceexec::duration::parse_duration;
use graceexec::logging::{init_logging, LogLevel};

#[derive(Parser)]
#[command(name = "graceexec")]
#[command(author, version, about = "Run a program with a timeout, graceful termination and forced kill")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (overrides GRACEEXEC_LOG)
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program
    Run {
        /// Terminate the program after this long (e.g. 500ms, 10s, 5m)
        #[arg(short, long, value_parser = parse_duration, conflicts_with = "no_timeout")]
        timeout: Option<Duration>,

        /// Ignore the stored default timeout
        #[arg(long)]
        no_timeout: bool,

        /// Time between terminate and kill
        #[arg(short, long, value_parser = parse_duration)]
        grace_period: Option<Duration>,

        /// Share this process's stdin with the program (for piped input)
        #[arg(long)]
        stdin: bool,

        /// Print the exit status as JSON to stderr
        #[arg(long)]
        json: bool,

        /// Program and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<OsString>,
    },

    /// Show or change stored defaults
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show stored defaults
    Show {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Update stored defaults
    Set {
        #[arg(long, value_parser = parse_duration)]
        grace_period: Option<Duration>,

        #[arg(long, value_parser = parse_duration, conflicts_with = "no_timeout")]
        timeout: Option<Duration>,

        /// Remove the stored timeout
        #[arg(long)]
        no_timeout: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    match cli.command {
        Commands::Run {
            timeout,
            no_timeout,
            grace_period,
            stdin,
            json,
            command,
        } => {
            let mut command = command.into_iter();
            let Some(program) = command.next() else {
                anyhow::bail!("missing program to run");
            };

            let code = commands::run::run(RunOptions {
                program,
                args: command.collect(),
                timeout,
                no_timeout,
                grace_period,
                forward_stdin: stdin,
                json,
            })
            .await?;

            return Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)));
        }
        Commands::Config { action } => match action {
            None => commands::config::show(false).await?,
            Some(ConfigAction::Show { json }) => commands::config::show(json).await?,
            Some(ConfigAction::Set {
                grace_period,
                timeout,
                no_timeout,
            }) => commands::config::set(grace_period, timeout, no_timeout).await?,
        },
    }

    Ok(ExitCode::SUCCESS)
}
