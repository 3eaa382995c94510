//! Test program for exercising the terminate/kill lifecycle.
//!
//! Sleeps for `--sleep`, then prints its positional arguments joined by a
//! space. With `--trap`, interrupt and terminate signals are caught and
//! reported as "signal received" on stderr instead of stopping the program.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use graceexec::duration::parse_duration;

#[derive(Parser)]
#[command(name = "graceexec-stub", about = "Sleep, then echo the arguments")]
struct StubArgs {
    /// Catch termination signals
    #[arg(long)]
    trap: bool,

    /// Time to sleep before printing
    #[arg(long, value_parser = parse_duration)]
    sleep: Option<Duration>,

    /// Words to print
    words: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = StubArgs::parse();

    if args.trap {
        trap_signals()?;
    }

    if let Some(sleep) = args.sleep {
        tokio::time::sleep(sleep).await;
    }

    println!("{}", args.words.join(" "));
    Ok(())
}

#[cfg(unix)]
fn trap_signals() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = interrupt.recv() => {}
                Some(()) = terminate.recv() => {}
                else => break,
            }
            eprintln!("signal received");
        }
    });

    Ok(())
}

#[cfg(windows)]
fn trap_signals() -> Result<()> {
    use tokio::signal::windows::{ctrl_break, ctrl_c};

    let mut interrupt = ctrl_c()?;
    let mut brk = ctrl_break()?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = interrupt.recv() => {}
                Some(()) = brk.recv() => {}
                else => break,
            }
            eprintln!("signal received");
        }
    });

    Ok(())
}
