//! Support code for the `graceexec` command-line tool.

pub mod commands;
pub mod duration;
pub mod logging;
pub mod settings;
