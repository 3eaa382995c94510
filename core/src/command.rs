//! Description of the program to run and where its I/O goes.

use std::ffi::{OsStr, OsString};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

/// Where the child's stdin comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Input {
    /// Read from the null device.
    #[default]
    Null,
    /// Share the parent's stdin.
    Inherit,
}

/// Where one of the child's output streams goes.
#[derive(Debug, Clone, Default)]
pub enum OutputSink {
    /// Share the parent's stream.
    #[default]
    Inherit,
    /// Discard.
    Null,
    /// Append to an in-memory buffer.
    Buffer(SharedBuffer),
}

/// Clonable in-memory byte buffer.
///
/// Pointing stdout and stderr at clones of the same buffer interleaves them.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the bytes written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().clone()
    }

    /// Take the bytes written so far, leaving the buffer empty.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn extend_from_slice(&self, bytes: &[u8]) {
        self.0.lock().extend_from_slice(bytes);
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Environment change applied on top of the inherited environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EnvChange {
    Set(OsString, OsString),
    Remove(OsString),
    Clear,
}

/// Program, arguments, environment and stdio of a command.
///
/// Handed by value to a [`ProcessFactory`](crate::ProcessFactory) at start.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: OsString,
    args: Vec<OsString>,
    env: Vec<EnvChange>,
    current_dir: Option<PathBuf>,
    stdin: Input,
    stdout: OutputSink,
    stderr: OutputSink,
}

impl CommandSpec {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
            stdin: Input::default(),
            stdout: OutputSink::default(),
            stderr: OutputSink::default(),
        }
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn get_args(&self) -> impl Iterator<Item = &OsStr> {
        self.args.iter().map(OsString::as_os_str)
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    pub fn get_stdin(&self) -> Input {
        self.stdin
    }

    pub fn get_stdout(&self) -> &OutputSink {
        &self.stdout
    }

    pub fn get_stderr(&self) -> &OutputSink {
        &self.stderr
    }

    pub(crate) fn env_changes(&self) -> &[EnvChange] {
        &self.env
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    pub fn env(&mut self, key: impl AsRef<OsStr>, val: impl AsRef<OsStr>) -> &mut Self {
        self.env.push(EnvChange::Set(
            key.as_ref().to_owned(),
            val.as_ref().to_owned(),
        ));
        self
    }

    pub fn env_remove(&mut self, key: impl AsRef<OsStr>) -> &mut Self {
        self.env.push(EnvChange::Remove(key.as_ref().to_owned()));
        self
    }

    pub fn env_clear(&mut self) -> &mut Self {
        self.env.push(EnvChange::Clear);
        self
    }

    pub fn current_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn stdin(&mut self, input: Input) -> &mut Self {
        self.stdin = input;
        self
    }

    pub fn stdout(&mut self, sink: OutputSink) -> &mut Self {
        self.stdout = sink;
        self
    }

    pub fn stderr(&mut self, sink: OutputSink) -> &mut Self {
        self.stderr = sink;
        self
    }

    /// Writer for the stdout sink, for process implementations that produce
    /// output in-process.
    pub fn stdout_writer(&self) -> Box<dyn Write + Send> {
        sink_writer(&self.stdout, Stream::Stdout)
    }

    /// Writer for the stderr sink.
    pub fn stderr_writer(&self) -> Box<dyn Write + Send> {
        sink_writer(&self.stderr, Stream::Stderr)
    }
}

enum Stream {
    Stdout,
    Stderr,
}

fn sink_writer(sink: &OutputSink, stream: Stream) -> Box<dyn Write + Send> {
    match (sink, stream) {
        (OutputSink::Inherit, Stream::Stdout) => Box::new(io::stdout()),
        (OutputSink::Inherit, Stream::Stderr) => Box::new(io::stderr()),
        (OutputSink::Null, _) => Box::new(io::sink()),
        (OutputSink::Buffer(buf), _) => Box::new(buf.clone()),
    }
}
