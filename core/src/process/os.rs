//! Real OS processes spawned through `tokio::process`.

use std::io;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::{closed_receiver, current_runtime, platform, Process, ProcessFactory, WaitStatus};
use crate::command::{CommandSpec, EnvChange, Input, OutputSink, SharedBuffer};
use crate::error::KillError;

/// Factory for [`OsProcess`]; the default in [`Config`](crate::Config).
#[derive(Debug, Default, Clone, Copy)]
pub struct OsProcessFactory;

impl ProcessFactory for OsProcessFactory {
    fn create(&self, spec: CommandSpec) -> Box<dyn Process> {
        Box::new(OsProcess::new(spec))
    }
}

/// Requests a kill of the direct child through the completion watcher, which
/// owns the `Child` handle.
#[derive(Debug)]
pub(super) struct ChildKiller(mpsc::Sender<()>);

impl ChildKiller {
    #[cfg_attr(windows, allow(dead_code))]
    pub(super) fn start_kill(&self) {
        // A full channel already holds a pending kill request.
        let _ = self.0.try_send(());
    }
}

/// A real child process.
///
/// Must be started from within a Tokio runtime: the completion watcher and
/// output pumps run as Tokio tasks.
#[derive(Debug)]
pub struct OsProcess {
    spec: CommandSpec,
    pid: Option<u32>,
    exit_rx: Option<oneshot::Receiver<WaitStatus>>,
    killer: Option<ChildKiller>,
}

impl OsProcess {
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            pid: None,
            exit_rx: None,
            killer: None,
        }
    }

    fn started(&self) -> Result<(u32, &ChildKiller), KillError> {
        match (self.pid, self.killer.as_ref()) {
            (Some(pid), Some(killer)) => Ok((pid, killer)),
            _ => Err(KillError::NotStarted),
        }
    }
}

impl Process for OsProcess {
    fn start(&mut self) -> io::Result<()> {
        if self.killer.is_some() {
            return Err(io::Error::other("process already started"));
        }

        let runtime = current_runtime()?;

        let mut cmd = build_command(&self.spec);
        platform::configure(&mut cmd);

        let mut child = cmd.spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| io::Error::other("spawned process has no pid"))?;
        debug!(pid = pid, program = ?self.spec.program(), "Spawned process");

        let mut pumps = Vec::new();
        if let (OutputSink::Buffer(buf), Some(stdout)) = (self.spec.get_stdout(), child.stdout.take())
        {
            pumps.push(runtime.spawn(pump(stdout, buf.clone())));
        }
        if let (OutputSink::Buffer(buf), Some(stderr)) = (self.spec.get_stderr(), child.stderr.take())
        {
            pumps.push(runtime.spawn(pump(stderr, buf.clone())));
        }

        let (exit_tx, exit_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = mpsc::channel(1);
        runtime.spawn(watch(child, pid, pumps, kill_rx, exit_tx));

        self.pid = Some(pid);
        self.exit_rx = Some(exit_rx);
        self.killer = Some(ChildKiller(kill_tx));
        Ok(())
    }

    fn wait(&mut self) -> oneshot::Receiver<WaitStatus> {
        self.exit_rx.take().unwrap_or_else(closed_receiver)
    }

    fn terminate(&mut self) -> Result<(), KillError> {
        let (pid, _) = self.started()?;
        debug!(pid = pid, "Terminating process");
        platform::terminate(pid)
    }

    fn kill(&mut self) -> Result<(), KillError> {
        let (pid, killer) = self.started()?;
        debug!(pid = pid, "Killing process");
        platform::kill(pid, killer)
    }

    fn id(&self) -> Option<u32> {
        self.pid
    }
}

fn build_command(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new(spec.program());
    cmd.args(spec.get_args());

    for change in spec.env_changes() {
        match change {
            EnvChange::Set(key, val) => cmd.env(key, val),
            EnvChange::Remove(key) => cmd.env_remove(key),
            EnvChange::Clear => cmd.env_clear(),
        };
    }
    if let Some(dir) = spec.get_current_dir() {
        cmd.current_dir(dir);
    }

    cmd.stdin(match spec.get_stdin() {
        Input::Null => Stdio::null(),
        Input::Inherit => Stdio::inherit(),
    });
    cmd.stdout(output_stdio(spec.get_stdout()));
    cmd.stderr(output_stdio(spec.get_stderr()));
    cmd
}

fn output_stdio(sink: &OutputSink) -> Stdio {
    match sink {
        OutputSink::Inherit => Stdio::inherit(),
        OutputSink::Null => Stdio::null(),
        OutputSink::Buffer(_) => Stdio::piped(),
    }
}

/// Copy a pipe into a buffer until EOF.
async fn pump<R: AsyncRead + Unpin>(mut reader: R, buf: SharedBuffer) {
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) => {
                debug!(error = %e, "Output pipe read failed");
                break;
            }
        }
    }
}

/// Reap the child, serving direct-child kill requests meanwhile, then drain
/// the output pumps and deliver the status.
async fn watch(
    mut child: Child,
    pid: u32,
    pumps: Vec<JoinHandle<()>>,
    mut kill_rx: mpsc::Receiver<()>,
    exit_tx: oneshot::Sender<WaitStatus>,
) {
    let result = loop {
        tokio::select! {
            result = child.wait() => break result,
            Some(()) = kill_rx.recv() => {
                if let Err(e) = child.start_kill() {
                    debug!(pid = pid, error = %e, "Direct child kill failed");
                }
            }
        }
    };

    for pump in pumps {
        let _ = pump.await;
    }

    let status = match result {
        Ok(status) => WaitStatus::from_exit_status(status),
        Err(e) => WaitStatus::from_wait_error(e),
    };
    debug!(
        pid = pid,
        code = status.code,
        signaled = status.signaled,
        "Process exited"
    );

    // The receiver may be gone if the command was dropped mid-run.
    let _ = exit_tx.send(status);
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn sh(script: &str) -> CommandSpec {
        let mut spec = CommandSpec::new("sh");
        spec.arg("-c").arg(script);
        spec
    }

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let buf = SharedBuffer::new();
        let mut spec = sh("echo hello; exit 3");
        spec.stdout(OutputSink::Buffer(buf.clone()));

        let mut process = OsProcess::new(spec);
        process.start().unwrap();
        assert!(process.id().is_some());

        let status = process.wait().await.unwrap();
        assert_eq!(status.code, 3);
        assert!(!status.signaled);
        assert_eq!(buf.contents(), b"hello\n");
    }

    #[tokio::test]
    async fn test_second_wait_is_closed() {
        let mut process = OsProcess::new(sh("exit 0"));
        process.start().unwrap();
        let first = process.wait();
        assert!(process.wait().await.is_err());
        assert_eq!(first.await.unwrap(), WaitStatus::success());
    }

    #[tokio::test]
    async fn test_start_missing_program() {
        let mut process = OsProcess::new(CommandSpec::new("/nonexistent/graceexec-test-binary"));
        let err = process.start().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_start_outside_runtime_is_an_error() {
        let mut process = OsProcess::new(sh("exit 0"));
        let err = process.start().unwrap_err();
        assert!(err.to_string().contains("Tokio runtime"));
        assert!(process.id().is_none());
    }

    #[tokio::test]
    async fn test_signals_before_start() {
        let mut process = OsProcess::new(sh("exit 0"));
        assert!(matches!(process.terminate(), Err(KillError::NotStarted)));
        assert!(matches!(process.kill(), Err(KillError::NotStarted)));
    }

    /// Poll a file until a child script has written its pid into it.
    #[cfg(target_os = "linux")]
    async fn read_pid(path: &std::path::Path) -> u32 {
        for _ in 0..500 {
            if let Ok(Ok(pid)) = std::fs::read_to_string(path).map(|s| s.trim().parse::<u32>()) {
                return pid;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("pid file {} was never written", path.display());
    }

    /// Whether `pid` is gone or a zombie, polling briefly since an orphan is
    /// reaped asynchronously.
    #[cfg(target_os = "linux")]
    async fn is_dead(pid: u32) -> bool {
        for _ in 0..200 {
            let state = std::fs::read_to_string(format!("/proc/{pid}/stat"))
                .ok()
                .and_then(|stat| stat.rsplit(')').next().map(|rest| rest.trim_start().to_string()));
            match state {
                None => return true,
                Some(rest) if rest.starts_with('Z') || rest.starts_with('X') => return true,
                Some(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
        false
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_terminate_reaches_grandchild() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("grandchild.pid");
        let script = format!(
            "sh -c 'echo $$ > \"{}\"; exec sleep 30'; echo done",
            pid_file.display()
        );

        let mut process = OsProcess::new(sh(&script));
        process.start().unwrap();
        let exit = process.wait();
        let grandchild = read_pid(&pid_file).await;

        process.terminate().unwrap();

        let status = timeout(Duration::from_secs(5), exit).await.unwrap().unwrap();
        assert!(status.signaled || status.code != 0);
        assert!(is_dead(grandchild).await, "grandchild {grandchild} survived terminate");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_kill_reaches_grandchild_ignoring_interrupt() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("grandchild.pid");
        let script = format!(
            "trap '' INT; sleep 30 & echo $! > \"{}\"; wait",
            pid_file.display()
        );

        let mut process = OsProcess::new(sh(&script));
        process.start().unwrap();
        let mut exit = process.wait();
        let grandchild = read_pid(&pid_file).await;

        process.terminate().unwrap();
        assert!(timeout(Duration::from_millis(200), &mut exit).await.is_err());

        process.kill().unwrap();

        let status = timeout(Duration::from_secs(5), exit).await.unwrap().unwrap();
        assert!(status.signaled);
        assert_eq!(status.code, 128 + 9);
        assert!(is_dead(grandchild).await, "grandchild {grandchild} survived kill");
    }

    #[tokio::test]
    async fn test_kill_ignores_trapped_signals() {
        let mut process = OsProcess::new(sh("trap '' INT TERM; sleep 5"));
        process.start().unwrap();
        let exit = process.wait();

        process.kill().unwrap();

        let status = timeout(Duration::from_secs(5), exit).await.unwrap().unwrap();
        assert!(status.signaled);
        assert_eq!(status.code, 128 + 9);
    }
}
