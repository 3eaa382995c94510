//! End-to-end behaviour of `Cmd` driven by fake processes.

use std::io::Write;
use std::time::Duration;

use graceexec_core::{BoxError, Context, Error, ExitCause, Executor};
use tokio_test::{assert_err, assert_ok};

/// Body that ends as soon as it is asked to, reporting the cancellation.
async fn until_cancelled(token: tokio_util::sync::CancellationToken) -> Result<(), BoxError> {
    token.cancelled().await;
    Err("context canceled".into())
}

#[tokio::test]
async fn simple_output() {
    let executor = Executor::builder()
        .with_fake_process(|_token, spec| async move {
            writeln!(spec.stdout_writer(), "2")?;
            Ok::<(), BoxError>(())
        })
        .build();

    let (out, result) = executor.command("echo").arg("1").output().await;
    assert_ok!(result);
    assert_eq!(out, b"2\n");
}

#[tokio::test]
async fn timeout_terminates_body() {
    let executor = Executor::builder()
        .with_fake_process(|token, _spec| until_cancelled(token))
        .build();
    let ctx = Context::background().with_timeout(Duration::from_millis(50));

    let err = assert_err!(executor.command_with_context(ctx, "sleep").arg("10").run().await);
    let status = err.exit_status().expect("exit status");

    assert_eq!(status.code, 1);
    assert!(status.timeout);
    assert!(!status.canceled);
    assert!(!status.killed);
    assert!(!status.signaled);
    assert_eq!(err.to_string(), "context canceled");
    assert!(matches!(status.cause, Some(ExitCause::Process(_))));
}

#[tokio::test]
async fn explicit_cancel_terminates_body() {
    let executor = Executor::builder()
        .with_fake_process(|token, _spec| until_cancelled(token))
        .build();
    let ctx = Context::background();

    let mut cmd = executor.command_with_context(ctx.clone(), "sleep");
    assert_ok!(cmd.start());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.cancel();
    });

    let err = assert_err!(cmd.wait().await);
    let status = err.exit_status().expect("exit status");
    assert!(status.canceled);
    assert!(!status.timeout);
    assert_eq!(status.code, 1);

    canceller.await.unwrap();
}

#[tokio::test]
async fn body_outliving_grace_period_is_reported_killed() {
    // Terminate and kill both cancel the token; a body that ignores it runs
    // to completion, and the status still records the escalation.
    let executor = Executor::builder()
        .with_grace_period(Duration::from_millis(20))
        .with_fake_process(|_token, _spec| async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Err::<(), BoxError>("too late".into())
        })
        .build();
    let ctx = Context::background().with_timeout(Duration::from_millis(10));

    let err = assert_err!(executor.command_with_context(ctx, "stubborn").run().await);
    let status = err.exit_status().expect("exit status");

    assert!(status.timeout);
    assert!(status.killed);
    assert_eq!(status.code, 1);
    assert_eq!(status.to_string(), "too late");
}

#[tokio::test]
async fn already_expired_context_still_starts() {
    let executor = Executor::builder()
        .with_fake_process(|token, _spec| until_cancelled(token))
        .build();
    let ctx = Context::background();
    ctx.cancel();

    let mut cmd = executor.command_with_context(ctx, "x");
    assert_ok!(cmd.start());

    let err = assert_err!(cmd.wait().await);
    assert!(err.exit_status().unwrap().canceled);
}

#[tokio::test]
async fn failing_body_without_cancellation() {
    let executor = Executor::builder()
        .with_fake_process(|_token, spec| async move {
            writeln!(spec.stderr_writer(), "boom")?;
            Err::<(), BoxError>("exit status 1".into())
        })
        .build();

    let (out, result) = executor.command("x").combined_output().await;
    let err = assert_err!(result);
    let status = err.exit_status().unwrap();

    assert_eq!(out, b"boom\n");
    assert_eq!(status.code, 1);
    assert!(!status.timeout && !status.canceled && !status.killed);
}

#[tokio::test]
async fn lifecycle_misuse() {
    let executor = Executor::builder()
        .with_fake_process(|_token, _spec| async { Ok::<(), BoxError>(()) })
        .build();
    let mut cmd = executor.command("x");

    assert!(matches!(cmd.wait().await, Err(Error::NotStarted)));
    assert_ok!(cmd.start());
    assert!(matches!(cmd.start(), Err(Error::AlreadyStarted)));
    assert_ok!(cmd.wait().await);
    assert!(matches!(cmd.wait().await, Err(Error::AlreadyWaited)));
}

#[cfg(unix)]
#[tokio::test]
async fn missing_program_reports_not_found() {
    let err = assert_err!(graceexec_core::command("graceexec-definitely-missing").run().await);
    let status = err.exit_status().expect("exit status");
    assert_eq!(status.code, 127);
    assert!(matches!(status.cause, Some(ExitCause::Io(_))));
}
