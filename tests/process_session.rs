// Process helper and command session tests
use anyhow::{Context, Result};
use pkgfront::process::{
    self, CommandRunner, ExitStatus, Language, ProcessEvent, SystemRunner, run_command,
};
use pkgfront::{CommandSession, PkgError};
use std::time::Duration;

#[test]
fn test_run_command_success() {
    let out = run_command("printf hello");
    assert!(out.success());
    assert_eq!(out.stdout_str(), "hello");
    assert!(out.error_string().is_none());
}

#[test]
fn test_run_command_reports_stderr_on_failure() {
    let out = run_command("echo partial; echo boom >&2; exit 4");
    assert_eq!(out.code, Some(4));
    assert_eq!(out.stdout_str(), "partial\n");
    assert_eq!(out.error_string().as_deref(), Some("boom"));

    match out.into_result("failing script") {
        Err(PkgError::CommandFailed { code, stderr, .. }) => {
            assert_eq!(code, Some(4));
            assert_eq!(stderr, "boom");
        }
        other => panic!("expected CommandFailed, got {:?}", other.map(|o| o.code)),
    }
}

#[test]
fn test_run_command_silent_failure_uses_exit_code() {
    let out = run_command("exit 2");
    assert_eq!(out.error_string().as_deref(), Some("exited with code 2"));
    assert!(process::get_command_output("exit 2").is_empty());
}

#[test]
fn test_run_command_missing_binary() {
    let out = run_command("pkgfront-no-such-binary-xyz");
    assert_eq!(out.code, Some(127));
    assert!(out.error_string().is_some());
}

#[test]
fn test_english_locale_is_forced() {
    let out = run_command("echo $LC_ALL");
    assert_eq!(out.stdout_str().trim(), "C");
}

#[tokio::test]
async fn test_system_runner_spawn_failure() {
    let out = SystemRunner
        .run("pkgfront-no-such-binary-xyz", &[], Language::English)
        .await;
    assert!(!out.success());
    assert!(out.spawn_error.is_some());
    assert!(out.error_string().is_some());
}

#[tokio::test]
async fn test_session_streams_output_and_exit_code() -> Result<()> {
    let (session, mut rx) = CommandSession::new();
    session.execute_command("echo hi; echo err 1>&2; exit 3", Language::English)?;

    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut started = false;
    let finished = tokio::time::timeout(
        Duration::from_secs(10),
        process::wait_finished(&mut rx, |ev| match ev {
            ProcessEvent::Started => started = true,
            ProcessEvent::StandardOutput => stdout.push_str(&session.read_all_standard_output()),
            ProcessEvent::StandardError => stderr.push_str(&session.read_all_standard_error()),
            ProcessEvent::Finished { .. } => {}
        }),
    )
    .await
    .context("session did not finish")?;

    assert!(started);
    assert_eq!(finished, Some((Some(3), ExitStatus::Normal)));
    assert_eq!(stdout, "hi\n");
    assert_eq!(stderr, "err\n");
    // reads drain the buffers
    assert!(session.read_all_standard_output().is_empty());
    assert!(!session.is_running());
    assert!(session.error_string().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_session_buffers_until_read() -> Result<()> {
    let (session, mut rx) = CommandSession::new();
    session.execute_command("printf one; printf two", Language::English)?;
    let finished = tokio::time::timeout(
        Duration::from_secs(10),
        process::wait_finished(&mut rx, |_| {}),
    )
    .await?;
    assert_eq!(finished, Some((Some(0), ExitStatus::Normal)));
    assert_eq!(session.read_all_standard_output(), "onetwo");

    // a new command starts from empty buffers
    session.execute_command("printf three >&2", Language::English)?;
    tokio::time::timeout(
        Duration::from_secs(10),
        process::wait_finished(&mut rx, |_| {}),
    )
    .await?;
    assert_eq!(session.read_all_standard_output(), "");
    assert_eq!(session.read_all_standard_error(), "three");
    Ok(())
}

#[tokio::test]
async fn test_session_kill_reports_crash() -> Result<()> {
    let (session, mut rx) = CommandSession::new();
    session.execute_command("sleep 30", Language::English)?;
    assert!(session.is_running());
    session.kill()?;

    let finished = tokio::time::timeout(
        Duration::from_secs(10),
        process::wait_finished(&mut rx, |_| {}),
    )
    .await
    .context("killed session did not finish")?;
    assert_eq!(finished, Some((None, ExitStatus::Crashed)));
    assert!(!session.is_running());
    // nothing left to kill
    session.kill()?;
    Ok(())
}

#[tokio::test]
async fn test_session_refuses_second_command_while_running() -> Result<()> {
    let (session, mut rx) = CommandSession::new();
    session.execute_command("sleep 30", Language::English)?;

    assert!(matches!(
        session.execute_command("printf late", Language::English),
        Err(PkgError::Busy)
    ));
    // the first child is still tracked and can be stopped
    assert!(session.is_running());
    session.kill()?;

    let mut started = 0;
    let finished = tokio::time::timeout(
        Duration::from_secs(10),
        process::wait_finished(&mut rx, |ev| {
            if *ev == ProcessEvent::Started {
                started += 1;
            }
        }),
    )
    .await
    .context("killed session did not finish")?;
    assert_eq!(started, 1);
    assert_eq!(finished, Some((None, ExitStatus::Crashed)));
    assert!(session.read_all_standard_output().is_empty());

    // once finished the session accepts new work
    session.execute_command("printf again", Language::English)?;
    let finished = tokio::time::timeout(
        Duration::from_secs(10),
        process::wait_finished(&mut rx, |_| {}),
    )
    .await?;
    assert_eq!(finished, Some((Some(0), ExitStatus::Normal)));
    assert_eq!(session.read_all_standard_output(), "again");
    Ok(())
}
