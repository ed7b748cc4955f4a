// Terminal session tests; `env` stands in for the emulator and runs the
// `sh -c <script>` it is handed.
use anyhow::{Context, Result};
use pkgfront::actions;
use pkgfront::privilege::{self, shell_quote};
use pkgfront::process::ExitStatus;
use pkgfront::terminal::{self, ExecStyle, Terminal, TerminalEvent, TerminalSession};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn passthrough_terminal() -> Terminal {
    Terminal {
        binary: "env".to_string(),
        style: ExecStyle::Direct,
    }
}

async fn run_to_end(
    rx: &mut UnboundedReceiver<TerminalEvent>,
) -> Result<(Option<i32>, ExitStatus)> {
    let first = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .context("no terminal event")?;
    assert_eq!(first, Some(TerminalEvent::Started));
    tokio::time::timeout(Duration::from_secs(10), terminal::wait_finished(rx))
        .await
        .context("terminal did not finish")?
        .context("event channel closed")
}

#[tokio::test]
async fn test_terminal_keeps_command_exit_status() -> Result<()> {
    let (session, mut rx) = TerminalSession::new(passthrough_terminal(), None);
    session.run_command_in_terminal_as_normal_user(&["false".to_string()])?;
    // the hold prompt must not mask the failure
    assert_eq!(run_to_end(&mut rx).await?, (Some(1), ExitStatus::Normal));

    let (session, mut rx) = TerminalSession::new(passthrough_terminal(), None);
    session.run_command_in_terminal_as_normal_user(&["true".to_string()])?;
    assert_eq!(run_to_end(&mut rx).await?, (Some(0), ExitStatus::Normal));
    Ok(())
}

#[tokio::test]
async fn test_terminal_stops_at_first_failure() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("reached");
    let (session, mut rx) = TerminalSession::new(passthrough_terminal(), None);
    session.run_command_in_terminal_as_normal_user(&[
        "exit 4".to_string(),
        format!("touch {}", shell_quote(&marker.to_string_lossy())),
    ])?;
    assert_eq!(run_to_end(&mut rx).await?.0, Some(4));
    assert!(!marker.exists());
    Ok(())
}

#[tokio::test]
async fn test_terminal_removes_actions_file_after_exit() -> Result<()> {
    // elevation would need an interactive prompt; only root runs it directly
    if !privilege::is_root_running() {
        return Ok(());
    }
    let dir = tempfile::tempdir()?;
    let seen = dir.path().join("seen");
    let (session, mut rx) = TerminalSession::new(passthrough_terminal(), None);
    // $0 of a script run as `sh <file>` is the file itself
    session.run_command_in_terminal(&[
        format!("echo \"$0\" > {}", shell_quote(&seen.to_string_lossy())),
        "exit 5".to_string(),
    ])?;
    assert_eq!(run_to_end(&mut rx).await?, (Some(5), ExitStatus::Normal));

    let staged = std::fs::read_to_string(&seen)?;
    let staged = Path::new(staged.trim());
    let name = staged
        .file_name()
        .and_then(|n| n.to_str())
        .context("no actions file name recorded")?;
    assert!(name.starts_with(actions::PREFIX));
    assert!(!staged.exists());
    Ok(())
}

#[tokio::test]
async fn test_missing_emulator_is_a_spawn_error() {
    let term = Terminal::new("pkgfront-no-such-terminal");
    let (session, _rx) = TerminalSession::new(term, None);
    assert!(
        session
            .run_command_in_terminal_as_normal_user(&["true".to_string()])
            .is_err()
    );
}
