//! Feeding the interactive console and running one-shot `dotnet` terminals.

use anyhow::{Context, Result};
use fsls_console::{ConsoleExit, ConsoleExitReason, ConsoleManager, ConsoleSpec, TerminalHost};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::error::RecvError;

/// Evaluate every line of `input` in the console until input ends or the
/// console goes away.
///
/// Returns how the console ended.
pub async fn drive<H, R>(consoles: &mut ConsoleManager<H>, input: R) -> Result<ConsoleExit>
where
    H: TerminalHost,
    R: AsyncBufRead + Unpin,
{
    let mut exits = consoles.subscribe_exits();
    let handle = consoles
        .ensure_started()
        .context("failed to start the F# console")?;
    let mut lines = input.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("failed to read input")? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => consoles.eval_line(handle, &line)?,
                    None => break,
                }
            }
            exit = exits.recv() => {
                match exit {
                    Ok(exit) if exit.handle == handle => return Ok(exit),
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    consoles.dispose();
    Ok(ConsoleExit {
        handle,
        reason: ConsoleExitReason::Disposed,
    })
}

/// Run `spec` in its own terminal and wait for it to finish.
///
/// Ctrl-C closes the terminal. Returns the exit code when known.
pub async fn run_to_completion<H: TerminalHost>(host: &mut H, spec: &ConsoleSpec) -> Result<Option<i32>> {
    tracing::info!(title = %spec.title, command = %spec.command_line(), "Running");
    let mut opened = host
        .open(spec)
        .with_context(|| format!("failed to run {}", spec.command_line()))?;

    tokio::select! {
        code = &mut opened.closed => Ok(code.unwrap_or(None)),
        _ = tokio::signal::ctrl_c() => {
            opened.terminal.close();
            Ok(None)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use fsls_console::ProcessTerminalHost;
    use tokio::io::AsyncWriteExt;

    use super::*;

    #[tokio::test]
    async fn blank_lines_are_skipped_and_statements_terminated() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("received.fsx");
        let spec = ConsoleSpec::new("scratch", "sh")
            .with_args(["-c".to_string(), format!("head -n 4 > '{}'", out.display())]);
        let mut consoles = ConsoleManager::new(ProcessTerminalHost, spec);

        let (mut writer, reader) = tokio::io::duplex(256);
        writer.write_all(b"let x = 1\n\n   \nx + 1\n").await.unwrap();

        let exit = tokio::time::timeout(
            Duration::from_secs(5),
            drive(&mut consoles, tokio::io::BufReader::new(reader)),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(exit.reason, ConsoleExitReason::Exited(Some(0)));
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "let x = 1\n;;\nx + 1\n;;\n"
        );
        drop(writer);
    }

    #[tokio::test]
    async fn end_of_input_disposes_the_console() {
        let spec = ConsoleSpec::new("scratch", "sh").with_args(["-c", "cat >/dev/null"]);
        let mut consoles = ConsoleManager::new(ProcessTerminalHost, spec);

        let exit = drive(&mut consoles, &b"let x = 1\n"[..]).await.unwrap();
        assert_eq!(exit.reason, ConsoleExitReason::Disposed);
        assert_eq!(consoles.current(), None);
    }

    #[tokio::test]
    async fn console_exit_ends_the_session() {
        let spec = ConsoleSpec::new("scratch", "sh").with_args(["-c", "exit 0"]);
        let mut consoles = ConsoleManager::new(ProcessTerminalHost, spec);

        let (_keep_open, reader) = tokio::io::duplex(64);
        let exit = tokio::time::timeout(
            Duration::from_secs(5),
            drive(&mut consoles, tokio::io::BufReader::new(reader)),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(exit.reason, ConsoleExitReason::Exited(Some(0)));
    }

    #[tokio::test]
    async fn run_to_completion_reports_exit_code() {
        let spec = ConsoleSpec::new("scratch", "sh").with_args(["-c", "exit 4"]);
        let code = run_to_completion(&mut ProcessTerminalHost, &spec)
            .await
            .unwrap();
        assert_eq!(code, Some(4));
    }
}
