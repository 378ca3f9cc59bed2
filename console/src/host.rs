//! Terminal surface the console manager drives, plus a process-backed host.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use crate::types::{ConsoleError, ConsoleSpec};

/// A running terminal session.
pub trait Terminal: Send {
    fn send_text(&mut self, text: &str) -> Result<(), ConsoleError>;
    /// Tear the session down. Must be idempotent.
    fn close(&mut self);
}

pub struct OpenedTerminal {
    pub terminal: Box<dyn Terminal>,
    /// Resolves when the session ends on its own, with the exit code if known.
    pub closed: oneshot::Receiver<Option<i32>>,
}

/// Opens terminals. Implemented by whatever owns the user's screen.
pub trait TerminalHost: Send {
    fn open(&mut self, spec: &ConsoleSpec) -> Result<OpenedTerminal, ConsoleError>;
}

/// Runs each console as a child process sharing this process's terminal.
///
/// Input is written to the child's stdin; its output goes straight to our
/// stdout and stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTerminalHost;

struct ProcessTerminal {
    text_tx: mpsc::UnboundedSender<String>,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl Terminal for ProcessTerminal {
    fn send_text(&mut self, text: &str) -> Result<(), ConsoleError> {
        self.text_tx
            .send(text.to_string())
            .map_err(|_| ConsoleError::Closed)
    }

    fn close(&mut self) {
        if let Some(kill) = self.kill_tx.take() {
            let _ = kill.send(());
        }
    }
}

impl TerminalHost for ProcessTerminalHost {
    fn open(&mut self, spec: &ConsoleSpec) -> Result<OpenedTerminal, ConsoleError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| ConsoleError::SpawnFailed {
            program: spec.program.clone(),
            source,
        })?;
        let mut stdin = child.stdin.take();
        tracing::info!(title = %spec.title, command = %spec.command_line(), pid = ?child.id(), "Console started");

        let (text_tx, mut text_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(text) = text_rx.recv().await {
                let Some(pipe) = stdin.as_mut() else { break };
                let written = match pipe.write_all(text.as_bytes()).await {
                    Ok(()) => pipe.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    tracing::debug!("Console stdin closed: {e}");
                    break;
                }
            }
        });

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let (closed_tx, closed_rx) = oneshot::channel();
        let title = spec.title.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let code = match status {
                        Ok(status) => status.code(),
                        Err(e) => {
                            tracing::warn!(%title, "Waiting on console failed: {e}");
                            None
                        }
                    };
                    tracing::info!(%title, ?code, "Console exited");
                    let _ = closed_tx.send(code);
                }
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        tracing::debug!(%title, "Killing console failed: {e}");
                    }
                    tracing::info!(%title, "Console terminated");
                }
            }
        });

        Ok(OpenedTerminal {
            terminal: Box::new(ProcessTerminal {
                text_tx,
                kill_tx: Some(kill_tx),
            }),
            closed: closed_rx,
        })
    }
}
