//! Single-instance lifecycle for the interactive F# console.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

use crate::host::{Terminal, TerminalHost};
use crate::types::{ConsoleError, ConsoleExit, ConsoleExitReason, ConsoleHandle, ConsoleSpec};

/// Statement terminator the interactive compiler waits for.
pub const STATEMENT_TERMINATOR: &str = ";;";

const EXIT_CHANNEL_CAPACITY: usize = 16;

struct LiveConsole {
    handle: ConsoleHandle,
    terminal: Box<dyn Terminal>,
    observer: JoinHandle<()>,
    /// Set by whichever of the observer and `dispose` announces the exit.
    exited: Arc<AtomicBool>,
}

impl LiveConsole {
    fn is_live(&self) -> bool {
        !self.exited.load(Ordering::SeqCst)
    }
}

/// Owns at most one console subprocess.
///
/// Every console ends with exactly one [`ConsoleExit`] on the channel from
/// [`ConsoleManager::subscribe_exits`], whether it died, was closed by the
/// user, or was disposed.
pub struct ConsoleManager<H> {
    host: H,
    spec: ConsoleSpec,
    current: Option<LiveConsole>,
    next_id: u64,
    exits: broadcast::Sender<ConsoleExit>,
}

impl<H: TerminalHost> ConsoleManager<H> {
    pub fn new(host: H, spec: ConsoleSpec) -> Self {
        let (exits, _) = broadcast::channel(EXIT_CHANNEL_CAPACITY);
        Self {
            host,
            spec,
            current: None,
            next_id: 0,
            exits,
        }
    }

    pub fn subscribe_exits(&self) -> broadcast::Receiver<ConsoleExit> {
        self.exits.subscribe()
    }

    /// The live console, if any.
    #[must_use]
    pub fn current(&self) -> Option<ConsoleHandle> {
        self.current
            .as_ref()
            .filter(|c| c.is_live())
            .map(|c| c.handle)
    }

    #[must_use]
    pub fn is_live(&self, handle: ConsoleHandle) -> bool {
        self.current() == Some(handle)
    }

    /// Return the live console, starting one if there is none.
    pub fn ensure_started(&mut self) -> Result<ConsoleHandle, ConsoleError> {
        if let Some(handle) = self.current() {
            tracing::debug!(%handle, "Console already running");
            return Ok(handle);
        }

        // A dead console may still be parked here; release it first.
        self.dispose();

        let opened = self.host.open(&self.spec)?;
        self.next_id += 1;
        let handle = ConsoleHandle::new(self.next_id);
        let exited = Arc::new(AtomicBool::new(false));
        let observer = self.observe(handle, opened.closed, Arc::clone(&exited));

        tracing::info!(%handle, title = %self.spec.title, "Console started");
        self.current = Some(LiveConsole {
            handle,
            terminal: opened.terminal,
            observer,
            exited,
        });
        Ok(handle)
    }

    fn observe(
        &self,
        handle: ConsoleHandle,
        closed: oneshot::Receiver<Option<i32>>,
        exited: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        let exits = self.exits.clone();
        tokio::spawn(async move {
            let code = closed.await.unwrap_or(None);
            if !exited.swap(true, Ordering::SeqCst) {
                tracing::info!(%handle, ?code, "Console terminated or its terminal was closed");
                let _ = exits.send(ConsoleExit {
                    handle,
                    reason: ConsoleExitReason::Exited(code),
                });
            }
        })
    }

    /// Send `text` followed by the statement terminator.
    ///
    /// Fire-and-forget: nothing is read back. Text aimed at a console that
    /// is no longer live is dropped.
    pub fn eval_line(&mut self, handle: ConsoleHandle, text: &str) -> Result<(), ConsoleError> {
        self.send(handle, &format!("{text}\n{STATEMENT_TERMINATOR}\n"))
    }

    /// Send each line, then a single terminator.
    pub fn eval_lines<S: AsRef<str>>(
        &mut self,
        handle: ConsoleHandle,
        lines: &[S],
    ) -> Result<(), ConsoleError> {
        let mut text = String::new();
        for line in lines {
            text.push_str(line.as_ref());
            text.push('\n');
        }
        text.push_str(STATEMENT_TERMINATOR);
        text.push('\n');
        self.send(handle, &text)
    }

    fn send(&mut self, handle: ConsoleHandle, text: &str) -> Result<(), ConsoleError> {
        match self.current.as_mut() {
            Some(console) if console.handle == handle && console.is_live() => {
                console.terminal.send_text(text)
            }
            _ => {
                tracing::debug!(%handle, "Dropping input for a console that is not live");
                Ok(())
            }
        }
    }

    /// Tear down the current console. Safe to call repeatedly.
    ///
    /// The termination observer is detached before the terminal closes, so
    /// the exit announced here is the only one.
    pub fn dispose(&mut self) {
        let Some(mut console) = self.current.take() else {
            return;
        };

        console.observer.abort();
        if console.is_live() {
            tracing::info!(handle = %console.handle, "Terminating console");
        }
        console.terminal.close();

        if !console.exited.swap(true, Ordering::SeqCst) {
            let _ = self.exits.send(ConsoleExit {
                handle: console.handle,
                reason: ConsoleExitReason::Disposed,
            });
        }
    }
}

impl<H> Drop for ConsoleManager<H> {
    fn drop(&mut self) {
        if let Some(mut console) = self.current.take() {
            console.observer.abort();
            console.terminal.close();
        }
    }
}
