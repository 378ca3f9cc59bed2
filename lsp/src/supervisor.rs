//! Supervisor facade: the one place the rest of the program starts, stops,
//! and listens to the language server.
//!
//! At most one server is live per supervisor. The running server lives in
//! `server`; taking it out IS the transition to stopped.

use std::path::Path;

use tokio::sync::mpsc;

use crate::router::NotificationRouter;
use crate::server::RunningServer;
use crate::types::{ServerEvent, ServerSpec, ServerStopReason, SupervisorError};

const EVENT_CHANNEL_CAPACITY: usize = 16;

pub struct Supervisor {
    router: NotificationRouter,
    server: Option<RunningServer>,
    next_server_id: u64,
    event_tx: mpsc::Sender<(u64, ServerEvent)>,
    event_rx: mpsc::Receiver<(u64, ServerEvent)>,
}

impl Supervisor {
    #[must_use]
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            router: NotificationRouter::new(),
            server: None,
            next_server_id: 0,
            event_tx,
            event_rx,
        }
    }

    /// Registration table for server notifications. Handlers may be added
    /// at any time and survive restarts.
    #[must_use]
    pub fn router(&self) -> &NotificationRouter {
        &self.router
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.server.as_ref().is_some_and(RunningServer::is_alive)
    }

    /// Launch the server for `workspace_root`, replacing any live one.
    pub async fn start(
        &mut self,
        spec: &ServerSpec,
        workspace_root: &Path,
    ) -> Result<(), SupervisorError> {
        self.stop().await;

        self.next_server_id += 1;
        tracing::info!(
            command = %spec.command.display(),
            root = %workspace_root.display(),
            "Starting language server"
        );
        let server = RunningServer::start(
            self.next_server_id,
            spec,
            workspace_root,
            self.router.clone(),
            self.event_tx.clone(),
        )
        .await?;
        self.server = Some(server);
        Ok(())
    }

    /// Stop the live server, if any. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        if let Some(server) = self.server.take() {
            tracing::info!("Stopping language server");
            server.shutdown().await;
        }
    }

    /// Drain pending transport events without blocking, up to `budget`.
    pub fn poll_events(&mut self, budget: usize) -> Vec<ServerStopReason> {
        let mut stopped = Vec::new();
        while stopped.len() < budget {
            match self.event_rx.try_recv() {
                Ok((id, event)) => {
                    if let Some(reason) = self.handle_event(id, event) {
                        stopped.push(reason);
                    }
                }
                Err(_) => break,
            }
        }
        stopped
    }

    /// Wait until the live server stops on its own.
    ///
    /// Returns `None` immediately when nothing is running.
    pub async fn wait_stopped(&mut self) -> Option<ServerStopReason> {
        while self.server.is_some() {
            let (id, event) = self.event_rx.recv().await?;
            if let Some(reason) = self.handle_event(id, event) {
                return Some(reason);
            }
        }
        None
    }

    /// Events from a server that was already replaced or stopped are stale
    /// and ignored.
    fn handle_event(&mut self, id: u64, event: ServerEvent) -> Option<ServerStopReason> {
        let current = self.server.as_ref().map(RunningServer::id);
        if current != Some(id) {
            tracing::trace!(id, "Ignoring event from a previous server");
            return None;
        }

        match event {
            ServerEvent::Stopped { reason } => {
                match &reason {
                    ServerStopReason::Exited => tracing::info!("Language server exited"),
                    ServerStopReason::Failed(msg) => {
                        tracing::warn!(error = %msg, "Language server failed");
                    }
                }
                // Drop closes the channels; the child has kill_on_drop.
                self.server = None;
                Some(reason)
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}
