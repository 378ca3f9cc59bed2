//! Server handle: owns the child process and its stdio transport.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::codec::{FrameReader, FrameWriter};
use crate::protocol::{self, ErrorResponse, Notification, Request};
use crate::router::NotificationRouter;
use crate::types::{ServerEvent, ServerSpec, ServerStopReason, SupervisorError};

const INIT_TIMEOUT: Duration = Duration::from_secs(30);

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

const WRITER_CHANNEL_CAPACITY: usize = 64;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

enum WriterCommand {
    Send(Value),
    Shutdown,
}

enum IncomingFrame {
    Response { id: u64, body: Value },
    ServerRequest { id: Value, method: String },
    Notification { method: String, params: Option<Value> },
}

fn parse_incoming(frame: &Value) -> Option<IncomingFrame> {
    let id = frame.get("id");
    let method = frame.get("method").and_then(Value::as_str).map(String::from);
    let has_result_or_error = frame.get("result").is_some() || frame.get("error").is_some();

    match (id, method, has_result_or_error) {
        (Some(id_val), None, true) => Some(IncomingFrame::Response {
            id: id_val.as_u64()?,
            body: frame.clone(),
        }),
        (Some(id_val), Some(method), _) => Some(IncomingFrame::ServerRequest {
            id: id_val.clone(),
            method,
        }),
        (None, Some(method), _) => Some(IncomingFrame::Notification {
            method,
            params: frame.get("params").cloned(),
        }),
        _ => None,
    }
}

/// Bare names go through `PATH`; anything with a directory part is used as given.
fn resolve_command(command: &Path) -> io::Result<PathBuf> {
    if command.components().count() > 1 || command.is_absolute() {
        return Ok(command.to_path_buf());
    }
    which::which(command).map_err(|e| io::Error::new(io::ErrorKind::NotFound, e))
}

pub(crate) struct RunningServer {
    id: u64,
    command: String,
    child: Child,
    writer_tx: mpsc::Sender<WriterCommand>,
    next_id: u64,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
}

impl RunningServer {
    /// Spawn the server and complete the initialize handshake.
    pub async fn start(
        id: u64,
        spec: &ServerSpec,
        workspace_root: &Path,
        router: NotificationRouter,
        event_tx: mpsc::Sender<(u64, ServerEvent)>,
    ) -> Result<Self, SupervisorError> {
        let command = spec.command.display().to_string();
        let spawn_failed = |source| SupervisorError::ProcessSpawnFailed {
            command: command.clone(),
            source,
        };

        // Relative roots cannot become a file URI; anchor them at our cwd.
        let workspace_root = std::path::absolute(workspace_root).map_err(|e| {
            SupervisorError::Handshake(format!(
                "resolving workspace root {}: {e}",
                workspace_root.display()
            ))
        })?;
        let workspace_root = workspace_root.as_path();

        let resolved = resolve_command(&spec.command).map_err(spawn_failed)?;
        let mut cmd = Command::new(&resolved);
        cmd.args(spec.launch_args())
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if spec.stderr_inherited() {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);
        if workspace_root.is_dir() {
            cmd.current_dir(workspace_root);
        }

        let mut child = cmd.spawn().map_err(spawn_failed)?;
        let (Some(stdout), Some(stdin)) = (child.stdout.take(), child.stdin.take()) else {
            return Err(spawn_failed(io::Error::other("child stdio was not captured")));
        };
        tracing::info!(command = %resolved.display(), pid = ?child.id(), "Language server spawned");

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
        let writer_handle = tokio::spawn(async move {
            let mut writer = FrameWriter::new(stdin);
            while let Some(cmd) = writer_rx.recv().await {
                match cmd {
                    WriterCommand::Send(frame) => {
                        if let Err(e) = writer.write_frame(&frame).await {
                            tracing::warn!("Language server write error: {e:#}");
                            break;
                        }
                    }
                    WriterCommand::Shutdown => break,
                }
            }
        });

        let reader_pending = Arc::clone(&pending);
        let reader_alive = Arc::clone(&alive);
        let reader_writer_tx = writer_tx.clone();
        let reader_handle = tokio::spawn(async move {
            let mut reader = FrameReader::new(stdout);
            let reason = loop {
                match reader.read_frame().await {
                    Ok(Some(frame)) => {
                        Self::dispatch_frame(&frame, &reader_pending, &reader_writer_tx, &router)
                            .await;
                    }
                    Ok(None) => {
                        tracing::info!("Language server closed stdout");
                        break ServerStopReason::Exited;
                    }
                    Err(e) => {
                        tracing::warn!("Language server transport error: {e:#}");
                        break ServerStopReason::Failed(format!("{e:#}"));
                    }
                }
            };
            reader_alive.store(false, Ordering::SeqCst);
            // Fail outstanding requests now instead of at their timeout.
            reader_pending.lock().await.clear();
            let _ = event_tx.send((id, ServerEvent::Stopped { reason })).await;
        });

        let mut server = Self {
            id,
            command,
            child,
            writer_tx,
            next_id: 1,
            pending,
            alive,
            reader_handle,
            writer_handle,
        };

        if let Err(e) = server.initialize(workspace_root).await {
            tracing::warn!(command = %server.command, "Initialize failed: {e:#}");
            server.kill().await;
            return Err(SupervisorError::Handshake(format!("{e:#}")));
        }

        Ok(server)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn dispatch_frame(
        frame: &Value,
        pending: &Mutex<HashMap<u64, oneshot::Sender<Value>>>,
        writer_tx: &mpsc::Sender<WriterCommand>,
        router: &NotificationRouter,
    ) {
        let Some(incoming) = parse_incoming(frame) else {
            tracing::trace!("Ignoring malformed JSON-RPC frame");
            return;
        };

        match incoming {
            IncomingFrame::Response { id, body } => {
                let sender = pending.lock().await.remove(&id);
                if let Some(tx) = sender {
                    let _ = tx.send(body);
                }
            }
            IncomingFrame::ServerRequest { id, method } => {
                // The server blocks on requests like client/registerCapability until answered.
                tracing::debug!(%method, "Server request; replying method not found");
                match serde_json::to_value(ErrorResponse::method_not_found(id, &method)) {
                    Ok(reply) => {
                        let _ = writer_tx.send(WriterCommand::Send(reply)).await;
                    }
                    Err(e) => tracing::warn!("Failed to serialize reply to {method}: {e}"),
                }
            }
            IncomingFrame::Notification { method, params } => {
                if router.dispatch(&method, params.as_ref()) == 0 {
                    Self::log_unclaimed(&method, params.as_ref());
                }
            }
        }
    }

    fn log_unclaimed(method: &str, params: Option<&Value>) {
        let message = params
            .and_then(|p| p.get("message"))
            .and_then(Value::as_str);
        match (method, message) {
            ("window/logMessage" | "window/showMessage", Some(message)) => {
                tracing::debug!(target: "fsls::server", "{message}");
            }
            _ => tracing::trace!(%method, "Ignoring unclaimed notification"),
        }
    }

    async fn initialize(&mut self, workspace_root: &Path) -> Result<()> {
        let root_uri = protocol::path_to_file_uri(workspace_root)
            .context("converting workspace root to URI")?;
        let root_name = workspace_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("workspace"));

        let params = protocol::initialize_params(root_uri.as_str(), &root_name);
        let response = self
            .send_request("initialize", Some(params), INIT_TIMEOUT)
            .await?;

        if let Some(error) = response.get("error") {
            bail!(
                "server rejected initialize: {}",
                error["message"].as_str().unwrap_or("unknown error")
            );
        }

        self.send_notification("initialized", Some(serde_json::json!({})))
            .await?;
        tracing::info!(root = %root_uri, "Language server initialized");
        Ok(())
    }

    async fn send_request(
        &mut self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        // The reader clears the map once the transport is gone; a request
        // registered after that would otherwise wait for its timeout.
        if !self.is_alive() {
            self.pending.lock().await.remove(&id);
            bail!("server transport closed");
        }

        let frame = serde_json::to_value(Request::new(id, method, params))
            .context("serializing request")?;
        if self
            .writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            bail!("writer channel closed");
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&id);
                bail!("server exited before answering {method}");
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                bail!("{method} timed out after {}s", timeout.as_secs());
            }
        }
    }

    async fn send_notification(&self, method: &str, params: Option<Value>) -> Result<()> {
        let frame = serde_json::to_value(Notification::new(method, params))
            .context("serializing notification")?;
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| anyhow::anyhow!("writer channel closed"))
    }

    /// Gracefully shut down the server: `shutdown`, `exit`, wait, then kill.
    pub async fn shutdown(mut self) {
        if self.is_alive() {
            match self.send_request("shutdown", None, SHUTDOWN_TIMEOUT).await {
                Ok(response) if response.get("error").is_none() => {
                    let _ = self.send_notification("exit", None).await;
                }
                Ok(_) => tracing::debug!("Server answered shutdown with an error"),
                Err(e) => tracing::debug!("Shutdown request failed: {e:#}"),
            }
        }

        let _ = self.writer_tx.send(WriterCommand::Shutdown).await;

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.child.wait())
            .await
            .is_err()
        {
            tracing::debug!(command = %self.command, "Language server didn't exit in time, killing");
            self.kill().await;
        }
        self.reader_handle.abort();
        self.writer_handle.abort();
    }

    async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!("Killing language server failed: {e}");
        }
        self.reader_handle.abort();
        self.writer_handle.abort();
    }
}
