//! Public types for launching and observing the language server.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// How to launch the language server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    /// Executable path, or a bare command name resolved through `PATH`.
    pub command: PathBuf,
    pub args: Vec<String>,
    /// Extra environment for the child.
    pub env: Vec<(String, String)>,
    /// Pass the server's stderr through instead of discarding it.
    pub inherit_stderr: bool,
    /// Ask the server to wait for a .NET debugger before starting.
    pub debug_attach: bool,
}

/// Argument that makes the server wait for a debugger to attach.
pub const DEBUG_ATTACH_ARG: &str = "--attach-debugger";

impl ServerSpec {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            inherit_stderr: false,
            debug_attach: false,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn inherit_stderr(mut self, inherit: bool) -> Self {
        self.inherit_stderr = inherit;
        self
    }

    pub fn debug_attach(mut self, attach: bool) -> Self {
        self.debug_attach = attach;
        self
    }

    /// Arguments as passed to the process.
    #[must_use]
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        if self.debug_attach && !args.iter().any(|a| a == DEBUG_ATTACH_ARG) {
            args.push(DEBUG_ATTACH_ARG.to_string());
        }
        args
    }

    /// A server waiting on a debugger reports through stderr, so keep it.
    #[must_use]
    pub fn stderr_inherited(&self) -> bool {
        self.inherit_stderr || self.debug_attach
    }
}

/// An event emitted by the transport tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Stopped { reason: ServerStopReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStopReason {
    /// Stdout reached EOF.
    Exited,
    /// Reading from the transport failed.
    Failed(String),
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn language server {command}: {source}")]
    ProcessSpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("language server initialization failed: {0}")]
    Handshake(String),
}
