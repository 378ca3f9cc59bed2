use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// What to run in a terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSpec {
    pub title: String,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl ConsoleSpec {
    pub fn new(title: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// The F# interactive console: `dotnet fsi --readline+`.
    pub fn fsi(title: impl Into<String>) -> Self {
        Self::new(title, "dotnet").with_args(["fsi", "--readline+"])
    }

    /// `dotnet run <args>` in the project root.
    pub fn run_project(root: &Path, args: &[String]) -> Self {
        let mut all = vec![String::from("run")];
        all.extend(args.iter().cloned());
        Self::new("F# console", "dotnet").with_args(all).in_dir(root)
    }

    /// `dotnet test <project> --filter FullyQualifiedName=<name>`.
    pub fn run_test(project: &Path, fully_qualified_name: &str) -> Self {
        Self::new("F# test", "dotnet").with_args([
            String::from("test"),
            project.display().to_string(),
            String::from("--filter"),
            format!("FullyQualifiedName={fully_qualified_name}"),
        ])
    }

    /// Shell-style rendering for logs.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Identifies one console subprocess for its whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsoleHandle(u64);

impl ConsoleHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConsoleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "console#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExitReason {
    /// The process ended or its terminal was closed. Carries the exit code when known.
    Exited(Option<i32>),
    /// Torn down by [`crate::ConsoleManager::dispose`].
    Disposed,
}

/// Broadcast exactly once per console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleExit {
    pub handle: ConsoleHandle,
    pub reason: ConsoleExitReason,
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("failed to start {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("console is closed")]
    Closed,
}
