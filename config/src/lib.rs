//! `~/.fsls/config.toml` loading.
//!
//! Every section is optional; a missing file is the same as an empty one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use fsls_console::ConsoleSpec;
use fsls_lsp::ServerSpec;
use fsls_types::DownloadChannel;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CONSOLE_TITLE: &str = "F# REPL";

#[derive(Debug, Default, Deserialize)]
pub struct FslsConfig {
    pub server: Option<ServerConfig>,
    pub download: Option<DownloadConfig>,
    pub console: Option<ConsoleConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    /// Run this instead of the provisioned server.
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub inherit_stderr: bool,
    /// Start the server waiting for a .NET debugger to attach.
    #[serde(default)]
    pub debug_attach: bool,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadConfig {
    /// `"stable"`, `"nightly"` or a release tag.
    pub channel: Option<String>,
    pub install_dir: Option<String>,
    /// Mirror serving the same archive names.
    pub base_url: Option<String>,
    pub inactivity_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConsoleConfig {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub title: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Replace `${VAR}` with the variable's value. Unset variables become empty.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut i = 0;

    while i < value.len() {
        if value[i..].starts_with("${") {
            let start = i + 2;
            if let Some(end_rel) = value[start..].find('}') {
                let end = start + end_rel;
                let var = &value[start..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                i = end + 1;
                continue;
            }
        }

        let Some(ch) = value[i..].chars().next() else {
            break;
        };
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

impl FslsConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn channel(&self) -> DownloadChannel {
        self.download
            .as_ref()
            .and_then(|d| d.channel.as_deref())
            .map(|c| DownloadChannel::from(expand_env_vars(c)))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn install_dir(&self) -> Option<PathBuf> {
        self.download
            .as_ref()
            .and_then(|d| d.install_dir.as_deref())
            .map(|dir| PathBuf::from(expand_env_vars(dir)))
            .or_else(default_install_dir)
    }

    #[must_use]
    pub fn base_url(&self) -> Option<String> {
        self.download
            .as_ref()
            .and_then(|d| d.base_url.as_deref())
            .map(expand_env_vars)
            .filter(|url| !url.is_empty())
    }

    #[must_use]
    pub fn inactivity_timeout(&self) -> Option<Duration> {
        self.download
            .as_ref()
            .and_then(|d| d.inactivity_timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// The configured server command, which bypasses provisioning.
    #[must_use]
    pub fn custom_server(&self) -> Option<ServerSpec> {
        let command = self.server.as_ref()?.command.as_deref()?;
        let command = expand_env_vars(command);
        if command.trim().is_empty() {
            return None;
        }
        Some(self.server_spec(PathBuf::from(command)))
    }

    /// Launch `command` with the configured args, env and stderr handling.
    #[must_use]
    pub fn server_spec(&self, command: PathBuf) -> ServerSpec {
        let mut spec = ServerSpec::new(command);
        if let Some(server) = &self.server {
            spec = spec
                .with_args(server.args.iter().map(|a| expand_env_vars(a)))
                .inherit_stderr(server.inherit_stderr)
                .debug_attach(server.debug_attach);
            for (key, value) in &server.env {
                spec = spec.with_env(key.clone(), expand_env_vars(value));
            }
        }
        spec
    }

    #[must_use]
    pub fn console_spec(&self) -> ConsoleSpec {
        let section = self.console.as_ref();
        let title = section
            .and_then(|c| c.title.clone())
            .unwrap_or_else(|| DEFAULT_CONSOLE_TITLE.to_string());
        match section.and_then(|c| c.program.as_deref()) {
            Some(program) => {
                let args = section
                    .and_then(|c| c.args.as_ref())
                    .map(|args| args.iter().map(|a| expand_env_vars(a)).collect::<Vec<_>>())
                    .unwrap_or_default();
                ConsoleSpec::new(title, expand_env_vars(program)).with_args(args)
            }
            None => {
                let mut spec = ConsoleSpec::fsi(title);
                if let Some(args) = section.and_then(|c| c.args.as_ref()) {
                    spec = spec.with_args(args.iter().map(|a| expand_env_vars(a)));
                }
                spec
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".fsls").join("config.toml"))
}

/// `<data_local_dir>/fsls/server`.
pub fn default_install_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("fsls").join("server"))
}
