//! Bring the language server up: resolve what to run, install it if needed,
//! launch it and hook its progress notifications to a status bar.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use fsls_config::FslsConfig;
use fsls_lsp::{ProgressListener, ServerSpec, StatusBar, Supervisor};
use fsls_provision::{InstallProgress, ProvisionError, Provisioner, ReleaseRepository, platform};
use fsls_types::{DownloadChannel, PlatformSignature};
use tokio::sync::mpsc;

/// Everything activation needs to know, independent of where it came from.
pub struct Activation {
    provisioner: Provisioner,
    install_dir: PathBuf,
    channel: DownloadChannel,
    /// Bypasses provisioning when set.
    custom_server: Option<ServerSpec>,
    /// Args, env and stderr handling applied to the provisioned executable.
    launch: ServerSpec,
    platform: Option<PlatformSignature>,
}

impl Activation {
    pub fn new(provisioner: Provisioner, install_dir: PathBuf, channel: DownloadChannel) -> Self {
        Self {
            provisioner,
            install_dir,
            channel,
            custom_server: None,
            launch: ServerSpec::new(PathBuf::new()),
            platform: None,
        }
    }

    pub fn from_config(config: &FslsConfig) -> Result<Self> {
        let install_dir = config
            .install_dir()
            .context("no install directory configured and no local data directory found")?;

        let mut repository = ReleaseRepository::builtin();
        if let Some(base_url) = config.base_url() {
            tracing::info!(%base_url, "Using download mirror");
            repository = repository.mirrored(&base_url);
        }
        let mut provisioner = Provisioner::new(repository);
        if let Some(timeout) = config.inactivity_timeout() {
            provisioner = provisioner.with_inactivity_timeout(timeout);
        }

        let mut activation = Self::new(provisioner, install_dir, config.channel());
        activation.launch = config.server_spec(PathBuf::new());
        activation.custom_server = config.custom_server();
        Ok(activation)
    }

    #[must_use]
    pub fn with_custom_server(mut self, spec: ServerSpec) -> Self {
        self.custom_server = Some(spec);
        self
    }

    /// Provision for `signature` instead of the running host.
    #[must_use]
    pub fn for_platform(mut self, signature: PlatformSignature) -> Self {
        self.platform = Some(signature);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, tx: mpsc::Sender<InstallProgress>) -> Self {
        self.provisioner = self.provisioner.with_progress(tx);
        self
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    pub fn channel(&self) -> &DownloadChannel {
        &self.channel
    }

    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    pub fn platform(&self) -> Result<PlatformSignature, ProvisionError> {
        match self.platform {
            Some(signature) => Ok(signature),
            None => platform::resolve(),
        }
    }

    /// Install the server if it is missing and return the executable.
    pub async fn install(&self) -> Result<PathBuf, ProvisionError> {
        let signature = self.platform()?;
        self.provisioner
            .ensure_installed(signature, &self.channel, &self.install_dir)
            .await
    }

    /// Remove any existing installation, then install.
    pub async fn reinstall(&self) -> Result<PathBuf, ProvisionError> {
        self.provisioner.uninstall(&self.install_dir).await?;
        self.install().await
    }

    /// What to launch: the custom command, or the provisioned executable.
    pub async fn server_spec(&self) -> Result<ServerSpec, ProvisionError> {
        if let Some(custom) = &self.custom_server {
            tracing::info!(command = %custom.command.display(), "Using custom language server command");
            return Ok(custom.clone());
        }
        let executable = self.install().await?;
        let mut spec = self.launch.clone();
        spec.command = executable;
        Ok(spec)
    }

    /// Provision, start the server in `workspace` and attach a progress
    /// listener drawing on `bar`.
    pub async fn activate<B>(&self, workspace: &Path, bar: B) -> Result<Session<B>>
    where
        B: StatusBar + 'static,
    {
        let spec = self
            .server_spec()
            .await
            .context("failed to provision the F# language server")?;

        let mut supervisor = Supervisor::new();
        let progress = Arc::new(Mutex::new(ProgressListener::new(bar)));
        ProgressListener::bind(&progress, supervisor.router());

        supervisor
            .start(&spec, workspace)
            .await
            .context("failed to start the F# language server")?;

        Ok(Session {
            supervisor,
            progress,
        })
    }
}

/// A running server with its progress listener attached.
pub struct Session<B> {
    pub supervisor: Supervisor,
    pub progress: Arc<Mutex<ProgressListener<B>>>,
}

impl<B> Session<B> {
    pub async fn shutdown(mut self) {
        self.supervisor.stop().await;
    }
}
