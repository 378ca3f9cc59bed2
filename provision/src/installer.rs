//! Idempotent download-extract-install of the language server.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fsls_types::{DownloadChannel, PlatformSignature};
use tokio::fs;
use tokio::sync::mpsc;

use crate::download::{self, report};
use crate::extract::extract_zip;
use crate::release::ReleaseRepository;
use crate::ProvisionError;

/// Default inactivity timeout for the archive stream (5 min without data).
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

/// Phases reported while installing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallProgress {
    Downloading { received: u64, total: Option<u64> },
    Extracting,
    Complete { executable: PathBuf },
}

/// Makes the language server executable present and runnable.
///
/// Presence of the executable IS the installation state; there is no
/// manifest. Callers must serialize installs into the same directory.
pub struct Provisioner {
    client: reqwest::Client,
    repository: ReleaseRepository,
    inactivity_timeout: Duration,
    progress: Option<mpsc::Sender<InstallProgress>>,
}

impl Provisioner {
    #[must_use]
    pub fn new(repository: ReleaseRepository) -> Self {
        Self {
            client: download::download_client().clone(),
            repository,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            progress: None,
        }
    }

    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<InstallProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    #[must_use]
    pub fn repository(&self) -> &ReleaseRepository {
        &self.repository
    }

    /// Where the executable for `signature` lives under `install_dir`.
    pub fn executable_path(
        &self,
        signature: PlatformSignature,
        install_dir: &Path,
    ) -> Result<PathBuf, ProvisionError> {
        let desc = self.repository.descriptor(signature)?;
        Ok(install_dir.join(&desc.executable))
    }

    pub async fn is_installed(
        &self,
        signature: PlatformSignature,
        install_dir: &Path,
    ) -> Result<bool, ProvisionError> {
        let executable = self.executable_path(signature, install_dir)?;
        path_exists(&executable).await
    }

    /// Ensure the server executable exists under `install_dir`.
    ///
    /// Returns immediately when it is already present. Otherwise the
    /// directory is wiped, the archive is downloaded into it, extracted,
    /// and the executable is marked runnable.
    pub async fn ensure_installed(
        &self,
        signature: PlatformSignature,
        channel: &DownloadChannel,
        install_dir: &Path,
    ) -> Result<PathBuf, ProvisionError> {
        let release = self.repository.describe(signature, channel)?;
        let executable = install_dir.join(&release.executable);

        if path_exists(&executable).await? {
            tracing::debug!(path = %executable.display(), "Language server already installed");
            return Ok(executable);
        }

        tracing::info!(
            platform = %signature,
            %channel,
            url = %release.url,
            dir = %install_dir.display(),
            "Installing language server"
        );

        reset_dir(install_dir).await?;

        let archive = tempfile::Builder::new()
            .prefix("download-")
            .suffix(".zip")
            .tempfile_in(install_dir)
            .map_err(|e| ProvisionError::io("creating temporary archive", e))?;
        let (std_file, archive_path) = archive.into_parts();
        let mut file = fs::File::from_std(std_file);

        download::fetch_to(
            &self.client,
            &release.url,
            &mut file,
            self.inactivity_timeout,
            self.progress.as_ref(),
        )
        .await?;
        drop(file);

        report(self.progress.as_ref(), InstallProgress::Extracting);
        extract_zip(&archive_path, install_dir).await?;

        if !path_exists(&executable).await? {
            return Err(ProvisionError::ExtractFailed {
                archive: archive_path.to_path_buf(),
                message: format!("archive did not contain {}", executable.display()),
            });
        }

        archive_path
            .close()
            .map_err(|e| ProvisionError::io("removing temporary archive", e))?;

        make_executable(&executable).await?;

        tracing::info!(path = %executable.display(), "Language server installed");
        report(
            self.progress.as_ref(),
            InstallProgress::Complete {
                executable: executable.clone(),
            },
        );
        Ok(executable)
    }

    /// Remove an installation so the next `ensure_installed` fetches anew.
    pub async fn uninstall(&self, install_dir: &Path) -> Result<(), ProvisionError> {
        if path_exists(install_dir).await? {
            tracing::info!(dir = %install_dir.display(), "Removing language server installation");
            fs::remove_dir_all(install_dir).await.map_err(|e| {
                ProvisionError::io(format!("removing {}", install_dir.display()), e)
            })?;
        }
        Ok(())
    }
}

impl Default for Provisioner {
    fn default() -> Self {
        Self::new(ReleaseRepository::builtin())
    }
}

/// Only a definite "not found" counts as absent; anything else is an error
/// so an unreadable installation is never wiped.
async fn path_exists(path: &Path) -> Result<bool, ProvisionError> {
    fs::try_exists(path)
        .await
        .map_err(|e| ProvisionError::io(format!("checking {}", path.display()), e))
}

/// Leave `dir` existing and empty.
async fn reset_dir(dir: &Path) -> Result<(), ProvisionError> {
    if let Some(parent) = dir.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ProvisionError::io(format!("creating {}", parent.display()), e))?;
    }

    if path_exists(dir).await? {
        tracing::debug!(dir = %dir.display(), "Removing stale installation");
        fs::remove_dir_all(dir)
            .await
            .map_err(|e| ProvisionError::io(format!("removing {}", dir.display()), e))?;
    }

    fs::create_dir_all(dir)
        .await
        .map_err(|e| ProvisionError::io(format!("creating {}", dir.display()), e))
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<(), ProvisionError> {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, Permissions::from_mode(0o755))
        .await
        .map_err(|e| ProvisionError::io(format!("marking {} executable", path.display()), e))
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<(), ProvisionError> {
    Ok(())
}
