use std::io;
use std::path::PathBuf;
use std::time::Duration;

use fsls_types::UnsupportedPlatform;
use thiserror::Error;

/// Why fetching the release archive failed.
#[derive(Debug, Error)]
pub enum DownloadFailure {
    #[error("server responded with HTTP {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("no data received for {}s", .0.as_secs())]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    UnsupportedPlatform(#[from] UnsupportedPlatform),

    #[error("failed to download {url}: {failure}")]
    DownloadFailed {
        url: String,
        #[source]
        failure: DownloadFailure,
    },

    #[error("failed to extract {}: {message}", archive.display())]
    ExtractFailed { archive: PathBuf, message: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ProvisionError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// HTTP status of a failed download, if the server answered at all.
    #[must_use]
    pub fn download_status(&self) -> Option<u16> {
        match self {
            Self::DownloadFailed {
                failure: DownloadFailure::Status(code),
                ..
            } => Some(*code),
            _ => None,
        }
    }
}
