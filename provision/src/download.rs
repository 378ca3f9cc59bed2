//! Streaming archive download.

use std::sync::OnceLock;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::error::{DownloadFailure, ProvisionError};
use crate::installer::InstallProgress;

const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Emit a progress update at most every 256 KiB.
const PROGRESS_CHUNK_BYTES: u64 = 256 * 1024;

pub(crate) fn download_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(concat!("fsls/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("Failed to build download client: {e}. Using defaults.");
                reqwest::Client::new()
            })
    })
}

/// Stream `url` into `dest`, following redirects.
///
/// Returns the number of bytes written. Progress is best-effort: a full or
/// closed channel never fails the download.
pub(crate) async fn fetch_to(
    client: &reqwest::Client,
    url: &str,
    dest: &mut File,
    inactivity: Duration,
    progress: Option<&mpsc::Sender<InstallProgress>>,
) -> Result<u64, ProvisionError> {
    let failed = |failure| ProvisionError::DownloadFailed {
        url: url.to_string(),
        failure,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| failed(DownloadFailure::Network(e)))?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(%url, status = status.as_u16(), "Download rejected");
        return Err(failed(DownloadFailure::Status(status.as_u16())));
    }

    let total = response.content_length();
    let mut stream = response.bytes_stream();
    let mut received: u64 = 0;
    let mut last_reported: u64 = 0;

    loop {
        let chunk = match timeout(inactivity, stream.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => return Err(failed(DownloadFailure::Network(e))),
            Ok(None) => break,
            Err(_) => {
                tracing::warn!(%url, received, "Download stalled");
                return Err(failed(DownloadFailure::Timeout(inactivity)));
            }
        };

        dest.write_all(&chunk)
            .await
            .map_err(|e| ProvisionError::io("writing downloaded archive", e))?;
        received += chunk.len() as u64;

        if received - last_reported >= PROGRESS_CHUNK_BYTES {
            report(progress, InstallProgress::Downloading { received, total });
            last_reported = received;
        }
    }

    dest.flush()
        .await
        .map_err(|e| ProvisionError::io("flushing downloaded archive", e))?;
    report(progress, InstallProgress::Downloading { received, total });

    tracing::debug!(%url, bytes = received, "Download complete");
    Ok(received)
}

pub(crate) fn report(progress: Option<&mpsc::Sender<InstallProgress>>, event: InstallProgress) {
    if let Some(tx) = progress {
        let _ = tx.try_send(event);
    }
}
