use std::fs::File;
use std::path::Path;

use zip::ZipArchive;

use crate::ProvisionError;

/// Unpack a zip archive into `dest`.
///
/// Runs on the blocking pool; entry paths escaping `dest` are rejected by
/// the zip reader.
pub(crate) async fn extract_zip(archive: &Path, dest: &Path) -> Result<(), ProvisionError> {
    let archive_path = archive.to_path_buf();
    let dest = dest.to_path_buf();

    let outcome = tokio::task::spawn_blocking(move || -> Result<usize, String> {
        let file = File::open(&archive_path).map_err(|e| format!("opening archive: {e}"))?;
        let mut zip = ZipArchive::new(file).map_err(|e| format!("reading archive: {e}"))?;
        let entries = zip.len();
        zip.extract(&dest).map_err(|e| format!("unpacking: {e}"))?;
        Ok(entries)
    })
    .await;

    match outcome {
        Ok(Ok(entries)) => {
            tracing::debug!(archive = %archive.display(), entries, "Archive extracted");
            Ok(())
        }
        Ok(Err(message)) => Err(ProvisionError::ExtractFailed {
            archive: archive.to_path_buf(),
            message,
        }),
        Err(join) => Err(ProvisionError::ExtractFailed {
            archive: archive.to_path_buf(),
            message: format!("extraction task failed: {join}"),
        }),
    }
}
