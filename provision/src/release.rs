//! Static table of release packages, keyed by platform.

use std::collections::HashMap;
use std::path::PathBuf;

use fsls_types::{Arch, DownloadChannel, Os, PlatformSignature, UnsupportedPlatform};

use crate::ProvisionError;

/// Placeholder in a download URL template that names the release.
pub const RELEASE_PLACEHOLDER: &str = "RELEASE";

const RELEASE_BASE: &str = "https://github.com/yatli/coc-fsharp/releases/download/RELEASE";

/// Where a platform's package lives and what it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    /// Executable path relative to the install directory.
    pub executable: PathBuf,
    /// Download URL containing [`RELEASE_PLACEHOLDER`].
    pub url_template: String,
}

impl PackageDescriptor {
    pub fn new(executable: impl Into<PathBuf>, url_template: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            url_template: url_template.into(),
        }
    }

    fn archive_name(&self) -> &str {
        self.url_template
            .rsplit('/')
            .next()
            .unwrap_or(&self.url_template)
    }
}

/// A descriptor resolved against a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelease {
    pub executable: PathBuf,
    pub url: String,
}

/// Read-only mapping from platform signature to package descriptor.
#[derive(Debug, Clone)]
pub struct ReleaseRepository {
    packages: HashMap<PlatformSignature, PackageDescriptor>,
}

impl ReleaseRepository {
    /// The packages published on the upstream release page.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_descriptors([
            (
                PlatformSignature::new(Os::Windows, Arch::X64),
                PackageDescriptor::new(
                    "FSharpLanguageServer.exe",
                    format!("{RELEASE_BASE}/coc-fsharp-win10-x64.zip"),
                ),
            ),
            (
                PlatformSignature::new(Os::MacOs, Arch::X64),
                PackageDescriptor::new(
                    "FSharpLanguageServer",
                    format!("{RELEASE_BASE}/coc-fsharp-osx.10.11-x64.zip"),
                ),
            ),
            (
                PlatformSignature::new(Os::Linux, Arch::X64),
                PackageDescriptor::new(
                    "FSharpLanguageServer",
                    format!("{RELEASE_BASE}/coc-fsharp-linux-x64.zip"),
                ),
            ),
        ])
    }

    pub fn from_descriptors(
        entries: impl IntoIterator<Item = (PlatformSignature, PackageDescriptor)>,
    ) -> Self {
        Self {
            packages: entries.into_iter().collect(),
        }
    }

    /// Serve the same archive names from a different base URL.
    ///
    /// `base_url` may itself contain [`RELEASE_PLACEHOLDER`].
    #[must_use]
    pub fn mirrored(&self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self::from_descriptors(self.packages.iter().map(|(sig, desc)| {
            (
                *sig,
                PackageDescriptor::new(
                    desc.executable.clone(),
                    format!("{base}/{}", desc.archive_name()),
                ),
            )
        }))
    }

    pub fn descriptor(
        &self,
        signature: PlatformSignature,
    ) -> Result<&PackageDescriptor, ProvisionError> {
        self.packages.get(&signature).ok_or_else(|| {
            ProvisionError::UnsupportedPlatform(UnsupportedPlatform {
                os: signature.os().as_str().to_string(),
                arch: signature.arch().as_str().to_string(),
            })
        })
    }

    /// Resolve the executable path and download URL for `signature` on `channel`.
    pub fn describe(
        &self,
        signature: PlatformSignature,
        channel: &DownloadChannel,
    ) -> Result<ResolvedRelease, ProvisionError> {
        let desc = self.descriptor(signature)?;
        let url = match channel.release_token() {
            None => desc.url_template.clone(),
            Some(token) => desc.url_template.replace(RELEASE_PLACEHOLDER, token),
        };
        Ok(ResolvedRelease {
            executable: desc.executable.clone(),
            url,
        })
    }
}

impl Default for ReleaseRepository {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> PlatformSignature {
        PlatformSignature::new(Os::Linux, Arch::X64)
    }

    #[test]
    fn nightly_replaces_placeholder() {
        let release = ReleaseRepository::builtin()
            .describe(linux(), &DownloadChannel::Nightly)
            .unwrap();
        assert_eq!(
            release.url,
            "https://github.com/yatli/coc-fsharp/releases/download/nightly/coc-fsharp-linux-x64.zip"
        );
        assert_eq!(release.executable, PathBuf::from("FSharpLanguageServer"));
    }

    #[test]
    fn stable_returns_template_verbatim() {
        let repo = ReleaseRepository::builtin();
        let release = repo.describe(linux(), &DownloadChannel::Stable).unwrap();
        assert_eq!(release.url, repo.descriptor(linux()).unwrap().url_template);
        assert!(release.url.contains(RELEASE_PLACEHOLDER));
    }

    #[test]
    fn specific_tag_replaces_placeholder() {
        let release = ReleaseRepository::builtin()
            .describe(
                PlatformSignature::new(Os::Windows, Arch::X64),
                &DownloadChannel::SpecificTag("v0.3.0".into()),
            )
            .unwrap();
        assert!(release.url.contains("/download/v0.3.0/coc-fsharp-win10-x64.zip"));
        assert_eq!(release.executable, PathBuf::from("FSharpLanguageServer.exe"));
    }

    #[test]
    fn unsupported_signature_is_rejected() {
        let err = ReleaseRepository::builtin()
            .describe(
                PlatformSignature::new(Os::Windows, Arch::X86),
                &DownloadChannel::Nightly,
            )
            .unwrap_err();
        assert!(matches!(err, ProvisionError::UnsupportedPlatform(_)));
    }

    #[test]
    fn mirror_keeps_archive_names() {
        let repo = ReleaseRepository::builtin().mirrored("http://mirror.local/fs/RELEASE/");
        let release = repo.describe(linux(), &DownloadChannel::Nightly).unwrap();
        assert_eq!(
            release.url,
            "http://mirror.local/fs/nightly/coc-fsharp-linux-x64.zip"
        );
    }
}
