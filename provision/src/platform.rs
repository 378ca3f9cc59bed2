//! Host platform detection.

use std::env::consts;
use std::sync::OnceLock;

use fsls_types::{PlatformSignature, UnsupportedPlatform};

use crate::ProvisionError;

/// Global cache for platform detection (resolved once per process).
static PLATFORM_CACHE: OnceLock<Result<PlatformSignature, UnsupportedPlatform>> = OnceLock::new();

/// Resolve the signature of the running host.
///
/// The first call inspects the host; every later call returns the same
/// answer, including a cached failure. An unsupported host is fatal.
pub fn resolve() -> Result<PlatformSignature, ProvisionError> {
    let cached = PLATFORM_CACHE.get_or_init(|| {
        let resolved = PlatformSignature::from_host(consts::OS, consts::ARCH);
        match &resolved {
            Ok(sig) => tracing::debug!(platform = %sig, "Resolved host platform"),
            Err(e) => tracing::warn!("{e}"),
        }
        resolved
    });
    cached.clone().map_err(ProvisionError::from)
}
