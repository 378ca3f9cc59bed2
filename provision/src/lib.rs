//! Acquisition of the F# language server binary.
//!
//! [`platform::resolve`] identifies the host, [`ReleaseRepository`] maps it to
//! a release package, and [`Provisioner`] makes sure the package is
//! downloaded, extracted, and runnable under an install directory.

mod download;
mod error;
mod extract;
mod installer;
pub mod platform;
mod release;

pub use error::{DownloadFailure, ProvisionError};
pub use installer::{DEFAULT_INACTIVITY_TIMEOUT, InstallProgress, Provisioner};
pub use release::{PackageDescriptor, RELEASE_PLACEHOLDER, ReleaseRepository, ResolvedRelease};
