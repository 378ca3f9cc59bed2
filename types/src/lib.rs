//! Core domain types for fsls.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod channel;
mod platform;

pub use channel::DownloadChannel;
pub use platform::{Arch, Os, PlatformSignature, UnsupportedPlatform};
