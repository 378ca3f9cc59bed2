use std::fmt;

use thiserror::Error;

/// Operating system families the language server ships builds for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Windows,
    Linux,
    MacOs,
}

impl Os {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::MacOs => "macos",
        }
    }

    /// Parse a `std::env::consts::OS` style identifier.
    #[must_use]
    pub fn from_consts(os: &str) -> Option<Self> {
        match os {
            "windows" => Some(Self::Windows),
            "linux" => Some(Self::Linux),
            "macos" => Some(Self::MacOs),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X64,
    X86,
}

impl Arch {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::X86 => "x86",
        }
    }

    /// Parse a `std::env::consts::ARCH` style identifier.
    #[must_use]
    pub fn from_consts(arch: &str) -> Option<Self> {
        match arch {
            "x86_64" => Some(Self::X64),
            "x86" => Some(Self::X86),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported platform: {os} {arch}")]
pub struct UnsupportedPlatform {
    pub os: String,
    pub arch: String,
}

/// Short OS + architecture key used to look up release packages.
///
/// Renders as `"linux-x64"`, `"windows-x86"`, `"macos-x64"`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformSignature {
    os: Os,
    arch: Arch,
}

impl PlatformSignature {
    #[must_use]
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Map host identifiers (as found in `std::env::consts`) to a signature.
    pub fn from_host(os: &str, arch: &str) -> Result<Self, UnsupportedPlatform> {
        match (Os::from_consts(os), Arch::from_consts(arch)) {
            (Some(os), Some(arch)) => Ok(Self { os, arch }),
            _ => Err(UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn os(self) -> Os {
        self.os
    }

    #[must_use]
    pub fn arch(self) -> Arch {
        self.arch
    }

    #[must_use]
    pub fn is_windows(self) -> bool {
        self.os == Os::Windows
    }
}

impl fmt::Display for PlatformSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.as_str(), self.arch.as_str())
    }
}
