use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which release of the language server to fetch.
///
/// Configuration spells this as a plain string: `"stable"`, `"nightly"`,
/// or any other value, which is taken as a release tag.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DownloadChannel {
    Stable,
    #[default]
    Nightly,
    SpecificTag(String),
}

impl DownloadChannel {
    /// The value substituted for the release placeholder in a URL template.
    ///
    /// `None` means the template is used verbatim.
    #[must_use]
    pub fn release_token(&self) -> Option<&str> {
        match self {
            Self::Stable => None,
            Self::Nightly => Some("nightly"),
            Self::SpecificTag(tag) => Some(tag),
        }
    }
}

impl FromStr for DownloadChannel {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "stable" => Self::Stable,
            "nightly" => Self::Nightly,
            _ => Self::SpecificTag(trimmed.to_string()),
        })
    }
}

impl From<String> for DownloadChannel {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(channel) => channel,
            Err(never) => match never {},
        }
    }
}

impl From<DownloadChannel> for String {
    fn from(value: DownloadChannel) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DownloadChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => f.write_str("stable"),
            Self::Nightly => f.write_str("nightly"),
            Self::SpecificTag(tag) => f.write_str(tag),
        }
    }
}
