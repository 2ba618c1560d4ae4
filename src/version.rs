//! Release channel classification.
//!
//! The channel decides the suffix of the CLI binary and of its default
//! config directory, so nightly/beta/dev installs live side by side with GA.

use crate::error::ConfigError;
use semver::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Ga,
    Beta,
    Nightly,
    DevBuild,
}

impl Channel {
    pub fn suffix(self) -> &'static str {
        match self {
            Channel::Ga => "",
            Channel::Beta => "-beta",
            Channel::Nightly => "-nightly",
            Channel::DevBuild => "-develop",
        }
    }
}

/// Classify a version string. A leading `v` is ignored.
///
/// - `1.2.3` -> GA
/// - `1.2.3-beta.N` -> Beta
/// - `1.2.3-nightly.N` -> Nightly
/// - `0.0.0-develop+<rev>` -> DevBuild
///
/// The numbered form is required: `1.2.3-beta` and `0.0.0-develop.17` are
/// rejected. Anything else, including other prerelease tags and non-semver
/// input, is a configuration error.
pub fn channel_for(version: &str) -> Result<Channel, ConfigError> {
    let unknown = || ConfigError::UnknownChannel {
        version: version.to_string(),
    };

    let parsed = Version::parse(version.strip_prefix('v').unwrap_or(version))
        .map_err(|_| unknown())?;

    if parsed.pre.is_empty() {
        return Ok(Channel::Ga);
    }

    let pre = parsed.pre.as_str();
    match pre.split_once('.') {
        Some(("beta", n)) if !n.is_empty() => Ok(Channel::Beta),
        Some(("nightly", n)) if !n.is_empty() => Ok(Channel::Nightly),
        None if pre == "develop" && !parsed.build.is_empty() => Ok(Channel::DevBuild),
        _ => Err(unknown()),
    }
}
