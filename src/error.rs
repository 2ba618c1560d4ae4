use thiserror::Error;

/// Configuration problems. Always fatal and never retried; raised before
/// any expensive work where the information is available.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown version channel for {version}")]
    UnknownChannel { version: String },

    #[error("unknown OS: {0}")]
    UnsupportedOs(String),

    #[error("no Rust target triple for {os}/{arch}")]
    UnsupportedTarget { os: String, arch: String },

    #[error("invalid platform '{0}', expected <os>/<arch>")]
    InvalidPlatform(String),

    #[error("missing setting: {0}")]
    MissingSetting(&'static str),
}
