use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which executables to use for compiling. Deserialized from the
/// `[toolchain]` table of `release.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toolchain {
    /// Go executable
    pub go: PathBuf,

    /// Cargo executable
    pub cargo: PathBuf,

    /// Cargo subcommand used for cross builds (`build`, `zigbuild`, ...)
    pub cargo_subcommand: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            go: PathBuf::from("go"),
            cargo: PathBuf::from("cargo"),
            cargo_subcommand: "build".to_string(),
        }
    }
}
