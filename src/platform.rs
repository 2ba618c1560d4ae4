//! Target platform model.
//!
//! OS and architecture use Go's naming (`darwin`, `linux`, `windows`;
//! `amd64`, `arm64`) since the Go toolchain consumes them verbatim. Any
//! GOOS value is accepted; only steps that need an OS-specific file name
//! reject the ones they don't know.

use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Os {
    Darwin,
    Linux,
    Windows,
    Other(String),
}

impl Os {
    pub fn as_str(&self) -> &str {
        match self {
            Os::Darwin => "darwin",
            Os::Linux => "linux",
            Os::Windows => "windows",
            Os::Other(name) => name,
        }
    }
}

impl From<&str> for Os {
    fn from(s: &str) -> Self {
        match s {
            "darwin" => Os::Darwin,
            "linux" => Os::Linux,
            "windows" => Os::Windows,
            other => Os::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub os: Os,
    pub arch: String,
}

impl Target {
    pub fn new(os: impl Into<Os>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Name of an executable on this target (`.exe` on Windows).
    pub fn exe_name(&self, base: &str) -> String {
        match self.os {
            Os::Windows => format!("{}.exe", base),
            _ => base.to_string(),
        }
    }

    /// File name cargo gives the JS runtime cdylib on this OS.
    pub fn node_plugin_artifact(&self) -> Result<&'static str, ConfigError> {
        match &self.os {
            Os::Darwin => Ok("libencore_js_runtime.dylib"),
            Os::Linux => Ok("libencore_js_runtime.so"),
            Os::Windows => Ok("encore_js_runtime.dll"),
            Os::Other(name) => Err(ConfigError::UnsupportedOs(name.clone())),
        }
    }

    pub fn rust_triple(&self) -> Result<&'static str, ConfigError> {
        let triple = match (&self.os, self.arch.as_str()) {
            (Os::Darwin, "amd64") => "x86_64-apple-darwin",
            (Os::Darwin, "arm64") => "aarch64-apple-darwin",
            (Os::Linux, "amd64") => "x86_64-unknown-linux-gnu",
            (Os::Linux, "arm64") => "aarch64-unknown-linux-gnu",
            (Os::Windows, "amd64") => "x86_64-pc-windows-msvc",
            (Os::Windows, "arm64") => "aarch64-pc-windows-msvc",
            _ => {
                return Err(ConfigError::UnsupportedTarget {
                    os: self.os.to_string(),
                    arch: self.arch.clone(),
                });
            }
        };
        Ok(triple)
    }

    /// Directory-safe form, e.g. `linux_amd64`. Also the token GitHub
    /// release assets use to name their platform.
    pub fn slug(&self) -> String {
        format!("{}_{}", self.os, self.arch)
    }
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((os, arch))
                if !os.is_empty() && !arch.is_empty() && !arch.contains('/') =>
            {
                Ok(Target::new(os, arch))
            }
            _ => Err(ConfigError::InvalidPlatform(s.to_string())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_platform() {
        let t: Target = "linux/amd64".parse().unwrap();
        assert_eq!(t.os, Os::Linux);
        assert_eq!(t.arch, "amd64");
        assert_eq!(t.to_string(), "linux/amd64");

        let t: Target = "freebsd/amd64".parse().unwrap();
        assert_eq!(t.os, Os::Other("freebsd".into()));
    }

    #[test]
    fn test_parse_platform_rejects_malformed() {
        for bad in ["linux", "linux/", "/amd64", "linux/amd64/v2", ""] {
            assert_eq!(
                bad.parse::<Target>(),
                Err(ConfigError::InvalidPlatform(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_node_plugin_artifact() {
        assert_eq!(
            Target::new("darwin", "arm64").node_plugin_artifact(),
            Ok("libencore_js_runtime.dylib")
        );
        assert_eq!(
            Target::new("linux", "amd64").node_plugin_artifact(),
            Ok("libencore_js_runtime.so")
        );
        assert_eq!(
            Target::new("windows", "amd64").node_plugin_artifact(),
            Ok("encore_js_runtime.dll")
        );
        assert_eq!(
            Target::new("plan9", "amd64").node_plugin_artifact(),
            Err(ConfigError::UnsupportedOs("plan9".into()))
        );
    }

    #[test]
    fn test_rust_triple() {
        assert_eq!(
            Target::new("linux", "arm64").rust_triple(),
            Ok("aarch64-unknown-linux-gnu")
        );
        assert_eq!(
            Target::new("darwin", "amd64").rust_triple(),
            Ok("x86_64-apple-darwin")
        );
        assert!(Target::new("linux", "riscv64").rust_triple().is_err());
    }

    #[test]
    fn test_exe_name_and_slug() {
        assert_eq!(Target::new("windows", "amd64").exe_name("encore"), "encore.exe");
        assert_eq!(Target::new("linux", "amd64").exe_name("encore"), "encore");
        assert_eq!(Target::new("darwin", "arm64").slug(), "darwin_arm64");
    }
}
