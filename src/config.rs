//! `release.toml` parsing and CLI override resolution.

use crate::error::ConfigError;
use crate::fetch::GithubRepo;
use crate::platform::Target;
use crate::toolchain::Toolchain;
use crate::version;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PLATFORMS: [&str; 5] = [
    "darwin/amd64",
    "darwin/arm64",
    "linux/amd64",
    "linux/arm64",
    "windows/amd64",
];

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ReleaseConfig {
    pub release: ReleaseSection,
    pub paths: PathsSection,
    pub js: JsSection,
    pub go_dist: GithubRepo,
    pub toolchain: Toolchain,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct ReleaseSection {
    pub platforms: Vec<String>,
    pub dist_dir: PathBuf,
}

impl Default for ReleaseSection {
    fn default() -> Self {
        Self {
            platforms: DEFAULT_PLATFORMS.iter().map(|p| p.to_string()).collect(),
            dist_dir: PathBuf::from("dist"),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct PathsSection {
    pub tsparser: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct JsSection {
    /// Build command, run in `runtimes/js`. Empty means "use the prebuilt dist".
    pub command: Vec<String>,
    pub dist: PathBuf,
}

impl Default for JsSection {
    fn default() -> Self {
        Self {
            command: vec!["npm".into(), "run".into(), "build".into()],
            dist: PathBuf::from("runtimes/js/dist"),
        }
    }
}

/// Load `release.toml`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<ReleaseConfig> {
    if !path.exists() {
        return Ok(ReleaseConfig::default());
    }
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ReleaseConfig = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

/// Values given on the command line; they win over `release.toml`.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub version: String,
    pub repo_root: PathBuf,
    pub dist_dir: Option<PathBuf>,
    pub tsparser: Option<PathBuf>,
    pub platforms: Vec<String>,
}

/// Fully resolved settings for one release run.
#[derive(Debug, Clone)]
pub struct ReleaseSettings {
    pub version: String,
    pub repo_root: PathBuf,
    pub dist_dir: PathBuf,
    pub tsparser: PathBuf,
    pub platforms: Vec<Target>,
    pub js_command: Vec<String>,
    pub js_dist: PathBuf,
    pub go_dist: GithubRepo,
    pub toolchain: Toolchain,
}

impl ReleaseSettings {
    pub fn resolve(config: ReleaseConfig, cli: Overrides) -> Result<Self, ConfigError> {
        // Reject a bad version before anything gets compiled.
        version::channel_for(&cli.version)?;

        let root = cli.repo_root;
        let in_repo = |p: PathBuf| if p.is_absolute() { p } else { root.join(p) };

        let platform_names = if cli.platforms.is_empty() {
            config.release.platforms
        } else {
            cli.platforms
        };
        let platforms = platform_names
            .iter()
            .map(|p| p.parse::<Target>())
            .collect::<Result<Vec<_>, _>>()?;

        let tsparser = match cli.tsparser {
            Some(p) => p,
            None => in_repo(
                config
                    .paths
                    .tsparser
                    .ok_or(ConfigError::MissingSetting("tsparser path"))?,
            ),
        };

        Ok(Self {
            version: cli.version,
            dist_dir: cli
                .dist_dir
                .unwrap_or_else(|| in_repo(config.release.dist_dir)),
            tsparser,
            platforms,
            js_command: config.js.command,
            js_dist: in_repo(config.js.dist),
            go_dist: config.go_dist,
            toolchain: config.toolchain,
            repo_root: root,
        })
    }

    pub fn js_workdir(&self) -> PathBuf {
        self.repo_root.join("runtimes").join("js")
    }

    pub fn staging_dir(&self, target: &Target) -> PathBuf {
        self.dist_dir.join(target.slug())
    }

    pub fn artifact_path(&self, target: &Target) -> PathBuf {
        self.dist_dir
            .join("artifacts")
            .join(format!("encore-{}-{}.tar.gz", self.version, target.slug()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(version: &str) -> Overrides {
        Overrides {
            version: version.into(),
            repo_root: PathBuf::from("/src/encore"),
            tsparser: Some(PathBuf::from("/src/tsparser")),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_without_file() {
        let config = load_config(Path::new("/definitely/not/here/release.toml")).unwrap();
        assert_eq!(config.release.platforms.len(), DEFAULT_PLATFORMS.len());
        assert_eq!(config.go_dist, GithubRepo::new("encoredev", "go"));
        assert_eq!(config.toolchain, Toolchain::default());
    }

    #[test]
    fn test_parse_partial_file() {
        let config: ReleaseConfig = toml::from_str(
            r#"
[release]
platforms = ["linux/amd64"]

[paths]
tsparser = "../tsparser"

[js]
command = []

[go_dist]
owner = "acme"

[toolchain]
cargo_subcommand = "zigbuild"
"#,
        )
        .unwrap();

        assert_eq!(config.release.platforms, vec!["linux/amd64"]);
        assert_eq!(config.release.dist_dir, PathBuf::from("dist"));
        assert!(config.js.command.is_empty());
        assert_eq!(config.go_dist, GithubRepo::new("acme", "go"));
        assert_eq!(config.toolchain.cargo_subcommand, "zigbuild");
    }

    #[test]
    fn test_resolve_paths_relative_to_repo() {
        let mut config = ReleaseConfig::default();
        config.paths.tsparser = Some(PathBuf::from("../tsparser"));
        let cli = Overrides {
            tsparser: None,
            ..overrides("1.2.3")
        };

        let s = ReleaseSettings::resolve(config, cli).unwrap();
        assert_eq!(s.tsparser, PathBuf::from("/src/encore/../tsparser"));
        assert_eq!(s.dist_dir, PathBuf::from("/src/encore/dist"));
        assert_eq!(s.js_dist, PathBuf::from("/src/encore/runtimes/js/dist"));
        assert_eq!(s.js_workdir(), PathBuf::from("/src/encore/runtimes/js"));

        let linux = Target::new("linux", "amd64");
        assert_eq!(s.staging_dir(&linux), PathBuf::from("/src/encore/dist/linux_amd64"));
        assert_eq!(
            s.artifact_path(&linux),
            PathBuf::from("/src/encore/dist/artifacts/encore-1.2.3-linux_amd64.tar.gz")
        );
    }

    #[test]
    fn test_cli_platforms_override_file() {
        let cli = Overrides {
            platforms: vec!["linux/arm64".into()],
            ..overrides("1.2.3")
        };
        let s = ReleaseSettings::resolve(ReleaseConfig::default(), cli).unwrap();
        assert_eq!(s.platforms, vec![Target::new("linux", "arm64")]);
    }

    #[test]
    fn test_resolve_rejects_bad_input() {
        assert_eq!(
            ReleaseSettings::resolve(ReleaseConfig::default(), overrides("1.2.3-rc.1")).unwrap_err(),
            ConfigError::UnknownChannel {
                version: "1.2.3-rc.1".into()
            }
        );

        let cli = Overrides {
            platforms: vec!["linux".into()],
            ..overrides("1.2.3")
        };
        assert_eq!(
            ReleaseSettings::resolve(ReleaseConfig::default(), cli).unwrap_err(),
            ConfigError::InvalidPlatform("linux".into())
        );

        let cli = Overrides {
            tsparser: None,
            ..overrides("1.2.3")
        };
        assert_eq!(
            ReleaseSettings::resolve(ReleaseConfig::default(), cli).unwrap_err(),
            ConfigError::MissingSetting("tsparser path")
        );
    }
}
