//! The individual build steps of a distribution.
//!
//! Each step logs its own start, failure and success, and wraps its error
//! with a short label naming the step.

use super::BuildRequest;
use crate::error::ConfigError;
use crate::fetch::ArtifactFetcher;
use crate::fsutil::{copy_dir_all, write_atomic};
use crate::producer::ProducerHandle;
use crate::toolchain::Compiler;
use crate::version;
use anyhow::Result;
use tracing::{error, info};

/// Log `msg` at error level and wrap `err` with `label`.
fn fail(err: impl Into<anyhow::Error>, msg: &str, label: &'static str) -> anyhow::Error {
    let err = err.into();
    error!(error = %format!("{:#}", err), "{}", msg);
    err.context(label)
}

fn version_flag(version: &str) -> [String; 2] {
    [
        "-X".to_string(),
        format!("'encr.dev/internal/version.Version={}'", version),
    ]
}

/// Binary-name suffix and Go linker flags for the CLI at `version`.
///
/// Non-GA channels also get their own default config directory
/// (`encore-beta`, ...) so they never share state with a GA install.
pub fn encore_cli_flags(version: &str) -> Result<(&'static str, Vec<String>), ConfigError> {
    let suffix = version::channel_for(version)?.suffix();

    let mut ldflags = version_flag(version).to_vec();
    if !suffix.is_empty() {
        ldflags.push("-X".to_string());
        ldflags.push(format!(
            "'encr.dev/internal/conf.defaultConfigDirectory=encore{}'",
            suffix
        ));
    }
    Ok((suffix, ldflags))
}

/// Contents of `runtimes/jscore/api/version.cjs`.
pub fn version_stamp(version: &str) -> String {
    format!(
        r#"// Code generated by make-release. DO NOT EDIT.

/**
 * The version of the runtime this JS bundle was built for
 */
module.exports.version = "{}";
"#,
        version
    )
}

impl BuildRequest {
    pub fn build_encore_cli(&self, compiler: &dyn Compiler) -> Result<()> {
        info!("building encore binary...");

        let (suffix, ldflags) = encore_cli_flags(&self.version)
            .map_err(|e| fail(e, "encore failed to build", "compile encore"))?;

        let output = self.bin_path(&self.target.exe_name(&format!("encore{}", suffix)));
        compiler
            .compile_go(&output, "./cli/cmd/encore", &ldflags, &self.target)
            .map_err(|e| fail(e, "encore failed to build", "compile encore"))?;

        info!("encore built successfully");
        Ok(())
    }

    pub fn build_git_hook(&self, compiler: &dyn Compiler) -> Result<()> {
        info!("building git-remote-encore binary...");

        let output = self.bin_path(&self.target.exe_name("git-remote-encore"));
        compiler
            .compile_go(&output, "./cli/cmd/git-remote-encore", &[], &self.target)
            .map_err(|e| {
                fail(
                    e,
                    "git-remote-encore failed to build",
                    "compile git-remote-encore",
                )
            })?;

        info!("git-remote-encore built successfully");
        Ok(())
    }

    pub fn build_ts_bundler(&self, compiler: &dyn Compiler) -> Result<()> {
        info!("building tsbundler binary...");

        let output = self.bin_path(&self.target.exe_name("tsbundler-encore"));
        compiler
            .compile_go(
                &output,
                "./cli/cmd/tsbundler-encore",
                &version_flag(&self.version),
                &self.target,
            )
            .map_err(|e| fail(e, "tsbundler failed to build", "compile tsbundler"))?;

        info!("tsbundler built successfully");
        Ok(())
    }

    pub fn build_ts_parser(&self, compiler: &dyn Compiler) -> Result<()> {
        info!("building ts-parser binary...");

        let name = self.target.exe_name("tsparser-encore");
        compiler
            .compile_rust(
                &name,
                &self.bin_path(&name),
                &self.tsparser_path,
                &self.target,
                &[("ENCORE_VERSION", self.version.clone())],
            )
            .map_err(|e| fail(e, "ts-parser failed to build", "compile ts-parser"))?;

        info!("ts-parser built successfully");
        Ok(())
    }

    pub fn build_node_plugin(&self, compiler: &dyn Compiler) -> Result<()> {
        info!("building node plugin...");

        let compiled = self
            .target
            .node_plugin_artifact()
            .map_err(|e| fail(e, "node plugin failed to build", "compile node plugin"))?;

        let jscore = self.repo_root.join("runtimes").join("jscore");
        info!("patching jscore/api/version.cjs...");
        write_atomic(
            &jscore.join("api").join("version.cjs"),
            version_stamp(&self.version).as_bytes(),
        )
        .map_err(|e| fail(e, "failed to patch version.cjs", "write patch version.cjs"))?;

        compiler
            .compile_rust(
                compiled,
                &self.bin_path("encore-runtime.node"),
                &jscore,
                &self.target,
                &[("ENCORE_VERSION", self.version.clone())],
            )
            .map_err(|e| fail(e, "node plugin failed to build", "compile node plugin"))?;

        info!("node plugin built successfully");
        Ok(())
    }

    pub fn copy_go_runtime(&self) -> Result<()> {
        info!("copying encore runtime for Go...");

        copy_dir_all(
            &self.repo_root.join("runtimes").join("go"),
            &self.runtime_dir("go"),
        )
        .map_err(|e| {
            fail(
                e,
                "encore runtime for go failed to be copied",
                "copy go runtime",
            )
        })?;

        info!("encore runtime for go copied successfully");
        Ok(())
    }

    /// Waits for the JS packager, then copies its output. Nothing is copied
    /// when the packager failed.
    pub fn copy_js_runtime(&self, js_runtime: ProducerHandle) -> Result<()> {
        info!("waiting for JS packager to complete...");
        let js_dist = js_runtime
            .wait()
            .map_err(|e| fail(e, "JS packager failed to build", "js build failed"))?;

        info!("copying encore runtime for JS...");
        copy_dir_all(&js_dist, &self.runtime_dir("js")).map_err(|e| {
            fail(
                e,
                "encore runtime for js failed to be copied",
                "copy js runtime",
            )
        })?;

        info!("encore runtime for js copied successfully");
        Ok(())
    }

    pub fn download_encore_go(&self, fetcher: &dyn ArtifactFetcher) -> Result<()> {
        info!(repo = %self.go_dist, "downloading latest encore-go...");
        let archive = fetcher
            .fetch_latest_release(&self.go_dist, &self.target)
            .map_err(|e| fail(e, "failed to download encore-go", "download encore-go"))?;

        info!("extracting encore-go...");
        fetcher
            .extract(&archive, &self.dist_build_dir)
            .map_err(|e| fail(e, "failed to extract encore-go", "extract encore-go"))?;

        info!("encore-go extracted successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ga_flags_have_no_config_dir_override() {
        let (suffix, flags) = encore_cli_flags("1.2.3").unwrap();
        assert_eq!(suffix, "");
        assert_eq!(
            flags,
            vec!["-X", "'encr.dev/internal/version.Version=1.2.3'"]
        );
    }

    #[test]
    fn test_nightly_flags_set_config_dir() {
        let (suffix, flags) = encore_cli_flags("1.40.0-nightly.20240610").unwrap();
        assert_eq!(suffix, "-nightly");
        assert_eq!(flags.len(), 4);
        assert_eq!(
            flags[3],
            "'encr.dev/internal/conf.defaultConfigDirectory=encore-nightly'"
        );
    }

    #[test]
    fn test_unknown_channel_flags() {
        assert!(matches!(
            encore_cli_flags("1.2.3-alpha.1"),
            Err(ConfigError::UnknownChannel { .. })
        ));
    }

    #[test]
    fn test_version_stamp() {
        let stamp = version_stamp("1.2.3");
        assert!(stamp.starts_with("// Code generated by make-release. DO NOT EDIT.\n"));
        assert!(stamp.ends_with("module.exports.version = \"1.2.3\";\n"));
    }
}
