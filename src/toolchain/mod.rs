//! Compiler invocation
//!
//! The distribution is built from two toolchains: Go for the CLI binaries
//! and Cargo for the parser and the node plugin. Both sit behind the
//! [`Compiler`] trait so builds can run against stubs.

pub mod types;

pub use types::Toolchain;

use crate::platform::Target;
use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Cross-compiling compiler front end. Implementations must be callable
/// from several build steps at once.
pub trait Compiler: Send + Sync {
    /// Build Go package `package` for `target` into `output`.
    fn compile_go(
        &self,
        output: &Path,
        package: &str,
        ldflags: &[String],
        target: &Target,
    ) -> Result<()>;

    /// Build the crate at `crate_dir` for `target` and copy the compiled
    /// `artifact` to `output`. `env` is added to the build's environment.
    fn compile_rust(
        &self,
        artifact: &str,
        output: &Path,
        crate_dir: &Path,
        target: &Target,
        env: &[(&str, String)],
    ) -> Result<()>;
}

/// Shells out to the real `go` and `cargo`.
pub struct SystemCompiler {
    toolchain: Toolchain,
    go_workdir: PathBuf,
}

impl SystemCompiler {
    /// `go_workdir` is the module root Go package paths are relative to.
    pub fn new(toolchain: Toolchain, go_workdir: impl Into<PathBuf>) -> Self {
        Self {
            toolchain,
            go_workdir: go_workdir.into(),
        }
    }
}

impl Compiler for SystemCompiler {
    fn compile_go(
        &self,
        output: &Path,
        package: &str,
        ldflags: &[String],
        target: &Target,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.toolchain.go);
        cmd.arg("build").arg("-trimpath");
        if !ldflags.is_empty() {
            cmd.arg("-ldflags").arg(ldflags.join(" "));
        }
        cmd.arg("-o").arg(output).arg(package);
        cmd.current_dir(&self.go_workdir)
            .env("GOOS", target.os.as_str())
            .env("GOARCH", &target.arch)
            .env("CGO_ENABLED", "0");

        run(&mut cmd)
    }

    fn compile_rust(
        &self,
        artifact: &str,
        output: &Path,
        crate_dir: &Path,
        target: &Target,
        env: &[(&str, String)],
    ) -> Result<()> {
        let triple = target.rust_triple()?;
        let target_dir = crate_dir.join("target");

        let mut cmd = Command::new(&self.toolchain.cargo);
        cmd.arg(&self.toolchain.cargo_subcommand)
            .arg("--release")
            .arg("--target")
            .arg(triple)
            .arg("--target-dir")
            .arg(&target_dir)
            .current_dir(crate_dir);
        for (key, value) in env {
            cmd.env(key, value);
        }
        run(&mut cmd)?;

        let built = target_dir.join(triple).join("release").join(artifact);
        fs::copy(&built, output).with_context(|| {
            format!(
                "Failed to copy {} -> {}",
                built.display(),
                output.display()
            )
        })?;
        Ok(())
    }
}

fn run(cmd: &mut Command) -> Result<()> {
    let program = cmd.get_program().to_string_lossy().to_string();
    debug!(command = ?cmd, "running");

    let output = cmd
        .output()
        .with_context(|| format!("Failed to execute '{}'", program))?;

    if !output.status.success() {
        return Err(anyhow!(
            "'{}' exited with {}:\n{}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim_end()
        ));
    }
    Ok(())
}
