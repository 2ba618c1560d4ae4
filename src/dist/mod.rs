//! Per-platform distribution builds.
//!
//! A [`DistBuilder`] turns one [`BuildRequest`] into a staging directory
//! and a `.tar.gz`:
//!
//! 1. wipe and recreate the staging tree
//! 2. run every build step concurrently ([`crate::parallel`])
//! 3. archive the staging tree
//!
//! Steps 1 and 3 fail fast. A failed build leaves its staging directory
//! behind for inspection; the next attempt wipes it.

mod steps;

pub use steps::{encore_cli_flags, version_stamp};

use crate::archive::Archiver;
use crate::fetch::{ArtifactFetcher, GithubRepo};
use crate::parallel::{BuildStep, run_parallel};
use crate::platform::Target;
use crate::producer::ProducerHandle;
use crate::toolchain::Compiler;
use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{Span, error, info, info_span};

/// The collaborators a build talks to.
#[derive(Clone, Copy)]
pub struct Toolset<'a> {
    pub compiler: &'a dyn Compiler,
    pub fetcher: &'a dyn ArtifactFetcher,
    pub archiver: &'a dyn Archiver,
}

/// Everything needed to build one distribution. Immutable once built.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub target: Target,
    pub version: String,
    /// Encore checkout: `cli/`, `runtimes/go`, `runtimes/jscore`.
    pub repo_root: PathBuf,
    /// tsparser checkout, built with Cargo.
    pub tsparser_path: PathBuf,
    /// Staging directory; wiped at the start of every build.
    pub dist_build_dir: PathBuf,
    pub artifacts_tar_file: PathBuf,
    /// Where the Encore Go toolchain is released.
    pub go_dist: GithubRepo,
}

impl BuildRequest {
    fn bin_path(&self, name: &str) -> PathBuf {
        self.dist_build_dir.join("bin").join(name)
    }

    fn runtime_dir(&self, lang: &str) -> PathBuf {
        self.dist_build_dir.join("runtimes").join(lang)
    }

    fn prepare_dirs(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dist_build_dir) {
            Ok(()) => {}
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) => {}
            Err(e) => {
                error!(error = %e, "failed to remove existing target dir");
                return Err(e).context("remove target dir");
            }
        }

        let dirs: [(PathBuf, &str); 5] = [
            (self.dist_build_dir.clone(), "create target dir"),
            (self.dist_build_dir.join("bin"), "create bin dir"),
            (self.dist_build_dir.join("runtimes"), "create runtimes dir"),
            (self.runtime_dir("go"), "create runtimes/go dir"),
            (self.runtime_dir("js"), "create runtimes/js dir"),
        ];
        for (dir, label) in dirs {
            if let Err(e) = fs::create_dir_all(&dir) {
                error!(error = %e, dir = %dir.display(), "failed to create directory");
                return Err(e).context(label);
            }
        }
        Ok(())
    }

    fn steps<'s>(
        &'s self,
        tools: &'s Toolset<'s>,
        js_runtime: ProducerHandle,
        span: &Span,
    ) -> Vec<BuildStep<'s>> {
        vec![
            traced(span, "encore", move || self.build_encore_cli(tools.compiler)),
            traced(span, "tsbundler", move || self.build_ts_bundler(tools.compiler)),
            traced(span, "git-remote-encore", move || self.build_git_hook(tools.compiler)),
            traced(span, "tsparser", move || self.build_ts_parser(tools.compiler)),
            traced(span, "node-plugin", move || self.build_node_plugin(tools.compiler)),
            traced(span, "go-runtime", move || self.copy_go_runtime()),
            traced(span, "js-runtime", move || self.copy_js_runtime(js_runtime)),
            traced(span, "encore-go", move || self.download_encore_go(tools.fetcher)),
        ]
    }
}

/// Runs `f` inside `span` on whichever thread executes the step, so every
/// log line of the step carries the build's os/arch.
fn traced<'a>(
    span: &Span,
    name: &'static str,
    f: impl FnOnce() -> Result<()> + Send + 'a,
) -> BuildStep<'a> {
    let span = span.clone();
    BuildStep::new(name, move || span.in_scope(f))
}

/// A [`BuildRequest`] paired with the handle of the JS runtime it waits on.
pub struct DistBuilder {
    pub request: BuildRequest,
    pub js_runtime: ProducerHandle,
}

impl DistBuilder {
    pub fn new(request: BuildRequest, js_runtime: ProducerHandle) -> Self {
        Self {
            request,
            js_runtime,
        }
    }

    /// Build the distribution. Errors from the build steps and the
    /// archiver carry the target's os/arch.
    pub fn build(self, tools: &Toolset<'_>) -> Result<()> {
        let DistBuilder {
            request: req,
            js_runtime,
        } = self;
        let span = info_span!("dist", os = %req.target.os, arch = %req.target.arch);
        let _entered = span.enter();

        info!("building distribution...");
        req.prepare_dirs()?;

        let platform = || format!("os: {}, arch: {}", req.target.os, req.target.arch);

        if let Err(e) = run_parallel(req.steps(tools, js_runtime, &span)) {
            error!(error = %format!("{:#}", e), "failed to build distribution");
            return Err(e.context(platform()));
        }

        info!(tar_file = %req.artifacts_tar_file.display(), "creating distribution tar file...");
        if let Err(e) = tools
            .archiver
            .archive(&req.dist_build_dir, &req.artifacts_tar_file)
        {
            error!(error = %format!("{:#}", e), "failed to tar gzip distribution");
            return Err(e.context(platform()));
        }

        info!(tar_file = %req.artifacts_tar_file.display(), "distribution built successfully");
        Ok(())
    }
}
