//! Multi-platform release driver.
//!
//! Starts the JS packager once, then builds every requested platform
//! concurrently. One platform failing does not stop the others; the
//! report lists each platform's outcome.

use crate::config::ReleaseSettings;
use crate::dist::{BuildRequest, DistBuilder, Toolset};
use crate::platform::Target;
use crate::producer::JsPackager;
use anyhow::Result;
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{info, warn};

pub struct PlatformResult {
    pub target: Target,
    pub artifact: PathBuf,
    pub result: Result<()>,
}

#[derive(Default)]
pub struct ReleaseReport {
    pub results: Vec<PlatformResult>,
}

impl ReleaseReport {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &PlatformResult> {
        self.results.iter().filter(|r| r.result.is_err())
    }
}

pub fn run(settings: &ReleaseSettings, tools: &Toolset<'_>) -> ReleaseReport {
    let mut packager = JsPackager::new(
        settings.js_workdir(),
        settings.js_command.clone(),
        settings.js_dist.clone(),
    );

    let builders: Vec<DistBuilder> = settings
        .platforms
        .iter()
        .map(|target| {
            let request = BuildRequest {
                target: target.clone(),
                version: settings.version.clone(),
                repo_root: settings.repo_root.clone(),
                tsparser_path: settings.tsparser.clone(),
                dist_build_dir: settings.staging_dir(target),
                artifacts_tar_file: settings.artifact_path(target),
                go_dist: settings.go_dist.clone(),
            };
            DistBuilder::new(request, packager.subscribe())
        })
        .collect();

    info!(
        version = %settings.version,
        platforms = builders.len(),
        "building distributions"
    );
    let js_packager = packager.start();

    let results: Vec<PlatformResult> = builders
        .into_par_iter()
        .map(|builder| {
            let target = builder.request.target.clone();
            let artifact = builder.request.artifacts_tar_file.clone();
            PlatformResult {
                target,
                artifact,
                result: builder.build(tools),
            }
        })
        .collect();

    if js_packager.join().is_err() {
        warn!("JS packager thread panicked");
    }

    ReleaseReport { results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_report_success_and_failures() {
        let ok = PlatformResult {
            target: Target::new("linux", "amd64"),
            artifact: PathBuf::from("a.tar.gz"),
            result: Ok(()),
        };
        let bad = PlatformResult {
            target: Target::new("windows", "amd64"),
            artifact: PathBuf::from("b.tar.gz"),
            result: Err(anyhow!("compile encore")),
        };

        let report = ReleaseReport {
            results: vec![ok],
        };
        assert!(report.is_success());

        let report = ReleaseReport {
            results: vec![bad],
        };
        assert!(!report.is_success());
        assert_eq!(
            report.failures().map(|r| r.target.to_string()).collect::<Vec<_>>(),
            vec!["windows/amd64"]
        );
    }
}
