//! External release fetching.
//!
//! Resolves the latest GitHub release of a repository, downloads the asset
//! built for a target into a local cache, and unpacks it.

use crate::platform::Target;
use anyhow::{Context, Result, anyhow};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = "make-release";
const GITHUB_API: &str = "https://api.github.com";

/// `owner/repo` on GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GithubRepo {
    pub owner: String,
    pub repo: String,
}

impl GithubRepo {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl Default for GithubRepo {
    fn default() -> Self {
        Self::new("encoredev", "go")
    }
}

impl fmt::Display for GithubRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

pub trait ArtifactFetcher: Send + Sync {
    /// Download the latest release asset of `repo` built for `target`;
    /// returns the local archive path.
    fn fetch_latest_release(&self, repo: &GithubRepo, target: &Target) -> Result<PathBuf>;

    /// Unpack `archive` into `dest`, keeping the archive's own paths.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

#[derive(Deserialize, Debug)]
struct Release {
    tag_name: String,
    assets: Vec<Asset>,
}

#[derive(Deserialize, Debug)]
struct Asset {
    name: String,
    browser_download_url: String,
}

const ARCHIVE_EXTENSIONS: [&str; 3] = [".tar.gz", ".tgz", ".zip"];

fn select_asset<'r>(release: &'r Release, target: &Target) -> Option<&'r Asset> {
    let slug = target.slug();
    release.assets.iter().find(|a| {
        a.name.contains(&slug) && ARCHIVE_EXTENSIONS.iter().any(|ext| a.name.ends_with(ext))
    })
}

pub struct GithubReleases {
    agent: ureq::Agent,
    cache_dir: PathBuf,
    token: Option<String>,
}

impl GithubReleases {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_connect(Some(Duration::from_secs(30)))
            .build()
            .into();

        Self {
            agent,
            cache_dir: cache_dir.into(),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }

    /// `<cache>/make-release/downloads`, falling back to the temp dir.
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("make-release")
            .join("downloads")
    }

    fn get(&self, url: &str) -> Result<ureq::http::Response<ureq::Body>> {
        let mut req = self
            .agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req.call().with_context(|| format!("GET {}", url))
    }

    fn latest_release(&self, repo: &GithubRepo) -> Result<Release> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            GITHUB_API, repo.owner, repo.repo
        );
        let mut resp = self.get(&url)?;
        let release: Release = resp
            .body_mut()
            .read_json()
            .context("Failed to parse release metadata")?;
        Ok(release)
    }
}

impl ArtifactFetcher for GithubReleases {
    fn fetch_latest_release(&self, repo: &GithubRepo, target: &Target) -> Result<PathBuf> {
        let release = self.latest_release(repo)?;
        let asset = select_asset(&release, target).ok_or_else(|| {
            anyhow!(
                "release {} of {} has no asset for {}",
                release.tag_name,
                repo,
                target
            )
        })?;

        fs::create_dir_all(&self.cache_dir)
            .with_context(|| format!("Failed to create {}", self.cache_dir.display()))?;
        let dest = self.cache_dir.join(format!(
            "{}-{}-{}-{}",
            repo.owner, repo.repo, release.tag_name, asset.name
        ));
        if dest.exists() {
            debug!(path = %dest.display(), "using cached download");
            return Ok(dest);
        }

        info!(tag = %release.tag_name, asset = %asset.name, "downloading release asset");
        let resp = self.get(&asset.browser_download_url)?;
        let partial = dest.with_extension("part");
        let mut file = File::create(&partial)
            .with_context(|| format!("Failed to create {}", partial.display()))?;
        io::copy(&mut resp.into_body().into_reader(), &mut file)
            .context("Failed to download release asset")?;
        drop(file);
        fs::rename(&partial, &dest)?;

        Ok(dest)
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        extract_archive(archive, dest)
    }
}

/// Unpack a `.tar.gz`/`.tgz`/`.zip` into `dest`. Entries that would land
/// outside `dest` are skipped.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let name = archive.to_string_lossy();
    fs::create_dir_all(dest)?;

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let file = File::open(archive)?;
        let mut tarball = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        tarball.set_preserve_permissions(true);
        tarball.unpack(dest)?;
    } else if name.ends_with(".zip") {
        extract_zip(archive, dest)?;
    } else {
        return Err(anyhow!("unsupported archive format: {}", archive.display()));
    }

    debug!(dest = %dest.display(), "unpacked");
    Ok(())
}

fn extract_zip(archive_path: &Path, target_dir: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let outpath = match file.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => continue,
        };

        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(p) = outpath.parent() {
                fs::create_dir_all(p)?;
            }
            let mut outfile = File::create(&outpath)?;
            io::copy(&mut file, &mut outfile)?;
        }
    }
    Ok(())
}
