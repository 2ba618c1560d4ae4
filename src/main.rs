//! # make-release CLI Entry Point
//!
//! Parses arguments with clap, resolves `release.toml`, and builds one
//! distribution archive per platform.
//!
//! ```bash
//! make-release --version 1.46.0 --tsparser ../tsparser
//! make-release --version 1.46.0-beta.2 --platform linux/amd64 --platform darwin/arm64
//! ```

use anyhow::{Result, bail};
use clap::Parser;
use colored::*;
use make_release::archive::TarGzArchiver;
use make_release::config::{self, Overrides, ReleaseSettings};
use make_release::dist::Toolset;
use make_release::fetch::GithubReleases;
use make_release::release::{self, ReleaseReport};
use make_release::toolchain::SystemCompiler;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "make-release")]
#[command(about = "Build Encore distributions for every target platform")]
#[command(disable_version_flag = true)]
struct Cli {
    /// Version to release (e.g. 1.46.0, 1.46.0-beta.2, 0.0.0-develop+abc123)
    #[arg(long)]
    version: String,

    /// Encore repository root
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Output directory for staging trees and archives [default: <repo>/dist]
    #[arg(long)]
    dst: Option<PathBuf>,

    /// Path to the tsparser checkout
    #[arg(long)]
    tsparser: Option<PathBuf>,

    /// Platform to build as <os>/<arch>; repeatable [default: from release.toml]
    #[arg(long = "platform")]
    platforms: Vec<String>,

    /// Release config file [default: <repo>/release.toml]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show debug logs (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .init();
}

fn print_summary(report: &ReleaseReport) {
    println!();
    for r in &report.results {
        match &r.result {
            Ok(()) => println!(
                "{} {} -> {}",
                "✓".green(),
                r.target.to_string().bold(),
                r.artifact.display()
            ),
            Err(e) => println!("{} {}: {:#}", "x".red(), r.target.to_string().bold(), e),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.repo.join("release.toml"));
    let config = config::load_config(&config_path)?;
    let settings = ReleaseSettings::resolve(
        config,
        Overrides {
            version: cli.version,
            repo_root: cli.repo,
            dist_dir: cli.dst,
            tsparser: cli.tsparser,
            platforms: cli.platforms,
        },
    )?;

    let compiler = SystemCompiler::new(settings.toolchain.clone(), &settings.repo_root);
    let fetcher = GithubReleases::new(GithubReleases::default_cache_dir());
    let archiver = TarGzArchiver;
    let tools = Toolset {
        compiler: &compiler,
        fetcher: &fetcher,
        archiver: &archiver,
    };

    let report = release::run(&settings, &tools);
    print_summary(&report);

    let failed: Vec<String> = report.failures().map(|r| r.target.to_string()).collect();
    if !failed.is_empty() {
        bail!(
            "{} of {} distributions failed: {}",
            failed.len(),
            report.results.len(),
            failed.join(", ")
        );
    }
    println!("{} All distributions built", "✓".green().bold());
    Ok(())
}
