//! # make-release - Encore distribution builder
//!
//! Builds one self-contained distribution per target platform: the Go
//! binaries, the Rust parser and node plugin, the Go and JS runtimes, and
//! the Encore Go toolchain, packed into a `.tar.gz`.
//!
//! ## Features
//!
//! - **Parallel Steps**: every build step of a platform runs on its own thread
//! - **Parallel Platforms**: all requested platforms build at once
//! - **One JS Build**: the JS runtime is built once and shared by every platform
//! - **Pluggable Toolchains**: compilers, fetchers and archivers sit behind traits
//!
//! ## Module Organization
//!
//! - [`dist`] - Per-platform orchestrator and its build steps
//! - [`parallel`] - Join-all step runner with first-error aggregation
//! - [`producer`] - One-shot handoff from the JS packager to each build
//! - [`toolchain`] - Go and Cargo invocation
//! - [`fetch`] - GitHub release download and extraction
//! - [`archive`] - tar.gz packaging
//! - [`release`] - Multi-platform driver

/// tar.gz packaging of a staging directory.
pub mod archive;

/// Release configuration (`release.toml` + CLI overrides).
pub mod config;

/// Per-platform distribution builder.
pub mod dist;

/// Typed configuration errors.
pub mod error;

/// GitHub release download and archive extraction.
pub mod fetch;

/// Filesystem helpers.
pub mod fsutil;

/// Concurrent step runner.
pub mod parallel;

/// Target OS / architecture.
pub mod platform;

/// Background producers and their one-shot handles.
pub mod producer;

/// Multi-platform release driver.
pub mod release;

/// Compiler invocation (Go, Cargo).
pub mod toolchain;

/// Version channel classification.
pub mod version;
