//! One-shot handoff between a background producer and a build.
//!
//! Completion and outcome travel as one message, so a consumer can never
//! observe the outcome before the producer has finished. Both ends are
//! consumed on use: a signal fires once, a handle is waited on once.

use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;
use std::process::Command;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{error, info};

/// Output directory on success, failure cause otherwise.
pub type ProducerOutcome = std::result::Result<PathBuf, String>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProducerError {
    #[error("producer failed: {0}")]
    Failed(String),
    #[error("producer exited without reporting an outcome")]
    Disconnected,
}

/// Producer side.
#[derive(Debug)]
pub struct ProducerSignal {
    tx: Sender<ProducerOutcome>,
}

/// Consumer side.
#[derive(Debug)]
pub struct ProducerHandle {
    rx: Receiver<ProducerOutcome>,
}

pub fn handoff() -> (ProducerSignal, ProducerHandle) {
    let (tx, rx) = mpsc::channel();
    (ProducerSignal { tx }, ProducerHandle { rx })
}

impl ProducerSignal {
    pub fn complete(self, outcome: ProducerOutcome) {
        // The consumer may already be gone (its build failed early); that's fine.
        let _ = self.tx.send(outcome);
    }
}

impl ProducerHandle {
    /// Blocks until the producer reports. No timeout.
    pub fn wait(self) -> std::result::Result<PathBuf, ProducerError> {
        match self.rx.recv() {
            Ok(Ok(dir)) => Ok(dir),
            Ok(Err(cause)) => Err(ProducerError::Failed(cause)),
            Err(_) => Err(ProducerError::Disconnected),
        }
    }
}

/// Builds the JS runtime bundle once, in the background, and hands the
/// result to every subscribed platform build.
pub struct JsPackager {
    workdir: PathBuf,
    command: Vec<String>,
    dist: PathBuf,
    subscribers: Vec<ProducerSignal>,
}

impl JsPackager {
    pub fn new(workdir: impl Into<PathBuf>, command: Vec<String>, dist: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            command,
            dist: dist.into(),
            subscribers: Vec::new(),
        }
    }

    /// Must be called before [`JsPackager::start`].
    pub fn subscribe(&mut self) -> ProducerHandle {
        let (signal, handle) = handoff();
        self.subscribers.push(signal);
        handle
    }

    pub fn start(self) -> JoinHandle<()> {
        thread::spawn(move || {
            let outcome = match self.package() {
                Ok(dir) => {
                    info!(dist = %dir.display(), "JS runtime packaged");
                    Ok(dir)
                }
                Err(e) => {
                    error!(error = %format!("{:#}", e), "JS packager failed");
                    Err(format!("{:#}", e))
                }
            };
            for signal in self.subscribers {
                signal.complete(outcome.clone());
            }
        })
    }

    fn package(&self) -> Result<PathBuf> {
        if let Some((program, args)) = self.command.split_first() {
            info!(command = %self.command.join(" "), "building JS runtime...");
            let output = Command::new(program)
                .args(args)
                .current_dir(&self.workdir)
                .output()
                .with_context(|| format!("Failed to execute '{}'", program))?;

            if !output.status.success() {
                return Err(anyhow!(
                    "'{}' exited with {}:\n{}",
                    self.command.join(" "),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim_end()
                ));
            }
        }

        if !self.dist.is_dir() {
            return Err(anyhow!(
                "JS dist folder not found: {}",
                self.dist.display()
            ));
        }
        Ok(self.dist.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handoff_success() {
        let (signal, handle) = handoff();
        signal.complete(Ok(PathBuf::from("out")));
        assert_eq!(handle.wait(), Ok(PathBuf::from("out")));
    }

    #[test]
    fn test_handoff_failure_keeps_cause() {
        let (signal, handle) = handoff();
        signal.complete(Err("tsc: 3 errors".into()));
        assert_eq!(
            handle.wait(),
            Err(ProducerError::Failed("tsc: 3 errors".into()))
        );
    }

    #[test]
    fn test_dropped_signal_disconnects() {
        let (signal, handle) = handoff();
        drop(signal);
        assert_eq!(handle.wait(), Err(ProducerError::Disconnected));
    }

    #[test]
    fn test_wait_blocks_until_completed() {
        let (signal, handle) = handoff();
        let waiter = thread::spawn(move || handle.wait());
        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!waiter.is_finished());
        signal.complete(Ok(PathBuf::from("late")));
        assert_eq!(waiter.join().unwrap(), Ok(PathBuf::from("late")));
    }

    #[test]
    fn test_packager_without_command_uses_prebuilt_dist() {
        let tmp = tempfile::tempdir().unwrap();
        let dist = tmp.path().join("dist");
        std::fs::create_dir_all(&dist).unwrap();

        let mut packager = JsPackager::new(tmp.path(), Vec::new(), &dist);
        let a = packager.subscribe();
        let b = packager.subscribe();
        packager.start().join().unwrap();

        assert_eq!(a.wait(), Ok(dist.clone()));
        assert_eq!(b.wait(), Ok(dist));
    }

    #[test]
    fn test_packager_missing_dist_fails_every_subscriber() {
        let tmp = tempfile::tempdir().unwrap();
        let mut packager = JsPackager::new(tmp.path(), Vec::new(), tmp.path().join("nope"));
        let a = packager.subscribe();
        let b = packager.subscribe();
        packager.start().join().unwrap();

        assert!(matches!(a.wait(), Err(ProducerError::Failed(msg)) if msg.contains("not found")));
        assert!(matches!(b.wait(), Err(ProducerError::Failed(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_packager_command_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let mut packager = JsPackager::new(
            tmp.path(),
            vec!["sh".into(), "-c".into(), "echo broken >&2; exit 3".into()],
            tmp.path(),
        );
        let handle = packager.subscribe();
        packager.start().join().unwrap();

        match handle.wait() {
            Err(ProducerError::Failed(msg)) => assert!(msg.contains("broken"), "{msg}"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_packager_command_success() {
        let tmp = tempfile::tempdir().unwrap();
        let mut packager = JsPackager::new(
            tmp.path(),
            vec!["sh".into(), "-c".into(), "mkdir -p dist && echo x > dist/index.js".into()],
            tmp.path().join("dist"),
        );
        let handle = packager.subscribe();
        packager.start().join().unwrap();

        let dir = handle.wait().unwrap();
        assert!(dir.join("index.js").is_file());
    }
}
