//! Join-all runner for independent build steps.
//!
//! Every step gets its own thread and every thread is joined before the
//! runner returns; a failing step never cuts the others short. Only the
//! first error to reach the shared slot is reported.

use anyhow::{Result, anyhow};
use std::sync::{Mutex, PoisonError};
use std::thread;

/// A named, zero-argument unit of work.
pub struct BuildStep<'a> {
    name: &'static str,
    run: Box<dyn FnOnce() -> Result<()> + Send + 'a>,
}

impl<'a> BuildStep<'a> {
    pub fn new(name: &'static str, run: impl FnOnce() -> Result<()> + Send + 'a) -> Self {
        Self {
            name,
            run: Box::new(run),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Runs all steps concurrently and waits for every one of them.
///
/// Returns `Ok(())` when all succeeded, otherwise the first recorded error.
/// Which failure wins among simultaneous ones is unspecified. A panicking
/// step is reported as an error, never dropped.
pub fn run_parallel(steps: Vec<BuildStep<'_>>) -> Result<()> {
    if steps.is_empty() {
        return Ok(());
    }

    let first_err: Mutex<Option<anyhow::Error>> = Mutex::new(None);
    let record = |err: anyhow::Error| {
        let mut slot = first_err.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        }
    };

    thread::scope(|s| {
        let mut handles = Vec::with_capacity(steps.len());

        for step in steps {
            let name = step.name;
            let run = step.run;
            let spawned = thread::Builder::new()
                .name(name.to_string())
                .spawn_scoped(s, || {
                    if let Err(e) = run() {
                        record(e);
                    }
                });

            match spawned {
                Ok(handle) => handles.push((name, handle)),
                Err(e) => record(anyhow!(e).context(format!("spawn build step '{}'", name))),
            }
        }

        for (name, handle) in handles {
            if handle.join().is_err() {
                record(anyhow!("build step '{}' panicked", name));
            }
        }
    });

    match first_err
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
    {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
