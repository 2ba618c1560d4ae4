//! Distribution packaging.
//!
//! A staging directory becomes one gzip-compressed tar. Entries are
//! relative to the staging root and written in file-name order, so two
//! archives of the same tree list their entries identically.

use anyhow::{Context, Result, anyhow};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

pub trait Archiver: Send + Sync {
    fn archive(&self, source_dir: &Path, output_file: &Path) -> Result<()>;
}

pub struct TarGzArchiver;

impl Archiver for TarGzArchiver {
    fn archive(&self, source_dir: &Path, output_file: &Path) -> Result<()> {
        if !source_dir.is_dir() {
            return Err(anyhow!("nothing to archive at {}", source_dir.display()));
        }
        if let Some(parent) = output_file.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = File::create(output_file)
            .with_context(|| format!("Failed to create {}", output_file.display()))?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        let mut entries = 0usize;
        for entry in WalkDir::new(source_dir).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            let rel = entry.path().strip_prefix(source_dir)?;
            builder
                .append_path_with_name(entry.path(), rel)
                .with_context(|| format!("Failed to add {}", entry.path().display()))?;
            entries += 1;
        }

        builder.into_inner()?.finish()?.flush()?;
        debug!(entries, output = %output_file.display(), "archive written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;

    fn list(archive: &Path) -> Vec<String> {
        let mut ar = tar::Archive::new(GzDecoder::new(File::open(archive).unwrap()));
        ar.entries()
            .unwrap()
            .map(|e| {
                let e = e.unwrap();
                e.path().unwrap().to_string_lossy().trim_end_matches('/').to_string()
            })
            .collect()
    }

    #[test]
    fn test_archive_preserves_relative_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("stage");
        fs::create_dir_all(src.join("bin")).unwrap();
        fs::create_dir_all(src.join("runtimes/go")).unwrap();
        fs::write(src.join("bin/encore"), b"bin").unwrap();
        fs::write(src.join("runtimes/go/go.mod"), b"module encore.dev").unwrap();

        let out = tmp.path().join("artifacts/linux_amd64.tar.gz");
        TarGzArchiver.archive(&src, &out).unwrap();

        assert_eq!(
            list(&out),
            vec!["bin", "bin/encore", "runtimes", "runtimes/go", "runtimes/go/go.mod"]
        );
    }

    #[test]
    fn test_archive_contents_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("stage");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("README"), b"hello").unwrap();

        let out = tmp.path().join("out.tar.gz");
        TarGzArchiver.archive(&src, &out).unwrap();

        let unpacked = tmp.path().join("unpacked");
        tar::Archive::new(GzDecoder::new(File::open(&out).unwrap()))
            .unpack(&unpacked)
            .unwrap();
        assert_eq!(fs::read_to_string(unpacked.join("README")).unwrap(), "hello");
    }

    #[test]
    fn test_archive_missing_source_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let result = TarGzArchiver.archive(&tmp.path().join("nope"), &tmp.path().join("x.tar.gz"));
        assert!(result.is_err());
    }
}
