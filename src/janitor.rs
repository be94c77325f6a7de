//! Deterministic cleanup of per-request temporary artifacts.
//!
//! Every artifact-producing stage registers its paths with the request's
//! [`ResourceJanitor`] at creation time; release happens once, at a single
//! well-defined point, independent of how many stages ran or which one
//! failed. Cleanup failure is logged and never overrides the primary
//! pipeline outcome.

use std::fs;
use std::path::{Path, PathBuf};

/// Tracks temporary files and directories for exactly-once removal.
///
/// One janitor per transcription request; concurrent requests never share a
/// janitor or an artifact namespace.
#[derive(Debug, Default)]
pub struct ResourceJanitor {
    tracked: Vec<PathBuf>,
}

impl ResourceJanitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an artifact for removal. Directories are removed recursively.
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        log::debug!("janitor: tracking {}", path.display());
        self.tracked.push(path);
    }

    /// Create a uniquely named scratch directory and track it.
    ///
    /// All downstream artifacts for a request live inside this directory, so
    /// releasing it removes every partial download, extracted audio file and
    /// engine output in one pass. `root` defaults to the OS temp dir.
    pub fn scratch_dir(&mut self, root: Option<&Path>) -> std::io::Result<PathBuf> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("slate-transcribe-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        // Disarm tempfile's own Drop cleanup; the janitor owns removal.
        let path = dir.keep();
        self.track(&path);
        Ok(path)
    }

    /// Remove every tracked artifact exactly once.
    ///
    /// Already-missing paths are fine; removal errors are surfaced as logged
    /// warnings, never returned. Safe to call repeatedly.
    pub fn release_all(&mut self) {
        for path in self.tracked.drain(..) {
            if !path.exists() {
                continue;
            }
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => log::debug!("janitor: removed {}", path.display()),
                Err(e) => log::warn!("janitor: failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

impl Drop for ResourceJanitor {
    /// Backstop for early returns; `release_all` is idempotent.
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_releases_files_and_dirs() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("artifact.wav");
        let dir = root.path().join("attempt-0");
        fs::write(&file, b"data").unwrap();
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("partial.mp4"), b"x").unwrap();

        let mut janitor = ResourceJanitor::new();
        janitor.track(&file);
        janitor.track(&dir);
        janitor.release_all();

        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_release_tolerates_missing_and_is_idempotent() {
        let mut janitor = ResourceJanitor::new();
        janitor.track("/nonexistent/slate-transcribe-test-path");
        janitor.release_all();
        janitor.release_all();
    }

    #[test]
    fn test_scratch_dir_created_and_released() {
        let root = tempfile::tempdir().unwrap();
        let mut janitor = ResourceJanitor::new();
        let scratch = janitor.scratch_dir(Some(root.path())).unwrap();

        assert!(scratch.exists());
        fs::write(scratch.join("media.m4a"), b"payload").unwrap();

        janitor.release_all();
        assert!(!scratch.exists());
    }

    #[test]
    fn test_drop_backstop_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("orphan.wav");
        fs::write(&file, b"data").unwrap();

        {
            let mut janitor = ResourceJanitor::new();
            janitor.track(&file);
            // dropped without an explicit release_all
        }
        assert!(!file.exists());
    }
}
