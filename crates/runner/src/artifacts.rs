//! Lifecycle of generated comparison artifacts
//!
//! All operations are best-effort: filesystem errors are logged and never
//! change a test's outcome.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::channel::EventChannel;
use crate::event::{basename, TestRecord};

const DIFF_SUFFIX: &str = "diff.png";
const FAIL_SUFFIX: &str = "fail.png";

/// Cleans and archives the images produced by one test's worker
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    screenshots_dir: PathBuf,
    failures_dir: PathBuf,
}

impl ArtifactManager {
    pub fn new(screenshots_dir: impl Into<PathBuf>, failures_dir: impl Into<PathBuf>) -> Self {
        Self {
            screenshots_dir: screenshots_dir.into(),
            failures_dir: failures_dir.into(),
        }
    }

    pub fn screenshots_dir(&self) -> &Path {
        &self.screenshots_dir
    }

    pub fn failures_dir(&self) -> &Path {
        &self.failures_dir
    }

    /// Remove leftovers of a previous run before the worker starts
    pub fn reset_prior_artifacts(&self) {
        self.sweep_comparison_images();

        match std::fs::remove_dir_all(&self.failures_dir) {
            Ok(()) => debug!("Removed failures directory {}", self.failures_dir.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove failures directory {}: {}",
                self.failures_dir.display(),
                e
            ),
        }
    }

    /// Copy a mismatched screenshot and its comparison images into the failures directory
    ///
    /// Besides the `failFile`/`diffFile` named by the worker, every
    /// `{stem}*diff.png` next to the screenshot is archived.
    pub fn archive_failure(&self, test: &TestRecord) {
        let original = &test.filename;
        let stem = original
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let reported = [Some(original), test.fail_file.as_ref(), test.diff_file.as_ref()];
        let mut files: Vec<PathBuf> = reported
            .into_iter()
            .flatten()
            .filter(|path| path.is_file())
            .cloned()
            .collect();
        for path in self.list_screenshots() {
            let name = basename(&path);
            if name.starts_with(&stem) && name.ends_with(DIFF_SUFFIX) {
                files.push(path);
            }
        }

        let mut seen = HashSet::new();
        files.retain(|path| seen.insert(path.file_name().map(|n| n.to_os_string())));

        if files.is_empty() {
            warn!("No artifacts found to archive for {}", original.display());
            return;
        }

        if let Err(e) = std::fs::create_dir_all(&self.failures_dir) {
            warn!(
                "Failed to create failures directory {}: {}",
                self.failures_dir.display(),
                e
            );
            return;
        }

        for file in files {
            let Some(name) = file.file_name() else { continue };
            let target = self.failures_dir.join(name);
            match std::fs::copy(&file, &target) {
                Ok(_) => debug!("Archived {} to {}", file.display(), target.display()),
                Err(e) => warn!("Failed to archive {}: {}", file.display(), e),
            }
        }
    }

    /// Delete the channel file and transient comparison images after a test
    pub fn final_cleanup(&self, channel: EventChannel) {
        let path = channel.path().to_path_buf();
        if let Err(e) = channel.close() {
            warn!("Failed to remove event channel {}: {}", path.display(), e);
        }

        self.sweep_comparison_images();
    }

    /// Delete `*diff.png` and `*fail.png` directly under the screenshot directory
    fn sweep_comparison_images(&self) {
        for path in self.list_screenshots() {
            let name = basename(&path);
            if !(name.ends_with(DIFF_SUFFIX) || name.ends_with(FAIL_SUFFIX)) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }

    fn list_screenshots(&self) -> Vec<PathBuf> {
        if !self.screenshots_dir.is_dir() {
            return Vec::new();
        }

        walkdir::WalkDir::new(&self.screenshots_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    }
}
