//! Partial-download cleanup.
//!
//! An aborted job leaves more than the container file behind: `.part` temp
//! files, separate audio/video stream files from multi-stream downloads, and
//! thumbnail/subtitle siblings, all sharing the container's basename. On an
//! unclean shutdown the tool also leaves `.ytdl` marker files pointing at
//! incomplete transfers. Everything here is best-effort: failures are logged
//! and swallowed, never a source of job failure.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::CleanupConfig;

/// Removes partial artifacts left behind by aborted jobs.
pub struct CleanupEngine {
    config: CleanupConfig,
}

impl CleanupEngine {
    pub fn new(config: CleanupConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(CleanupConfig::default())
    }

    /// Whether `file_name` is the base file or one of its siblings.
    ///
    /// Matches `stem` itself plus anything extending it across a dot
    /// boundary ("video.mp4", "video.mp4.part", "video.f140.m4a",
    /// "video.jpg" for stem "video") without catching "video2.mp4".
    fn matches_stem(file_name: &str, stem: &str) -> bool {
        file_name == stem
            || (file_name.len() > stem.len()
                && file_name.starts_with(stem)
                && file_name.as_bytes()[stem.len()] == b'.')
    }

    /// Deletes every file in `dir` sharing `stem` as its basename.
    async fn sweep_basename(&self, dir: &Path, stem: &str) {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Cleanup: cannot read directory");
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if Self::matches_stem(name, stem) {
                match fs::remove_file(&path).await {
                    Ok(()) => info!(path = %path.display(), "Deleted partial artifact"),
                    // Already-gone files are expected: the supervisor and a
                    // marker sweep may race on the same basename.
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete"),
                }
            }
        }
    }

    /// Cleans up the artifacts of one aborted download.
    ///
    /// Waits briefly so the terminated process can release its file handles,
    /// then basename-sweeps the path's directory.
    pub async fn cleanup_partial(&self, partial_path: &Path) {
        info!(path = %partial_path.display(), "Cleaning up partial download");
        tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;

        let Some(stem) = partial_path.file_stem().and_then(|s| s.to_str()) else {
            return;
        };
        let dir = partial_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        self.sweep_basename(&dir, stem).await;
    }

    /// Sweeps a directory tree for orphaned transfer markers.
    ///
    /// A marker is a file named `<target>.<marker_ext>` (e.g.
    /// "video.mp4.ytdl") left by an uncleanly-terminated run; the marker's
    /// target and all its basename siblings are deleted along with it.
    pub async fn sweep_markers(&self, root: &Path) {
        let mut markers = Vec::new();
        self.collect_markers(root, &mut markers).await;

        for marker in markers {
            info!(marker = %marker.display(), "Found incomplete transfer marker");
            // "video.mp4.ytdl" -> target "video.mp4" -> stem "video"
            let target = marker.with_extension("");
            if let (Some(stem), Some(dir)) = (
                target.file_stem().and_then(|s| s.to_str()),
                marker.parent(),
            ) {
                self.sweep_basename(dir, stem).await;
            }
            // The marker itself may already be gone if its own stem matched.
            match fs::remove_file(&marker).await {
                Ok(()) => debug!(marker = %marker.display(), "Deleted marker"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(marker = %marker.display(), error = %e, "Failed to delete marker"),
            }
        }
    }

    /// Recursive walk collecting marker files. Iterative to avoid async
    /// recursion boxing.
    async fn collect_markers(&self, root: &Path, out: &mut Vec<PathBuf>) {
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "Marker sweep: cannot read directory");
                    continue;
                }
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if path
                    .extension()
                    .is_some_and(|e| e == self.config.marker_extension.as_str())
                {
                    out.push(path);
                }
            }
        }
    }
}
