//! Moving source videos around the working tree.
//!
//! Sources arrive loose in the working root, get staged into the input
//! directory, and are archived into `<input>/done` once extracted. None of
//! these moves affect correctness: the record store decides what is done.

use anyhow::{bail, Context, Result};
use audex_common::paths::is_video_file;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Name of the archive directory inside the input directory.
pub const DONE_DIR_NAME: &str = "done";

/// Sorted list of video files directly inside `dir` (no recursion).
///
/// Fails only if `dir` itself cannot be read; unreadable entries are skipped.
pub fn list_video_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(e).with_context(|| format!("Failed to list directory: {:?}", dir));
            }
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        if entry.file_type().is_file() && is_video_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Result of a staging pass.
#[derive(Debug, Default)]
pub struct StageReport {
    /// Destination paths of files that were moved.
    pub moved: Vec<PathBuf>,
    /// Source paths that could not be moved, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

/// Stages new sources into the input directory and archives finished ones.
#[derive(Debug, Clone)]
pub struct FileOrganizer {
    input_dir: PathBuf,
    done_dir: PathBuf,
}

impl FileOrganizer {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        let input_dir = input_dir.into();
        let done_dir = input_dir.join(DONE_DIR_NAME);
        Self {
            input_dir,
            done_dir,
        }
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn done_dir(&self) -> &Path {
        &self.done_dir
    }

    /// Whether `path` already sits in the done directory.
    pub fn is_archived(&self, path: &Path) -> bool {
        path.parent().is_some_and(|dir| same_dir(dir, &self.done_dir))
    }

    /// Move loose videos from `root` into the input directory.
    ///
    /// Does nothing when `root` and the input directory are the same place.
    /// Per-file failures are collected, not returned.
    pub fn stage_new_files(&self, root: &Path) -> Result<StageReport> {
        let mut report = StageReport::default();

        if same_dir(root, &self.input_dir) {
            debug!("Root and input directory coincide, skipping staging");
            return Ok(report);
        }

        std::fs::create_dir_all(&self.input_dir)
            .with_context(|| format!("Failed to create input directory: {:?}", self.input_dir))?;

        for source in list_video_files(root)? {
            let Some(name) = source.file_name() else {
                continue;
            };
            let dest = self.input_dir.join(name);

            match move_file(&source, &dest) {
                Ok(()) => {
                    info!("Staged {} -> {}", source.display(), dest.display());
                    report.moved.push(dest);
                }
                Err(e) => {
                    warn!("Could not stage {}: {:#}", source.display(), e);
                    report.failed.push((source, format!("{e:#}")));
                }
            }
        }

        Ok(report)
    }

    /// Archive a processed source into `<input>/done`.
    ///
    /// Returns the new location.
    pub fn mark_file_done(&self, source: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.done_dir)
            .with_context(|| format!("Failed to create done directory: {:?}", self.done_dir))?;

        let Some(name) = source.file_name() else {
            bail!("Not a file path: {:?}", source);
        };
        let dest = self.done_dir.join(name);
        move_file(source, &dest)?;

        debug!("Archived {} -> {}", source.display(), dest.display());
        Ok(dest)
    }
}

/// Move a file, refusing to overwrite an existing destination.
///
/// Tries a rename first and falls back to copy + remove (for moves across
/// filesystems). If the fallback cannot remove the source, the copy is
/// deleted again so the file never ends up in two places.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        bail!("Destination already exists: {:?}", to);
    }

    let rename_err = match std::fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(e).with_context(|| format!("Source vanished: {:?}", from));
        }
        Err(e) => e,
    };

    debug!(
        "Rename {} -> {} failed ({}), copying instead",
        from.display(),
        to.display(),
        rename_err
    );

    if let Err(e) = std::fs::copy(from, to) {
        let _ = std::fs::remove_file(to);
        return Err(e).with_context(|| format!("Failed to move {:?} to {:?}", from, to));
    }

    if let Err(e) = std::fs::remove_file(from) {
        let _ = std::fs::remove_file(to);
        return Err(e).with_context(|| format!("Copied but could not remove source {:?}", from));
    }

    Ok(())
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
