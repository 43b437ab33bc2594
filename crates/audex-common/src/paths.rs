//! Path utilities for recognizing source videos and naming extracted audio.

use crate::AudioFormat;
use std::path::{Path, PathBuf};

/// Video file extensions picked up by staging and scanning.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "ts",
];

/// Check if a path has a video file extension (case-insensitive).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use audex_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("talk.MKV")));
/// assert!(is_video_file(Path::new("/path/to/clip.mp4")));
/// assert!(!is_video_file(Path::new("notes.txt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Name under which a source file is tracked across runs.
///
/// Only the file name is used so the identity survives the file moving
/// between the working root, the input directory and `done/`.
pub fn file_identity(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Deterministic output path: `<output_dir>/<source stem>.<format ext>`.
///
/// ```
/// use std::path::Path;
/// use audex_common::{paths::output_path_for, AudioFormat};
///
/// let out = output_path_for(Path::new("in/lecture 01.mp4"), Path::new("out"), AudioFormat::Flac);
/// assert_eq!(out, Path::new("out/lecture 01.flac"));
/// ```
pub fn output_path_for(source: &Path, output_dir: &Path, format: AudioFormat) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_identity(source));
    output_dir.join(format!("{stem}.{}", format.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_video_file() {
        for name in [
            "a.mp4", "a.avi", "a.mkv", "a.mov", "a.wmv", "a.flv", "a.webm", "a.m4v", "a.ts",
        ] {
            assert!(is_video_file(Path::new(name)), "{name}");
        }

        // Case insensitive
        assert!(is_video_file(Path::new("movie.MKV")));
        assert!(is_video_file(Path::new("movie.Mp4")));

        // Not video files
        assert!(!is_video_file(Path::new("song.mp3")));
        assert!(!is_video_file(Path::new("record.json")));
        assert!(!is_video_file(Path::new("no_extension")));
    }

    #[test]
    fn test_file_identity() {
        assert_eq!(file_identity(Path::new("/a/b/clip.mkv")), "clip.mkv");
        assert_eq!(file_identity(Path::new("clip.mkv")), "clip.mkv");
    }

    #[test]
    fn test_output_path_keeps_dots_in_stem() {
        let out = output_path_for(
            Path::new("/videos/show.s01e02.mkv"),
            Path::new("/audio"),
            AudioFormat::Mp3,
        );
        assert_eq!(out, PathBuf::from("/audio/show.s01e02.mp3"));
    }
}
