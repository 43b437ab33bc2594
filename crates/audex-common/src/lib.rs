//! audex-common: shared value types for the audex workspace.
//!
//! - **Audio formats**: [`AudioFormat`] with its encoder codec and lossless flag
//! - **Bitrates**: [`Bitrate`], parsed from and rendered as ffmpeg-style `192k` strings
//! - **Path utilities**: video extension detection and output path derivation
//!
//! # Examples
//!
//! ```
//! use audex_common::{AudioFormat, Bitrate};
//! use audex_common::paths::is_video_file;
//! use std::path::Path;
//!
//! let format: AudioFormat = "mp3".parse().unwrap();
//! let quality: Bitrate = "192k".parse().unwrap();
//!
//! assert_eq!(quality.bits_per_sec(), 192_000);
//! assert!(!format.is_lossless());
//! assert!(is_video_file(Path::new("lecture.mkv")));
//! ```

pub mod bitrate;
pub mod error;
pub mod format;
pub mod paths;

pub use bitrate::Bitrate;
pub use error::ParseError;
pub use format::AudioFormat;
