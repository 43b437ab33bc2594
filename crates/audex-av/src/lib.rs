//! # audex-av
//!
//! External media tool plumbing for audex.
//!
//! This crate provides:
//! - Tool discovery for ffmpeg/ffprobe with configured path overrides
//! - A timed subprocess builder ([`ToolCommand`]) that kills children on timeout
//! - Audio stream probing through ffprobe ([`FfprobeProber`])
//! - Audio extraction through ffmpeg ([`FfmpegEncoder`])
//!
//! The prober and encoder sit behind the [`AudioProber`] and [`AudioEncoder`]
//! traits so batch logic can be exercised without the real binaries.
//!
//! ## Example
//!
//! ```no_run
//! use audex_av::{AudioProber, FfprobeProber};
//! use std::path::Path;
//!
//! # async fn example() -> audex_av::Result<()> {
//! let prober = FfprobeProber::from_path().expect("ffprobe on PATH");
//! let probe = prober.probe_audio(Path::new("/path/to/video.mkv")).await?;
//! println!("audio bitrate: {:?}", probe.bitrate());
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod encode;
mod error;
pub mod probe;
pub mod tools;

// Re-exports
pub use command::{ToolCommand, ToolOutput};
pub use encode::{AudioEncoder, ExtractJob, FfmpegEncoder};
pub use error::{Error, Result};
pub use probe::{AudioProbe, AudioProber, AudioStreamInfo, BitrateSource, FfprobeProber};
pub use tools::{ToolInfo, ToolRegistry, ToolsConfig};
