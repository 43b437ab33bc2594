//! Audio stream probing.
//!
//! The [`AudioProber`] trait is the seam between the batch scheduler and the
//! external prober; [`FfprobeProber`] is the production implementation.

mod ffprobe;

pub use ffprobe::FfprobeProber;

use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;

/// Where a probed bitrate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BitrateSource {
    /// The stream's own `bit_rate` field.
    Stream,
    /// A container statistics tag (`BPS`, `bit_rate`).
    Tag,
    /// Estimated as `sample_rate * channels * 16`.
    Estimated,
}

/// The first audio stream of a media file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AudioStreamInfo {
    /// Codec name as reported by the prober (e.g. "aac", "opus").
    pub codec: Option<String>,
    /// Number of channels.
    pub channels: Option<u32>,
    /// Sample rate in Hz.
    pub sample_rate: Option<u32>,
    /// Bitrate in bits per second, when it could be determined.
    pub bitrate: Option<u64>,
    /// Origin of [`Self::bitrate`].
    pub bitrate_source: Option<BitrateSource>,
}

/// Outcome of probing a file for audio.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioProbe {
    /// The file has an audio stream; its bitrate may still be unknown.
    Stream(AudioStreamInfo),
    /// The file has no audio stream at all.
    NoAudioStream,
}

impl AudioProbe {
    /// Detected bitrate in bits per second, or `None` when unknown or absent.
    pub fn bitrate(&self) -> Option<u64> {
        match self {
            AudioProbe::Stream(info) => info.bitrate,
            AudioProbe::NoAudioStream => None,
        }
    }

    /// Whether the file has an audio stream.
    pub fn has_audio(&self) -> bool {
        matches!(self, AudioProbe::Stream(_))
    }
}

/// A backend able to inspect a file's first audio stream.
///
/// Implementations return `Ok(AudioProbe::NoAudioStream)` for files without
/// audio and reserve `Err` for the prober itself failing.
#[async_trait]
pub trait AudioProber: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Probe the first audio stream of `path`.
    async fn probe_audio(&self, path: &Path) -> Result<AudioProbe>;
}
