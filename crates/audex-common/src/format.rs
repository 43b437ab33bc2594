//! Output audio formats.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audio container/codec combination produced by an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MPEG-1 Layer III via libmp3lame.
    #[default]
    Mp3,
    /// Raw ADTS AAC via ffmpeg's native encoder.
    Aac,
    /// 16-bit PCM WAVE at 44.1 kHz.
    Wav,
    /// Free Lossless Audio Codec.
    Flac,
}

impl AudioFormat {
    /// Name used on the command line, in record file names and as the file extension.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Aac => "aac",
            Self::Wav => "wav",
            Self::Flac => "flac",
        }
    }

    /// Extension of the extracted audio file.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// The ffmpeg encoder name (`-acodec`).
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Mp3 => "libmp3lame",
            Self::Aac => "aac",
            Self::Wav => "pcm_s16le",
            Self::Flac => "flac",
        }
    }

    /// Whether the format is bit-exact and therefore takes no bitrate.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Wav | Self::Flac)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "aac" => Ok(Self::Aac),
            "wav" => Ok(Self::Wav),
            "flac" => Ok(Self::Flac),
            _ => Err(ParseError::UnknownFormat(s.to_string())),
        }
    }
}
