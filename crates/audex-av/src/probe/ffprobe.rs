//! FFprobe-based [`AudioProber`] implementation.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_streams
//! -select_streams a:0` and reads the bitrate of the first audio stream.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{AudioProbe, AudioProber, AudioStreamInfo, BitrateSource};
use crate::command::ToolCommand;
use crate::{Error, Result};

/// Tag names carrying a bitrate, in lookup order. mkvmerge writes `BPS`
/// (older versions `BPS-eng`); some muxers use `bit_rate`.
const BITRATE_TAGS: &[&str] = &["BPS", "BPS-eng", "bit_rate"];

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffprobe_path,
            timeout,
        }
    }

    /// Create a prober that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffprobe")
            .ok()
            .map(|p| Self::new(p, crate::command::DEFAULT_TIMEOUT))
    }
}

#[async_trait]
impl AudioProber for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe_audio(&self, path: &Path) -> Result<AudioProbe> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            "-select_streams",
            "a:0",
        ])
        .arg(path.to_string_lossy())
        .timeout(self.timeout);

        let output = cmd.execute().await?;
        parse_probe_json(&output.stdout)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    bit_rate: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_probe_json(json: &str) -> Result<AudioProbe> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::parse_error("ffprobe", format!("invalid JSON: {e}")))?;

    let stream = output
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref().map_or(true, |t| t == "audio"));

    let Some(stream) = stream else {
        return Ok(AudioProbe::NoAudioStream);
    };

    let sample_rate = stream.sample_rate.as_deref().and_then(parse_positive);
    let sample_rate = sample_rate.and_then(|r| u32::try_from(r).ok());
    let (bitrate, bitrate_source) = match detect_bitrate(&stream, sample_rate) {
        Some((bps, source)) => (Some(bps), Some(source)),
        None => (None, None),
    };

    Ok(AudioProbe::Stream(AudioStreamInfo {
        codec: stream.codec_name,
        channels: stream.channels,
        sample_rate,
        bitrate,
        bitrate_source,
    }))
}

fn detect_bitrate(stream: &FfprobeStream, sample_rate: Option<u32>) -> Option<(u64, BitrateSource)> {
    if let Some(bps) = stream.bit_rate.as_deref().and_then(parse_positive) {
        return Some((bps, BitrateSource::Stream));
    }

    for tag in BITRATE_TAGS {
        if let Some(bps) = stream.tags.get(*tag).and_then(|v| parse_positive(v)) {
            return Some((bps, BitrateSource::Tag));
        }
    }

    // Assume 16-bit samples when nothing better is available.
    match (sample_rate, stream.channels) {
        (Some(rate), Some(channels)) if channels > 0 => Some((
            u64::from(rate) * u64::from(channels) * 16,
            BitrateSource::Estimated,
        )),
        _ => None,
    }
}

/// ffprobe reports numbers as strings and uses "N/A" for missing values.
fn parse_positive(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_bit_rate_wins() {
        let json = r#"{"streams":[{"index":1,"codec_type":"audio","codec_name":"aac",
            "sample_rate":"44100","channels":2,"bit_rate":"96000",
            "tags":{"BPS":"128000"}}]}"#;
        let probe = parse_probe_json(json).unwrap();
        assert_eq!(probe.bitrate(), Some(96_000));
        match probe {
            AudioProbe::Stream(info) => {
                assert_eq!(info.codec.as_deref(), Some("aac"));
                assert_eq!(info.sample_rate, Some(44_100));
                assert_eq!(info.bitrate_source, Some(BitrateSource::Stream));
            }
            AudioProbe::NoAudioStream => panic!("expected an audio stream"),
        }
    }

    #[test]
    fn matroska_bps_tag_is_used() {
        let json = r#"{"streams":[{"codec_type":"audio","codec_name":"opus",
            "sample_rate":"48000","channels":2,
            "tags":{"language":"eng","BPS":"131072"}}]}"#;
        assert_eq!(parse_probe_json(json).unwrap().bitrate(), Some(131_072));
    }

    #[test]
    fn not_available_bit_rate_falls_through_to_tags() {
        let json = r#"{"streams":[{"codec_type":"audio","bit_rate":"N/A",
            "tags":{"bit_rate":"64000"}}]}"#;
        assert_eq!(parse_probe_json(json).unwrap().bitrate(), Some(64_000));
    }

    #[test]
    fn estimate_from_sample_rate_and_channels() {
        let json = r#"{"streams":[{"codec_type":"audio","codec_name":"pcm_s16le",
            "sample_rate":"48000","channels":2}]}"#;
        let probe = parse_probe_json(json).unwrap();
        assert_eq!(probe.bitrate(), Some(1_536_000));
    }

    #[test]
    fn stream_without_any_rate_is_unknown() {
        let json = r#"{"streams":[{"codec_type":"audio","codec_name":"vorbis"}]}"#;
        let probe = parse_probe_json(json).unwrap();
        assert!(probe.has_audio());
        assert_eq!(probe.bitrate(), None);
    }

    #[test]
    fn empty_stream_list_means_no_audio() {
        assert_eq!(
            parse_probe_json(r#"{"streams":[]}"#).unwrap(),
            AudioProbe::NoAudioStream
        );
        assert_eq!(parse_probe_json("{}").unwrap(), AudioProbe::NoAudioStream);
    }

    #[test]
    fn malformed_output_is_a_parse_error() {
        let err = parse_probe_json("not json").unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
    }

    #[tokio::test]
    async fn missing_binary_is_a_probe_failure() {
        let prober = FfprobeProber::new(
            PathBuf::from("/nonexistent/ffprobe_xyz"),
            Duration::from_secs(5),
        );
        let err = prober
            .probe_audio(Path::new("/tmp/whatever.mkv"))
            .await
            .unwrap_err();
        assert!(err.is_tool_missing());
    }
}
