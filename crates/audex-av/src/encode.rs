//! Audio extraction through the ffmpeg CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use audex_common::{AudioFormat, Bitrate};

use crate::command::ToolCommand;
use crate::Result;

/// Sample rate forced for WAV output.
const WAV_SAMPLE_RATE: &str = "44100";

/// One file's extraction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractJob {
    /// Source video.
    pub input: PathBuf,
    /// Destination audio file.
    pub output: PathBuf,
    /// Output format.
    pub format: AudioFormat,
    /// Target bitrate; `None` for lossless formats.
    pub bitrate: Option<Bitrate>,
}

/// A backend able to write the audio of one video into a file.
#[async_trait]
pub trait AudioEncoder: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Produce `job.output` from `job.input`.
    ///
    /// Returning `Ok` only means the encoder reported success; callers still
    /// verify the output on disk.
    async fn extract(&self, job: &ExtractJob) -> Result<()>;
}

/// Encoder backed by the `ffmpeg` CLI.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegEncoder {
    /// Create a new encoder using the given ffmpeg path.
    pub fn new(ffmpeg_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffmpeg_path,
            timeout,
        }
    }

    fn command(&self, job: &ExtractJob) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.args(ffmpeg_args(job)).timeout(self.timeout);
        cmd
    }
}

#[async_trait]
impl AudioEncoder for FfmpegEncoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn extract(&self, job: &ExtractJob) -> Result<()> {
        tracing::debug!(
            input = %job.input.display(),
            output = %job.output.display(),
            format = %job.format,
            bitrate = ?job.bitrate.map(|b| b.to_string()),
            "running ffmpeg"
        );

        let result = self.command(job).execute().await;
        if result.is_err() {
            remove_partial_output(&job.output);
        }
        result.map(|_| ())
    }
}

/// Build the ffmpeg argument list for an extraction.
///
/// `-vn` drops video; the codec and rate flags depend on the format.
pub fn ffmpeg_args(job: &ExtractJob) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-nostdin".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-i".into(),
        job.input.to_string_lossy().into_owned(),
        "-vn".into(),
        "-acodec".into(),
        job.format.ffmpeg_codec().into(),
    ];

    match job.format {
        AudioFormat::Mp3 => push_bitrate(&mut args, "-ab", job.bitrate),
        AudioFormat::Aac => push_bitrate(&mut args, "-b:a", job.bitrate),
        AudioFormat::Wav => args.extend(["-ar".into(), WAV_SAMPLE_RATE.into()]),
        AudioFormat::Flac => {}
    }

    args.push(job.output.to_string_lossy().into_owned());
    args
}

fn push_bitrate(args: &mut Vec<String>, flag: &str, bitrate: Option<Bitrate>) {
    if let Some(rate) = bitrate {
        args.push(flag.to_string());
        args.push(rate.to_string());
    }
}

fn remove_partial_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial output {}: {}", path.display(), e),
    }
}
