//! Shared test harness for batch integration tests.
//!
//! Provides [`FakeProber`] and [`FakeEncoder`], scripted stand-ins for
//! ffprobe and ffmpeg, and [`Workspace`], a temporary working tree laid out
//! like a real run (root, input directory, output directory).

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use audex::batch::{BatchScheduler, BatchSettings, BatchSummary, Parallelism};
use audex_av::{AudioEncoder, AudioProbe, AudioProber, AudioStreamInfo, Error, ExtractJob};
use tokio_util::sync::CancellationToken;

/// Scripted answer for one file.
#[derive(Debug, Clone, Copy)]
pub enum ProbeScript {
    Bitrate(Option<u64>),
    NoAudio,
    Fail,
}

/// Prober answering from a table keyed by file name.
pub struct FakeProber {
    scripts: Mutex<HashMap<String, ProbeScript>>,
    default: ProbeScript,
    pub calls: AtomicUsize,
}

impl FakeProber {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default: ProbeScript::Bitrate(Some(320_000)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn script(self, name: &str, script: ProbeScript) -> Self {
        self.scripts.lock().insert(name.to_string(), script);
        self
    }
}

#[async_trait]
impl AudioProber for FakeProber {
    fn name(&self) -> &'static str {
        "fake-probe"
    }

    async fn probe_audio(&self, path: &Path) -> audex_av::Result<AudioProbe> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = file_name(path);
        let script = self
            .scripts
            .lock()
            .get(&name)
            .copied()
            .unwrap_or(self.default);

        match script {
            ProbeScript::Bitrate(bitrate) => Ok(AudioProbe::Stream(AudioStreamInfo {
                codec: Some("aac".to_string()),
                channels: Some(2),
                sample_rate: Some(48_000),
                bitrate,
                bitrate_source: None,
            })),
            ProbeScript::NoAudio => Ok(AudioProbe::NoAudioStream),
            ProbeScript::Fail => Err(Error::tool_failed("ffprobe", "scripted failure")),
        }
    }
}

/// How the fake encoder treats one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeScript {
    Write,
    Fail,
    WriteEmpty,
}

/// Encoder that writes a few bytes instead of running ffmpeg.
pub struct FakeEncoder {
    scripts: Mutex<HashMap<String, EncodeScript>>,
    delay: Duration,
    pub jobs: Mutex<Vec<ExtractJob>>,
    running: AtomicUsize,
    pub max_running: AtomicUsize,
}

impl FakeEncoder {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            jobs: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    pub fn script(self, name: &str, script: EncodeScript) -> Self {
        self.scripts.lock().insert(name.to_string(), script);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.jobs.lock().len()
    }

    /// The job submitted for a source file name, if any.
    pub fn job_for(&self, name: &str) -> Option<ExtractJob> {
        self.jobs
            .lock()
            .iter()
            .find(|j| file_name(&j.input) == name)
            .cloned()
    }
}

#[async_trait]
impl AudioEncoder for FakeEncoder {
    fn name(&self) -> &'static str {
        "fake-encode"
    }

    async fn extract(&self, job: &ExtractJob) -> audex_av::Result<()> {
        self.jobs.lock().push(job.clone());

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let script = self
            .scripts
            .lock()
            .get(&file_name(&job.input))
            .copied()
            .unwrap_or(EncodeScript::Write);

        match script {
            EncodeScript::Write => {
                std::fs::write(&job.output, b"fake audio")?;
                Ok(())
            }
            EncodeScript::WriteEmpty => {
                std::fs::write(&job.output, b"")?;
                Ok(())
            }
            EncodeScript::Fail => Err(Error::tool_failed("ffmpeg", "scripted failure")),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A temporary working tree: `<root>/original` and `<root>/extracted_audio`.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn input(&self) -> PathBuf {
        self.root().join("original")
    }

    pub fn output(&self) -> PathBuf {
        self.root().join("extracted_audio")
    }

    pub fn done(&self) -> PathBuf {
        self.input().join("done")
    }

    /// Create a source video in the input directory.
    pub fn add_video(&self, name: &str) -> PathBuf {
        std::fs::create_dir_all(self.input()).unwrap();
        let path = self.input().join(name);
        std::fs::write(&path, b"video bytes").unwrap();
        path
    }

    /// Settings with staging off and archiving off, records in the root.
    pub fn settings(&self) -> BatchSettings {
        let mut settings = BatchSettings::new(self.input(), self.output());
        settings.record_dir = self.root().to_path_buf();
        settings.parallelism = Parallelism::Fixed(2);
        settings.archive_done = false;
        settings
    }

    pub fn store_path(&self, format: &str) -> PathBuf {
        self.root().join(format!("extraction_record_{format}.json"))
    }

    pub fn read_store(&self, format: &str) -> serde_json::Value {
        let content = std::fs::read_to_string(self.store_path(format)).unwrap();
        serde_json::from_str(&content).unwrap()
    }
}

/// Run one batch with fresh cancellation.
pub async fn run_batch(
    settings: BatchSettings,
    prober: &Arc<FakeProber>,
    encoder: &Arc<FakeEncoder>,
) -> BatchSummary {
    BatchScheduler::new(settings, prober.clone(), encoder.clone())
        .run(CancellationToken::new())
        .await
        .unwrap()
}
