use crate::batch::{BatchSettings, Parallelism};
use audex_av::ToolsConfig;
use audex_common::{AudioFormat, Bitrate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub extract: ExtractConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

/// `[extract]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExtractConfig {
    /// Directory scanned for source videos.
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Directory receiving extracted audio.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Working root; loose videos here are staged into `input_dir`.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Where the record files live (defaults to `root`).
    #[serde(default)]
    pub record_dir: Option<PathBuf>,

    #[serde(default)]
    pub format: AudioFormat,

    #[serde(default = "default_quality")]
    pub quality: Bitrate,

    #[serde(default)]
    pub adaptive: bool,

    /// Worker count; 0 picks one per CPU.
    #[serde(default)]
    pub jobs: usize,

    #[serde(default)]
    pub sequential: bool,

    #[serde(default = "default_true")]
    pub resume: bool,

    #[serde(default = "default_true")]
    pub archive_done: bool,

    #[serde(default = "default_true")]
    pub stage: bool,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("./original")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./extracted_audio")
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_quality() -> Bitrate {
    Bitrate::from_kbps(192)
}

fn default_true() -> bool {
    true
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            root: default_root(),
            record_dir: None,
            format: AudioFormat::default(),
            quality: default_quality(),
            adaptive: false,
            jobs: 0,
            sequential: false,
            resume: true,
            archive_done: true,
            stage: true,
        }
    }
}

impl ExtractConfig {
    pub fn parallelism(&self) -> Parallelism {
        if self.sequential {
            Parallelism::Sequential
        } else if self.jobs > 0 {
            Parallelism::Fixed(self.jobs)
        } else {
            Parallelism::Auto
        }
    }

    pub fn record_dir(&self) -> PathBuf {
        self.record_dir.clone().unwrap_or_else(|| self.root.clone())
    }

    /// Settings for a batch run.
    pub fn to_settings(&self) -> BatchSettings {
        BatchSettings {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            record_dir: self.record_dir(),
            stage_from: self.stage.then(|| self.root.clone()),
            format: self.format,
            quality: self.quality,
            adaptive: self.adaptive,
            parallelism: self.parallelism(),
            resume: self.resume,
            archive_done: self.archive_done,
        }
    }
}

/// Command-line values layered over the file configuration.
///
/// `None` and `false` leave the file value alone.
#[derive(Debug, Clone, Default)]
pub struct ExtractOverrides {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub record_dir: Option<PathBuf>,
    pub format: Option<AudioFormat>,
    pub quality: Option<Bitrate>,
    pub adaptive: bool,
    pub jobs: Option<usize>,
    pub sequential: bool,
    pub no_resume: bool,
    pub no_archive: bool,
    pub no_stage: bool,
}

impl ExtractOverrides {
    pub fn apply(&self, config: &mut ExtractConfig) {
        if let Some(ref dir) = self.input_dir {
            config.input_dir = dir.clone();
        }
        if let Some(ref dir) = self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(ref dir) = self.root {
            config.root = dir.clone();
        }
        if let Some(ref dir) = self.record_dir {
            config.record_dir = Some(dir.clone());
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }

        config.adaptive |= self.adaptive;
        config.sequential |= self.sequential;
        if self.no_resume {
            config.resume = false;
        }
        if self.no_archive {
            config.archive_done = false;
        }
        if self.no_stage {
            config.stage = false;
        }
    }
}
