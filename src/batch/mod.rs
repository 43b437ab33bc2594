//! Batch scheduling of extractions.
//!
//! A run stages loose sources, lists the input directory, drops files the
//! record store already covers, and pushes the rest through a bounded pool
//! of workers. Each file ends in exactly one [`FileOutcome`]; one file's
//! failure never stops its siblings.

mod report;
mod worker;

pub use report::{BatchSummary, FileError, FileOutcome, FileReport};

use crate::organizer::{list_video_files, FileOrganizer};
use crate::quality::QualityRequest;
use crate::store::{output_present, ExtractionRecord, RecordOrigin, RecordStore};
use anyhow::{Context, Result};
use audex_av::{AudioEncoder, AudioProber};
use audex_common::paths::{file_identity, output_path_for};
use audex_common::{AudioFormat, Bitrate};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use worker::Worker;

/// A source video discovered by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub path: PathBuf,
    /// File name; the key in the record store.
    pub identity: String,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
}

impl MediaFile {
    /// Describe `path`, reading size and mtime if available.
    pub fn from_path(path: PathBuf) -> Self {
        let metadata = std::fs::metadata(&path).ok();
        Self {
            identity: file_identity(&path),
            size: metadata.as_ref().map(|m| m.len()),
            modified: metadata
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from),
            path,
        }
    }
}

/// How many files are extracted at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parallelism {
    /// One worker per CPU, capped at the number of eligible files.
    #[default]
    Auto,
    /// Exactly one file at a time.
    Sequential,
    /// A fixed number of workers.
    Fixed(usize),
}

impl Parallelism {
    /// Worker count for a batch of `eligible` files. Always at least 1.
    pub fn workers_for(self, eligible: usize) -> usize {
        match self {
            Parallelism::Sequential => 1,
            Parallelism::Fixed(n) => n.max(1),
            Parallelism::Auto => num_cpus::get().min(eligible).max(1),
        }
    }
}

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Directory scanned for sources.
    pub input_dir: PathBuf,
    /// Directory receiving extracted audio.
    pub output_dir: PathBuf,
    /// Directory holding `extraction_record_<format>.json`.
    pub record_dir: PathBuf,
    /// Move loose videos from this directory into `input_dir` first.
    pub stage_from: Option<PathBuf>,
    pub format: AudioFormat,
    pub quality: Bitrate,
    pub adaptive: bool,
    pub parallelism: Parallelism,
    /// Read and write the record store.
    pub resume: bool,
    /// Move finished sources into `<input_dir>/done`.
    pub archive_done: bool,
}

impl BatchSettings {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            record_dir: PathBuf::from("."),
            stage_from: None,
            format: AudioFormat::default(),
            quality: Bitrate::from_kbps(192),
            adaptive: false,
            parallelism: Parallelism::Auto,
            resume: true,
            archive_done: true,
        }
    }

    pub fn quality_request(&self) -> QualityRequest {
        QualityRequest {
            requested: self.quality,
            adaptive: self.adaptive,
            format: self.format,
        }
    }
}

/// Runs batches against a prober and an encoder.
pub struct BatchScheduler {
    settings: BatchSettings,
    prober: Arc<dyn AudioProber>,
    encoder: Arc<dyn AudioEncoder>,
}

impl BatchScheduler {
    pub fn new(
        settings: BatchSettings,
        prober: Arc<dyn AudioProber>,
        encoder: Arc<dyn AudioEncoder>,
    ) -> Self {
        Self {
            settings,
            prober,
            encoder,
        }
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Run one batch to completion.
    ///
    /// Errors only when the working directories cannot be created or listed.
    /// Everything that goes wrong with an individual file ends up in that
    /// file's [`FileReport`]. Once `cancel` fires no further file is started;
    /// files already running finish and are recorded.
    ///
    /// Sources archived into `<input>/done` by earlier runs are checked too,
    /// so an empty summary means no source was found anywhere.
    pub async fn run(&self, cancel: CancellationToken) -> Result<BatchSummary> {
        let started = Instant::now();
        let settings = &self.settings;
        let mut summary = BatchSummary::default();

        std::fs::create_dir_all(&settings.input_dir).with_context(|| {
            format!("Failed to create input directory: {:?}", settings.input_dir)
        })?;
        std::fs::create_dir_all(&settings.output_dir).with_context(|| {
            format!("Failed to create output directory: {:?}", settings.output_dir)
        })?;

        let organizer = FileOrganizer::new(&settings.input_dir);

        if let Some(root) = &settings.stage_from {
            let staged = organizer.stage_new_files(root)?;
            if !staged.moved.is_empty() {
                info!(
                    "Staged {} new file(s) into {}",
                    staged.moved.len(),
                    settings.input_dir.display()
                );
            }
            summary.staged = staged.moved.len();
            summary.staging_failures = staged.failed;
        }

        let mut candidates: Vec<MediaFile> = list_video_files(&settings.input_dir)?
            .into_iter()
            .map(MediaFile::from_path)
            .collect();

        let (rescued, archived) = scan_archive(&organizer, &candidates, settings)?;
        candidates.extend(rescued);

        if candidates.is_empty() {
            for report in archived {
                summary.push(report);
            }
            if summary.is_empty() {
                warn!("No video files found in {}", settings.input_dir.display());
            }
            summary.elapsed = started.elapsed();
            return Ok(summary);
        }

        info!(
            "Found {} video file(s) in {}",
            candidates.len(),
            settings.input_dir.display()
        );

        let store = if settings.resume {
            let mut store = RecordStore::load(&settings.record_dir, settings.format);
            summary.store_recovered = store.recovered();
            adopt_existing_outputs(&mut store, &candidates, &archived, settings);
            Some(store)
        } else {
            None
        };

        let (eligible, mut skipped) = classify(candidates, store.as_ref());
        skipped.extend(archived);
        let (eligible, collisions) = reject_collisions(eligible, &skipped, settings);
        for report in skipped.into_iter().chain(collisions) {
            summary.push(report);
        }

        let workers = settings.parallelism.workers_for(eligible.len());
        summary.workers = workers;

        if eligible.is_empty() {
            info!("Nothing to extract, {} file(s) already done", summary.skipped);
        } else {
            info!(
                "Extracting {} file(s) to {} with {} worker(s)",
                eligible.len(),
                settings.format,
                workers
            );
        }

        let store = store.map(|s| Arc::new(Mutex::new(s)));
        let worker = Arc::new(Worker {
            prober: Arc::clone(&self.prober),
            encoder: Arc::clone(&self.encoder),
            store: store.clone(),
            organizer: settings.archive_done.then(|| organizer.clone()),
            request: settings.quality_request(),
            output_dir: settings.output_dir.clone(),
        });

        for report in dispatch(worker, eligible, workers, &cancel).await {
            summary.push(report);
        }

        if let Some(store) = store {
            let persisted = store.lock().persist();
            if let Err(e) = persisted {
                error!("Failed to save extraction records: {:#}", e);
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            "Batch finished in {:.1}s: {} succeeded, {} skipped, {} without audio, {} failed, {} interrupted",
            summary.elapsed.as_secs_f64(),
            summary.succeeded,
            summary.skipped,
            summary.no_audio,
            summary.failed,
            summary.interrupted
        );

        Ok(summary)
    }
}

/// Adopt outputs that already exist on disk but have no valid record.
///
/// An output already claimed by another candidate's record, or by an
/// archived source, is left alone.
fn adopt_existing_outputs(
    store: &mut RecordStore,
    candidates: &[MediaFile],
    archived: &[FileReport],
    settings: &BatchSettings,
) {
    let mut claimed: HashSet<PathBuf> = candidates
        .iter()
        .filter(|f| store.is_done(&f.identity))
        .filter_map(|f| store.get(&f.identity))
        .filter(|r| r.output_present())
        .map(|r| r.output_file.clone())
        .chain(archived.iter().filter_map(|r| match &r.outcome {
            FileOutcome::Skipped { output } => Some(output.clone()),
            _ => None,
        }))
        .collect();
    let mut adopted = 0;

    for file in candidates {
        let covered = store.is_done(&file.identity)
            && store
                .get(&file.identity)
                .is_some_and(ExtractionRecord::output_present);
        if covered {
            continue;
        }

        let output = output_path_for(&file.path, &settings.output_dir, settings.format);
        if !output_present(&output) || claimed.contains(&output) {
            continue;
        }

        debug!("Adopting existing output {}", output.display());
        claimed.insert(output.clone());
        let mut record = ExtractionRecord::completed(RecordOrigin::Detected, settings.format, output);
        record.source_size = file.size;
        record.source_modified = file.modified;
        store.insert(file.identity.clone(), record);
        adopted += 1;
    }

    if adopted > 0 {
        info!("Detected {} existing output(s), marking them done", adopted);
        if let Err(e) = store.persist() {
            warn!("Failed to save detected outputs: {:#}", e);
        }
    }
}

/// Sources already archived into `<input>/done`.
///
/// Those whose output is gone come back as candidates; the rest are
/// reported as skipped. Names also present in the input directory are
/// ignored.
fn scan_archive(
    organizer: &FileOrganizer,
    candidates: &[MediaFile],
    settings: &BatchSettings,
) -> Result<(Vec<MediaFile>, Vec<FileReport>)> {
    let mut rescued = Vec::new();
    let mut archived = Vec::new();

    if !organizer.done_dir().is_dir() {
        return Ok((rescued, archived));
    }

    for path in list_video_files(organizer.done_dir())? {
        let file = MediaFile::from_path(path);
        if candidates.iter().any(|c| c.identity == file.identity) {
            continue;
        }

        let output = output_path_for(&file.path, &settings.output_dir, settings.format);
        if output_present(&output) {
            archived.push(FileReport::new(
                file.identity,
                file.path,
                FileOutcome::Skipped { output },
            ));
        } else {
            info!("Archived {} has no output, extracting again", file.identity);
            rescued.push(file);
        }
    }

    Ok((rescued, archived))
}

/// Split candidates into files to extract and files already done.
fn classify(candidates: Vec<MediaFile>, store: Option<&RecordStore>) -> (Vec<MediaFile>, Vec<FileReport>) {
    let Some(store) = store else {
        return (candidates, Vec::new());
    };

    let mut eligible = Vec::new();
    let mut skipped = Vec::new();

    for file in candidates {
        let record = store
            .get(&file.identity)
            .filter(|_| store.is_done(&file.identity));

        match record {
            Some(record) if record.output_present() => {
                debug!("Skipping {}, already extracted", file.identity);
                skipped.push(FileReport::new(
                    file.identity,
                    file.path,
                    FileOutcome::Skipped {
                        output: record.output_file.clone(),
                    },
                ));
            }
            Some(record) => {
                warn!(
                    "Record for {} is stale ({} is missing or empty), extracting again",
                    file.identity,
                    record.output_file.display()
                );
                eligible.push(file);
            }
            None => eligible.push(file),
        }
    }

    (eligible, skipped)
}

/// Keep the first source for each output path.
///
/// Sources sharing a stem (`talk.mkv`, `talk.mp4`) would write the same
/// file; every later one fails without being extracted or recorded.
fn reject_collisions(
    eligible: Vec<MediaFile>,
    skipped: &[FileReport],
    settings: &BatchSettings,
) -> (Vec<MediaFile>, Vec<FileReport>) {
    let mut claimed: HashMap<PathBuf, String> = skipped
        .iter()
        .filter_map(|r| match &r.outcome {
            FileOutcome::Skipped { output } => Some((output.clone(), r.identity.clone())),
            _ => None,
        })
        .collect();
    let mut kept = Vec::with_capacity(eligible.len());
    let mut rejected = Vec::new();

    for file in eligible {
        let output = output_path_for(&file.path, &settings.output_dir, settings.format);
        match claimed.get(&output) {
            Some(owner) => {
                error!(
                    "{} would overwrite {} from {}, not extracting",
                    file.identity,
                    output.display(),
                    owner
                );
                let claimed_by = owner.clone();
                rejected.push(FileReport::new(
                    file.identity,
                    file.path,
                    FileOutcome::Failed(FileError::OutputCollision { output, claimed_by }),
                ));
            }
            None => {
                claimed.insert(output, file.identity.clone());
                kept.push(file);
            }
        }
    }

    (kept, rejected)
}

/// Run `files` through at most `workers` concurrent extractions.
async fn dispatch(
    worker: Arc<Worker>,
    files: Vec<MediaFile>,
    workers: usize,
    cancel: &CancellationToken,
) -> Vec<FileReport> {
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();
    let mut reports = Vec::with_capacity(files.len());
    let mut pending = files.into_iter().enumerate();

    while let Some((index, file)) = pending.next() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
        };

        let Some(permit) = permit else {
            let unstarted = std::iter::once(file).chain(pending.by_ref().map(|(_, f)| f));
            for file in unstarted {
                reports.push(FileReport::new(file.identity, file.path, FileOutcome::Interrupted));
            }
            warn!("Cancelled, not starting remaining files");
            break;
        };

        let worker = Arc::clone(&worker);
        tasks.spawn(async move {
            let _permit = permit;
            match AssertUnwindSafe(worker.process(&file, index + 1))
                .catch_unwind()
                .await
            {
                Ok(report) => report,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!("Worker panicked on {}: {}", file.identity, message);
                    FileReport::new(
                        file.identity.clone(),
                        file.path.clone(),
                        FileOutcome::Failed(FileError::Internal(message)),
                    )
                }
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(report) => reports.push(report),
            Err(e) => error!("Extraction task aborted: {}", e),
        }
    }

    reports
}
