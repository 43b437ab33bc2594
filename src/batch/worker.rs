//! Processing of a single source file: probe, resolve, extract, record, archive.

use super::report::{FileError, FileOutcome, FileReport};
use super::MediaFile;
use crate::organizer::FileOrganizer;
use crate::quality::QualityRequest;
use crate::store::{output_present, ExtractionRecord, RecordOrigin, SharedStore};
use audex_av::{AudioEncoder, AudioProbe, AudioProber, ExtractJob};
use audex_common::paths::output_path_for;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Everything a worker needs, shared by all in-flight files.
pub(crate) struct Worker {
    pub prober: Arc<dyn AudioProber>,
    pub encoder: Arc<dyn AudioEncoder>,
    /// `None` when resume is disabled.
    pub store: Option<SharedStore>,
    /// `None` when archiving is disabled.
    pub organizer: Option<FileOrganizer>,
    pub request: QualityRequest,
    pub output_dir: PathBuf,
}

impl Worker {
    /// Run one file to a terminal outcome. Never panics on I/O or tool errors.
    pub async fn process(&self, file: &MediaFile, job: usize) -> FileReport {
        let started = Instant::now();
        let mut warnings = Vec::new();

        let outcome = self.run(file, job, &mut warnings).await;

        let mut report = FileReport::new(file.identity.clone(), file.path.clone(), outcome);
        report.warnings = warnings;
        report.elapsed = started.elapsed();
        report
    }

    async fn run(&self, file: &MediaFile, job: usize, warnings: &mut Vec<FileError>) -> FileOutcome {
        info!("[job {}] Processing {}", job, file.identity);

        let source_bps = match self.prober.probe_audio(&file.path).await {
            Ok(AudioProbe::NoAudioStream) => {
                info!("[job {}] {} has no audio stream, skipping", job, file.identity);
                return FileOutcome::NoAudio;
            }
            Ok(probe) => probe.bitrate(),
            Err(e) => {
                warn!(
                    "[job {}] Probe failed for {}, treating bitrate as unknown: {}",
                    job, file.identity, e
                );
                warnings.push(FileError::Probe(e));
                None
            }
        };

        let decision = self.request.resolve(source_bps);
        if decision.adjusted {
            if let (Some(bps), Some(effective)) = (source_bps, decision.bitrate) {
                info!(
                    "[job {}] {}: source audio ~{} kbps, using {} instead of {}",
                    job,
                    file.identity,
                    bps / 1000,
                    effective,
                    self.request.requested
                );
            }
        }

        let output = output_path_for(&file.path, &self.output_dir, self.request.format);
        let extract = ExtractJob {
            input: file.path.clone(),
            output: output.clone(),
            format: self.request.format,
            bitrate: decision.bitrate,
        };

        debug!(
            "[job {}] {} via {} -> {}",
            job,
            file.identity,
            self.encoder.name(),
            output.display()
        );

        if let Err(e) = self.encoder.extract(&extract).await {
            error!("[job {}] Extraction failed for {}: {}", job, file.identity, e);
            return FileOutcome::Failed(FileError::Encode(e));
        }

        if !output_present(&output) {
            error!(
                "[job {}] {} produced no output at {}",
                job,
                file.identity,
                output.display()
            );
            return FileOutcome::Failed(FileError::EmptyOutput(output));
        }

        // Store and archive writes block; run them on the blocking pool.
        if let Some(store) = &self.store {
            let mut record =
                ExtractionRecord::completed(RecordOrigin::Extracted, self.request.format, output.clone());
            record.quality = decision.bitrate;
            record.requested_quality = decision.bitrate.map(|_| self.request.requested);
            record.source_size = file.size;
            record.source_modified = file.modified;

            let store = Arc::clone(store);
            let identity = file.identity.clone();
            let saved = tokio::task::spawn_blocking(move || {
                let mut store = store.lock();
                store.mark_done(identity, record)
            })
            .await
            .map_err(anyhow::Error::from)
            .and_then(|saved| saved);
            if let Err(e) = saved {
                warn!("[job {}] Could not save record for {}: {:#}", job, file.identity, e);
                warnings.push(FileError::Store(format!("{e:#}")));
            }
        }

        let archived_to = match &self.organizer {
            Some(organizer) if !organizer.is_archived(&file.path) => {
                let organizer = organizer.clone();
                let source = file.path.clone();
                let moved = tokio::task::spawn_blocking(move || organizer.mark_file_done(&source))
                    .await
                    .map_err(anyhow::Error::from)
                    .and_then(|moved| moved);
                match moved {
                    Ok(dest) => Some(dest),
                    Err(e) => {
                        warn!("[job {}] Could not archive {}: {:#}", job, file.identity, e);
                        warnings.push(FileError::Organize {
                            path: file.path.clone(),
                            message: format!("{e:#}"),
                        });
                        None
                    }
                }
            }
            _ => None,
        };

        info!("[job {}] Extracted {} -> {}", job, file.identity, output.display());

        FileOutcome::Succeeded {
            output,
            bitrate: decision.bitrate,
            adjusted: decision.adjusted,
            archived_to,
        }
    }
}
