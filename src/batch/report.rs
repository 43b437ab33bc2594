//! Per-file outcomes and the batch summary.

use audex_common::Bitrate;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Something that went wrong with a single file.
///
/// `Encode`, `EmptyOutput` and `OutputCollision` fail a file; the others
/// are attached to a report as warnings.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("probe failed: {0}")]
    Probe(#[source] audex_av::Error),

    #[error("encode failed: {0}")]
    Encode(#[source] audex_av::Error),

    #[error("encoder reported success but {0:?} is missing or empty")]
    EmptyOutput(PathBuf),

    #[error("{output:?} is already the output of {claimed_by}")]
    OutputCollision { output: PathBuf, claimed_by: String },

    #[error("could not archive {path:?}: {message}")]
    Organize { path: PathBuf, message: String },

    #[error("could not save extraction record: {0}")]
    Store(String),

    #[error("worker crashed: {0}")]
    Internal(String),
}

impl FileError {
    /// Short category name for summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            FileError::Probe(_) => "probe",
            FileError::Encode(_) | FileError::EmptyOutput(_) => "encode",
            FileError::OutputCollision { .. } => "collision",
            FileError::Organize { .. } => "organize",
            FileError::Store(_) => "store",
            FileError::Internal(_) => "internal",
        }
    }
}

/// Terminal state of one file in a batch.
#[derive(Debug)]
pub enum FileOutcome {
    Succeeded {
        output: PathBuf,
        /// Bitrate passed to the encoder; `None` for lossless.
        bitrate: Option<Bitrate>,
        /// Whether adaptive mode lowered the requested bitrate.
        adjusted: bool,
        /// Where the source was archived, if it was.
        archived_to: Option<PathBuf>,
    },
    /// Already done on a previous run.
    Skipped { output: PathBuf },
    /// The source has no audio stream.
    NoAudio,
    Failed(FileError),
    /// Never started because the run was cancelled.
    Interrupted,
}

impl FileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FileOutcome::Succeeded { .. } => "succeeded",
            FileOutcome::Skipped { .. } => "skipped",
            FileOutcome::NoAudio => "no-audio",
            FileOutcome::Failed(_) => "failed",
            FileOutcome::Interrupted => "interrupted",
        }
    }
}

/// What happened to one source file.
#[derive(Debug)]
pub struct FileReport {
    /// Source file name.
    pub identity: String,
    /// Source path at the time it was scheduled.
    pub source: PathBuf,
    pub outcome: FileOutcome,
    /// Recoverable problems hit along the way.
    pub warnings: Vec<FileError>,
    pub elapsed: Duration,
}

impl FileReport {
    pub fn new(identity: impl Into<String>, source: impl Into<PathBuf>, outcome: FileOutcome) -> Self {
        Self {
            identity: identity.into(),
            source: source.into(),
            outcome,
            warnings: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }
}

/// Aggregate result of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub no_audio: usize,
    pub failed: usize,
    pub interrupted: usize,
    /// Files staged from the root before the run.
    pub staged: usize,
    /// Loose files that could not be staged, with the reason.
    pub staging_failures: Vec<(PathBuf, String)>,
    /// Number of concurrent workers used.
    pub workers: usize,
    /// Whether the record store on disk was corrupt at load time.
    pub store_recovered: bool,
    pub elapsed: Duration,
    pub reports: Vec<FileReport>,
}

impl BatchSummary {
    pub(crate) fn push(&mut self, report: FileReport) {
        match report.outcome {
            FileOutcome::Succeeded { .. } => self.succeeded += 1,
            FileOutcome::Skipped { .. } => self.skipped += 1,
            FileOutcome::NoAudio => self.no_audio += 1,
            FileOutcome::Failed(_) => self.failed += 1,
            FileOutcome::Interrupted => self.interrupted += 1,
        }
        self.reports.push(report);
    }

    /// Total number of candidate files considered.
    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn was_interrupted(&self) -> bool {
        self.interrupted > 0
    }

    /// Reports for files that failed.
    pub fn failures(&self) -> impl Iterator<Item = (&FileReport, &FileError)> {
        self.reports.iter().filter_map(|r| match &r.outcome {
            FileOutcome::Failed(e) => Some((r, e)),
            _ => None,
        })
    }

    /// Look up a report by source file name.
    pub fn report_for(&self, identity: &str) -> Option<&FileReport> {
        self.reports.iter().find(|r| r.identity == identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_by_outcome() {
        let mut summary = BatchSummary::default();
        summary.push(FileReport::new("a", "a", FileOutcome::NoAudio));
        summary.push(FileReport::new(
            "b",
            "b",
            FileOutcome::Skipped {
                output: PathBuf::from("b.mp3"),
            },
        ));
        summary.push(FileReport::new(
            "c",
            "c",
            FileOutcome::Failed(FileError::EmptyOutput(PathBuf::from("c.mp3"))),
        ));
        summary.push(FileReport::new("d", "d", FileOutcome::Interrupted));

        assert_eq!(summary.total(), 4);
        assert_eq!(
            (summary.succeeded, summary.skipped, summary.no_audio, summary.failed),
            (0, 1, 1, 1)
        );
        assert!(summary.was_interrupted());

        let failures: Vec<_> = summary.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].1.kind(), "encode");
        assert_eq!(summary.report_for("a").unwrap().outcome.label(), "no-audio");
    }
}
