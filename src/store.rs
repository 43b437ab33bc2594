//! Per-format record of completed extractions.
//!
//! Each output format gets its own `extraction_record_<format>.json`, a
//! pretty-printed object mapping source file name to [`ExtractionRecord`].
//! Writes go through a temp file in the same directory followed by a rename,
//! so a crash never leaves a half-written store behind.

use anyhow::{Context, Result};
use audex_common::{AudioFormat, Bitrate};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// A store shared between concurrent workers.
pub type SharedStore = Arc<Mutex<RecordStore>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Completed,
    /// Anything a hand edit left behind; never counts as done.
    #[serde(other)]
    Unknown,
}

/// How a record came to exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOrigin {
    /// Written by a worker after a successful extraction.
    #[default]
    Extracted,
    /// An existing output adopted without running the encoder.
    Detected,
}

/// One completed (source, format) extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub status: RecordStatus,
    #[serde(default)]
    pub origin: RecordOrigin,
    pub output_file: PathBuf,
    pub audio_format: AudioFormat,
    /// Bitrate actually used; absent for lossless formats and detected outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Bitrate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_quality: Option<Bitrate>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_modified: Option<DateTime<Utc>>,
}

impl ExtractionRecord {
    /// A completed record stamped with the current time.
    pub fn completed(origin: RecordOrigin, format: AudioFormat, output_file: PathBuf) -> Self {
        Self {
            status: RecordStatus::Completed,
            origin,
            output_file,
            audio_format: format,
            quality: None,
            requested_quality: None,
            timestamp: Some(Utc::now()),
            source_size: None,
            source_modified: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RecordStatus::Completed
    }

    /// Whether the recorded output exists and is non-empty.
    pub fn output_present(&self) -> bool {
        output_present(&self.output_file)
    }
}

/// Whether `path` is a regular file with at least one byte.
pub fn output_present(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Completed extractions for one output format.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    format: AudioFormat,
    records: BTreeMap<String, ExtractionRecord>,
    recovered: bool,
}

impl RecordStore {
    /// File name of the store for `format`.
    pub fn file_name(format: AudioFormat) -> String {
        format!("extraction_record_{}.json", format.as_str())
    }

    /// Full path of the store for `format` inside `dir`.
    pub fn path_for(dir: &Path, format: AudioFormat) -> PathBuf {
        dir.join(Self::file_name(format))
    }

    /// An empty store that will persist to `path`.
    pub fn empty(path: PathBuf, format: AudioFormat) -> Self {
        Self {
            path,
            format,
            records: BTreeMap::new(),
            recovered: false,
        }
    }

    /// Load the store for `format` from `dir`.
    ///
    /// A missing file yields an empty store. An unreadable or corrupt file
    /// also yields an empty store, with a warning; the next [`persist`]
    /// overwrites it. Individual malformed entries are dropped on their own.
    ///
    /// [`persist`]: Self::persist
    pub fn load(dir: &Path, format: AudioFormat) -> Self {
        let mut store = Self::empty(Self::path_for(dir, format), format);

        match read_records(&store.path) {
            Ok(records) => {
                tracing::debug!(
                    "Loaded {} extraction record(s) from {}",
                    records.len(),
                    store.path.display()
                );
                store.records = records;
            }
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable extraction record {}: {:#}",
                    store.path.display(),
                    e
                );
                store.recovered = true;
            }
        }

        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the file on disk was corrupt and this store started empty.
    pub fn recovered(&self) -> bool {
        self.recovered
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, identity: &str) -> Option<&ExtractionRecord> {
        self.records.get(identity)
    }

    /// Whether a completed record for this format exists.
    ///
    /// This does not look at the output file; callers decide what a missing
    /// output means.
    pub fn is_done(&self, identity: &str) -> bool {
        self.records
            .get(identity)
            .is_some_and(|r| r.is_completed() && r.audio_format == self.format)
    }

    /// Insert without persisting.
    pub fn insert(&mut self, identity: impl Into<String>, record: ExtractionRecord) {
        self.records.insert(identity.into(), record);
    }

    /// Record a completed extraction and write the store through.
    ///
    /// The in-memory entry is kept even if the write fails, so a later
    /// [`persist`](Self::persist) can still save it.
    pub fn mark_done(&mut self, identity: impl Into<String>, record: ExtractionRecord) -> Result<()> {
        self.insert(identity, record);
        self.persist()
    }

    /// Atomically rewrite the store file.
    pub fn persist(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create record directory: {:?}", dir))?;

        let json = serde_json::to_string_pretty(&self.records)
            .context("Failed to serialize extraction records")?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {:?}", dir))?;
        writeln!(tmp, "{json}")
            .context("Failed to write extraction records")?;
        tmp.as_file()
            .sync_all()
            .context("Failed to sync extraction records")?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;

        tracing::trace!("Persisted {} record(s) to {}", self.records.len(), self.path.display());
        Ok(())
    }
}

fn read_records(path: &Path) -> Result<BTreeMap<String, ExtractionRecord>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let raw: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&content).context("Expected a JSON object of records")?;

    let mut records = BTreeMap::new();
    for (identity, value) in raw {
        match serde_json::from_value::<ExtractionRecord>(value) {
            Ok(record) => {
                records.insert(identity, record);
            }
            Err(e) => tracing::warn!("Dropping malformed record for {}: {}", identity, e),
        }
    }
    Ok(records)
}

/// Accept RFC 3339 strings as well as Unix seconds, either as a number or
/// as a numeric string (`"1712345678.25"`), which older stores used.
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().and_then(from_unix_seconds)),
        Some(serde_json::Value::Number(n)) => n.as_f64().and_then(from_unix_seconds),
        _ => None,
    })
}

fn from_unix_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9) as u32;
    DateTime::from_timestamp(whole, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(format: AudioFormat, output: &Path) -> ExtractionRecord {
        let mut r = ExtractionRecord::completed(RecordOrigin::Extracted, format, output.to_path_buf());
        r.quality = Some(Bitrate::from_kbps(128));
        r
    }

    #[test]
    fn test_missing_store_is_empty() {
        let dir = tempdir().unwrap();
        let store = RecordStore::load(dir.path(), AudioFormat::Mp3);
        assert!(store.is_empty());
        assert!(!store.recovered());
        assert_eq!(store.path(), dir.path().join("extraction_record_mp3.json"));
    }

    #[test]
    fn test_mark_done_writes_through() {
        let dir = tempdir().unwrap();
        let mut store = RecordStore::load(dir.path(), AudioFormat::Mp3);
        store
            .mark_done("a.mkv", record(AudioFormat::Mp3, Path::new("out/a.mp3")))
            .unwrap();

        let reloaded = RecordStore::load(dir.path(), AudioFormat::Mp3);
        assert!(reloaded.is_done("a.mkv"));
        assert!(!reloaded.is_done("b.mkv"));
        assert_eq!(
            reloaded.get("a.mkv").unwrap().quality,
            Some(Bitrate::from_kbps(128))
        );

        // Stores are per format
        assert!(RecordStore::load(dir.path(), AudioFormat::Flac).is_empty());
    }

    #[test]
    fn test_corrupt_store_recovers_empty_and_is_repaired() {
        let dir = tempdir().unwrap();
        let path = RecordStore::path_for(dir.path(), AudioFormat::Aac);
        std::fs::write(&path, "{ this is not json").unwrap();

        let mut store = RecordStore::load(dir.path(), AudioFormat::Aac);
        assert!(store.recovered());
        assert!(store.is_empty());

        store.insert("x.mp4", record(AudioFormat::Aac, Path::new("x.aac")));
        store.persist().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert!(parsed.get("x.mp4").is_some());
    }

    #[test]
    fn test_malformed_entry_is_dropped_alone() {
        let dir = tempdir().unwrap();
        let path = RecordStore::path_for(dir.path(), AudioFormat::Mp3);
        std::fs::write(
            &path,
            r#"{
                "good.mkv": {"status": "completed", "output_file": "good.mp3", "audio_format": "mp3"},
                "bad.mkv": {"status": "completed", "audio_format": "ogg"}
            }"#,
        )
        .unwrap();

        let store = RecordStore::load(dir.path(), AudioFormat::Mp3);
        assert!(!store.recovered());
        assert_eq!(store.len(), 1);
        assert!(store.is_done("good.mkv"));
    }

    #[test]
    fn test_hand_edited_status_is_not_done() {
        let dir = tempdir().unwrap();
        let path = RecordStore::path_for(dir.path(), AudioFormat::Mp3);
        std::fs::write(
            &path,
            r#"{"a.mkv": {"status": "redo", "output_file": "a.mp3", "audio_format": "mp3"}}"#,
        )
        .unwrap();

        let store = RecordStore::load(dir.path(), AudioFormat::Mp3);
        assert_eq!(store.get("a.mkv").unwrap().status, RecordStatus::Unknown);
        assert!(!store.is_done("a.mkv"));
    }

    #[test]
    fn test_legacy_epoch_timestamp() {
        let dir = tempdir().unwrap();
        let path = RecordStore::path_for(dir.path(), AudioFormat::Mp3);
        std::fs::write(
            &path,
            r#"{"a.mkv": {"status": "completed", "output_file": "a.mp3",
                "audio_format": "mp3", "quality": "192k", "timestamp": "1700000000.5"}}"#,
        )
        .unwrap();

        let store = RecordStore::load(dir.path(), AudioFormat::Mp3);
        let rec = store.get("a.mkv").unwrap();
        assert_eq!(rec.origin, RecordOrigin::Extracted);
        assert_eq!(rec.timestamp.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_output_present_requires_bytes() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty.mp3");
        let full = dir.path().join("full.mp3");
        std::fs::write(&empty, b"").unwrap();
        std::fs::write(&full, b"ID3").unwrap();

        assert!(!output_present(&empty));
        assert!(output_present(&full));
        assert!(!output_present(&dir.path().join("missing.mp3")));
        assert!(!output_present(dir.path()));
    }
}
