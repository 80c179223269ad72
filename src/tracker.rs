//! Durable processed-message log.
//!
//! One JSON object per line, appended as messages are handled. The log is
//! the single point of cross-run coordination: once an id is recorded, later
//! runs skip it without re-scoring, so historical decisions stay immutable
//! even when weights or keyword sets change between runs.
//!
//! Each append is flushed before the message counts as seen. If the write
//! fails the message is *not* marked, and the next run picks it up again —
//! a message is never silently dropped by a crash mid-write.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{Result, ScanError};
use crate::model::decision::{ClassificationResult, Outcome};

/// One durable record: a message id and how its first scan ended.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProcessedEntry {
    /// The message identifier.
    pub id: String,
    /// How the message ended its run.
    pub outcome: Outcome,
    /// Confidence at the time of the scan.
    pub confidence: u32,
    /// When the scan happened.
    pub scanned_at: DateTime<Utc>,
    /// Attachment files written for this message (empty unless accepted).
    pub saved_paths: Vec<PathBuf>,
}

impl ProcessedEntry {
    /// Build an entry from a classification result and the paths saved for it.
    pub fn from_result(
        result: &ClassificationResult,
        outcome: Outcome,
        saved_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            id: result.id.clone(),
            outcome,
            confidence: result.confidence,
            scanned_at: Utc::now(),
            saved_paths,
        }
    }
}

/// Append-only log of processed message ids, held in memory as a map and
/// mirrored line-by-line on disk.
pub struct ProcessedLog {
    path: PathBuf,
    file: File,
    entries: BTreeMap<String, ProcessedEntry>,
}

impl ProcessedLog {
    /// Open (or create) the log at `path`, loading all prior entries.
    ///
    /// A torn final line — the footprint of a crash mid-append — is skipped
    /// with a warning; its message was never marked seen and will simply be
    /// scanned again.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ScanError::io(parent, e))?;
        }

        let mut entries = BTreeMap::new();
        if path.exists() {
            let reader =
                BufReader::new(File::open(&path).map_err(|e| ScanError::io(&path, e))?);
            for (lineno, line) in reader.lines().enumerate() {
                let line = line.map_err(|e| ScanError::io(&path, e))?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ProcessedEntry>(&line) {
                    Ok(entry) => {
                        entries.insert(entry.id.clone(), entry);
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            line = lineno + 1,
                            error = %e,
                            "Skipping unreadable processed-log line"
                        );
                    }
                }
            }
            debug!(
                path = %path.display(),
                count = entries.len(),
                "Loaded processed log"
            );
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ScanError::io(&path, e))?;

        Ok(Self {
            path,
            file,
            entries,
        })
    }

    /// Whether this message id was recorded by a prior (or this) run.
    pub fn has_seen(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Durably record one entry. The in-memory map is only updated after
    /// the line has been written and flushed.
    pub fn record(&mut self, entry: ProcessedEntry) -> Result<()> {
        let line = serde_json::to_string(&entry).map_err(|e| ScanError::Tracker {
            path: self.path.clone(),
            reason: format!("serialize entry '{}': {e}", entry.id),
        })?;
        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.write_all(b"\n"))
            .and_then(|()| self.file.flush())
            .map_err(|e| ScanError::Tracker {
                path: self.path.clone(),
                reason: format!("append entry '{}': {e}", entry.id),
            })?;
        self.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    /// All recorded entries, keyed by message id.
    pub fn entries(&self) -> &BTreeMap<String, ProcessedEntry> {
        &self.entries
    }

    /// Number of recorded message ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
