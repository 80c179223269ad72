//! Classification decisions and per-run summaries.

use chrono::{DateTime, Utc};

/// Final outcome of one message within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Classified as a mechanic invoice.
    Accepted,
    /// Scored below the threshold.
    Rejected,
    /// A hard-exclusion rule fired before scoring.
    Excluded,
    /// Classification succeeded but persistence failed.
    Error,
}

/// The classifier's verdict for a single message.
///
/// Immutable once created; the triggered list is the audit trail and is kept
/// in extractor-evaluation order (VIN, unit, keywords, attachment, subject).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClassificationResult {
    /// Identifier of the classified message.
    pub id: String,

    /// Whether the message is considered a mechanic invoice.
    pub is_invoice: bool,

    /// Sum of triggered signal weights, keyword contribution capped.
    /// Deliberately not clamped at 100 — this is an audit value, not a
    /// probability.
    pub confidence: u32,

    /// Names of the signals that fired, or `["excluded: <term>"]` when an
    /// exclusion rule short-circuited scoring.
    pub triggered: Vec<String>,

    /// The acceptance threshold the decision was made against.
    pub threshold: u32,
}

impl ClassificationResult {
    /// Derive the run outcome (before any persistence errors are applied).
    pub fn outcome(&self) -> Outcome {
        if self
            .triggered
            .first()
            .is_some_and(|t| t.starts_with("excluded"))
        {
            Outcome::Excluded
        } else if self.is_invoice {
            Outcome::Accepted
        } else {
            Outcome::Rejected
        }
    }
}

/// Counters accumulated over one scan pass.
///
/// Serialized to a JSON file in the data directory after each run so that
/// failures stay visible without aborting the batch.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RunSummary {
    /// When the pass started.
    pub started_at: DateTime<Utc>,
    /// Messages actually classified this run.
    pub scanned: usize,
    /// Messages accepted as mechanic invoices.
    pub accepted: usize,
    /// Messages scored below the threshold.
    pub rejected: usize,
    /// Messages rejected by a hard-exclusion rule.
    pub excluded: usize,
    /// Messages that ended the run error-marked.
    pub errors: usize,
    /// Messages skipped because a prior run already recorded them.
    pub skipped_seen: usize,
    /// Attachment files written.
    pub attachments_saved: usize,
    /// Total bytes of attachment payload written.
    pub bytes_saved: u64,
}

impl RunSummary {
    /// Fresh summary stamped with the current time.
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            scanned: 0,
            accepted: 0,
            rejected: 0,
            excluded: 0,
            errors: 0,
            skipped_seen: 0,
            attachments_saved: 0,
            bytes_saved: 0,
        }
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}
