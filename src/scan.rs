//! Run coordinator: one full scan pass over a mail source.
//!
//! Sequential by design. Each message is classified, its attachments saved
//! if accepted, and its outcome durably recorded, one at a time and in
//! source order. A per-message failure marks that message as an error and
//! the pass continues; the summary makes every outcome category visible.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::classify::Classifier;
use crate::error::{Result, ScanError};
use crate::model::decision::{Outcome, RunSummary};
use crate::source::MailSource;
use crate::storage::AttachmentVault;
use crate::tracker::{ProcessedEntry, ProcessedLog};

/// Behavior switches for one pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Classify only: save nothing, mark nothing as seen.
    pub dry_run: bool,
    /// Re-classify messages the log already records. Audit override; the
    /// new entry is appended and the newest wins on the next load.
    pub force: bool,
}

/// Run one scan pass.
///
/// The processed log is consulted *before* classification so prior
/// decisions are never re-derived, and written after every message so a
/// crash cannot silently drop one.
pub fn run_scan(
    source: &mut dyn MailSource,
    classifier: &Classifier,
    log: &mut ProcessedLog,
    vault: &AttachmentVault,
    options: ScanOptions,
    progress: Option<&dyn Fn(usize, usize)>,
) -> Result<RunSummary> {
    let records = source.messages()?;
    let total = records.len();
    let mut summary = RunSummary::new();

    info!(messages = total, dry_run = options.dry_run, "Starting scan pass");

    for (i, record) in records.into_iter().enumerate() {
        if let Some(cb) = progress {
            cb(i, total);
        }

        if !options.force && log.has_seen(&record.id) {
            summary.skipped_seen += 1;
            continue;
        }
        summary.scanned += 1;

        let result = classifier.classify(&record);
        let mut outcome = result.outcome();
        let mut saved_paths: Vec<PathBuf> = Vec::new();

        if outcome == Outcome::Accepted {
            info!(
                id = %record.id,
                subject = %record.subject,
                confidence = result.confidence,
                signals = ?result.triggered,
                "Invoice found"
            );
            if !options.dry_run {
                for attachment in record.attachments.iter().filter(|a| a.is_savable()) {
                    let saved = source
                        .attachment_data(&record.id, attachment)
                        .and_then(|data| vault.save(&record, attachment, &data));
                    match saved {
                        Ok(saved) => {
                            if saved.written {
                                summary.attachments_saved += 1;
                                summary.bytes_saved += saved.bytes;
                            }
                            saved_paths.push(saved.path);
                        }
                        Err(e) => {
                            warn!(
                                id = %record.id,
                                filename = %attachment.filename,
                                error = %e,
                                "Failed to save attachment"
                            );
                            outcome = Outcome::Error;
                        }
                    }
                }
            }
        }

        match outcome {
            Outcome::Accepted => summary.accepted += 1,
            Outcome::Rejected => summary.rejected += 1,
            Outcome::Excluded => summary.excluded += 1,
            Outcome::Error => summary.errors += 1,
        }

        if !options.dry_run {
            let entry = ProcessedEntry::from_result(&result, outcome, saved_paths);
            if let Err(e) = log.record(entry) {
                // The message stays unmarked and will be scanned again next
                // run; surface the failure in the summary.
                warn!(id = %record.id, error = %e, "Failed to record processed entry");
                if outcome != Outcome::Error {
                    summary.errors += 1;
                }
            }
        }
    }

    if let Some(cb) = progress {
        cb(total, total);
    }

    info!(
        scanned = summary.scanned,
        accepted = summary.accepted,
        rejected = summary.rejected,
        excluded = summary.excluded,
        errors = summary.errors,
        skipped = summary.skipped_seen,
        "Scan pass complete"
    );

    Ok(summary)
}

/// Write the run summary as a timestamped JSON file for later inspection.
pub fn write_summary(summary: &RunSummary, data_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(data_dir).map_err(|e| ScanError::io(data_dir, e))?;
    let filename = format!(
        "scan_summary_{}.json",
        summary.started_at.format("%Y%m%d_%H%M%S")
    );
    let path = data_dir.join(filename);
    let json = serde_json::to_string_pretty(summary).map_err(|e| ScanError::Tracker {
        path: path.clone(),
        reason: format!("serialize summary: {e}"),
    })?;
    std::fs::write(&path, json).map_err(|e| ScanError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::classify::signals::VehicleTarget;
    use crate::classify::weights::SignalWeights;
    use crate::classify::MatchRules;
    use crate::model::message::{AttachmentRef, MessageRecord};

    /// In-memory source for coordinator tests; can be told to fail
    /// attachment downloads.
    struct FakeSource {
        records: Vec<MessageRecord>,
        fail_attachments: bool,
    }

    impl MailSource for FakeSource {
        fn messages(&mut self) -> Result<Vec<MessageRecord>> {
            Ok(self.records.clone())
        }

        fn attachment_data(&mut self, id: &str, a: &AttachmentRef) -> Result<Vec<u8>> {
            if self.fail_attachments {
                Err(ScanError::MessageParse {
                    id: id.to_string(),
                    reason: format!("simulated download failure for '{}'", a.filename),
                })
            } else {
                Ok(b"%PDF-1.4 payload".to_vec())
            }
        }
    }

    fn classifier() -> Classifier {
        Classifier::new(
            VehicleTarget::new("3AKJHHDR7KSKE1598", "574").unwrap(),
            SignalWeights::default(),
            MatchRules {
                keywords: vec!["repair".to_string()],
                exclusion_terms: vec!["rate confirmation".to_string()],
                excluded_senders: Vec::new(),
                subject_terms: vec!["invoice".to_string()],
            },
            30,
        )
    }

    fn pdf_attachment() -> AttachmentRef {
        AttachmentRef {
            filename: "invoice.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size: 16,
            has_content: true,
        }
    }

    fn message(id: &str, subject: &str, body: &str, pdf: bool) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            subject: subject.to_string(),
            sender: "shop@example.com".to_string(),
            received: Utc::now(),
            body: body.to_string(),
            attachments: if pdf { vec![pdf_attachment()] } else { Vec::new() },
        }
    }

    fn sample_records() -> Vec<MessageRecord> {
        vec![
            message("accept-1", "Invoice Unit 574", "brake repair KSKE1598", true),
            message("exclude-1", "Rate Confirmation #4521", "unit 574", false),
            message("reject-1", "Lunch Friday?", "see you there", false),
        ]
    }

    #[test]
    fn test_pass_counts_every_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource {
            records: sample_records(),
            fail_attachments: false,
        };
        let mut log = ProcessedLog::open(dir.path().join("processed.jsonl")).unwrap();
        let vault = AttachmentVault::new(dir.path().join("invoices")).unwrap();

        let summary = run_scan(
            &mut source,
            &classifier(),
            &mut log,
            &vault,
            ScanOptions::default(),
            None,
        )
        .unwrap();

        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.excluded, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.errors, 0);
        assert_eq!(summary.attachments_saved, 1);
        assert_eq!(summary.bytes_saved, 16, "counts the payload written to disk");
        assert_eq!(log.len(), 3);
        assert_eq!(log.entries()["accept-1"].saved_paths.len(), 1);
        assert!(log.entries()["accept-1"].saved_paths[0].exists());
    }

    #[test]
    fn test_second_pass_skips_seen_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource {
            records: sample_records(),
            fail_attachments: false,
        };
        let mut log = ProcessedLog::open(dir.path().join("processed.jsonl")).unwrap();
        let vault = AttachmentVault::new(dir.path().join("invoices")).unwrap();

        run_scan(
            &mut source,
            &classifier(),
            &mut log,
            &vault,
            ScanOptions::default(),
            None,
        )
        .unwrap();

        let summary = run_scan(
            &mut source,
            &classifier(),
            &mut log,
            &vault,
            ScanOptions::default(),
            None,
        )
        .unwrap();

        assert_eq!(summary.scanned, 0);
        assert_eq!(summary.skipped_seen, 3);
        assert_eq!(summary.accepted, 0);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource {
            records: sample_records(),
            fail_attachments: false,
        };
        let mut log = ProcessedLog::open(dir.path().join("processed.jsonl")).unwrap();
        let vault = AttachmentVault::new(dir.path().join("invoices")).unwrap();

        let summary = run_scan(
            &mut source,
            &classifier(),
            &mut log,
            &vault,
            ScanOptions {
                dry_run: true,
                force: false,
            },
            None,
        )
        .unwrap();

        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.attachments_saved, 0);
        assert!(log.is_empty());
        assert_eq!(
            std::fs::read_dir(dir.path().join("invoices"))
                .unwrap()
                .count(),
            0
        );
    }

    #[test]
    fn test_download_failure_marks_error_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource {
            records: sample_records(),
            fail_attachments: true,
        };
        let mut log = ProcessedLog::open(dir.path().join("processed.jsonl")).unwrap();
        let vault = AttachmentVault::new(dir.path().join("invoices")).unwrap();

        let summary = run_scan(
            &mut source,
            &classifier(),
            &mut log,
            &vault,
            ScanOptions::default(),
            None,
        )
        .unwrap();

        assert_eq!(summary.errors, 1);
        assert_eq!(summary.accepted, 0, "a failed save is not a clean accept");
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.excluded, 1);
        // The message is still recorded, error-marked, so the run moved on.
        assert_eq!(log.entries()["accept-1"].outcome, Outcome::Error);
    }

    #[test]
    fn test_force_rescans_seen_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource {
            records: sample_records(),
            fail_attachments: false,
        };
        let mut log = ProcessedLog::open(dir.path().join("processed.jsonl")).unwrap();
        let vault = AttachmentVault::new(dir.path().join("invoices")).unwrap();

        run_scan(
            &mut source,
            &classifier(),
            &mut log,
            &vault,
            ScanOptions::default(),
            None,
        )
        .unwrap();

        let summary = run_scan(
            &mut source,
            &classifier(),
            &mut log,
            &vault,
            ScanOptions {
                dry_run: false,
                force: true,
            },
            None,
        )
        .unwrap();

        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.skipped_seen, 0);
        // The identical payload is already on disk; the rescan must not
        // report it as saved again.
        assert_eq!(summary.attachments_saved, 0);
        assert_eq!(summary.bytes_saved, 0);
    }

    #[test]
    fn test_write_summary() {
        let dir = tempfile::tempdir().unwrap();
        let summary = RunSummary::new();
        let path = write_summary(&summary, dir.path()).unwrap();
        assert!(path.exists());
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"scanned\""));
        assert!(text.contains("\"errors\""));
    }
}
