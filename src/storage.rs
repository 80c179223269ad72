//! Filing accepted attachments into dated folders.
//!
//! Layout: `<root>/<YYYY-MM>/<YYYYMMDD>_<subject>_<hash8>_<filename>`
//! where `<subject>` is a sanitized slice of the message subject and
//! `<hash8>` is the first 8 hex characters of the payload's SHA-256, so the
//! same invoice arriving twice lands on the same path.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Result, ScanError};
use crate::model::message::{AttachmentRef, MessageRecord};

/// Result of persisting one attachment payload.
#[derive(Debug, Clone)]
pub struct SavedAttachment {
    /// Final path of the payload on disk.
    pub path: PathBuf,
    /// Payload length in bytes.
    pub bytes: u64,
    /// False when an identical payload was already filed and nothing was
    /// written this time.
    pub written: bool,
}

/// Writes attachment payloads under a deterministic, dated path scheme.
#[derive(Debug, Clone)]
pub struct AttachmentVault {
    root: PathBuf,
}

impl AttachmentVault {
    /// Create a vault rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| ScanError::io(&root, e))?;
        Ok(Self { root })
    }

    /// The vault's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist one attachment payload. When an identical payload for this
    /// message was already filed (the content hash in the name makes this
    /// detectable), the existing path is returned with `written: false`.
    pub fn save(
        &self,
        record: &MessageRecord,
        attachment: &AttachmentRef,
        data: &[u8],
    ) -> Result<SavedAttachment> {
        let month_dir = self.root.join(record.received.format("%Y-%m").to_string());
        std::fs::create_dir_all(&month_dir).map_err(|e| ScanError::io(&month_dir, e))?;

        let date = record.received.format("%Y%m%d");
        let subject = sanitize_filename_part(&record.subject, 50);
        let hash = content_hash8(data);
        let original = sanitize_filename_part(&attachment.filename, 100);

        let filename = format!("{date}_{subject}_{hash}_{original}");
        let path = month_dir.join(filename);

        let bytes = data.len() as u64;
        if path.exists() {
            debug!(path = %path.display(), "Skipping duplicate attachment");
            return Ok(SavedAttachment {
                path,
                bytes,
                written: false,
            });
        }

        std::fs::write(&path, data).map_err(|e| ScanError::Storage {
            filename: attachment.filename.clone(),
            reason: format!("write '{}': {e}", path.display()),
        })?;
        info!(path = %path.display(), size = data.len(), "Saved attachment");
        Ok(SavedAttachment {
            path,
            bytes,
            written: true,
        })
    }
}

/// First 8 hex characters of the payload's SHA-256.
fn content_hash8(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = format!("{:x}", hasher.finalize());
    digest[..8].to_string()
}

/// Make a string safe for use as part of a filename: keep alphanumerics,
/// dashes and dots, collapse whitespace and underscore runs into single
/// underscores, and truncate to `max_len` characters.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(s.len().min(max_len));
    let mut last_was_sep = true;
    for ch in s.chars() {
        if out.chars().count() >= max_len {
            break;
        }
        if ch.is_alphanumeric() || ch == '-' || ch == '.' {
            out.push(ch);
            last_was_sep = false;
        } else if ch == '_' || ch.is_whitespace() {
            if !last_was_sep {
                out.push('_');
                last_was_sep = true;
            }
        }
        // Everything else is dropped.
    }
    let trimmed = out.trim_matches('_').to_string();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record(subject: &str) -> MessageRecord {
        MessageRecord {
            id: "msg-1".to_string(),
            subject: subject.to_string(),
            sender: "shop@example.com".to_string(),
            received: chrono::Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap(),
            body: String::new(),
            attachments: Vec::new(),
        }
    }

    fn attachment(filename: &str) -> AttachmentRef {
        AttachmentRef {
            filename: filename.to_string(),
            content_type: "application/pdf".to_string(),
            size: 4,
            has_content: true,
        }
    }

    #[test]
    fn test_save_under_month_folder() {
        let dir = tempfile::tempdir().unwrap();
        let vault = AttachmentVault::new(dir.path().join("invoices")).unwrap();

        let saved = vault
            .save(&record("Invoice #88"), &attachment("scan.pdf"), b"data")
            .unwrap();

        assert!(saved.written);
        assert_eq!(saved.bytes, 4);
        let path = saved.path;
        assert!(path.exists());
        assert_eq!(
            path.parent().unwrap().file_name().unwrap(),
            "2024-03",
            "attachments are filed by message month"
        );
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("20240315_Invoice_88_"));
        assert!(name.ends_with("_scan.pdf"));
    }

    #[test]
    fn test_identical_payload_is_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let vault = AttachmentVault::new(dir.path()).unwrap();
        let rec = record("Repair bill");
        let att = attachment("invoice.pdf");

        let first = vault.save(&rec, &att, b"same bytes").unwrap();
        let second = vault.save(&rec, &att, b"same bytes").unwrap();
        assert!(first.written);
        assert!(!second.written, "an identical payload is not rewritten");
        assert_eq!(first.path, second.path);

        let third = vault.save(&rec, &att, b"different bytes").unwrap();
        assert_ne!(
            first.path, third.path,
            "different content gets a different hash"
        );
    }

    #[test]
    fn test_sanitize_filename_part() {
        assert_eq!(
            sanitize_filename_part("Invoice - Freightliner Repair Unit 574", 50),
            "Invoice_-_Freightliner_Repair_Unit_574"
        );
        assert_eq!(sanitize_filename_part("a/b\\c:d", 50), "abcd");
        assert_eq!(sanitize_filename_part("   ", 50), "untitled");
        assert!(sanitize_filename_part(&"x".repeat(500), 50).chars().count() <= 50);
    }
}
