//! The message record handed to the classifier.

use chrono::{DateTime, Utc};

/// A single email message as seen by the classifier.
///
/// Built once by the mail source, then owned by the run coordinator for the
/// duration of one classification. Attachment payloads are **not** part of
/// the record — they are fetched lazily through the source only after a
/// message has been accepted.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageRecord {
    /// Provider-unique message identifier (`Message-ID` header, or the
    /// source filename when the header is missing).
    pub id: String,

    /// Decoded subject line (may be empty).
    pub subject: String,

    /// Sender address or display name (may be empty).
    pub sender: String,

    /// When the message was received.
    pub received: DateTime<Utc>,

    /// Plain-text body. Empty when the message had no text part or could
    /// not be decoded.
    pub body: String,

    /// Attachment descriptors in message order.
    pub attachments: Vec<AttachmentRef>,
}

/// Metadata about one attachment. Payload bytes live with the mail source.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AttachmentRef {
    /// Filename of the attachment. Generated if missing from the headers.
    pub filename: String,

    /// MIME content type (e.g. `"application/pdf"`).
    pub content_type: String,

    /// Decoded size in bytes.
    pub size: u64,

    /// Whether the source actually holds content for this descriptor.
    pub has_content: bool,
}

impl AttachmentRef {
    /// PDF detection by content type or filename extension.
    pub fn is_pdf(&self) -> bool {
        self.content_type.to_lowercase().starts_with("application/pdf")
            || self.filename.to_lowercase().ends_with(".pdf")
    }

    /// Whether this attachment should be persisted when the message is
    /// accepted. Invoices arrive as PDFs or scanned images; everything
    /// else (calendar invites, signatures) is left in place.
    pub fn is_savable(&self) -> bool {
        if !self.has_content {
            return false;
        }
        if self.is_pdf() || self.content_type.to_lowercase().starts_with("image/") {
            return true;
        }
        let name = self.filename.to_lowercase();
        [".png", ".jpg", ".jpeg", ".tiff"]
            .iter()
            .any(|ext| name.ends_with(ext))
    }
}
