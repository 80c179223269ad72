//! Mail source backed by a directory of `.eml` files.
//!
//! This is the drop-folder workflow: mail export tools (or a fetch script)
//! deposit bare RFC 5322 messages into a directory, and each scan pass
//! walks that directory. Files are visited in filename order so runs are
//! deterministic.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use mail_parser::{MessageParser, MimeHeaders};
use tracing::{debug, warn};

use crate::error::{Result, ScanError};
use crate::model::message::{AttachmentRef, MessageRecord};

use super::MailSource;

/// Reads messages from a directory of `.eml` files.
pub struct EmlDirSource {
    dir: PathBuf,
    cutoff: Option<DateTime<Utc>>,
    paths_by_id: HashMap<String, PathBuf>,
}

impl EmlDirSource {
    /// Open a source over `dir`, ignoring messages received more than
    /// `lookback_days` ago (0 disables the window).
    pub fn new(dir: impl Into<PathBuf>, lookback_days: u32) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(ScanError::MaildirNotFound(dir));
        }
        let cutoff = if lookback_days == 0 {
            None
        } else {
            Some(Utc::now() - Duration::days(i64::from(lookback_days)))
        };
        Ok(Self {
            dir,
            cutoff,
            paths_by_id: HashMap::new(),
        })
    }

    fn eml_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .map_err(|e| ScanError::io(&self.dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("eml"))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }
}

impl MailSource for EmlDirSource {
    fn messages(&mut self) -> Result<Vec<MessageRecord>> {
        self.paths_by_id.clear();
        let mut records = Vec::new();

        for path in self.eml_paths()? {
            // One unreadable entry must not abort the pass; it is skipped
            // and will be retried next run since no outcome is recorded.
            let record = match parse_eml(&path) {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable message file");
                    continue;
                }
            };
            if let Some(cutoff) = self.cutoff {
                if record.received < cutoff {
                    debug!(
                        path = %path.display(),
                        received = %record.received,
                        "Skipping message outside lookback window"
                    );
                    continue;
                }
            }
            self.paths_by_id.insert(record.id.clone(), path);
            records.push(record);
        }

        debug!(dir = %self.dir.display(), count = records.len(), "Listed messages");
        Ok(records)
    }

    fn attachment_data(&mut self, id: &str, attachment: &AttachmentRef) -> Result<Vec<u8>> {
        let path = self
            .paths_by_id
            .get(id)
            .ok_or_else(|| ScanError::MessageParse {
                id: id.to_string(),
                reason: "message id not listed by this source".to_string(),
            })?;

        let data = std::fs::read(path).map_err(|e| ScanError::io(path, e))?;
        let msg = MessageParser::default()
            .parse(&data)
            .ok_or_else(|| ScanError::MessageParse {
                id: id.to_string(),
                reason: "message no longer parseable".to_string(),
            })?;

        for (idx, part) in msg.attachments().enumerate() {
            let name = attachment_filename(part.attachment_name(), idx);
            if name == attachment.filename {
                return Ok(part.contents().to_vec());
            }
        }

        Err(ScanError::MessageParse {
            id: id.to_string(),
            reason: format!("attachment '{}' not found", attachment.filename),
        })
    }
}

/// Parse one `.eml` file into a [`MessageRecord`].
///
/// Decoding problems are recovered locally: a message `mail-parser` cannot
/// handle still yields a record with an empty subject and body (the
/// attachment signal can then still fire on nothing, i.e. the message is
/// rejected), logged rather than fatal.
pub fn parse_eml(path: &Path) -> Result<MessageRecord> {
    let data = std::fs::read(path).map_err(|e| ScanError::io(path, e))?;

    let fallback_id = || {
        path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unnamed-message".to_string())
    };

    let Some(msg) = MessageParser::default().parse(&data) else {
        warn!(path = %path.display(), "Unparseable message, treating as empty");
        return Ok(MessageRecord {
            id: fallback_id(),
            subject: String::new(),
            sender: String::new(),
            received: file_mtime(path).unwrap_or_else(Utc::now),
            body: String::new(),
            attachments: Vec::new(),
        });
    };

    let id = msg
        .message_id()
        .map(str::to_string)
        .unwrap_or_else(fallback_id);

    let subject = msg.subject().unwrap_or_default().to_string();

    let sender = msg
        .from()
        .and_then(|a| a.first())
        .and_then(|a| a.address.as_deref().or(a.name.as_deref()))
        .unwrap_or_default()
        .to_string();

    let received = msg
        .date()
        .and_then(|d| DateTime::parse_from_rfc3339(&d.to_rfc3339()).ok())
        .map(|d| d.with_timezone(&Utc))
        .or_else(|| file_mtime(path))
        .unwrap_or_else(Utc::now);

    let body = msg
        .body_text(0)
        .map(|s| s.into_owned())
        .or_else(|| msg.body_html(0).map(|html| html_to_text(&html)))
        .unwrap_or_default();

    let attachments = msg
        .attachments()
        .enumerate()
        .map(|(idx, part)| {
            let content_type = part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(sub) => format!("{}/{sub}", ct.ctype()),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| "application/octet-stream".to_string());
            AttachmentRef {
                filename: attachment_filename(part.attachment_name(), idx),
                content_type,
                size: part.contents().len() as u64,
                has_content: !part.contents().is_empty(),
            }
        })
        .collect();

    Ok(MessageRecord {
        id,
        subject,
        sender,
        received,
        body,
        attachments,
    })
}

fn attachment_filename(name: Option<&str>, idx: usize) -> String {
    name.map(String::from)
        .unwrap_or_else(|| format!("attachment_{idx}"))
}

fn file_mtime(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Convert an HTML body to rough plain text: block tags become newlines,
/// remaining tags are stripped, common entities decoded. Enough for
/// substring matching; this is not a renderer.
fn html_to_text(html: &str) -> String {
    let mut text = html.to_string();
    for tag in &["<br>", "<br/>", "<br />", "</p>", "</div>", "</li>", "</tr>"] {
        text = text.replace(tag, "\n");
        text = text.replace(&tag.to_uppercase(), "\n");
    }

    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    result = result.replace("&amp;", "&");
    result = result.replace("&lt;", "<");
    result = result.replace("&gt;", ">");
    result = result.replace("&quot;", "\"");
    result = result.replace("&#39;", "'");
    result = result.replace("&nbsp;", " ");
    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_eml(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    const SIMPLE: &str = "\
From: Joe's Truck Shop <billing@joestruck.example>\r\n\
To: owner@fleet.example\r\n\
Subject: Invoice for Unit 574\r\n\
Date: Fri, 15 Mar 2024 09:30:00 +0000\r\n\
Message-ID: <inv-88@joestruck.example>\r\n\
Content-Type: text/plain\r\n\
\r\n\
Brake repair on KSKE1598 complete.\r\n";

    #[test]
    fn test_parse_simple_eml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_eml(dir.path(), "inv.eml", SIMPLE);

        let rec = parse_eml(&path).unwrap();
        assert_eq!(rec.id, "inv-88@joestruck.example");
        assert_eq!(rec.subject, "Invoice for Unit 574");
        assert_eq!(rec.sender, "billing@joestruck.example");
        assert!(rec.body.contains("KSKE1598"));
        assert!(rec.attachments.is_empty());
        assert_eq!(rec.received.format("%Y-%m-%d").to_string(), "2024-03-15");
    }

    #[test]
    fn test_unparseable_message_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.eml");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x01]).unwrap();

        let rec = parse_eml(&path).unwrap();
        assert_eq!(rec.id, "broken");
        assert!(rec.subject.is_empty());
        assert!(rec.body.is_empty());
    }

    #[test]
    fn test_source_lists_in_filename_order() {
        let dir = tempfile::tempdir().unwrap();
        write_eml(dir.path(), "b.eml", SIMPLE);
        write_eml(
            dir.path(),
            "a.eml",
            &SIMPLE.replace("inv-88", "inv-87"),
        );
        write_eml(dir.path(), "ignored.txt", "not a message");

        let mut source = EmlDirSource::new(dir.path(), 0).unwrap();
        let records = source.messages().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "inv-87@joestruck.example");
        assert_eq!(records[1].id, "inv-88@joestruck.example");
    }

    #[test]
    fn test_lookback_window_filters_old_messages() {
        let dir = tempfile::tempdir().unwrap();
        write_eml(dir.path(), "old.eml", SIMPLE); // dated 2024-03-15

        let mut source = EmlDirSource::new(dir.path(), 1).unwrap();
        assert!(source.messages().unwrap().is_empty());

        let mut source = EmlDirSource::new(dir.path(), 0).unwrap();
        assert_eq!(source.messages().unwrap().len(), 1);
    }

    #[test]
    fn test_unreadable_entry_does_not_abort_listing() {
        let dir = tempfile::tempdir().unwrap();
        write_eml(dir.path(), "a.eml", SIMPLE);
        // A subdirectory with the right extension must be ignored, not
        // turn the whole listing into an I/O error.
        std::fs::create_dir(dir.path().join("b_subdir.eml")).unwrap();

        let mut source = EmlDirSource::new(dir.path(), 0).unwrap();
        let records = source.messages().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "inv-88@joestruck.example");
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_eml(&dir.path().join("gone.eml")).unwrap_err();
        assert!(matches!(err, ScanError::Io { .. }));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            EmlDirSource::new(&missing, 0),
            Err(ScanError::MaildirNotFound(_))
        ));
    }

    #[test]
    fn test_html_to_text() {
        let text = html_to_text("<p>Oil change<br>on Unit 574 &amp; trailer</p>");
        assert!(text.contains("Oil change"));
        assert!(text.contains("Unit 574 & trailer"));
        assert!(!text.contains('<'));
    }
}
