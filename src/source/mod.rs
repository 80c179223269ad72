//! Mail retrieval collaborators.
//!
//! The engine never talks to a mail provider directly; it consumes
//! [`MessageRecord`]s from a [`MailSource`] and asks it for attachment
//! payloads only after a message has been accepted.

pub mod eml;

use crate::error::Result;
use crate::model::message::{AttachmentRef, MessageRecord};

/// A finite, restartable supply of messages for one scan pass.
pub trait MailSource {
    /// Messages within the configured lookback window, in a stable order.
    fn messages(&mut self) -> Result<Vec<MessageRecord>>;

    /// Decoded payload bytes for one attachment of a previously listed
    /// message.
    fn attachment_data(&mut self, id: &str, attachment: &AttachmentRef) -> Result<Vec<u8>>;
}
