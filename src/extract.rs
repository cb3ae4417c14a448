//! Attachment extraction from a parsed message.
//!
//! Walks the full MIME part tree depth-first and yields every part that is
//! genuinely an attachment: disposition exactly `attachment`, a non-empty
//! filename, and a non-empty decoded payload. Inline bodies, alternative
//! text/html renderings, and empty placeholder parts are all skipped.
//! Name synthesis for the degenerate no-filename case is the persistence
//! layer's concern, not this module's.

use crate::message::{Disposition, FetchedMessage, MessagePart};
use tracing::debug;

/// One extracted attachment blob.
///
/// Produced transiently; ownership passes to the persistence step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Original filename, if the part carried one.
    pub filename: Option<String>,
    /// Decoded payload bytes, never empty.
    pub payload: Vec<u8>,
}

/// Extracts all qualifying attachments from a message.
///
/// The walk is an explicit-stack depth-first traversal (children pushed in
/// reverse so they pop in message order); returned attachments appear in
/// tree order. Depth is already bounded at tree-construction time.
#[must_use]
pub fn extract(message: &FetchedMessage) -> Vec<Attachment> {
    let mut attachments = Vec::new();
    let mut stack: Vec<&MessagePart> = vec![&message.root];

    while let Some(part) = stack.pop() {
        if qualifies(part) {
            attachments.push(Attachment {
                filename: part.filename.clone(),
                payload: part.payload.clone(),
            });
        }

        for child in part.children.iter().rev() {
            stack.push(child);
        }
    }

    debug!(
        uid = message.uid,
        count = attachments.len(),
        "Extracted attachments"
    );

    attachments
}

/// A part qualifies only if all three hold: disposition is exactly
/// `attachment`, it has a filename, and its decoded payload is non-empty.
fn qualifies(part: &MessagePart) -> bool {
    part.disposition == Disposition::Attachment
        && part.filename.as_deref().is_some_and(|name| !name.is_empty())
        && !part.payload.is_empty()
}
