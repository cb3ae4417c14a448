//! Owned, parsed representation of a fetched message.
//!
//! A [`FetchedMessage`] is built once from the raw RFC822 bytes returned by
//! a fetch and is read-only afterwards: the decoded headers the pipeline
//! cares about (`Subject`, `From`, `Message-ID`, `Date`) and a typed tree of
//! MIME parts. Tree construction bounds nesting depth so a malformed,
//! deeply-nested message cannot recurse without limit.

use crate::error::{Error, Result};
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use tracing::warn;

/// Maximum MIME nesting depth honored when building the part tree.
/// Parts nested deeper than this are dropped with a warning.
pub(crate) const MAX_PART_DEPTH: usize = 32;

/// Content disposition of a MIME part, reduced to what the pipeline
/// distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Part meant to be rendered in place (`inline`, or no disposition).
    Inline,
    /// Part meant for download/storage (`attachment`).
    Attachment,
    /// Any other disposition (`form-data`, extensions).
    Other,
}

impl From<&DispositionType> for Disposition {
    fn from(value: &DispositionType) -> Self {
        match value {
            DispositionType::Inline => Disposition::Inline,
            DispositionType::Attachment => Disposition::Attachment,
            DispositionType::FormData | DispositionType::Extension(_) => Disposition::Other,
        }
    }
}

/// One node of the MIME part tree.
#[derive(Debug, Clone)]
pub struct MessagePart {
    /// Lowercased content type, e.g. `text/plain` or `application/pdf`.
    pub content_type: String,
    /// The part's content disposition.
    pub disposition: Disposition,
    /// Filename from the disposition (or content-type `name`) parameters.
    pub filename: Option<String>,
    /// Decoded payload bytes. Empty for multipart container nodes.
    pub payload: Vec<u8>,
    /// Child parts, in message order.
    pub children: Vec<MessagePart>,
}

/// An in-memory parsed message.
///
/// Owned by the call site that fetched it; the server-side original is
/// immutable within this pipeline's scope except for flag changes, so the
/// same UID may be re-fetched to obtain an identical value.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    /// Server-assigned UID the message was fetched under.
    pub uid: u32,
    /// Decoded `Subject` header.
    pub subject: Option<String>,
    /// Decoded `From` header.
    pub from: Option<String>,
    /// `Message-ID` header, as sent (angle brackets preserved).
    pub message_id: Option<String>,
    /// Raw `Date` header.
    pub date: Option<String>,
    /// Root of the MIME part tree.
    pub root: MessagePart,
}

impl FetchedMessage {
    /// Parses the raw RFC822 bytes of a message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParseMessage`] when the message structure itself is
    /// unparseable. Decoding failures inside individual parts are degraded
    /// to empty payloads with a warning (best-effort decoding).
    pub fn parse(uid: u32, raw: &[u8]) -> Result<Self> {
        let parsed = mailparse::parse_mail(raw).map_err(|source| Error::ParseMessage {
            uid,
            source,
        })?;

        let subject = parsed.headers.get_first_value("Subject");
        let from = parsed.headers.get_first_value("From");
        let message_id = parsed.headers.get_first_value("Message-ID");
        let date = parsed.headers.get_first_value("Date");

        let root = convert_part(uid, &parsed, 0);

        Ok(Self {
            uid,
            subject,
            from,
            message_id,
            date,
            root,
        })
    }
}

/// Converts one `mailparse` node into an owned [`MessagePart`].
///
/// Recursion is bounded by `MAX_PART_DEPTH`; children past the bound are
/// dropped.
fn convert_part(uid: u32, part: &ParsedMail<'_>, depth: usize) -> MessagePart {
    let content_type = part.ctype.mimetype.to_lowercase();

    let parsed_disposition = part.get_content_disposition();
    let disposition = Disposition::from(&parsed_disposition.disposition);

    let filename = parsed_disposition
        .params
        .get("filename")
        .cloned()
        .or_else(|| part.ctype.params.get("name").cloned())
        .filter(|name| !name.is_empty());

    // Containers hold structure, not payload
    let payload = if part.subparts.is_empty() {
        match part.get_body_raw() {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(uid, content_type = %content_type, error = %error, "Failed to decode part body, treating as empty");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let children = if depth + 1 > MAX_PART_DEPTH {
        if !part.subparts.is_empty() {
            warn!(uid, depth, "Part tree exceeds depth bound, dropping nested parts");
        }
        Vec::new()
    } else {
        part.subparts
            .iter()
            .map(|child| convert_part(uid, child, depth + 1))
            .collect()
    };

    MessagePart {
        content_type,
        disposition,
        filename,
        payload,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &[u8] = b"From: sender@example.com\r\n\
Subject: Hello\r\n\
Message-ID: <abc123@example.com>\r\n\
Date: Wed, 10 Jan 2024 10:00:00 +0000\r\n\
\r\n\
Plain body.";

    #[test]
    fn test_parse_simple_message_headers() {
        let message = FetchedMessage::parse(7, SIMPLE).unwrap();
        assert_eq!(message.uid, 7);
        assert_eq!(message.subject.as_deref(), Some("Hello"));
        assert_eq!(message.from.as_deref(), Some("sender@example.com"));
        assert_eq!(message.message_id.as_deref(), Some("<abc123@example.com>"));
        assert!(message.date.is_some());
        assert_eq!(message.root.content_type, "text/plain");
        assert_eq!(message.root.payload, b"Plain body.");
        assert!(message.root.children.is_empty());
    }

    #[test]
    fn test_parse_multipart_with_attachment() {
        let raw = b"From: sender@example.com\r\n\
Subject: Invoice\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain\r\n\
\r\n\
See attached.\r\n\
--XYZ\r\n\
Content-Type: application/pdf; name=\"invoice.pdf\"\r\n\
Content-Disposition: attachment; filename=\"invoice.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--XYZ--\r\n";

        let message = FetchedMessage::parse(1, raw).unwrap();
        assert_eq!(message.root.content_type, "multipart/mixed");
        assert!(message.root.payload.is_empty());
        assert_eq!(message.root.children.len(), 2);

        let text = &message.root.children[0];
        assert_eq!(text.content_type, "text/plain");
        assert_eq!(text.disposition, Disposition::Inline);

        let pdf = &message.root.children[1];
        assert_eq!(pdf.content_type, "application/pdf");
        assert_eq!(pdf.disposition, Disposition::Attachment);
        assert_eq!(pdf.filename.as_deref(), Some("invoice.pdf"));
        // base64 "JVBERi0xLjQ=" decodes to "%PDF-1.4"
        assert_eq!(pdf.payload, b"%PDF-1.4");
    }

    #[test]
    fn test_missing_message_id_is_none() {
        let raw = b"From: sender@example.com\r\nSubject: x\r\n\r\nbody";
        let message = FetchedMessage::parse(2, raw).unwrap();
        assert!(message.message_id.is_none());
    }

    #[test]
    fn test_encoded_subject_is_decoded() {
        let raw = b"Subject: =?utf-8?q?Caf=C3=A9_receipt?=\r\n\r\nbody";
        let message = FetchedMessage::parse(3, raw).unwrap();
        assert_eq!(message.subject.as_deref(), Some("Caf\u{e9} receipt"));
    }

    #[test]
    fn test_filename_falls_back_to_content_type_name() {
        let raw = b"Content-Type: application/octet-stream; name=\"data.bin\"\r\n\
Content-Disposition: attachment\r\n\
\r\n\
payload";
        let message = FetchedMessage::parse(4, raw).unwrap();
        assert_eq!(message.root.filename.as_deref(), Some("data.bin"));
    }
}
