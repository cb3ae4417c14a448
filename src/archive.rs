//! Verified archive-and-delete for a single message.
//!
//! The sequence is COPY, then verify the copy landed, then delete the
//! source - in that order, because the delete is irreversible and the
//! server's COPY may be asynchronous, partial, or a silent no-op. The only
//! authoritative evidence that the message exists at the destination is a
//! `Message-ID` search in the archive folder, so deletion is gated on it
//! whenever a Message-ID is available.
//!
//! Progression: mark Seen (best effort), COPY, verify in archive, delete
//! from source. The two failure exits - copy failed, verification failed -
//! are terminal and non-destructive: the source message keeps existing,
//! flagged Seen at most. A negative [`ArchiveOutcome`] is never retried
//! automatically.

use crate::error::Result;
use crate::session::{Mailbox, Uid};
use tracing::{info, instrument, warn};

/// Header used to verify the copy landed in the archive folder.
const VERIFICATION_HEADER: &str = "Message-ID";

/// What the archive attempt achieved, one per message.
///
/// `copied && !deleted_from_source` is the safe, recoverable failure state:
/// the message may exist twice but has been lost zero times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOutcome {
    /// The server accepted the COPY into the archive folder.
    pub copied: bool,
    /// The copy was confirmed by a Message-ID search in the archive folder.
    pub verified: bool,
    /// The source message was deleted and expunged.
    pub deleted_from_source: bool,
}

impl ArchiveOutcome {
    /// Returns `true` when the message was archived and removed from the
    /// source folder.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.copied && self.deleted_from_source
    }

    fn copy_failed() -> Self {
        Self {
            copied: false,
            verified: false,
            deleted_from_source: false,
        }
    }

    fn verification_failed() -> Self {
        Self {
            copied: true,
            verified: false,
            deleted_from_source: false,
        }
    }
}

/// Runs the verified archive sequence for one message.
///
/// `message_id` is the value captured from the fetched message; when it is
/// absent, verification is skipped with a warning and deletion proceeds on
/// the strength of the COPY response alone (a deliberately preserved,
/// weaker guarantee).
///
/// # Errors
///
/// Copy and verification failures are reported through the returned
/// [`ArchiveOutcome`], not as errors. An `Err` is returned only when the
/// session itself is left unusable - re-selecting the source folder fails -
/// which must abort the whole run.
#[instrument(
    name = "archive::archive_message",
    skip(mailbox, message_id),
    fields(has_message_id = message_id.is_some())
)]
pub async fn archive_message<M: Mailbox + ?Sized>(
    mailbox: &mut M,
    uid: Uid,
    source_folder: &str,
    archive_folder: &str,
    message_id: Option<&str>,
) -> Result<ArchiveOutcome> {
    // Best effort; failure here must not stop the archive sequence
    if let Err(error) = mailbox.mark_seen(uid).await {
        warn!(uid, error = %error, "Failed to mark message as read");
    }

    if let Err(error) = mailbox.copy_to(uid, archive_folder).await {
        warn!(uid, archive_folder, error = %error, "COPY failed, leaving source untouched");
        return Ok(ArchiveOutcome::copy_failed());
    }

    let verified = match message_id {
        Some(message_id) => {
            match verify_in_archive(mailbox, archive_folder, message_id).await {
                Verification::Found => true,
                Verification::NotFound => {
                    warn!(
                        uid,
                        archive_folder,
                        "Copy not found in archive, aborting delete"
                    );
                    // Leave the session where the caller expects it
                    mailbox.select(source_folder).await?;
                    return Ok(ArchiveOutcome::verification_failed());
                }
            }
        }
        None => {
            warn!(uid, "No Message-ID available, deleting without verification");
            false
        }
    };

    mailbox.select(source_folder).await?;

    if let Err(error) = mailbox.mark_deleted_and_expunge(uid).await {
        warn!(uid, error = %error, "Failed to delete source message after copy");
        return Ok(ArchiveOutcome {
            copied: true,
            verified,
            deleted_from_source: false,
        });
    }

    info!(uid, archive_folder, verified, "Message archived");

    Ok(ArchiveOutcome {
        copied: true,
        verified,
        deleted_from_source: true,
    })
}

enum Verification {
    Found,
    NotFound,
}

/// Selects the archive folder and searches it for the captured Message-ID.
///
/// Any failure along the way - selection, search, or an empty result - is
/// treated as "not verified"; only a positive hit allows deletion.
async fn verify_in_archive<M: Mailbox + ?Sized>(
    mailbox: &mut M,
    archive_folder: &str,
    message_id: &str,
) -> Verification {
    if let Err(error) = mailbox.select(archive_folder).await {
        warn!(archive_folder, error = %error, "Cannot select archive folder for verification");
        return Verification::NotFound;
    }

    match mailbox.search_header(VERIFICATION_HEADER, message_id).await {
        Ok(uids) if !uids.is_empty() => Verification::Found,
        Ok(_) => Verification::NotFound,
        Err(error) => {
            warn!(error = %error, "Verification search failed");
            Verification::NotFound
        }
    }
}
