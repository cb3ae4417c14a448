//! End-to-end harvest orchestration.
//!
//! [`Harvester`] drives the whole pipeline: validate and build search terms,
//! connect, search, then per matched message fetch → extract → persist →
//! optionally mark read → optionally archive. Failures scoped to one
//! message are logged and counted, and the loop moves on; failures that
//! invalidate the session abort the run. The session is logged out on every
//! exit path.
//!
//! # Example
//!
//! ```no_run
//! use mail_harvest::{HarvestConfig, HarvestOptions, Harvester, SearchFilter};
//!
//! # async fn example() -> mail_harvest::Result<()> {
//! let config = HarvestConfig::builder()
//!     .host("imap.example.com")
//!     .username("bills@example.com")
//!     .password("app-password")
//!     .download_dir("/home/me/attachments")
//!     .build()?;
//!
//! let filter = SearchFilter::builder()
//!     .from("billing@utility.example")
//!     .unread_only(true)
//!     .defaults(&config.search)
//!     .build()?;
//!
//! let summary = Harvester::new(config)
//!     .run(&filter, HarvestOptions { mark_read: true, archive: true })
//!     .await?;
//!
//! println!(
//!     "matched {}, saved {}, archived {}, failed {}",
//!     summary.matched, summary.attachments_saved, summary.archived, summary.failed
//! );
//! # Ok(())
//! # }
//! ```

use crate::archive;
use crate::config::{FolderConfig, HarvestConfig};
use crate::criteria;
use crate::error::{Error, Result};
use crate::extract;
use crate::filter::SearchFilter;
use crate::session::{Mailbox, MailboxSession, Uid};
use crate::store::AttachmentStore;
use tracing::{debug, info, instrument, warn};

/// Per-run behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct HarvestOptions {
    /// Mark each processed message `\Seen` (best effort).
    pub mark_read: bool,
    /// Run the verified archive sequence for each processed message.
    pub archive: bool,
}

/// Counters describing what a run did.
///
/// Per-message failures are visible here and in the logs; they never abort
/// the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    /// Messages matched by the search.
    pub matched: usize,
    /// Messages actually fetched (matched minus vanished ones).
    pub fetched: usize,
    /// Attachments written to the download directory.
    pub attachments_saved: usize,
    /// Messages fully archived (copied, verified, deleted from source).
    pub archived: usize,
    /// Messages that hit a per-message failure.
    pub failed: usize,
}

/// The end-to-end harvesting pipeline.
///
/// Owns the configuration; each [`run`](Self::run) opens its own session
/// and closes it before returning. One run owns the connection exclusively:
/// processing is strictly sequential by design.
#[derive(Debug)]
pub struct Harvester {
    config: HarvestConfig,
}

impl Harvester {
    /// Creates a harvester over a validated configuration.
    #[must_use]
    pub fn new(config: HarvestConfig) -> Self {
        Self { config }
    }

    /// Runs the pipeline once for the given filter.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: filter/configuration problems,
    /// connection or authentication failure, a rejected search, an archive
    /// folder missing from the server while archiving was requested, or an
    /// unusable download directory. Per-message failures are only reflected
    /// in [`HarvestSummary::failed`].
    #[instrument(
        name = "Harvester::run",
        skip_all,
        fields(
            host = %self.config.host,
            folder = %self.config.folders.inbox,
            mark_read = options.mark_read,
            archive = options.archive
        )
    )]
    pub async fn run(
        &self,
        filter: &SearchFilter,
        options: HarvestOptions,
    ) -> Result<HarvestSummary> {
        let store = AttachmentStore::open(&self.config.download_dir).await?;

        let mut session = MailboxSession::connect(&self.config).await?;
        info!("Connected and authenticated");

        let result = run_harvest(&mut session, &store, &self.config.folders, filter, options).await;

        // The session is torn down whatever happened above; a logout
        // failure is logged but never masks the run's result.
        if let Err(error) = session.logout().await {
            warn!(error = %error, "Logout failed");
        }

        result
    }
}

/// Drives one harvest over an already-connected mailbox.
///
/// Factored out of [`Harvester::run`] so the orchestration logic can be
/// exercised against a scripted mailbox.
pub(crate) async fn run_harvest<M: Mailbox + ?Sized + Send>(
    mailbox: &mut M,
    store: &AttachmentStore,
    folders: &FolderConfig,
    filter: &SearchFilter,
    options: HarvestOptions,
) -> Result<HarvestSummary> {
    let terms = criteria::build(filter);
    info!(terms = terms.len(), query = %terms, "Filter validated");

    let uids = mailbox.search(&terms).await?;
    info!(matched = uids.len(), "Search complete");

    // Archiving into a folder the server does not know is a
    // misconfiguration: refuse the whole run before touching any message.
    if options.archive && !mailbox.folder_exists(&folders.archive).await? {
        return Err(Error::ArchiveFolderMissing {
            folder: folders.archive.clone(),
        });
    }

    let mut summary = HarvestSummary {
        matched: uids.len(),
        ..HarvestSummary::default()
    };

    for uid in uids {
        match process_message(mailbox, store, folders, options, uid, &mut summary).await {
            Ok(()) => {}
            Err(error) if !error.is_fatal() => {
                warn!(
                    uid,
                    category = %error.category(),
                    error = %error,
                    "Message failed, continuing with the next one"
                );
                summary.failed += 1;
            }
            Err(error) => return Err(error),
        }
    }

    info!(
        matched = summary.matched,
        fetched = summary.fetched,
        saved = summary.attachments_saved,
        archived = summary.archived,
        failed = summary.failed,
        "Harvest finished"
    );

    Ok(summary)
}

/// Processes a single matched message.
///
/// Any `Err` bubbling out of here is classified by the caller: non-fatal
/// errors count against this message only.
async fn process_message<M: Mailbox + ?Sized>(
    mailbox: &mut M,
    store: &AttachmentStore,
    folders: &FolderConfig,
    options: HarvestOptions,
    uid: Uid,
    summary: &mut HarvestSummary,
) -> Result<()> {
    // Vanished between search and fetch: not an error, just gone
    let Some(message) = mailbox.fetch(uid).await? else {
        return Ok(());
    };
    summary.fetched += 1;

    let subject = message.subject.clone();
    info!(uid, subject = subject.as_deref().unwrap_or(""), "Processing message");

    let attachments = extract::extract(&message);
    info!(uid, count = attachments.len(), "Extraction complete");

    for attachment in &attachments {
        let path = store.save(attachment, subject.as_deref()).await?;
        debug!(uid, path = %path.display(), "Attachment persisted");
        summary.attachments_saved += 1;
    }

    if options.mark_read {
        if let Err(error) = mailbox.mark_seen(uid).await {
            warn!(uid, error = %error, "Failed to mark message as read");
        }
    }

    if options.archive {
        // Re-fetch so the Message-ID used for verification is fresh
        let message_id = match mailbox.fetch(uid).await? {
            Some(fresh) => fresh.message_id,
            None => {
                warn!(uid, "Message vanished before archiving");
                return Ok(());
            }
        };

        let outcome = archive::archive_message(
            mailbox,
            uid,
            &folders.inbox,
            &folders.archive,
            message_id.as_deref(),
        )
        .await?;

        if outcome.is_complete() {
            summary.archived += 1;
        } else {
            warn!(uid, ?outcome, "Archive incomplete, source message retained");
            summary.failed += 1;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedMailbox;

    fn raw_with_attachment(subject: &str, filename: &str) -> Vec<u8> {
        format!(
            "From: billing@utility.example\r\n\
             Subject: {subject}\r\n\
             Message-ID: <{filename}@example.com>\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: multipart/mixed; boundary=\"B\"\r\n\
             \r\n\
             --B\r\n\
             Content-Type: text/plain\r\n\
             \r\n\
             see attached\r\n\
             --B\r\n\
             Content-Type: application/pdf; name=\"{filename}\"\r\n\
             Content-Disposition: attachment; filename=\"{filename}\"\r\n\
             \r\n\
             payload-of-{filename}\r\n\
             --B--\r\n"
        )
        .into_bytes()
    }

    fn filter() -> SearchFilter {
        SearchFilter::builder()
            .from("billing@utility.example")
            .build()
            .unwrap()
    }

    async fn store_in(dir: &std::path::Path) -> AttachmentStore {
        AttachmentStore::open(dir).await.unwrap()
    }

    #[tokio::test]
    async fn test_happy_path_saves_all_attachments() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path()).await;
        let folders = FolderConfig::default();

        let mut mailbox = ScriptedMailbox::new(["INBOX", "Archive"]);
        mailbox.add_message(1, &raw_with_attachment("January bill", "jan.pdf"));
        mailbox.add_message(2, &raw_with_attachment("February bill", "feb.pdf"));

        let summary = run_harvest(
            &mut mailbox,
            &store,
            &folders,
            &filter(),
            HarvestOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(
            summary,
            HarvestSummary {
                matched: 2,
                fetched: 2,
                attachments_saved: 2,
                archived: 0,
                failed: 0,
            }
        );
        assert!(tmp.path().join("jan.pdf").is_file());
        assert!(tmp.path().join("feb.pdf").is_file());
        // Without mark_read/archive nothing was mutated server-side
        assert!(mailbox.seen.is_empty());
        assert!(mailbox.deleted.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_skips_only_that_message() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path()).await;
        let folders = FolderConfig::default();

        // A directory squatting on message 2's attachment name makes its
        // write fail while 1 and 3 stay writable.
        std::fs::create_dir(tmp.path().join("two.pdf")).unwrap();

        let mut mailbox = ScriptedMailbox::new(["INBOX"]);
        mailbox.add_message(1, &raw_with_attachment("One", "one.pdf"));
        mailbox.add_message(2, &raw_with_attachment("Two", "two.pdf"));
        mailbox.add_message(3, &raw_with_attachment("Three", "three.pdf"));

        let summary = run_harvest(
            &mut mailbox,
            &store,
            &folders,
            &filter(),
            HarvestOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(summary.matched, 3);
        assert_eq!(summary.attachments_saved, 2);
        assert_eq!(summary.failed, 1);
        assert!(tmp.path().join("one.pdf").is_file());
        assert!(tmp.path().join("three.pdf").is_file());
    }

    #[tokio::test]
    async fn test_missing_archive_folder_aborts_before_processing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path()).await;
        let folders = FolderConfig {
            inbox: "INBOX".into(),
            archive: "Nonexistent".into(),
        };

        let mut mailbox = ScriptedMailbox::new(["INBOX", "Archive"]);
        mailbox.add_message(1, &raw_with_attachment("One", "one.pdf"));

        let result = run_harvest(
            &mut mailbox,
            &store,
            &folders,
            &filter(),
            HarvestOptions {
                mark_read: true,
                archive: true,
            },
        )
        .await;

        assert!(matches!(result, Err(Error::ArchiveFolderMissing { .. })));
        // Nothing was processed: no file written, no flag touched
        assert!(!tmp.path().join("one.pdf").exists());
        assert!(mailbox.seen.is_empty());
    }

    #[tokio::test]
    async fn test_vanished_message_is_skipped_silently() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path()).await;
        let folders = FolderConfig::default();

        let mut mailbox = ScriptedMailbox::new(["INBOX"]);
        mailbox.add_message(1, &raw_with_attachment("One", "one.pdf"));
        mailbox.phantom_uids = vec![2];

        let summary = run_harvest(
            &mut mailbox,
            &store,
            &folders,
            &filter(),
            HarvestOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(summary.matched, 2);
        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_mark_read_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path()).await;
        let folders = FolderConfig::default();

        let mut mailbox = ScriptedMailbox::new(["INBOX"]);
        mailbox.add_message(1, &raw_with_attachment("One", "one.pdf"));
        mailbox.add_message(2, &raw_with_attachment("Two", "two.pdf"));

        let summary = run_harvest(
            &mut mailbox,
            &store,
            &folders,
            &filter(),
            HarvestOptions {
                mark_read: true,
                archive: false,
            },
        )
        .await
        .unwrap();

        assert_eq!(summary.failed, 0);
        assert_eq!(mailbox.seen, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_archive_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path()).await;
        let folders = FolderConfig::default();

        let mut mailbox = ScriptedMailbox::new(["INBOX", "Archive"]);
        mailbox.add_message(1, &raw_with_attachment("One", "one.pdf"));
        mailbox.verification_hits = vec![501];

        let summary = run_harvest(
            &mut mailbox,
            &store,
            &folders,
            &filter(),
            HarvestOptions {
                mark_read: false,
                archive: true,
            },
        )
        .await
        .unwrap();

        assert_eq!(summary.archived, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(mailbox.copied, vec![(1, "Archive".to_string())]);
        assert_eq!(mailbox.deleted, vec![1]);
        // Verification used the re-fetched Message-ID
        assert_eq!(mailbox.header_searches.len(), 1);
        assert_eq!(mailbox.header_searches[0].2, "<one.pdf@example.com>");
    }

    #[tokio::test]
    async fn test_copy_failure_counts_failed_but_continues() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path()).await;
        let folders = FolderConfig::default();

        let mut mailbox = ScriptedMailbox::new(["INBOX", "Archive"]);
        mailbox.add_message(1, &raw_with_attachment("One", "one.pdf"));
        mailbox.add_message(2, &raw_with_attachment("Two", "two.pdf"));
        mailbox.fail_copy = true;

        let summary = run_harvest(
            &mut mailbox,
            &store,
            &folders,
            &filter(),
            HarvestOptions {
                mark_read: false,
                archive: true,
            },
        )
        .await
        .unwrap();

        // Both messages processed, both archive attempts failed, nothing
        // deleted, attachments still saved
        assert_eq!(summary.attachments_saved, 2);
        assert_eq!(summary.archived, 0);
        assert_eq!(summary.failed, 2);
        assert!(mailbox.deleted.is_empty());
    }
}
