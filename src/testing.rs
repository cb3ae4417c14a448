//! Test support: a scripted, in-memory [`Mailbox`] implementation.
//!
//! Drives the archive coordinator and the orchestrator through the same
//! trait surface the real session implements, with per-operation failure
//! injection and a record of the mutations performed.

use crate::criteria::SearchTermSequence;
use crate::error::{Error, Result};
use crate::message::FetchedMessage;
use crate::session::{Mailbox, Uid};
use async_trait::async_trait;
use std::collections::HashSet;

fn imap_error(message: &str) -> async_imap::error::Error {
    async_imap::error::Error::Io(std::io::Error::new(std::io::ErrorKind::Other, message))
}

struct ScriptedMessage {
    uid: Uid,
    raw: Vec<u8>,
}

/// In-memory mailbox with scripted failures.
///
/// All state is public so tests can assert on exactly what happened.
pub(crate) struct ScriptedMailbox {
    /// Folders the server "knows"; selecting anything else fails.
    pub folders: HashSet<String>,
    /// Currently selected folder.
    pub selected: String,
    /// UIDs returned by the verification header search.
    pub verification_hits: Vec<Uid>,
    /// Fail the next COPY commands.
    pub fail_copy: bool,
    /// Fail STORE \Seen commands.
    pub fail_mark_seen: bool,
    /// Fail selecting this specific folder even though it exists.
    pub fail_select: Option<String>,
    /// UIDs marked Seen.
    pub seen: Vec<Uid>,
    /// UIDs deleted and expunged.
    pub deleted: Vec<Uid>,
    /// (uid, destination folder) pairs that were copied.
    pub copied: Vec<(Uid, String)>,
    /// (selected folder, header name, header value) per header search.
    pub header_searches: Vec<(String, String, String)>,
    /// Rendered queries from plain searches.
    pub search_queries: Vec<String>,
    /// UIDs reported by search but gone by fetch time (simulates a
    /// concurrent external delete).
    pub phantom_uids: Vec<Uid>,
    /// Whether logout ran.
    pub logged_out: bool,
    messages: Vec<ScriptedMessage>,
}

impl ScriptedMailbox {
    pub(crate) fn new<'a>(folders: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            folders: folders.into_iter().map(str::to_string).collect(),
            selected: "INBOX".to_string(),
            verification_hits: Vec::new(),
            fail_copy: false,
            fail_mark_seen: false,
            fail_select: None,
            seen: Vec::new(),
            deleted: Vec::new(),
            copied: Vec::new(),
            header_searches: Vec::new(),
            search_queries: Vec::new(),
            phantom_uids: Vec::new(),
            logged_out: false,
            messages: Vec::new(),
        }
    }

    /// Adds a message with the given UID and raw RFC822 bytes.
    pub(crate) fn add_message(&mut self, uid: Uid, raw: &[u8]) {
        self.messages.push(ScriptedMessage {
            uid,
            raw: raw.to_vec(),
        });
    }
}

#[async_trait]
impl Mailbox for ScriptedMailbox {
    async fn search(&mut self, terms: &SearchTermSequence) -> Result<Vec<Uid>> {
        self.search_queries.push(terms.to_string());
        let mut uids: Vec<Uid> = self.messages.iter().map(|m| m.uid).collect();
        uids.extend(&self.phantom_uids);
        uids.sort_unstable();
        Ok(uids)
    }

    async fn fetch(&mut self, uid: Uid) -> Result<Option<FetchedMessage>> {
        match self.messages.iter().find(|m| m.uid == uid) {
            Some(message) => FetchedMessage::parse(uid, &message.raw).map(Some),
            None => Ok(None),
        }
    }

    async fn mark_seen(&mut self, uid: Uid) -> Result<()> {
        if self.fail_mark_seen {
            return Err(Error::StoreFlags {
                uid,
                source: imap_error("STORE rejected"),
            });
        }
        self.seen.push(uid);
        Ok(())
    }

    async fn copy_to(&mut self, uid: Uid, folder: &str) -> Result<()> {
        if self.fail_copy {
            return Err(Error::Copy {
                uid,
                folder: folder.to_string(),
                source: imap_error("COPY rejected"),
            });
        }
        self.copied.push((uid, folder.to_string()));
        Ok(())
    }

    async fn select(&mut self, folder: &str) -> Result<()> {
        let blocked = self.fail_select.as_deref() == Some(folder);
        if blocked || !self.folders.contains(folder) {
            return Err(Error::SelectFolder {
                folder: folder.to_string(),
                source: imap_error("SELECT rejected"),
            });
        }
        self.selected = folder.to_string();
        Ok(())
    }

    async fn search_header(&mut self, name: &str, value: &str) -> Result<Vec<Uid>> {
        self.header_searches
            .push((self.selected.clone(), name.to_string(), value.to_string()));
        Ok(self.verification_hits.clone())
    }

    async fn mark_deleted_and_expunge(&mut self, uid: Uid) -> Result<()> {
        self.messages.retain(|m| m.uid != uid);
        self.deleted.push(uid);
        Ok(())
    }

    async fn list_folders(&mut self) -> Result<HashSet<String>> {
        Ok(self.folders.clone())
    }

    async fn logout(&mut self) -> Result<()> {
        self.logged_out = true;
        Ok(())
    }
}
